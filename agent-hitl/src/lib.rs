//! The pre-tool-use coordinator that turns a resolved [`agent_policy::Strategy`]
//! into a concrete permission decision: strategy dispatch, approval-channel
//! racing, and the event stream a transport observes along the way.

#![warn(missing_docs, clippy::pedantic)]

mod bindings;
mod events;
mod interceptor;
mod phone;
mod request;

pub use bindings::{BotReplier, ExecutionContext, TurnBindings};
pub use events::{EventEmitter, HitlEvent, MxpEventEmitter, MxpSink, TracingEventEmitter};
pub use interceptor::{HitlInterceptor, ShieldClient};
pub use phone::{PhoneError, PhoneResult, PhoneVerifier, StaticPhoneVerifier};
pub use request::{Decision, PermissionDecision, ToolCallRequest};
