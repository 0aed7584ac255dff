//! HITL lifecycle events surfaced to the calling channel (chat UI, bot
//! transcript, audit log).

use async_trait::async_trait;
use mxp::{Message, MessageType};
use serde_json::{json, Value};
use tracing::info;

/// A HITL lifecycle event emitted while a tool call is intercepted.
#[derive(Clone, Debug)]
pub enum HitlEvent {
    /// An approval prompt was raised and is awaiting a human response.
    ApprovalRequest {
        /// Identifies the tool call awaiting approval.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Truncated, human-readable rendering of the call's arguments.
        args_preview: String,
    },
    /// An approval prompt was resolved, by whichever channel won the race.
    ApprovalResolved {
        /// Identifies the tool call that was resolved.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Whether the call was approved.
        approved: bool,
        /// Which channel produced the resolution (`"chat"`, `"bot"`,
        /// `"phone"`, `"timeout"`).
        channel: &'static str,
    },
    /// A tool call was denied without ever reaching a human.
    ToolDenied {
        /// Identifies the denied tool call.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Why the call was denied.
        reason: String,
    },
}

impl HitlEvent {
    /// Returns the event's wire name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ApprovalRequest { .. } => "approval_request",
            Self::ApprovalResolved { .. } => "approval_resolved",
            Self::ToolDenied { .. } => "tool_denied",
        }
    }

    /// Renders the event as a JSON payload suitable for an MXP event message
    /// or a WebSocket push.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::ApprovalRequest {
                tool_call_id,
                tool_name,
                args_preview,
            } => json!({
                "type": self.event_name(),
                "tool_call_id": tool_call_id,
                "tool_name": tool_name,
                "args_preview": args_preview,
            }),
            Self::ApprovalResolved {
                tool_call_id,
                tool_name,
                approved,
                channel,
            } => json!({
                "type": self.event_name(),
                "tool_call_id": tool_call_id,
                "tool_name": tool_name,
                "approved": approved,
                "channel": channel,
            }),
            Self::ToolDenied {
                tool_call_id,
                tool_name,
                reason,
            } => json!({
                "type": self.event_name(),
                "tool_call_id": tool_call_id,
                "tool_name": tool_name,
                "reason": reason,
            }),
        }
    }
}

/// Delivers [`HitlEvent`]s to whatever surface the current turn is bound to
/// (a chat UI over a WebSocket, a headless audit sink, or both).
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emits the supplied event.
    async fn emit(&self, event: HitlEvent);
}

/// An [`EventEmitter`] that logs events via `tracing` and nothing else. The
/// default used when no turn binding supplies a real emitter.
#[derive(Default)]
pub struct TracingEventEmitter;

#[async_trait]
impl EventEmitter for TracingEventEmitter {
    async fn emit(&self, event: HitlEvent) {
        info!(event = event.event_name(), payload = %event.to_json(), "hitl event");
    }
}

/// Accepts a built MXP message for delivery. A narrow seam so this crate
/// doesn't need to depend on whatever transport (WebSocket session, message
/// queue) a deployment uses to actually ship the message.
pub trait MxpSink: Send + Sync {
    /// Delivers the supplied MXP event message.
    fn emit(&self, message: Message);
}

/// An [`EventEmitter`] that logs events and forwards them as MXP `Event`
/// messages to a [`MxpSink`].
pub struct MxpEventEmitter {
    sink: std::sync::Arc<dyn MxpSink>,
}

impl MxpEventEmitter {
    /// Builds an emitter that forwards to `sink`.
    #[must_use]
    pub fn new(sink: std::sync::Arc<dyn MxpSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl EventEmitter for MxpEventEmitter {
    async fn emit(&self, event: HitlEvent) {
        let payload = event.to_json();
        info!(event = event.event_name(), payload = %payload, "hitl event");
        let payload_string = payload.to_string();
        let message = Message::new(MessageType::Event, payload_string.as_bytes());
        self.sink.emit(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn approval_request_renders_expected_fields() {
        let event = HitlEvent::ApprovalRequest {
            tool_call_id: "id-1".into(),
            tool_name: "run_command".into(),
            args_preview: "{}".into(),
        };
        assert_eq!(event.event_name(), "approval_request");
        let json = event.to_json();
        assert_eq!(json["tool_call_id"], "id-1");
        assert_eq!(json["args_preview"], "{}");
    }

    struct CollectingSink {
        messages: Mutex<Vec<Message>>,
    }

    impl MxpSink for CollectingSink {
        fn emit(&self, message: Message) {
            self.messages.lock().unwrap().push(message);
        }
    }

    #[tokio::test]
    async fn mxp_event_emitter_forwards_to_sink() {
        let sink = Arc::new(CollectingSink {
            messages: Mutex::new(Vec::new()),
        });
        let emitter = MxpEventEmitter::new(sink.clone());
        emitter
            .emit(HitlEvent::ToolDenied {
                tool_call_id: "id-2".into(),
                tool_name: "execute_shell".into(),
                reason: "blocked".into(),
            })
            .await;

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(format!("{:?}", messages[0].message_type()), "Event");
        let payload = String::from_utf8_lossy(messages[0].payload());
        assert!(payload.contains("tool_denied"));
    }
}
