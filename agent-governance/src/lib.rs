//! AI-reviewer (AITL) and prompt-injection filtering (Prompt Shield) for
//! MXP tool-call governance.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod reviewer;
mod shield;
mod spotlight;

pub use error::GovernanceError;
pub use reviewer::{AiReviewer, ReviewVerdict};
pub use shield::{BearerTokenProvider, PromptShieldClient, ShieldOutcome, StaticToken};
pub use spotlight::{datamark, frame_untrusted};
