//! Phone-in-the-loop (PITL) approval channel.
//!
//! No telephony provider ships in this crate; [`PhoneVerifier`] is a seam a
//! deployment wires to its own outbound-call stack (e.g. Twilio). The
//! interceptor only needs the yes/no result of the call.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a [`PhoneVerifier`] implementation may report.
#[derive(Debug, Error)]
pub enum PhoneError {
    /// The outbound call could not be placed or did not complete.
    #[error("phone verification failed: {0}")]
    Failed(String),
}

/// Result type for [`PhoneVerifier::verify`].
pub type PhoneResult<T> = Result<T, PhoneError>;

/// Places an outbound call to request voice approval for a tool call.
#[async_trait]
pub trait PhoneVerifier: Send + Sync {
    /// Calls out and asks whether `tool_name` (summarized by `args_summary`)
    /// should be allowed to run. Returns the caller's yes/no answer.
    async fn verify(&self, tool_name: &str, args_summary: &str) -> PhoneResult<bool>;
}

/// A [`PhoneVerifier`] test double that returns a fixed answer after an
/// optional delay, without placing any real call.
pub struct StaticPhoneVerifier {
    answer: bool,
    delay: Duration,
}

impl StaticPhoneVerifier {
    /// Builds a verifier that immediately returns `answer`.
    #[must_use]
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            delay: Duration::ZERO,
        }
    }

    /// Delays the answer by `delay` before returning it.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl PhoneVerifier for StaticPhoneVerifier {
    async fn verify(&self, _tool_name: &str, _args_summary: &str) -> PhoneResult<bool> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.answer)
    }
}
