//! Error types for governance components.

use thiserror::Error;

/// Errors raised while constructing a governance component.
///
/// Neither [`crate::reviewer::AiReviewer`] nor
/// [`crate::shield::PromptShieldClient`] return errors from their
/// call-time methods: both are designed to degrade to a safe default
/// (deny/flag) rather than propagate a failure, since a tool call awaiting
/// review has nowhere useful to send a `Result::Err`. This type is only
/// for misconfiguration caught at construction time.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// A required configuration value was missing or malformed.
    #[error("governance component misconfigured: {reason}")]
    Configuration {
        /// Additional detail about the misconfiguration.
        reason: String,
    },
}

impl GovernanceError {
    /// Convenience constructor for configuration errors.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
