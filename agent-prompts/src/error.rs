//! Error types shared across prompt orchestration.

use thiserror::Error;

use crate::context::ContextError;
use crate::template::TemplateError;

/// Errors produced while composing or applying prompt artifacts.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Context window budgeting failed.
    #[error("context window error: {0}")]
    Context(#[from] ContextError),

    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// A system instruction failed validation.
    #[error("invalid system instruction: {reason}")]
    InvalidInstruction {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Result alias for prompt orchestration operations.
pub type PromptResult<T> = Result<T, PromptError>;
