//! Per-turn channel bindings: the concrete chat emitter, bot replier, phone
//! verifier, and execution context a single conversational turn supplies to
//! the interceptor before it may raise an approval prompt on that turn's
//! behalf.

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::EventEmitter;
use crate::phone::PhoneVerifier;

/// Identifies the execution context (mode) a turn is running under, e.g.
/// `"interactive"` or one of the background-agent contexts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext(String);

impl ExecutionContext {
    /// Wraps a context name.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self(context.into())
    }

    /// Returns the context name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutionContext {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExecutionContext {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Delivers a textual reply through the messaging/bot channel (e.g. a
/// WhatsApp or Slack bot), distinct from the realtime chat [`EventEmitter`].
#[async_trait]
pub trait BotReplier: Send + Sync {
    /// Sends `text` back through the bound bot channel.
    async fn reply(&self, text: &str);
}

/// The channel bindings a turn supplies before any tool call on its behalf
/// may be intercepted. All fields are optional: a turn with no chat
/// emitter simply can't win the chat leg of an approval race, and so on.
#[derive(Clone, Default)]
pub struct TurnBindings {
    /// Realtime chat event sink, used to raise `approval_request` prompts.
    pub emit: Option<Arc<dyn EventEmitter>>,
    /// Messaging/bot channel used to request and receive approval replies.
    pub bot_reply: Option<Arc<dyn BotReplier>>,
    /// The execution context this turn is running under.
    pub execution_context: Option<ExecutionContext>,
    /// Outbound-call verifier for `pitl` strategies.
    pub phone_verifier: Option<Arc<dyn PhoneVerifier>>,
}

impl TurnBindings {
    /// Starts from an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the chat event emitter.
    #[must_use]
    pub fn with_emitter(mut self, emit: Arc<dyn EventEmitter>) -> Self {
        self.emit = Some(emit);
        self
    }

    /// Attaches the bot replier.
    #[must_use]
    pub fn with_bot_reply(mut self, bot_reply: Arc<dyn BotReplier>) -> Self {
        self.bot_reply = Some(bot_reply);
        self
    }

    /// Attaches the execution context.
    #[must_use]
    pub fn with_execution_context(mut self, context: impl Into<ExecutionContext>) -> Self {
        self.execution_context = Some(context.into());
        self
    }

    /// Attaches the phone verifier.
    #[must_use]
    pub fn with_phone_verifier(mut self, verifier: Arc<dyn PhoneVerifier>) -> Self {
        self.phone_verifier = Some(verifier);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_context_conversions() {
        let a: ExecutionContext = "interactive".into();
        let b: ExecutionContext = String::from("interactive").into();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "interactive");
    }

    #[test]
    fn default_bindings_are_empty() {
        let bindings = TurnBindings::new();
        assert!(bindings.emit.is_none());
        assert!(bindings.bot_reply.is_none());
        assert!(bindings.execution_context.is_none());
        assert!(bindings.phone_verifier.is_none());
    }
}
