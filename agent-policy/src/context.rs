//! Execution-context identifiers and tool-call evaluation contexts.

use serde::{Deserialize, Serialize};

/// Well-known interactive context: a human is chatting with the agent in real time.
pub const INTERACTIVE: &str = "interactive";
/// Well-known background context: a driver is acting without a human waiting on it.
pub const BACKGROUND: &str = "background";
/// Voice-call context.
pub const VOICE: &str = "voice";
/// Programmatic API context.
pub const API: &str = "api";

/// The background-agent contexts that fall back to [`BACKGROUND`] absent a
/// direct policy. Every background driver in the runtime (the scheduler, the
/// bot-channel processor, the proactive loop, the realtime voice bridge, and
/// the memory-formation pass) pins itself to one of these.
pub const BACKGROUND_AGENT_CONTEXTS: &[&str] = &[
    "scheduler",
    "bot_processor",
    "proactive_loop",
    "memory_formation",
    "aitl_reviewer",
    "realtime",
];

/// Evaluation context carried on a single tool-call request.
///
/// Every field but `tool` is optional from the caller's perspective; `mode`
/// defaults to [`INTERACTIVE`] and `model`/`mcp_server` default to empty.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalContext {
    tool: String,
    mode: String,
    #[serde(default)]
    model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mcp_server: Option<String>,
}

impl EvalContext {
    /// Creates a context for the supplied tool, defaulting to the interactive
    /// mode with no model or MCP server attached.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            mode: INTERACTIVE.to_owned(),
            model: String::new(),
            mcp_server: None,
        }
    }

    /// Overrides the execution context/mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Attaches the model identifier driving the request.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Attaches the MCP server name when the tool call is routed through one.
    #[must_use]
    pub fn with_mcp_server(mut self, mcp_server: impl Into<String>) -> Self {
        self.mcp_server = Some(mcp_server.into());
        self
    }

    /// Returns the tool identifier (bare name, `mcp:<server>`, or `skill:<name>`).
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the execution context/mode.
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Returns the model identifier, empty when not supplied.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the MCP server name, when the tool call names one.
    #[must_use]
    pub fn mcp_server(&self) -> Option<&str> {
        self.mcp_server.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_interactive() {
        let ctx = EvalContext::new("run");
        assert_eq!(ctx.mode(), INTERACTIVE);
        assert_eq!(ctx.model(), "");
        assert_eq!(ctx.mcp_server(), None);
    }

    #[test]
    fn builder_overrides_fields() {
        let ctx = EvalContext::new("mcp:github-mcp-server")
            .with_mode(BACKGROUND)
            .with_model("gpt-4.1")
            .with_mcp_server("github-mcp-server");

        assert_eq!(ctx.mode(), BACKGROUND);
        assert_eq!(ctx.model(), "gpt-4.1");
        assert_eq!(ctx.mcp_server(), Some("github-mcp-server"));
    }
}
