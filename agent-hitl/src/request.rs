//! Tool-call request and permission-decision types exchanged with the
//! owning LLM session runtime.

use serde_json::Value;

/// Characters kept from a rendered argument payload when building the
/// human-facing preview attached to an `approval_request` event.
const ARGS_PREVIEW_LIMIT: usize = 200;

/// A proposed tool invocation awaiting a permission decision.
///
/// Produced by the session runtime ahead of executing a tool; carries
/// everything [`crate::HitlInterceptor::on_pre_tool_use`] needs to resolve a
/// strategy and, if one fires, to render an approval prompt.
#[derive(Clone, Debug)]
pub struct ToolCallRequest {
    /// Correlates this call with its eventual resolution and result.
    pub tool_call_id: String,
    /// Tool identifier: a bare name, an `mcp:<server>` form, or a `skill:<name>` form.
    pub tool_name: String,
    /// Arguments the tool would be invoked with, usually parsed from stringified JSON.
    pub tool_args: Value,
    /// MCP server the call is routed through, when `tool_name` is MCP-scoped.
    pub mcp_server: Option<String>,
}

impl ToolCallRequest {
    /// Builds a request for a tool call carrying no MCP server.
    #[must_use]
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_args: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            tool_args,
            mcp_server: None,
        }
    }

    /// Attaches the MCP server this call is routed through.
    #[must_use]
    pub fn with_mcp_server(mut self, mcp_server: impl Into<String>) -> Self {
        self.mcp_server = Some(mcp_server.into());
        self
    }

    /// Renders a truncated, human-readable preview of the arguments for the
    /// `approval_request` event payload.
    #[must_use]
    pub fn args_preview(&self) -> String {
        let rendered = self.tool_args.to_string();
        if rendered.chars().count() <= ARGS_PREVIEW_LIMIT {
            return rendered;
        }
        let truncated: String = rendered.chars().take(ARGS_PREVIEW_LIMIT).collect();
        format!("{truncated}\u{2026}")
    }
}

/// Binary outcome of a pre-tool-use check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// The call may proceed.
    Allow,
    /// The call must not proceed.
    Deny,
}

/// The interceptor's verdict for a [`ToolCallRequest`].
#[derive(Clone, Debug)]
pub struct PermissionDecision {
    /// The allow/deny outcome.
    pub decision: Decision,
    /// Arguments to substitute for the original call, when a strategy
    /// rewrote them. `None` means the original arguments are unchanged.
    pub modified_args: Option<Value>,
}

impl PermissionDecision {
    /// An unconditional allow with unmodified arguments.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            modified_args: None,
        }
    }

    /// An unconditional deny.
    #[must_use]
    pub const fn deny() -> Self {
        Self {
            decision: Decision::Deny,
            modified_args: None,
        }
    }

    /// Returns `true` when the call was allowed.
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_args_preview_is_unchanged() {
        let request = ToolCallRequest::new("id-1", "read_file", json!({"path": "a.txt"}));
        assert_eq!(request.args_preview(), r#"{"path":"a.txt"}"#);
    }

    #[test]
    fn long_args_preview_is_truncated() {
        let long_value = "x".repeat(400);
        let request = ToolCallRequest::new("id-1", "read_file", json!({"path": long_value}));
        let preview = request.args_preview();
        assert!(preview.chars().count() <= ARGS_PREVIEW_LIMIT + 1);
        assert!(preview.ends_with('\u{2026}'));
    }

    #[test]
    fn allow_and_deny_constructors() {
        assert!(PermissionDecision::allow().is_allow());
        assert!(!PermissionDecision::deny().is_allow());
    }
}
