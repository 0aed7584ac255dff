//! Risk taxonomy for tools/MCP servers/skills, and model tiering.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Coarse risk classification used to pick a preset's effective strategy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RiskLevel {
    /// Read-only operations with no lasting side effects.
    Low,
    /// Operations that write files, automate a browser, or schedule work.
    Medium,
    /// Shell/terminal access, source control, cloud admin, outbound voice.
    High,
}

/// Model capability tier; unknown models default to the most cautious tier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ModelTier(pub u8);

impl ModelTier {
    /// Strongest, frontier-class models.
    pub const TIER_1: Self = Self(1);
    /// Standard-capability models.
    pub const TIER_2: Self = Self(2);
    /// Small or cautious models.
    pub const TIER_3: Self = Self(3);
}

fn risk_table() -> &'static HashMap<&'static str, RiskLevel> {
    static TABLE: OnceLock<HashMap<&'static str, RiskLevel>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use RiskLevel::{High, Low, Medium};
        HashMap::from([
            // Read-only file tools.
            ("read_file", Low),
            ("list_directory", Low),
            ("search_files", Low),
            ("grep", Low),
            ("web_search", Low),
            ("web_fetch", Low),
            // Read-only SDK tools.
            ("view", Low),
            ("glob", Low),
            // Documentation-only MCP servers.
            ("mcp:docs-mcp-server", Low),
            ("mcp:context7", Low),
            // Read-only skills.
            ("skill:summarize", Low),
            ("skill:research", Low),
            // File-write / browser-automation / scheduling tools.
            ("write_file", Medium),
            ("edit_file", Medium),
            ("delete_file", Medium),
            ("browser_automation", Medium),
            ("schedule_task", Medium),
            ("send_email", Medium),
            ("skill:report-writer", Medium),
            // File-write SDK tools.
            ("create", Medium),
            ("edit", Medium),
            // Terminal / source-control / cloud-admin / outbound-voice.
            ("run_terminal_command", High),
            ("execute_shell", High),
            // Terminal SDK tools.
            ("run", High),
            ("bash", High),
            ("mcp:github-mcp-server", High),
            ("mcp:gitlab-mcp-server", High),
            ("mcp:aws-mcp-server", High),
            ("mcp:azure-mcp-server", High),
            ("outbound_call", High),
            ("skill:provision-infrastructure", High),
        ])
    })
}

/// Classifies a tool/MCP/skill identifier into a [`RiskLevel`].
///
/// Unknown `mcp:*` and `skill:*` identifiers default to [`RiskLevel::High`];
/// unknown plain tool names default to [`RiskLevel::Medium`].
#[must_use]
pub fn risk_of(tool_id: &str) -> RiskLevel {
    if let Some(level) = risk_table().get(tool_id) {
        return *level;
    }

    if tool_id.starts_with("mcp:") || tool_id.starts_with("skill:") {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

fn tier_table() -> &'static HashMap<&'static str, ModelTier> {
    static TABLE: OnceLock<HashMap<&'static str, ModelTier>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("gpt-5.3-codex", ModelTier::TIER_1),
            ("claude-opus-4.6", ModelTier::TIER_1),
            ("claude-opus-4.6-fast", ModelTier::TIER_1),
            ("claude-sonnet-4.6", ModelTier::TIER_2),
            ("gpt-5.2", ModelTier::TIER_2),
            ("gemini-3-pro-preview", ModelTier::TIER_2),
            ("gpt-5-mini", ModelTier::TIER_3),
            ("gpt-4.1", ModelTier::TIER_3),
        ])
    })
}

/// Looks up a model's capability tier, defaulting unknown models to tier 3.
#[must_use]
pub fn model_tier(model: &str) -> ModelTier {
    tier_table().get(model).copied().unwrap_or(ModelTier::TIER_3)
}

/// Every tool/MCP/skill identifier with a cataloged risk level, used to seed
/// tool policies when a preset is applied.
pub(crate) fn known_tool_ids() -> impl Iterator<Item = &'static str> {
    risk_table().keys().copied()
}
