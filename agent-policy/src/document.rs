//! The compiled policy document: the canonical in-memory form the engine reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::EvalContext;
use crate::strategy::{Channel, Strategy};

/// A conjunction of optional match lists. All lists present on a condition
/// must match for the owning policy to fire; an absent list matches
/// unconditionally.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    /// Execution contexts this condition applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<Vec<String>>,
    /// Tool identifiers (bare name, `mcp:<server>`, or `skill:<name>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Model identifiers this condition applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// MCP server names this condition applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Vec<String>>,
}

impl Condition {
    /// Returns `true` when every populated list on this condition matches
    /// the supplied evaluation context.
    ///
    /// `fallback_mode` is the `context_fallbacks` target for `ctx.mode()`,
    /// if the document declares one; a `modes` list also matches when it
    /// names that fallback target directly.
    #[must_use]
    pub fn matches(&self, ctx: &EvalContext, fallback_mode: Option<&str>) -> bool {
        let modes_ok = self.modes.as_ref().is_none_or(|modes| {
            modes.iter().any(|m| m == ctx.mode())
                || fallback_mode.is_some_and(|fallback| modes.iter().any(|m| m == fallback))
        });

        let tools_ok = self
            .tools
            .as_ref()
            .is_none_or(|tools| tools.iter().any(|t| t == ctx.tool()));

        let models_ok = self.models.as_ref().is_none_or(|models| {
            !ctx.model().is_empty() && models.iter().any(|m| m == ctx.model())
        });

        let mcp_ok = self.mcp_servers.as_ref().is_none_or(|servers| {
            ctx.mcp_server()
                .is_some_and(|server| servers.iter().any(|s| s == server))
        });

        modes_ok && tools_ok && models_ok && mcp_ok
    }
}

fn default_enabled() -> bool {
    true
}

/// A single entry in the compiled policy document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    /// Unique identifier, used to break priority ties (lexicographically).
    pub id: String,
    /// Human-readable label, not used for matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lower numbers win; see the priority-band layout in [`crate::compile`].
    pub priority: u32,
    /// The match conjunction.
    #[serde(default)]
    pub condition: Condition,
    /// The strategy returned when this policy fires.
    pub effect: Strategy,
    /// Approval channel override for `hitl`/`pitl` effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    /// Disabled policies are skipped during resolution.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Policy {
    /// Creates a policy with `enabled = true` and no name/channel.
    #[must_use]
    pub fn new(id: impl Into<String>, priority: u32, condition: Condition, effect: Strategy) -> Self {
        Self {
            id: id.into(),
            name: None,
            priority,
            condition,
            effect,
            channel: None,
            enabled: true,
        }
    }

    /// Attaches an explicit approval channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Attaches a human-readable name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the policy disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// The compiled, canonical in-memory policy set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Strategy returned when no policy matches.
    pub effect_default: Strategy,
    /// Channel used when a firing strategy doesn't specify one.
    pub channel_default: Channel,
    /// Maps a background-agent context to the context it falls back to.
    #[serde(default)]
    pub context_fallbacks: BTreeMap<String, String>,
    /// The compiled policies, any order (resolution sorts by priority).
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicyDocument {
    /// Returns the document produced when HITL is disabled: allow
    /// everything, no policies, no fallbacks.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            effect_default: Strategy::Allow,
            channel_default: Channel::Chat,
            context_fallbacks: BTreeMap::new(),
            policies: Vec::new(),
        }
    }

    /// Returns the fallback target for the supplied mode, if the document
    /// declares one.
    #[must_use]
    pub fn fallback_for(&self, mode: &str) -> Option<&str> {
        self.context_fallbacks.get(mode).map(String::as_str)
    }
}
