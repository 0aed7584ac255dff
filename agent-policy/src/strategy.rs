//! The closed set of tool-call governance outcomes.

use serde::{Deserialize, Deserializer, Serialize};

/// Decision a tool call can resolve to once the policy engine matches a rule.
///
/// Ranked by restrictiveness: `Allow` is the least restrictive, `Deny` the
/// most. The ordering is used only when callers need to merge strategies
/// across several contexts (e.g. picking the stricter of two overlapping
/// defaults); the engine itself never compares strategies, only priorities.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pass the call through without review.
    Allow,
    /// Run the prompt-injection filter against the arguments.
    Filter,
    /// Delegate the decision to the background AI reviewer.
    Aitl,
    /// Ask a human over the interactive chat channel.
    Hitl,
    /// Ask a human via an outbound phone call.
    Pitl,
    /// Refuse immediately.
    Deny,
}

impl<'de> Deserialize<'de> for Strategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "allow" => Ok(Self::Allow),
            "filter" => Ok(Self::Filter),
            "aitl" => Ok(Self::Aitl),
            "hitl" | "ask" => Ok(Self::Hitl),
            "pitl" => Ok(Self::Pitl),
            "deny" => Ok(Self::Deny),
            other => Err(serde::de::Error::custom(format!(
                "unknown policy strategy: {other}"
            ))),
        }
    }
}

impl Strategy {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Filter => "filter",
            Self::Aitl => "aitl",
            Self::Hitl => "hitl",
            Self::Pitl => "pitl",
            Self::Deny => "deny",
        }
    }
}

/// Approval channel used when a `hitl`/`pitl` strategy fires without one
/// attached to the specific rule that matched.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Interactive chat channel (WebSocket emit or bot reply).
    Chat,
    /// Outbound phone verification.
    Phone,
}

impl Channel {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Phone => "phone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_normalizes_to_hitl() {
        let parsed: Strategy = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(parsed, Strategy::Hitl);
    }

    #[test]
    fn unknown_strategy_errors() {
        let err = serde_json::from_str::<Strategy>("\"yolo\"");
        assert!(err.is_err());
    }

    #[test]
    fn serialization_never_emits_ask() {
        let rendered = serde_json::to_string(&Strategy::Hitl).unwrap();
        assert_eq!(rendered, "\"hitl\"");
    }

    #[test]
    fn ranking_orders_by_restrictiveness() {
        assert!(Strategy::Allow < Strategy::Filter);
        assert!(Strategy::Filter < Strategy::Aitl);
        assert!(Strategy::Aitl < Strategy::Hitl);
        assert!(Strategy::Hitl < Strategy::Pitl);
        assert!(Strategy::Pitl < Strategy::Deny);
    }
}
