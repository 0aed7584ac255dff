//! Human-editable configuration compiled into a [`crate::document::PolicyDocument`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::strategy::{Channel, Strategy};

fn e164_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("valid regex"))
}

/// A legacy rule, predating the preset/tool-policy model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Unique rule id.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Glob-free exact match pattern against a tool or MCP server name.
    pub pattern: String,
    /// What the pattern is matched against.
    pub scope: RuleScope,
    /// Strategy applied when the rule fires.
    pub action: Strategy,
    /// Disabled rules are ignored during compilation.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Execution contexts the rule is scoped to; empty means all contexts.
    #[serde(default)]
    pub contexts: Vec<String>,
    /// Models the rule is scoped to; empty means all models.
    #[serde(default)]
    pub models: Vec<String>,
    /// Approval channel override when `action` is `hitl`/`pitl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hitl_channel: Option<Channel>,
}

fn default_true() -> bool {
    true
}

/// What a [`Rule`]'s pattern is matched against.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Matched against the plain tool name.
    Tool,
    /// Matched against the MCP server name.
    Mcp,
}

/// The full human-facing policy configuration. Every mutation to the owning
/// store regenerates the compiled [`crate::document::PolicyDocument`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Master switch; `false` disables all governance (everything allowed).
    pub hitl_enabled: bool,
    /// Global fallback strategy.
    pub default_action: Strategy,
    /// Default approval channel for strategies that don't specify one.
    pub default_channel: Channel,
    /// E.164 phone number PITL calls are placed to.
    pub phone_number: String,
    /// Model used by the AI reviewer.
    pub aitl_model: String,
    /// Whether reviewer input is data-marked before being sent.
    pub aitl_spotlighting: bool,
    /// Forward-compatibility field; always `prompt_shields` today.
    pub filter_mode: String,
    /// Prompt Shield service endpoint, empty when unconfigured.
    pub content_safety_endpoint: String,
    /// Per-context catch-all default strategy.
    pub context_defaults: BTreeMap<String, Strategy>,
    /// Per-context, per-tool strategy overrides.
    pub tool_policies: BTreeMap<String, BTreeMap<String, Strategy>>,
    /// Models with at least one per-model override.
    pub model_columns: Vec<String>,
    /// Per-model, per-context, per-tool overrides.
    pub model_policies: BTreeMap<String, BTreeMap<String, BTreeMap<String, Strategy>>>,
    /// Legacy rules, evaluated in order.
    pub rules: Vec<Rule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hitl_enabled: true,
            default_action: Strategy::Allow,
            default_channel: Channel::Chat,
            phone_number: String::new(),
            aitl_model: String::new(),
            aitl_spotlighting: true,
            filter_mode: "prompt_shields".to_owned(),
            content_safety_endpoint: String::new(),
            context_defaults: BTreeMap::new(),
            tool_policies: BTreeMap::new(),
            model_columns: Vec::new(),
            model_policies: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

/// Errors raised by [`PolicyConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `model_policies` names a model absent from `model_columns`.
    #[error("model `{0}` has policies but is not listed in model_columns")]
    UnknownModelColumn(String),
    /// `phone_number` is non-empty and not a valid E.164 string.
    #[error("phone_number `{0}` is not a valid E.164 number")]
    InvalidPhoneNumber(String),
}

impl PolicyConfig {
    /// Validates the invariants listed in the configuration's specification:
    /// every model with overrides is a declared column, and the phone
    /// number (if any) is valid E.164.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invariant violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for model in self.model_policies.keys() {
            if !self.model_columns.iter().any(|column| column == model) {
                return Err(ConfigError::UnknownModelColumn(model.clone()));
            }
        }

        if !self.phone_number.is_empty() && !e164_pattern().is_match(&self.phone_number) {
            return Err(ConfigError::InvalidPhoneNumber(self.phone_number.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PolicyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_model_policy_without_column() {
        let mut config = PolicyConfig::default();
        config
            .model_policies
            .entry("gpt-4.1".into())
            .or_default()
            .entry("interactive".into())
            .or_default()
            .insert("run".into(), Strategy::Deny);

        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownModelColumn("gpt-4.1".into()))
        );
    }

    #[test]
    fn rejects_malformed_phone_number() {
        let mut config = PolicyConfig::default();
        config.phone_number = "not-a-number".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPhoneNumber(_))
        ));
    }

    #[test]
    fn accepts_e164_with_and_without_plus() {
        let mut config = PolicyConfig::default();
        config.phone_number = "+15551234567".into();
        assert!(config.validate().is_ok());
        config.phone_number = "15551234567".into();
        assert!(config.validate().is_ok());
    }
}
