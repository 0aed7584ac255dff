//! Wire format for hand-editable YAML policy documents.
//!
//! This is a thin, versioned envelope around [`PolicyDocument`] so an
//! operator can edit policy as YAML without learning the compiled JSON
//! shape; `agent-policy::store` round-trips through it via
//! [`compile`]/[`reverse_compile`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compile::{compile, reverse_compile};
use crate::config::PolicyConfig;
use crate::document::PolicyDocument;
use crate::strategy::Channel;

const API_VERSION: &str = "policy.mxp/v1";
const KIND: &str = "ToolPolicy";

/// Errors raised while parsing or rendering a [`PolicyYamlDocument`].
#[derive(Debug, Error)]
pub enum YamlError {
    /// The YAML text didn't parse as a [`PolicyYamlDocument`].
    #[error("invalid policy yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The envelope's `apiVersion`/`kind` don't match what this crate emits.
    #[error("unsupported policy document: apiVersion={api_version}, kind={kind}")]
    UnsupportedEnvelope {
        /// The `apiVersion` found in the document.
        api_version: String,
        /// The `kind` found in the document.
        kind: String,
    },
}

/// `metadata` block of the YAML envelope. Entirely descriptive; the engine
/// never reads it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyMetadata {
    /// Human-facing name for the policy set, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `defaults` block of the YAML envelope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDefaults {
    /// Mirrors [`PolicyDocument::effect_default`].
    pub action: crate::strategy::Strategy,
    /// Mirrors [`PolicyDocument::channel_default`].
    #[serde(default)]
    pub channel: Channel,
}

/// The versioned YAML envelope around a compiled [`PolicyDocument`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyYamlDocument {
    /// Always `policy.mxp/v1`.
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Always `ToolPolicy`.
    pub kind: String,
    /// Descriptive metadata, not read by the engine.
    #[serde(default)]
    pub metadata: PolicyMetadata,
    /// Global defaults.
    pub defaults: PolicyDefaults,
    /// Background-agent context fallback map.
    #[serde(default)]
    pub context_fallbacks: std::collections::BTreeMap<String, String>,
    /// The compiled policy list.
    #[serde(default)]
    pub policies: Vec<crate::document::Policy>,
}

impl From<&PolicyDocument> for PolicyYamlDocument {
    fn from(document: &PolicyDocument) -> Self {
        Self {
            api_version: API_VERSION.to_owned(),
            kind: KIND.to_owned(),
            metadata: PolicyMetadata::default(),
            defaults: PolicyDefaults {
                action: document.effect_default,
                channel: document.channel_default,
            },
            context_fallbacks: document.context_fallbacks.clone(),
            policies: document.policies.clone(),
        }
    }
}

impl PolicyYamlDocument {
    /// Converts the envelope back into a compiled document, without
    /// validating `apiVersion`/`kind`.
    #[must_use]
    pub fn into_document(self) -> PolicyDocument {
        PolicyDocument {
            effect_default: self.defaults.action,
            channel_default: self.defaults.channel,
            context_fallbacks: self.context_fallbacks,
            policies: self.policies,
        }
    }

    fn validate_envelope(&self) -> Result<(), YamlError> {
        if self.api_version != API_VERSION || self.kind != KIND {
            return Err(YamlError::UnsupportedEnvelope {
                api_version: self.api_version.clone(),
                kind: self.kind.clone(),
            });
        }
        Ok(())
    }
}

/// Renders a configuration's compiled document as YAML text.
///
/// # Errors
///
/// Returns [`YamlError`] if serialization fails (practically unreachable for
/// well-formed configurations).
pub fn config_to_yaml(config: &PolicyConfig) -> Result<String, YamlError> {
    let document = compile(config);
    let envelope = PolicyYamlDocument::from(&document);
    serde_yaml::to_string(&envelope).map_err(YamlError::Parse)
}

/// Parses hand-authored or previously rendered YAML text, reconstructing the
/// configuration fields it implies.
///
/// # Errors
///
/// Returns [`YamlError::Parse`] for malformed YAML and
/// [`YamlError::UnsupportedEnvelope`] for a document this crate doesn't know
/// how to read.
pub fn yaml_to_config(yaml: &str) -> Result<PolicyConfig, YamlError> {
    let envelope: PolicyYamlDocument = serde_yaml::from_str(yaml)?;
    envelope.validate_envelope()?;
    Ok(reverse_compile(&envelope.into_document()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::INTERACTIVE;
    use crate::strategy::Strategy;

    #[test]
    fn round_trips_a_representative_configuration() {
        let mut config = PolicyConfig::default();
        config.context_defaults.insert(INTERACTIVE.into(), Strategy::Hitl);
        config
            .tool_policies
            .entry(INTERACTIVE.into())
            .or_default()
            .insert("run".into(), Strategy::Filter);

        let yaml = config_to_yaml(&config).expect("serializes");
        assert!(yaml.contains("apiVersion: policy.mxp/v1"));

        let parsed = yaml_to_config(&yaml).expect("parses");
        assert_eq!(parsed.context_defaults, config.context_defaults);
        assert_eq!(parsed.tool_policies, config.tool_policies);
        assert_eq!(parsed.default_action, config.default_action);
        assert_eq!(parsed.default_channel, config.default_channel);
        assert_eq!(parsed.hitl_enabled, config.hitl_enabled);
    }

    #[test]
    fn disabled_config_round_trips_to_disabled() {
        let mut config = PolicyConfig::default();
        config.hitl_enabled = false;

        let yaml = config_to_yaml(&config).expect("serializes");
        let parsed = yaml_to_config(&yaml).expect("parses");
        assert!(!parsed.hitl_enabled);
    }

    #[test]
    fn rejects_unknown_envelope() {
        let yaml = "apiVersion: other/v2\nkind: Something\ndefaults:\n  action: allow\n";
        assert!(matches!(
            yaml_to_config(yaml),
            Err(YamlError::UnsupportedEnvelope { .. })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(matches!(yaml_to_config("not: [valid"), Err(YamlError::Parse(_))));
    }
}
