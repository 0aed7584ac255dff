//! `PolicyStore`: the mutable, thread-safe holder of a [`PolicyConfig`] and
//! its compiled [`StrategyEngine`].
//!
//! Reads never block on writers: resolution goes through an [`ArcSwap`]
//! snapshot of the compiled engine, refreshed atomically after every
//! mutation. Mutations serialize through a [`Mutex`] over the
//! human-editable [`PolicyConfig`], which is what gets persisted to disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::compile::compile;
use crate::config::{ConfigError, PolicyConfig, Rule};
use crate::context::EvalContext;
use crate::presets::{ContextClass, Preset};
use crate::resolver::StrategyEngine;
use crate::risk::{known_tool_ids, model_tier, risk_of, RiskLevel};
use crate::strategy::{Channel, Strategy};
use crate::yaml::{config_to_yaml, yaml_to_config, YamlError};

/// Errors raised by [`PolicyStore`] construction or mutation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configuration failed [`PolicyConfig::validate`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A YAML document could not be parsed or rendered.
    #[error(transparent)]
    Yaml(#[from] YamlError),
    /// The JSON configuration file could not be parsed or rendered.
    #[error("invalid policy json: {0}")]
    Json(#[from] serde_json::Error),
    /// A configuration or compiled-document file could not be read or written.
    #[error("policy file io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Thread-safe store for a live [`PolicyConfig`], optionally persisted to a
/// JSON config file and/or a YAML-rendered compiled document.
pub struct PolicyStore {
    config: Mutex<PolicyConfig>,
    engine: ArcSwap<StrategyEngine>,
    json_path: Option<PathBuf>,
    yaml_path: Option<PathBuf>,
}

impl PolicyStore {
    /// Builds a store from an in-memory configuration with no backing files.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `config` fails validation.
    pub fn from_config(config: PolicyConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let engine = StrategyEngine::new(Arc::new(compile(&config)));
        Ok(Self {
            config: Mutex::new(config),
            engine: ArcSwap::new(Arc::new(engine)),
            json_path: None,
            yaml_path: None,
        })
    }

    /// Builds a store backed by an optional JSON config file and an optional
    /// YAML-rendered compiled-document file. When `json_path` exists on
    /// disk it is loaded; otherwise the store starts from
    /// [`PolicyConfig::default`]. `yaml_path`, when set, is (re)written on
    /// every mutation as a human-inspectable mirror of the compiled
    /// document; it is never read back on startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `json_path` exists but can't be read,
    /// [`StoreError::Json`] if it doesn't parse, or [`StoreError::Config`]
    /// if the loaded configuration fails validation.
    pub fn new(json_path: Option<PathBuf>, yaml_path: Option<PathBuf>) -> Result<Self, StoreError> {
        let config = match &json_path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            _ => PolicyConfig::default(),
        };

        let mut store = Self::from_config(config)?;
        store.json_path = json_path;
        store.yaml_path = yaml_path;
        store.persist()?;
        Ok(store)
    }

    /// Returns a clone of the current configuration.
    #[must_use]
    pub fn config(&self) -> PolicyConfig {
        self.lock().clone()
    }

    /// Resolves the strategy for a tool-call request against the current
    /// compiled document. Never blocks on a concurrent mutation.
    #[must_use]
    pub fn resolve(&self, ctx: &EvalContext) -> Strategy {
        self.engine.load().resolve(ctx)
    }

    /// Resolves the approval channel for a firing `hitl`/`pitl` strategy.
    #[must_use]
    pub fn resolve_channel(&self, ctx: &EvalContext) -> Channel {
        self.engine.load().resolve_channel(ctx)
    }

    /// Renders the current configuration's compiled document as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Yaml`] on a serialization failure.
    pub fn get_policy_yaml(&self) -> Result<String, StoreError> {
        Ok(config_to_yaml(&self.lock())?)
    }

    /// Replaces the configuration wholesale from hand-authored YAML. The
    /// YAML is parsed, reverse-compiled into a [`PolicyConfig`], validated,
    /// and, only if valid, swapped in and persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Yaml`] if the YAML doesn't parse, or
    /// [`StoreError::Config`] if the resulting configuration is invalid.
    pub fn set_policy_yaml(&self, yaml: &str) -> Result<(), StoreError> {
        let config = yaml_to_config(yaml)?;
        self.replace_config(config)
    }

    /// Replaces the configuration wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `config` fails validation.
    pub fn replace_config(&self, config: PolicyConfig) -> Result<(), StoreError> {
        config.validate()?;
        *self.lock() = config;
        self.recompile_and_persist()
    }

    /// Flips the master enable switch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`]/[`StoreError::Json`] on a persistence failure.
    pub fn set_hitl_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.lock().hitl_enabled = enabled;
        self.recompile_and_persist()
    }

    /// Sets the global fallback strategy.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_default_action(&self, action: Strategy) -> Result<(), StoreError> {
        self.lock().default_action = action;
        self.recompile_and_persist()
    }

    /// Sets the default approval channel.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_default_channel(&self, channel: Channel) -> Result<(), StoreError> {
        self.lock().default_channel = channel;
        self.recompile_and_persist()
    }

    /// Sets the E.164 phone number used for `pitl` calls.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the number isn't a valid E.164 string.
    pub fn set_phone_number(&self, phone_number: impl Into<String>) -> Result<(), StoreError> {
        let phone_number = phone_number.into();
        let mut config = self.lock();
        let mut candidate = config.clone();
        candidate.phone_number = phone_number;
        candidate.validate()?;
        *config = candidate;
        drop(config);
        self.recompile_and_persist()
    }

    /// Sets the AI reviewer's model identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_aitl_model(&self, model: impl Into<String>) -> Result<(), StoreError> {
        self.lock().aitl_model = model.into();
        self.recompile_and_persist()
    }

    /// Toggles spotlighting/datamarking before AI-reviewer calls.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_aitl_spotlighting(&self, enabled: bool) -> Result<(), StoreError> {
        self.lock().aitl_spotlighting = enabled;
        self.recompile_and_persist()
    }

    /// Sets the Prompt Shield service endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_content_safety_endpoint(&self, endpoint: impl Into<String>) -> Result<(), StoreError> {
        self.lock().content_safety_endpoint = endpoint.into();
        self.recompile_and_persist()
    }

    /// Sets the catch-all strategy for an execution context.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_context_default(
        &self,
        context: impl Into<String>,
        strategy: Strategy,
    ) -> Result<(), StoreError> {
        self.lock().context_defaults.insert(context.into(), strategy);
        self.recompile_and_persist()
    }

    /// Sets a context+tool override.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn set_tool_policy(
        &self,
        context: impl Into<String>,
        tool_id: impl Into<String>,
        strategy: Strategy,
    ) -> Result<(), StoreError> {
        self.lock()
            .tool_policies
            .entry(context.into())
            .or_default()
            .insert(tool_id.into(), strategy);
        self.recompile_and_persist()
    }

    /// Removes a context+tool override, if present.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn remove_tool_policy(
        &self,
        context: &str,
        tool_id: &str,
    ) -> Result<(), StoreError> {
        if let Some(by_tool) = self.lock().tool_policies.get_mut(context) {
            by_tool.remove(tool_id);
        }
        self.recompile_and_persist()
    }

    /// Declares a model column with no overrides, if not already present.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn add_model_column(&self, model: impl Into<String>) -> Result<(), StoreError> {
        let model = model.into();
        let mut config = self.lock();
        if !config.model_columns.iter().any(|m| m == &model) {
            config.model_columns.push(model);
        }
        drop(config);
        self.recompile_and_persist()
    }

    /// Removes a model column and all of its overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn remove_model_column(&self, model: &str) -> Result<(), StoreError> {
        let mut config = self.lock();
        config.model_columns.retain(|m| m != model);
        config.model_policies.remove(model);
        drop(config);
        self.recompile_and_persist()
    }

    /// Sets a model+context+tool override. The model must already be a
    /// declared column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `model` is not a declared column.
    pub fn set_model_policy(
        &self,
        model: &str,
        context: impl Into<String>,
        tool_id: impl Into<String>,
        strategy: Strategy,
    ) -> Result<(), StoreError> {
        let mut config = self.lock();
        if !config.model_columns.iter().any(|m| m == model) {
            return Err(ConfigError::UnknownModelColumn(model.to_owned()).into());
        }
        config
            .model_policies
            .entry(model.to_owned())
            .or_default()
            .entry(context.into())
            .or_default()
            .insert(tool_id.into(), strategy);
        drop(config);
        self.recompile_and_persist()
    }

    /// Adds or replaces a legacy rule (matched by `id`).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn upsert_rule(&self, rule: Rule) -> Result<(), StoreError> {
        let mut config = self.lock();
        if let Some(existing) = config.rules.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule;
        } else {
            config.rules.push(rule);
        }
        drop(config);
        self.recompile_and_persist()
    }

    /// Removes a legacy rule by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn remove_rule(&self, id: &str) -> Result<(), StoreError> {
        self.lock().rules.retain(|r| r.id != id);
        self.recompile_and_persist()
    }

    /// Applies a named preset: rewrites every cataloged tool's context
    /// policy from the preset's risk matrix, applies the preset's per-tool
    /// overrides, sets risk-proportionate context defaults, and re-derives
    /// every declared model column's overrides using that model's
    /// tier-adjusted effective preset.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a persistence failure.
    pub fn apply_preset(&self, preset: Preset) -> Result<(), StoreError> {
        let mut config = self.lock();
        apply_preset_to(&mut config, preset);
        let model_columns = config.model_columns.clone();
        for model in model_columns {
            let effective = preset.effective_for_tier(model_tier(&model));
            for context in [crate::context::INTERACTIVE, crate::context::BACKGROUND] {
                let class = ContextClass::of(context);
                write_preset_tool_policies(
                    config
                        .model_policies
                        .entry(model.clone())
                        .or_default()
                        .entry(context.to_owned())
                        .or_default(),
                    effective,
                    class,
                );
            }
        }
        drop(config);
        self.recompile_and_persist()
    }

    fn lock(&self) -> MutexGuard<'_, PolicyConfig> {
        self.config.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn recompile_and_persist(&self) -> Result<(), StoreError> {
        let document = {
            let config = self.lock();
            compile(&config)
        };
        self.engine.store(Arc::new(StrategyEngine::new(Arc::new(document))));
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.json_path {
            write_atomically(path, &serde_json::to_string_pretty(&*self.lock())?)?;
        }
        if let Some(path) = &self.yaml_path {
            write_atomically(path, &self.get_policy_yaml()?)?;
        }
        Ok(())
    }
}

fn apply_preset_to(config: &mut PolicyConfig, preset: Preset) {
    for context in [crate::context::INTERACTIVE, crate::context::BACKGROUND] {
        let class = ContextClass::of(context);
        config
            .context_defaults
            .insert(context.to_owned(), preset.strategy_for(class, RiskLevel::Medium));
        write_preset_tool_policies(
            config.tool_policies.entry(context.to_owned()).or_default(),
            preset,
            class,
        );
    }
}

fn write_preset_tool_policies(
    table: &mut std::collections::BTreeMap<String, Strategy>,
    preset: Preset,
    class: ContextClass,
) {
    for tool_id in known_tool_ids() {
        table.insert(tool_id.to_owned(), preset.strategy_for(class, risk_of(tool_id)));
    }
    if class == ContextClass::Background {
        for (context, tool_id, strategy) in preset.overrides() {
            if ContextClass::of(context) == ContextClass::Background {
                table.insert((*tool_id).to_owned(), *strategy);
            }
        }
    }
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleScope;
    use crate::context::{BACKGROUND, INTERACTIVE};

    #[test]
    fn resolve_reflects_live_mutations() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        let ctx = EvalContext::new("run").with_mode(INTERACTIVE);
        assert_eq!(store.resolve(&ctx), Strategy::Allow);

        store.set_context_default(INTERACTIVE, Strategy::Deny).unwrap();
        assert_eq!(store.resolve(&ctx), Strategy::Deny);
    }

    #[test]
    fn set_model_policy_rejects_unknown_column() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        let err = store.set_model_policy("gpt-4.1", INTERACTIVE, "run", Strategy::Deny);
        assert!(matches!(err, Err(StoreError::Config(ConfigError::UnknownModelColumn(_)))));
    }

    #[test]
    fn model_column_overrides_context_default() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.add_model_column("gpt-4.1").unwrap();
        store.set_context_default(INTERACTIVE, Strategy::Hitl).unwrap();
        store
            .set_model_policy("gpt-4.1", INTERACTIVE, "run", Strategy::Deny)
            .unwrap();

        let ctx = EvalContext::new("run").with_mode(INTERACTIVE).with_model("gpt-4.1");
        assert_eq!(store.resolve(&ctx), Strategy::Deny);

        let other_ctx = EvalContext::new("run").with_mode(INTERACTIVE).with_model("claude-opus-4.6");
        assert_eq!(store.resolve(&other_ctx), Strategy::Hitl);
    }

    #[test]
    fn remove_model_column_drops_its_overrides() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.add_model_column("gpt-4.1").unwrap();
        store
            .set_model_policy("gpt-4.1", INTERACTIVE, "run", Strategy::Deny)
            .unwrap();
        store.remove_model_column("gpt-4.1").unwrap();

        let config = store.config();
        assert!(config.model_policies.is_empty());
        assert!(config.model_columns.is_empty());
    }

    #[test]
    fn rules_upsert_and_remove() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store
            .upsert_rule(Rule {
                id: "r1".into(),
                name: "custom".into(),
                pattern: "dangerous_tool".into(),
                scope: RuleScope::Tool,
                action: Strategy::Deny,
                enabled: true,
                contexts: vec![],
                models: vec![],
                hitl_channel: None,
            })
            .unwrap();

        let ctx = EvalContext::new("dangerous_tool");
        assert_eq!(store.resolve(&ctx), Strategy::Deny);

        store.remove_rule("r1").unwrap();
        assert_eq!(store.resolve(&ctx), Strategy::Allow);
    }

    #[test]
    fn apply_preset_rewrites_tool_policies_and_model_columns() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.add_model_column("gpt-5.3-codex").unwrap();
        store.apply_preset(Preset::Restrictive).unwrap();

        let shell_ctx = EvalContext::new("execute_shell").with_mode(BACKGROUND);
        assert_eq!(store.resolve(&shell_ctx), Strategy::Deny);

        let read_ctx = EvalContext::new("read_file").with_mode(INTERACTIVE);
        assert_eq!(store.resolve(&read_ctx), Strategy::Filter);
    }

    #[test]
    fn balanced_preset_tier_one_model_filters_run() {
        // S2: preset=balanced auto-applied to models; a tier-1 model's
        // effective preset relaxes to permissive, so interactive/high=filter.
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.add_model_column("gpt-5.3-codex").unwrap();
        store.apply_preset(Preset::Balanced).unwrap();

        let ctx = EvalContext::new("run").with_mode(INTERACTIVE).with_model("gpt-5.3-codex");
        assert_eq!(store.resolve(&ctx), Strategy::Filter);
    }

    #[test]
    fn balanced_preset_tier_three_model_requires_hitl_for_run() {
        // S3: a tier-3 model's effective preset stays balanced, so
        // interactive/high=hitl -- this must differ from the tier-1 case
        // above even though both start from the same selected preset.
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.add_model_column("gpt-4.1").unwrap();
        store.apply_preset(Preset::Balanced).unwrap();

        let ctx = EvalContext::new("run").with_mode(INTERACTIVE).with_model("gpt-4.1");
        assert_eq!(store.resolve(&ctx), Strategy::Hitl);
    }

    #[test]
    fn set_policy_yaml_round_trips_through_store() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store.set_context_default(INTERACTIVE, Strategy::Hitl).unwrap();
        let yaml = store.get_policy_yaml().unwrap();

        let store2 = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        store2.set_policy_yaml(&yaml).unwrap();
        assert_eq!(
            store2.config().context_defaults.get(INTERACTIVE),
            Some(&Strategy::Hitl)
        );
    }

    #[test]
    fn invalid_phone_number_is_rejected_and_not_persisted() {
        let store = PolicyStore::from_config(PolicyConfig::default()).unwrap();
        let err = store.set_phone_number("not-a-number");
        assert!(matches!(err, Err(StoreError::Config(ConfigError::InvalidPhoneNumber(_)))));
        assert_eq!(store.config().phone_number, "");
    }
}
