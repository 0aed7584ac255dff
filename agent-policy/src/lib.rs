//! Governance policy evaluation for agents.

#![warn(missing_docs, clippy::pedantic)]

mod compile;
mod config;
mod context;
mod contracts;
mod decision;
mod document;
mod engine;
mod integrations;
mod presets;
mod resolver;
mod risk;
mod store;
mod strategy;
mod yaml;

pub use compile::{
    compile, reverse_compile, BAND_WIDTH, CONTEXT_DEFAULT_BAND_BASE, CONTEXT_TOOL_BAND_BASE,
    LEGACY_BAND_BASE, MODEL_BAND_BASE,
};
pub use config::{ConfigError, PolicyConfig, Rule, RuleScope};
pub use context::{
    EvalContext, API, BACKGROUND, BACKGROUND_AGENT_CONTEXTS, INTERACTIVE, VOICE,
};
pub use contracts::{PolicyAction, PolicyContext, PolicyRequest};
pub use decision::{DecisionKind, PolicyDecision};
pub use document::{Condition, Policy, PolicyDocument};
pub use engine::{
    ActionMatcher, PolicyEngine, PolicyError, PolicyResult, PolicyRule, RuleBasedEngine,
    RuleMatcher,
};
pub use integrations::{GovernanceClient, RemotePolicyEngine};
pub use presets::{ContextClass, Preset};
pub use resolver::StrategyEngine;
pub use risk::{model_tier, risk_of, ModelTier, RiskLevel};
pub use store::{PolicyStore, StoreError};
pub use strategy::{Channel, Strategy};
pub use yaml::{
    config_to_yaml, yaml_to_config, PolicyDefaults, PolicyMetadata, PolicyYamlDocument, YamlError,
};
