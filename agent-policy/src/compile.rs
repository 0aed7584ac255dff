//! Deterministic compilation of a [`PolicyConfig`] into a [`PolicyDocument`],
//! and the reverse direction used by `set_policy_yaml`.

use std::collections::BTreeMap;

use crate::config::{PolicyConfig, Rule, RuleScope};
use crate::context::{BACKGROUND, BACKGROUND_AGENT_CONTEXTS};
use crate::document::{Condition, Policy, PolicyDocument};
use crate::strategy::Strategy;

/// Priority base for model + context + tool policies (most specific).
pub const MODEL_BAND_BASE: u32 = 10_000;
/// Priority base for context + tool policies.
pub const CONTEXT_TOOL_BAND_BASE: u32 = 20_000;
/// Priority base for context catch-all defaults.
pub const CONTEXT_DEFAULT_BAND_BASE: u32 = 30_000;
/// Priority base for legacy rules.
pub const LEGACY_BAND_BASE: u32 = 80_000;
/// Width reserved per band; bands never alias as long as no band emits more
/// than this many policies.
pub const BAND_WIDTH: u32 = 10_000;

/// Compiles a configuration into its canonical document. Pure: no I/O, no
/// locking, same input always yields a byte-identical (after YAML
/// serialization) output.
#[must_use]
pub fn compile(config: &PolicyConfig) -> PolicyDocument {
    if !config.hitl_enabled {
        return PolicyDocument::disabled();
    }

    let mut policies = Vec::new();
    compile_model_band(config, &mut policies);
    compile_context_tool_band(config, &mut policies);
    compile_legacy_band(config, &mut policies);
    compile_context_default_band(config, &mut policies);

    let context_fallbacks = BACKGROUND_AGENT_CONTEXTS
        .iter()
        .filter(|ctx| **ctx != BACKGROUND)
        .map(|ctx| ((*ctx).to_owned(), BACKGROUND.to_owned()))
        .collect();

    PolicyDocument {
        effect_default: config.default_action,
        channel_default: config.default_channel,
        context_fallbacks,
        policies,
    }
}

fn compile_model_band(config: &PolicyConfig, out: &mut Vec<Policy>) {
    let mut models: Vec<&String> = config.model_policies.keys().collect();
    models.sort();

    let mut offset = 0u32;
    for model in models {
        let by_context = &config.model_policies[model];
        let mut contexts: Vec<&String> = by_context.keys().collect();
        contexts.sort();
        for context in contexts {
            let by_tool = &by_context[context];
            let mut tool_ids: Vec<&String> = by_tool.keys().collect();
            tool_ids.sort();
            for tool_id in tool_ids {
                let strategy = by_tool[tool_id];
                let condition = build_condition(Some(context), Some(tool_id), Some(model));
                let id = format!("model:{model}:{context}:{tool_id}");
                out.push(Policy::new(id, MODEL_BAND_BASE + offset, condition, strategy));
                offset += 1;
            }
        }
    }
}

fn compile_context_tool_band(config: &PolicyConfig, out: &mut Vec<Policy>) {
    let mut contexts: Vec<&String> = config.tool_policies.keys().collect();
    contexts.sort();

    let mut offset = 0u32;
    for context in contexts {
        let by_tool = &config.tool_policies[context];
        let mut tool_ids: Vec<&String> = by_tool.keys().collect();
        tool_ids.sort();
        for tool_id in tool_ids {
            let strategy = by_tool[tool_id];
            let condition = build_condition(Some(context), Some(tool_id), None);
            let id = format!("context-tool:{context}:{tool_id}");
            out.push(Policy::new(
                id,
                CONTEXT_TOOL_BAND_BASE + offset,
                condition,
                strategy,
            ));
            offset += 1;
        }
    }
}

fn compile_legacy_band(config: &PolicyConfig, out: &mut Vec<Policy>) {
    let mut offset = 0u32;
    for rule in config.rules.iter().filter(|rule| rule.enabled) {
        let condition = build_rule_condition(rule);
        let id = format!("rule:{}", rule.id);
        let mut policy = Policy::new(id, LEGACY_BAND_BASE + offset, condition, rule.action);
        if let Some(channel) = rule.hitl_channel {
            policy = policy.with_channel(channel);
        }
        if !rule.name.is_empty() {
            policy = policy.with_name(rule.name.clone());
        }
        out.push(policy);
        offset += 1;
    }
}

fn compile_context_default_band(config: &PolicyConfig, out: &mut Vec<Policy>) {
    let mut contexts: Vec<&String> = config.context_defaults.keys().collect();
    contexts.sort();

    let mut offset = 0u32;
    for context in contexts {
        let strategy = config.context_defaults[context];
        let condition = Condition {
            modes: Some(vec![context.clone()]),
            tools: None,
            models: None,
            mcp_servers: None,
        };
        let id = format!("context-default:{context}");
        out.push(Policy::new(
            id,
            CONTEXT_DEFAULT_BAND_BASE + offset,
            condition,
            strategy,
        ));
        offset += 1;
    }
}

/// Builds a condition for a `{context?, tool_id?, model?}` triple. A tool id
/// prefixed with `mcp:` populates `mcp_servers` (with the prefix stripped)
/// instead of `tools`, mirroring the source's `_build_condition` split.
fn build_condition(context: Option<&str>, tool_id: Option<&str>, model: Option<&str>) -> Condition {
    let (tools, mcp_servers) = match tool_id {
        Some(id) => {
            if let Some(server) = id.strip_prefix("mcp:") {
                (None, Some(vec![server.to_owned()]))
            } else {
                (Some(vec![id.to_owned()]), None)
            }
        }
        None => (None, None),
    };

    Condition {
        modes: context.map(|c| vec![c.to_owned()]),
        tools,
        models: model.map(|m| vec![m.to_owned()]),
        mcp_servers,
    }
}

fn build_rule_condition(rule: &Rule) -> Condition {
    let modes = if rule.contexts.is_empty() {
        None
    } else {
        Some(rule.contexts.clone())
    };
    let models = if rule.models.is_empty() {
        None
    } else {
        Some(rule.models.clone())
    };
    let (tools, mcp_servers) = match rule.scope {
        RuleScope::Tool => (Some(vec![rule.pattern.clone()]), None),
        RuleScope::Mcp => (None, Some(vec![rule.pattern.clone()])),
    };

    Condition {
        modes,
        tools,
        models,
        mcp_servers,
    }
}

/// Reverses compilation: given a (possibly hand-authored) document,
/// reconstructs the configuration fields it implies. Each policy's
/// condition is classified by which of `{models, modes, tools/mcp_servers}`
/// are present; shapes that don't fit the model/context/default pattern
/// become legacy rules.
#[must_use]
pub fn reverse_compile(document: &PolicyDocument) -> PolicyConfig {
    let mut config = PolicyConfig {
        hitl_enabled: !(document.policies.is_empty()
            && document.context_fallbacks.is_empty()
            && document.effect_default == Strategy::Allow),
        default_action: document.effect_default,
        default_channel: document.channel_default,
        ..PolicyConfig::default()
    };

    let mut model_columns: Vec<String> = Vec::new();

    for policy in &document.policies {
        let has_tool = policy.condition.tools.is_some() || policy.condition.mcp_servers.is_some();
        let has_mode = policy.condition.modes.is_some();
        let has_model = policy.condition.models.is_some();

        if has_model && has_mode && has_tool {
            let model = first_of(&policy.condition.models).to_owned();
            let context = first_of(&policy.condition.modes).to_owned();
            let tool_id = tool_identifier(policy);
            if !model_columns.contains(&model) {
                model_columns.push(model.clone());
            }
            config
                .model_policies
                .entry(model)
                .or_default()
                .entry(context)
                .or_default()
                .insert(tool_id, policy.effect);
        } else if !has_model && has_mode && has_tool {
            let context = first_of(&policy.condition.modes).to_owned();
            let tool_id = tool_identifier(policy);
            config
                .tool_policies
                .entry(context)
                .or_default()
                .insert(tool_id, policy.effect);
        } else if !has_model && has_mode && !has_tool {
            let context = first_of(&policy.condition.modes).to_owned();
            config.context_defaults.insert(context, policy.effect);
        } else {
            config.rules.push(rule_from_policy(policy));
        }
    }

    model_columns.sort();
    config.model_columns = model_columns;
    config
}

fn first_of(list: &Option<Vec<String>>) -> &str {
    list.as_ref()
        .and_then(|values| values.first())
        .map_or("", String::as_str)
}

fn tool_identifier(policy: &Policy) -> String {
    if let Some(tools) = &policy.condition.tools {
        tools.first().cloned().unwrap_or_default()
    } else if let Some(servers) = &policy.condition.mcp_servers {
        format!("mcp:{}", servers.first().cloned().unwrap_or_default())
    } else {
        String::new()
    }
}

fn rule_from_policy(policy: &Policy) -> Rule {
    let (scope, pattern) = if let Some(tools) = &policy.condition.tools {
        (RuleScope::Tool, tools.first().cloned().unwrap_or_default())
    } else if let Some(servers) = &policy.condition.mcp_servers {
        (RuleScope::Mcp, servers.first().cloned().unwrap_or_default())
    } else {
        (RuleScope::Tool, String::new())
    };

    Rule {
        id: policy
            .id
            .strip_prefix("rule:")
            .unwrap_or(&policy.id)
            .to_owned(),
        name: policy.name.clone().unwrap_or_default(),
        pattern,
        scope,
        action: policy.effect,
        enabled: policy.enabled,
        contexts: policy.condition.modes.clone().unwrap_or_default(),
        models: policy.condition.models.clone().unwrap_or_default(),
        hitl_channel: policy.channel,
    }
}

#[allow(dead_code)]
fn bands() -> [u32; 4] {
    [
        MODEL_BAND_BASE,
        CONTEXT_TOOL_BAND_BASE,
        CONTEXT_DEFAULT_BAND_BASE,
        LEGACY_BAND_BASE,
    ]
}
