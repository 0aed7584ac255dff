//! `StrategyEngine`: the pure, priority-ordered resolution function.

use std::sync::Arc;

use crate::compile::LEGACY_BAND_BASE;
use crate::context::EvalContext;
use crate::document::PolicyDocument;
use crate::strategy::{Channel, Strategy};

/// Resolves an [`EvalContext`] against a compiled [`PolicyDocument`].
///
/// Holds the document behind an `Arc` so cloning the engine (as the store
/// does on every snapshot swap) is cheap and lock-free for readers.
#[derive(Clone, Debug)]
pub struct StrategyEngine {
    document: Arc<PolicyDocument>,
}

impl StrategyEngine {
    /// Builds an engine over the supplied document.
    #[must_use]
    pub fn new(document: Arc<PolicyDocument>) -> Self {
        Self { document }
    }

    /// Returns the document backing this engine.
    #[must_use]
    pub fn document(&self) -> &Arc<PolicyDocument> {
        &self.document
    }

    /// Resolves the strategy for the supplied request.
    ///
    /// Pure and side-effect free: equal inputs and an equal document always
    /// produce the same result, safe for concurrent read access.
    #[must_use]
    pub fn resolve(&self, ctx: &EvalContext) -> Strategy {
        self.best_match(ctx, |_| true)
            .map_or(self.document.effect_default, |policy| policy.effect)
    }

    /// Resolves the approval channel for a firing `hitl`/`pitl` strategy.
    ///
    /// Scans the legacy-rule band for the first enabled match carrying an
    /// explicit channel; falls back to `document.channel_default`. When
    /// guardrails are disabled (no policies and an `allow` default) the
    /// channel is unconditionally `chat`, matching the source runtime's
    /// "disabled guardrails always talk over chat" behavior.
    #[must_use]
    pub fn resolve_channel(&self, ctx: &EvalContext) -> Channel {
        if self.document.policies.is_empty() && self.document.effect_default == Strategy::Allow {
            return Channel::Chat;
        }

        let fallback = self.document.fallback_for(ctx.mode());
        let legacy_channel = self
            .document
            .policies
            .iter()
            .filter(|policy| policy.enabled && policy.priority >= LEGACY_BAND_BASE)
            .find(|policy| policy.condition.matches(ctx, fallback))
            .and_then(|policy| policy.channel);

        legacy_channel.unwrap_or(self.document.channel_default)
    }

    fn best_match<F>(&self, ctx: &EvalContext, extra: F) -> Option<&crate::document::Policy>
    where
        F: Fn(&crate::document::Policy) -> bool,
    {
        let fallback = self.document.fallback_for(ctx.mode());
        self.document
            .policies
            .iter()
            .filter(|policy| policy.enabled && extra(policy))
            .filter(|policy| policy.condition.matches(ctx, fallback))
            .min_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Condition, Policy};

    fn doc(policies: Vec<Policy>, effect_default: Strategy) -> Arc<PolicyDocument> {
        Arc::new(PolicyDocument {
            effect_default,
            channel_default: Channel::Chat,
            context_fallbacks: Default::default(),
            policies,
        })
    }

    #[test]
    fn empty_document_returns_default() {
        let engine = StrategyEngine::new(doc(vec![], Strategy::Deny));
        assert_eq!(engine.resolve(&EvalContext::new("run")), Strategy::Deny);
    }

    #[test]
    fn lowest_priority_wins() {
        let policies = vec![
            Policy::new("a", 100, Condition::default(), Strategy::Deny),
            Policy::new("b", 10, Condition::default(), Strategy::Allow),
        ];
        let engine = StrategyEngine::new(doc(policies, Strategy::Deny));
        assert_eq!(engine.resolve(&EvalContext::new("run")), Strategy::Allow);
    }

    #[test]
    fn ties_broken_by_policy_id() {
        let policies = vec![
            Policy::new("zzz", 10, Condition::default(), Strategy::Deny),
            Policy::new("aaa", 10, Condition::default(), Strategy::Allow),
        ];
        let engine = StrategyEngine::new(doc(policies, Strategy::Deny));
        assert_eq!(engine.resolve(&EvalContext::new("run")), Strategy::Allow);
    }

    #[test]
    fn disabled_policies_are_skipped() {
        let policies = vec![
            Policy::new("a", 10, Condition::default(), Strategy::Allow).disabled(),
        ];
        let engine = StrategyEngine::new(doc(policies, Strategy::Deny));
        assert_eq!(engine.resolve(&EvalContext::new("run")), Strategy::Deny);
    }

    #[test]
    fn channel_defaults_to_chat_when_guardrails_disabled() {
        let engine = StrategyEngine::new(Arc::new(PolicyDocument::disabled()));
        assert_eq!(engine.resolve_channel(&EvalContext::new("run")), Channel::Chat);
    }

    #[test]
    fn channel_falls_back_to_document_default() {
        let mut document = PolicyDocument::disabled();
        document.effect_default = Strategy::Hitl;
        document.channel_default = Channel::Phone;
        let engine = StrategyEngine::new(Arc::new(document));
        assert_eq!(engine.resolve_channel(&EvalContext::new("run")), Channel::Phone);
    }

    #[test]
    fn channel_prefers_legacy_rule_override() {
        let policy = Policy::new("legacy-1", LEGACY_BAND_BASE, Condition::default(), Strategy::Hitl)
            .with_channel(Channel::Phone);
        let engine = StrategyEngine::new(doc(vec![policy], Strategy::Hitl));
        assert_eq!(engine.resolve_channel(&EvalContext::new("run")), Channel::Phone);
    }
}
