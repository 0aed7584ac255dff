//! Named presets: a `context-class x risk -> strategy` matrix plus per-tool
//! overrides and a tier-aware "effective preset" derivation for model
//! columns.

use crate::risk::{ModelTier, RiskLevel};
use crate::strategy::Strategy;

/// A named preset, ordered from most permissive to most restrictive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Preset {
    /// Reviews only obviously dangerous calls.
    Permissive,
    /// The default, risk-proportionate posture.
    Balanced,
    /// Reviews anything beyond read-only operations.
    Restrictive,
}

/// Which half of the matrix a context belongs to. Every baseline and
/// background-agent context other than `interactive`/`voice`/`api` collapses
/// to `Background` for the purpose of preset application.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextClass {
    /// `interactive`, `voice`, `api`.
    Interactive,
    /// `background` and every background-agent context.
    Background,
}

impl ContextClass {
    /// Classifies an execution context string.
    #[must_use]
    pub fn of(context: &str) -> Self {
        if context == crate::context::INTERACTIVE
            || context == crate::context::VOICE
            || context == crate::context::API
        {
            Self::Interactive
        } else {
            Self::Background
        }
    }
}

impl Preset {
    /// Returns the `context-class x risk -> strategy` matrix for this preset.
    ///
    /// Indexed `[context_class][risk]` with `ContextClass::Interactive = 0`,
    /// `Background = 1`, and `RiskLevel::Low = 0`, `Medium = 1`, `High = 2`.
    #[must_use]
    pub const fn matrix(self) -> [[Strategy; 3]; 2] {
        match self {
            Self::Permissive => [
                [Strategy::Filter, Strategy::Filter, Strategy::Filter],
                [Strategy::Filter, Strategy::Filter, Strategy::Hitl],
            ],
            Self::Balanced => [
                [Strategy::Filter, Strategy::Filter, Strategy::Hitl],
                [Strategy::Filter, Strategy::Hitl, Strategy::Deny],
            ],
            Self::Restrictive => [
                [Strategy::Filter, Strategy::Hitl, Strategy::Hitl],
                [Strategy::Filter, Strategy::Deny, Strategy::Deny],
            ],
        }
    }

    /// Looks up the strategy cell for a context/risk pair.
    #[must_use]
    pub fn strategy_for(self, class: ContextClass, risk: RiskLevel) -> Strategy {
        let row = match class {
            ContextClass::Interactive => 0,
            ContextClass::Background => 1,
        };
        let col = match risk {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        };
        self.matrix()[row][col]
    }

    /// Per-preset, per-tool rewrites applied after the matrix cell, as
    /// `(context, tool_id, strategy)` triples.
    #[must_use]
    pub const fn overrides(self) -> &'static [(&'static str, &'static str, Strategy)] {
        match self {
            Self::Balanced => &[
                ("background", "write_file", Strategy::Aitl),
                ("background", "edit_file", Strategy::Aitl),
                ("background", "delete_file", Strategy::Aitl),
                ("background", "run_terminal_command", Strategy::Aitl),
                ("background", "execute_shell", Strategy::Aitl),
            ],
            Self::Permissive | Self::Restrictive => &[],
        }
    }

    /// Derives the effective preset used to seed a given model's column, per
    /// the fixed `(selected preset, model tier) -> effective preset`
    /// cross-reference: strong/standard models under `permissive` stay
    /// `permissive`, cautious models get bumped to `balanced`; every tier
    /// under `balanced` stays `balanced` except tier-1, which relaxes to
    /// `permissive`; `restrictive` relaxes only tier-1, to `balanced`.
    #[must_use]
    pub const fn effective_for_tier(self, tier: ModelTier) -> Self {
        match (self, tier.0) {
            (Self::Permissive, 1 | 2) => Self::Permissive,
            (Self::Permissive, _) => Self::Balanced,
            (Self::Balanced, 1) => Self::Permissive,
            (Self::Balanced, _) => Self::Balanced,
            (Self::Restrictive, 1) => Self::Balanced,
            (Self::Restrictive, _) => Self::Restrictive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_matches_spec_table() {
        assert_eq!(
            Preset::Permissive.strategy_for(ContextClass::Background, RiskLevel::High),
            Strategy::Hitl
        );
        assert_eq!(
            Preset::Balanced.strategy_for(ContextClass::Interactive, RiskLevel::High),
            Strategy::Hitl
        );
        assert_eq!(
            Preset::Balanced.strategy_for(ContextClass::Background, RiskLevel::High),
            Strategy::Deny
        );
        assert_eq!(
            Preset::Restrictive.strategy_for(ContextClass::Interactive, RiskLevel::Medium),
            Strategy::Hitl
        );
    }

    #[test]
    fn tier_one_relaxes_by_one_step() {
        assert_eq!(
            Preset::Balanced.effective_for_tier(ModelTier::TIER_1),
            Preset::Permissive
        );
        assert_eq!(
            Preset::Restrictive.effective_for_tier(ModelTier::TIER_1),
            Preset::Balanced
        );
        assert_eq!(
            Preset::Permissive.effective_for_tier(ModelTier::TIER_1),
            Preset::Permissive
        );
    }

    #[test]
    fn tier_three_stays_put_under_balanced() {
        // The cross-reference keeps tier-3 at `balanced`, not a further
        // `restrictive` step: (balanced, 3) -> balanced in the original.
        assert_eq!(
            Preset::Balanced.effective_for_tier(ModelTier::TIER_3),
            Preset::Balanced
        );
    }

    #[test]
    fn tier_two_is_unchanged() {
        assert_eq!(
            Preset::Balanced.effective_for_tier(ModelTier::TIER_2),
            Preset::Balanced
        );
    }

    #[test]
    fn clamped_at_extremes() {
        assert_eq!(
            Preset::Permissive.effective_for_tier(ModelTier::TIER_1),
            Preset::Permissive
        );
        assert_eq!(
            Preset::Restrictive.effective_for_tier(ModelTier::TIER_3),
            Preset::Restrictive
        );
    }

    #[test]
    fn permissive_tier_three_relaxes_down_to_balanced() {
        assert_eq!(
            Preset::Permissive.effective_for_tier(ModelTier::TIER_3),
            Preset::Balanced
        );
    }

    #[test]
    fn context_class_groups_background_agents() {
        assert_eq!(ContextClass::of("scheduler"), ContextClass::Background);
        assert_eq!(ContextClass::of("voice"), ContextClass::Interactive);
    }
}
