//! Priority-ordered tier rules
//!
//! Rules are evaluated top to bottom and the first matching predicate
//! wins. The last rule always matches.

use superhelfer_core::Tier;

use crate::ReasonCode;

/// Heavy must beat this score even when there is no technical signal
const HEAVY_FLOOR: f64 = 1.5;

/// Heavy must lead the technical score by this margin
const HEAVY_MARGIN: f64 = 0.5;

/// Signals extracted from one query
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Signals {
    /// No alphanumeric content
    pub degenerate: bool,
    pub basic_command: bool,
    pub calculation_verb: bool,
    /// Complexity reached the override threshold
    pub high_complexity: bool,
    pub heavy_score: f64,
    pub tech_score: f64,
}

/// One `(predicate, tier, reason)` entry
pub struct Rule {
    pub reason: ReasonCode,
    pub tier: Tier,
    predicate: fn(&Signals) -> bool,
}

impl Rule {
    pub fn matches(&self, signals: &Signals) -> bool {
        (self.predicate)(signals)
    }
}

/// The rule table, highest priority first
pub static RULES: [Rule; 6] = [
    Rule {
        reason: ReasonCode::FastDegenerate,
        tier: Tier::Fast,
        predicate: |s| s.degenerate,
    },
    Rule {
        reason: ReasonCode::FastBasicCommand,
        tier: Tier::Fast,
        predicate: |s| s.basic_command,
    },
    Rule {
        reason: ReasonCode::HeavyHighComplexityVerb,
        tier: Tier::Heavy,
        predicate: |s| s.high_complexity && s.calculation_verb,
    },
    Rule {
        reason: ReasonCode::HeavyWinRelaxed,
        tier: Tier::Heavy,
        predicate: |s| s.heavy_score >= HEAVY_FLOOR.max(s.tech_score + HEAVY_MARGIN),
    },
    Rule {
        reason: ReasonCode::CodeTech,
        tier: Tier::Code,
        predicate: |s| s.tech_score > 0.0,
    },
    Rule {
        reason: ReasonCode::FastDefault,
        tier: Tier::Fast,
        predicate: |_| true,
    },
];

/// First rule matching `signals`
pub fn evaluate(signals: &Signals) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| rule.matches(signals))
        .unwrap_or(&RULES[RULES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(heavy_score: f64, tech_score: f64) -> Signals {
        Signals {
            heavy_score,
            tech_score,
            ..Signals::default()
        }
    }

    #[test]
    fn degenerate_wins_over_everything() {
        let signals = Signals {
            degenerate: true,
            basic_command: true,
            heavy_score: 5.0,
            ..Signals::default()
        };
        assert_eq!(evaluate(&signals).reason, ReasonCode::FastDegenerate);
    }

    #[test]
    fn basic_command_beats_heavy_signals() {
        let signals = Signals {
            basic_command: true,
            calculation_verb: true,
            high_complexity: true,
            heavy_score: 3.0,
            ..Signals::default()
        };
        let rule = evaluate(&signals);
        assert_eq!(rule.tier, Tier::Fast);
        assert_eq!(rule.reason, ReasonCode::FastBasicCommand);
    }

    #[test]
    fn override_needs_both_verb_and_complexity() {
        let verb_only = Signals {
            calculation_verb: true,
            tech_score: 1.0,
            ..Signals::default()
        };
        assert_eq!(evaluate(&verb_only).reason, ReasonCode::CodeTech);

        let both = Signals {
            calculation_verb: true,
            high_complexity: true,
            tech_score: 4.0,
            ..Signals::default()
        };
        assert_eq!(evaluate(&both).reason, ReasonCode::HeavyHighComplexityVerb);
    }

    #[test]
    fn heavy_needs_floor_and_margin() {
        assert_eq!(evaluate(&scored(1.0, 0.0)).reason, ReasonCode::FastDefault);
        assert_eq!(evaluate(&scored(1.5, 0.0)).reason, ReasonCode::HeavyWinRelaxed);
        assert_eq!(evaluate(&scored(2.0, 2.0)).reason, ReasonCode::CodeTech);
        assert_eq!(evaluate(&scored(2.5, 2.0)).reason, ReasonCode::HeavyWinRelaxed);
    }

    #[test]
    fn nothing_matched_is_fast_default() {
        let rule = evaluate(&Signals::default());
        assert_eq!(rule.tier, Tier::Fast);
        assert_eq!(rule.reason, ReasonCode::FastDefault);
    }
}
