//! Heuristic query analysis for tier routing
//!
//! Extracts token count and keyword/pattern signals from a query and runs
//! them through the rule table. No ML pipeline, pure heuristics.

use regex::Regex;
use serde::Serialize;
use superhelfer_config::{AnalyzerConfig, ComplexityWeights};
use superhelfer_core::Tier;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::patterns::{
    self, BASIC_COMMAND, CALCULATION_VERB, COMPLEXITY_INDICATOR, CODE_KEYWORDS, LINUX_KEYWORDS, MATH, NamedPattern,
    TECH,
};
use crate::rules::{self, Signals};
use crate::{ReasonCode, RouteScores};

/// Boolean signals of an analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisFlags {
    pub basic_command: bool,
    /// Technical or programming vocabulary
    pub technical: bool,
    /// Mathematical or optimization intent
    pub mathematical: bool,
}

/// Result of analyzing one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    /// Whitespace-separated words
    pub token_count: usize,
    pub flags: AnalysisFlags,
    /// Deterministic score in `[0, 1]`
    pub complexity_score: f64,
    pub heavy_score: f64,
    pub tech_score: f64,
    pub matched_patterns: Vec<&'static str>,
    /// Recommended tier
    pub tier: Tier,
    pub reason_code: ReasonCode,
    /// Human-readable trace of how the tier was chosen
    pub reason: String,
}

impl QueryAnalysis {
    pub const fn scores(&self) -> RouteScores {
        RouteScores {
            heavy_score: self.heavy_score,
            tech_score: self.tech_score,
            complexity_score: self.complexity_score,
        }
    }

    fn degenerate(token_count: usize) -> Self {
        Self {
            token_count,
            flags: AnalysisFlags::default(),
            complexity_score: 0.0,
            heavy_score: 0.0,
            tech_score: 0.0,
            matched_patterns: Vec::new(),
            tier: Tier::Fast,
            reason_code: ReasonCode::FastDegenerate,
            reason: "fast_degenerate: no alphanumeric content".to_owned(),
        }
    }
}

/// Query analyzer with compiled operator vocabulary
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    linux_keywords: Option<Regex>,
    code_keywords: Option<Regex>,
}

impl QueryAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let linux: Vec<String> = LINUX_KEYWORDS
            .iter()
            .map(|w| (*w).to_owned())
            .chain(config.extra_linux_keywords.iter().cloned())
            .collect();
        let code: Vec<String> = CODE_KEYWORDS
            .iter()
            .map(|w| (*w).to_owned())
            .chain(config.extra_code_keywords.iter().cloned())
            .collect();

        Self {
            config: config.clone(),
            linux_keywords: patterns::keyword_regex(&linux),
            code_keywords: patterns::keyword_regex(&code),
        }
    }

    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a query; never fails
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let token_count = query.split_whitespace().count();

        if !query.chars().any(char::is_alphanumeric) {
            return QueryAnalysis::degenerate(token_count);
        }

        let lower = query.to_lowercase();
        let folded = fold(query);
        let mut matched_patterns = Vec::new();

        let basic_command = collect_matches(&BASIC_COMMAND, &lower, &folded, &mut matched_patterns) > 0;
        let math_matches = collect_matches(&MATH, &lower, &folded, &mut matched_patterns);
        let tech_matches = collect_matches(&TECH, &lower, &folded, &mut matched_patterns);

        let mut keyword_hit = false;
        for (id, re) in [("kw.linux", &self.linux_keywords), ("kw.code", &self.code_keywords)] {
            if re.as_ref().is_some_and(|re| re.is_match(&lower) || re.is_match(&folded)) {
                matched_patterns.push(id);
                keyword_hit = true;
            }
        }

        let calculation_verb = CALCULATION_VERB.is_match(&lower) || CALCULATION_VERB.is_match(&folded);
        if calculation_verb {
            matched_patterns.push("verb.calculation");
        }

        let indicators = count_indicators(&lower, &folded);

        let complexity_score = complexity(
            &self.config.weights,
            token_count,
            math_matches,
            tech_matches,
            indicators,
        );

        let mut heavy_score = math_matches as f64;
        if complexity_score >= self.config.heavy_bonus_threshold {
            heavy_score += 1.0;
        }

        let mut tech_score = tech_matches as f64;
        if keyword_hit {
            tech_score += 1.0;
        }

        let signals = Signals {
            degenerate: false,
            basic_command,
            calculation_verb,
            high_complexity: complexity_score >= self.config.override_threshold,
            heavy_score,
            tech_score,
        };
        let rule = rules::evaluate(&signals);

        let reason = format!(
            "{}: heavy_score={heavy_score:.1} tech_score={tech_score:.1} complexity={complexity_score:.2} tokens={token_count} matched=[{}]",
            rule.reason,
            matched_patterns.join(", ")
        );

        QueryAnalysis {
            token_count,
            flags: AnalysisFlags {
                basic_command,
                technical: tech_score > 0.0,
                mathematical: math_matches > 0,
            },
            complexity_score,
            heavy_score,
            tech_score,
            matched_patterns,
            tier: rule.tier,
            reason_code: rule.reason,
            reason,
        }
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}

/// Lowercase, decompose and drop combining marks ("Löse" becomes "lose")
fn fold(text: &str) -> String {
    text.to_lowercase().nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn collect_matches(
    table: &[NamedPattern],
    lower: &str,
    folded: &str,
    matched: &mut Vec<&'static str>,
) -> usize {
    let before = matched.len();
    matched.extend(table.iter().filter(|p| p.matches(lower, folded)).map(|p| p.id));
    matched.len() - before
}

/// Distinct indicator phrases, counted once across both text forms
fn count_indicators(lower: &str, folded: &str) -> usize {
    let mut seen: Vec<String> = COMPLEXITY_INDICATOR
        .find_iter(folded)
        .map(|m| m.as_str().to_owned())
        .collect();

    // The folded form covers umlaut spellings; the lowercase form adds
    // nothing new unless folding changed the match
    for m in COMPLEXITY_INDICATOR.find_iter(lower) {
        let phrase = fold(m.as_str());
        if !seen.contains(&phrase) {
            seen.push(phrase);
        }
    }

    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

fn complexity(
    weights: &ComplexityWeights,
    token_count: usize,
    math_matches: usize,
    tech_matches: usize,
    indicators: usize,
) -> f64 {
    let pressure = (token_count as f64 / weights.token_saturation as f64).min(1.0);

    let score = weights.token_weight * pressure
        + (math_matches as f64 * weights.math_per_match).min(weights.math_cap)
        + (tech_matches as f64 * weights.tech_per_match).min(weights.tech_cap)
        + (indicators as f64 * weights.indicator_per_match).min(weights.indicator_cap);

    score.clamp(0.0, 1.0)
}
