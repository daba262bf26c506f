use serde::Deserialize;

/// Query analyzer tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Complexity at or above which a calculation verb forces the heavy tier
    #[serde(default = "default_threshold")]
    pub override_threshold: f64,
    /// Complexity at or above which the heavy score gets a bonus point
    #[serde(default = "default_threshold")]
    pub heavy_bonus_threshold: f64,
    /// Weights of the complexity score components
    #[serde(default)]
    pub weights: ComplexityWeights,
    /// Additional shell/system words counted as technical vocabulary
    #[serde(default)]
    pub extra_linux_keywords: Vec<String>,
    /// Additional programming words counted as technical vocabulary
    #[serde(default)]
    pub extra_code_keywords: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            override_threshold: default_threshold(),
            heavy_bonus_threshold: default_threshold(),
            weights: ComplexityWeights::default(),
            extra_linux_keywords: Vec::new(),
            extra_code_keywords: Vec::new(),
        }
    }
}

/// Weights combined into `complexity_score`
///
/// Each component is capped on its own; the sum is clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplexityWeights {
    /// Contribution of a query at or beyond `token_saturation` tokens
    pub token_weight: f64,
    /// Token count at which length pressure stops growing
    pub token_saturation: usize,
    /// Per matched mathematical pattern
    pub math_per_match: f64,
    pub math_cap: f64,
    /// Per matched technical pattern
    pub tech_per_match: f64,
    pub tech_cap: f64,
    /// Per multi-step or problem-solving indicator phrase
    pub indicator_per_match: f64,
    pub indicator_cap: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            token_weight: 0.3,
            token_saturation: 100,
            math_per_match: 0.2,
            math_cap: 0.6,
            tech_per_match: 0.05,
            tech_cap: 0.2,
            indicator_per_match: 0.1,
            indicator_cap: 0.3,
        }
    }
}

impl ComplexityWeights {
    /// All weights, for validation
    pub(crate) fn values(&self) -> [(&'static str, f64); 7] {
        [
            ("token_weight", self.token_weight),
            ("math_per_match", self.math_per_match),
            ("math_cap", self.math_cap),
            ("tech_per_match", self.tech_per_match),
            ("tech_cap", self.tech_cap),
            ("indicator_per_match", self.indicator_per_match),
            ("indicator_cap", self.indicator_cap),
        ]
    }
}

const fn default_threshold() -> f64 {
    0.8
}
