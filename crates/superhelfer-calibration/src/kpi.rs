//! Scoring a routed batch

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use superhelfer_config::CostMatrixConfig;
use superhelfer_routing::{ReasonCode, Tier};

use crate::corpus::{Category, QuerySource};

/// Misroutes listed per cycle
const TOP_MISROUTES: usize = 10;

/// A routed calibration query
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub query: String,
    pub category: Category,
    pub source: QuerySource,
    pub expected: Tier,
    pub actual: Tier,
    pub reason: ReasonCode,
}

impl Outcome {
    pub fn is_correct(&self) -> bool {
        self.expected == self.actual
    }

    /// Expected Heavy but routed cheaper
    pub fn is_hard_negative(&self) -> bool {
        self.expected == Tier::Heavy && self.actual < Tier::Heavy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misroute {
    pub query: String,
    pub category: Category,
    pub expected: Tier,
    pub actual: Tier,
    pub reason: String,
    pub cost: f64,
}

/// Confusion counts indexed `[expected][actual]`
pub type ConfusionMatrix = BTreeMap<Tier, BTreeMap<Tier, usize>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total: usize,
    pub correct: usize,
    /// `correct / total`
    pub accuracy: f64,
    /// `100 * (1 - total_cost / total)`; 100 only when every query is correct
    pub cost_score: f64,
    /// `None` when the batch expected no Heavy query
    pub heavy_recall: Option<f64>,
    pub expected_counts: BTreeMap<Tier, usize>,
    pub routed_counts: BTreeMap<Tier, usize>,
    pub confusion: ConfusionMatrix,
    pub category_accuracy: BTreeMap<Category, f64>,
    /// Costliest misroutes first
    pub top_misroutes: Vec<Misroute>,
}

pub fn evaluate(outcomes: &[Outcome], costs: &CostMatrixConfig) -> Kpis {
    let total = outcomes.len();
    let correct = outcomes.iter().filter(|o| o.is_correct()).count();

    let mut expected_counts = BTreeMap::new();
    let mut routed_counts = BTreeMap::new();
    let mut confusion = ConfusionMatrix::new();
    let mut per_category: BTreeMap<Category, (usize, usize)> = BTreeMap::new();
    let mut total_cost = 0.0;

    for outcome in outcomes {
        *expected_counts.entry(outcome.expected).or_insert(0) += 1;
        *routed_counts.entry(outcome.actual).or_insert(0) += 1;
        *confusion
            .entry(outcome.expected)
            .or_default()
            .entry(outcome.actual)
            .or_insert(0) += 1;

        let slot = per_category.entry(outcome.category).or_default();
        slot.1 += 1;
        if outcome.is_correct() {
            slot.0 += 1;
        }

        total_cost += costs.cost(outcome.expected, outcome.actual);
    }

    let (accuracy, cost_score) = if total == 0 {
        (0.0, 0.0)
    } else {
        (correct as f64 / total as f64, 100.0 * (1.0 - total_cost / total as f64))
    };

    let expected_heavy = expected_counts.get(&Tier::Heavy).copied().unwrap_or(0);
    let correct_heavy = confusion
        .get(&Tier::Heavy)
        .and_then(|row| row.get(&Tier::Heavy))
        .copied()
        .unwrap_or(0);
    let heavy_recall = (expected_heavy > 0).then(|| correct_heavy as f64 / expected_heavy as f64);

    let category_accuracy = per_category
        .into_iter()
        .map(|(category, (hits, n))| (category, hits as f64 / n as f64))
        .collect();

    let mut top_misroutes: Vec<Misroute> = outcomes
        .iter()
        .filter(|o| !o.is_correct())
        .map(|o| Misroute {
            query: o.query.clone(),
            category: o.category,
            expected: o.expected,
            actual: o.actual,
            reason: o.reason.to_string(),
            cost: costs.cost(o.expected, o.actual),
        })
        .collect();
    top_misroutes.sort_by(|a, b| b.cost.total_cmp(&a.cost));
    top_misroutes.truncate(TOP_MISROUTES);

    Kpis {
        total,
        correct,
        accuracy,
        cost_score,
        heavy_recall,
        expected_counts,
        routed_counts,
        confusion,
        category_accuracy,
        top_misroutes,
    }
}
