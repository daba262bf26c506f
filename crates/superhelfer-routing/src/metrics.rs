use std::time::Instant;

use superhelfer_core::Tier;
use superhelfer_telemetry::metrics::{self as names, record_duration};
use superhelfer_telemetry::{Counter, Histogram, KeyValue};

use crate::{FallbackCause, RoutingDecision};

/// Instruments recorded by the router
pub(crate) struct RoutingMetrics {
    decisions: Counter<u64>,
    fallbacks: Counter<u64>,
    inference_duration: Histogram<f64>,
}

impl RoutingMetrics {
    pub fn new() -> Self {
        let meter = names::meter();

        Self {
            decisions: meter
                .u64_counter(names::ROUTING_DECISIONS)
                .with_description("Routing decisions by tier and reason")
                .build(),
            fallbacks: meter
                .u64_counter(names::ROUTING_FALLBACKS)
                .with_description("Fallbacks to a cheaper tier")
                .build(),
            inference_duration: meter
                .f64_histogram(names::INFERENCE_DURATION)
                .with_description("Duration of inference attempts")
                .with_unit("s")
                .build(),
        }
    }

    pub fn decision(&self, decision: &RoutingDecision) {
        self.decisions.add(
            1,
            &[
                KeyValue::new("tier", decision.tier.as_str()),
                KeyValue::new("reason", <&'static str>::from(decision.reason)),
            ],
        );
    }

    pub fn fallback(&self, from: Tier, to: Tier, cause: FallbackCause) {
        self.fallbacks.add(
            1,
            &[
                KeyValue::new("from", from.as_str()),
                KeyValue::new("to", to.as_str()),
                KeyValue::new("cause", <&'static str>::from(cause)),
            ],
        );
    }

    pub fn inference(&self, tier: Tier, start: Instant, success: bool) {
        record_duration(
            &self.inference_duration,
            start,
            &[
                KeyValue::new("tier", tier.as_str()),
                KeyValue::new("success", success),
            ],
        );
    }
}
