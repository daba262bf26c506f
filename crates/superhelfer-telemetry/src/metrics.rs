//! Metric name constants and recording helpers

use std::time::Instant;

use opentelemetry::global;
use opentelemetry::metrics::{Histogram, Meter};

/// Instrumentation scope for every superhelfer instrument
pub const METER_NAME: &str = "superhelfer";

/// Meter from the global provider; a no-op until `init` installs an exporter
pub fn meter() -> Meter {
    global::meter(METER_NAME)
}

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[opentelemetry::KeyValue]) {
    let duration = start.elapsed().as_secs_f64();
    histogram.record(duration, attributes);
}

// Routing metric names
pub const ROUTING_DECISIONS: &str = "superhelfer.routing.decisions";
pub const ROUTING_FALLBACKS: &str = "superhelfer.routing.fallbacks";
pub const INFERENCE_DURATION: &str = "superhelfer.inference.duration";

// Calibration metric names
pub const CALIBRATION_COST_SCORE: &str = "superhelfer.calibration.cost_score";
pub const CALIBRATION_ACCURACY: &str = "superhelfer.calibration.accuracy";
pub const CALIBRATION_HEAVY_RECALL: &str = "superhelfer.calibration.heavy_recall";
