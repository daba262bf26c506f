use superhelfer_telemetry::Gauge;
use superhelfer_telemetry::metrics as names;

use crate::CalibrationCycle;

/// Gauges updated after every cycle
pub(crate) struct CalibrationMetrics {
    cost_score: Gauge<f64>,
    accuracy: Gauge<f64>,
    heavy_recall: Gauge<f64>,
}

impl CalibrationMetrics {
    pub fn new() -> Self {
        let meter = names::meter();

        Self {
            cost_score: meter
                .f64_gauge(names::CALIBRATION_COST_SCORE)
                .with_description("Cost-weighted routing score of the last calibration cycle")
                .build(),
            accuracy: meter
                .f64_gauge(names::CALIBRATION_ACCURACY)
                .with_description("Routing accuracy of the last calibration cycle")
                .build(),
            heavy_recall: meter
                .f64_gauge(names::CALIBRATION_HEAVY_RECALL)
                .with_description("Share of Heavy queries routed to Heavy in the last calibration cycle")
                .build(),
        }
    }

    pub fn record(&self, cycle: &CalibrationCycle) {
        self.cost_score.record(cycle.cost_score, &[]);
        self.accuracy.record(cycle.accuracy, &[]);
        if let Some(recall) = cycle.heavy_recall {
            self.heavy_recall.record(recall, &[]);
        }
    }
}
