//! Calibration cycle and its schedule

use jiff::Timestamp;
use rand::SeedableRng;
use rand::rngs::StdRng;
use superhelfer_config::{CalibrationConfig, TiersConfig};
use superhelfer_routing::{QueryAnalyzer, decide};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bank::HardNegativeBank;
use crate::corpus::build_batch;
use crate::kpi::{Outcome, evaluate};
use crate::metrics::CalibrationMetrics;
use crate::store::{CalibrationCycle, CycleStore};
use crate::CalibrationError;

/// Runs calibration cycles against the live analyzer configuration
pub struct CalibrationRunner {
    analyzer: QueryAnalyzer,
    tiers: TiersConfig,
    config: CalibrationConfig,
    bank: HardNegativeBank,
    store: CycleStore,
    rng: StdRng,
    metrics: CalibrationMetrics,
}

impl CalibrationRunner {
    /// Open the output directory and load the bank
    pub fn new(analyzer: QueryAnalyzer, tiers: TiersConfig, config: CalibrationConfig) -> Result<Self, CalibrationError> {
        let store = CycleStore::open(&config.output_dir, config.rolling_window)?;
        let bank = HardNegativeBank::load(store.dir())?;
        let rng = config.seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        tracing::info!(
            output_dir = %config.output_dir.display(),
            next_cycle = store.next_id(),
            hard_negatives = bank.len(),
            "calibration ready"
        );

        Ok(Self {
            analyzer,
            tiers,
            config,
            bank,
            store,
            rng,
            metrics: CalibrationMetrics::new(),
        })
    }

    pub const fn bank(&self) -> &HardNegativeBank {
        &self.bank
    }

    pub const fn store(&self) -> &CycleStore {
        &self.store
    }

    /// Run one cycle
    ///
    /// Persistence failures are logged and the writes retried on the next
    /// cycle; the cycle record is returned either way.
    pub fn run_cycle(&mut self) -> CalibrationCycle {
        let cycle_id = self.store.next_id();

        let batch = build_batch(
            &mut self.rng,
            self.config.batch_size,
            self.config.hard_negative_fraction,
            &self.bank,
            self.store.recent_accuracy(),
        );

        let outcomes: Vec<Outcome> = batch
            .into_iter()
            .map(|query| {
                let analysis = self.analyzer.analyze(&query.text);
                let decision = decide(&analysis, &self.tiers);
                Outcome {
                    query: query.text,
                    category: query.category,
                    source: query.source,
                    expected: query.expected,
                    actual: decision.tier,
                    reason: decision.reason,
                }
            })
            .collect();

        let kpis = evaluate(&outcomes, &self.config.costs);

        let added = self
            .bank
            .extend(outcomes.iter().filter(|o| o.is_hard_negative()).map(|o| o.query.as_str()));
        if let Err(e) = self.bank.flush() {
            tracing::error!(error = %e, pending = self.bank.unflushed(), "failed to write hard negatives");
        }

        let cycle = CalibrationCycle::new(cycle_id, Timestamp::now(), kpis, added, self.bank.len());

        if let Err(e) = self.store.commit(cycle.clone()) {
            tracing::error!(cycle_id, error = %e, pending = self.store.pending_writes(), "failed to persist calibration cycle");
        }

        self.metrics.record(&cycle);

        tracing::info!(
            cycle_id,
            total = cycle.total,
            accuracy = cycle.accuracy,
            cost_score = cycle.cost_score,
            heavy_recall = ?cycle.heavy_recall,
            new_hard_negatives = added,
            hard_negatives = cycle.hard_negative_total,
            "calibration cycle complete"
        );

        cycle
    }

    /// Run a cycle every `interval` until `cancel` fires, starting immediately
    ///
    /// Cycles run on the blocking pool since persistence syncs to disk; a
    /// cycle in flight finishes before cancellation is observed.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            tracing::debug!(interval = ?self.config.interval, "calibration loop started");

            let mut runner = self;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let cycle = tokio::task::spawn_blocking(move || {
                    runner.run_cycle();
                    runner
                });
                match cycle.await {
                    Ok(returned) => runner = returned,
                    Err(e) => {
                        tracing::error!(error = %e, "calibration cycle aborted, stopping loop");
                        break;
                    }
                }
            }

            tracing::debug!("calibration loop stopped");
        })
    }
}
