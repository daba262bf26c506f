//! Offline routing calibration
//!
//! Drives labeled synthetic queries through the analyzer and the routing
//! decision, scores the result against the expected tiers and keeps a bank
//! of hard negatives that is oversampled in later cycles:
//! - **Corpus**: category templates, adversarial mutations, curriculum mix
//! - **KPIs**: accuracy, cost score, heavy recall, confusion matrix
//! - **Bank**: append-only `hard_negatives.txt`
//! - **Store**: atomic `cycle_<id>.json` and `latest.json`

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod bank;
pub mod corpus;
pub mod error;
pub mod kpi;
mod metrics;
pub mod runner;
pub mod store;

pub use bank::HardNegativeBank;
pub use corpus::{CalibrationQuery, Category, QuerySource};
pub use error::CalibrationError;
pub use kpi::{Kpis, Misroute, Outcome};
pub use runner::CalibrationRunner;
pub use store::{CalibrationCycle, CycleStore, RollingSummary};
