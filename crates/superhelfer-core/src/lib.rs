//! Shared types for the superhelfer workspace

#![allow(clippy::must_use_candidate)]

mod error;
mod tier;

pub use error::HttpError;
pub use tier::{SwitchDecision, Tier};
