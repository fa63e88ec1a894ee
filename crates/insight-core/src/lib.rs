// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod record;
pub mod severity;
pub mod stats;

pub use error::EngineError;
pub use event::{EngineEvent, EventQueue, EventSink};
pub use record::Record;
pub use severity::Severity;
pub use stats::{
    clamp_unit, linear_fit, mean, median, min_max, population_stddev, population_variance,
    RunningStats,
};
