// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod factors;
pub mod lead;
pub mod quality;

pub use factors::{FactorScore, FactorWeights, ScoreResult};
pub use lead::{LeadProfile, LeadScoringEngine, LeadTier, PriorityThresholds};
pub use quality::{EmailQualityClassifier, QualityTier};
