// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod batch;
pub mod defs;
pub mod extract;

pub use batch::{
    Augmentation, BatchConfig, BatchProcessor, BatchReport, MissingValuePolicy, ProcessedBatch,
};
pub use defs::{FeatureDef, FeatureKind, FeatureRule, FeatureSet};
pub use extract::{campaign_features, company_features, email_features, FeatureVector};
