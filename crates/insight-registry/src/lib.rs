// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod cache;
pub mod model;
pub mod registry;
pub mod source;

pub use cache::{CacheConfig, InferenceCache};
pub use model::{LinearModel, Model, ModelMetadata, ModelVersion};
pub use registry::{
    AbArm, AbTestOutcome, BatchOutcome, ModelRegistry, ModelStatistics, RegistryStatistics,
};
pub use source::{ModelSource, StaticSource};
