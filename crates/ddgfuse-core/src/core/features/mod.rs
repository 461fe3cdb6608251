//! Feature records and the transformations applied to them before scoring.
//!
//! Plugins emit flat name→value maps. These are namespaced with
//! [`record::feature_key`], merged into a [`record::FeatureRecord`], and then
//! extended with wild-type→mutant and core→interface change features by
//! [`delta::synthesize_deltas`].

pub mod coi;
pub mod delta;
pub mod record;

pub use coi::Coi;
pub use delta::{SynthesizedFeatures, synthesize_deltas};
pub use record::{FeatureError, FeatureRecord, FeatureValue, feature_key};
