use super::record::{FeatureError, FeatureRecord};
use std::collections::BTreeSet;
use tracing::trace;

const WT_SUFFIX: &str = "_wt";
const MUT_SUFFIX: &str = "_mut";
const CHANGE_SUFFIX: &str = "_change";
const CORE_SEGMENT: &str = "_core_";
const INTERFACE_SEGMENT: &str = "_interface_";
const CORE2INTERFACE_SEGMENT: &str = "_core2interface_";

/// A feature record extended with derived change features.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedFeatures {
    pub record: FeatureRecord,
    /// Vector-valued columns eligible for PCA compression, sorted.
    pub pca_columns: Vec<String>,
}

/// Derives wild-type→mutant and core→interface change features.
///
/// The wt→mut pass runs first so that the core→interface pass can compare
/// the freshly computed `_change` columns.
///
/// - For each `<stem>_mut` with a `<stem>_wt` sibling, `<stem>_change = mut - wt`
///   is added. Vector pairs mark `<stem>_wt` and `<stem>_change` as PCA-eligible
///   and drop `<stem>_mut`; scalar pairs keep `<stem>_mut`.
/// - For each non-`_mut` key containing `_interface_` whose `_core_` sibling
///   exists, the key with `_core2interface_` in place of `_interface_` is added
///   with value `interface - core`. Vector results are PCA-eligible.
///
/// Keys are visited in sorted order so the output is reproducible.
pub fn synthesize_deltas(record: &FeatureRecord) -> Result<SynthesizedFeatures, FeatureError> {
    let mut record = record.clone();
    let mut pca_columns = BTreeSet::new();

    for key in record.sorted_keys() {
        let Some(stem) = key.strip_suffix(MUT_SUFFIX) else {
            continue;
        };
        let wt_key = format!("{stem}{WT_SUFFIX}");
        let Some(wt_value) = record.get(&wt_key) else {
            continue;
        };
        let Some(mut_value) = record.get(&key) else {
            continue;
        };

        let change = mut_value
            .difference(wt_value)
            .map_err(|reason| FeatureError::ShapeMismatch {
                minuend: key.clone(),
                subtrahend: wt_key.clone(),
                reason,
            })?;
        let change_key = format!("{stem}{CHANGE_SUFFIX}");
        trace!(feature = %change_key, vector = change.is_vector(), "wt→mut change");

        if change.is_vector() {
            pca_columns.insert(wt_key);
            pca_columns.insert(change_key.clone());
            record.remove(&key);
        }
        record.insert(change_key, change)?;
    }

    for key in record.sorted_keys() {
        if !key.contains(INTERFACE_SEGMENT) || key.ends_with(MUT_SUFFIX) {
            continue;
        }
        let core_key = key.replacen(INTERFACE_SEGMENT, CORE_SEGMENT, 1);
        let (Some(interface_value), Some(core_value)) = (record.get(&key), record.get(&core_key))
        else {
            continue;
        };

        let change = interface_value
            .difference(core_value)
            .map_err(|reason| FeatureError::ShapeMismatch {
                minuend: key.clone(),
                subtrahend: core_key.clone(),
                reason,
            })?;
        let change_key = key.replacen(INTERFACE_SEGMENT, CORE2INTERFACE_SEGMENT, 1);
        trace!(feature = %change_key, vector = change.is_vector(), "core→interface change");

        if change.is_vector() {
            pca_columns.insert(change_key.clone());
        }
        record.insert(change_key, change)?;
    }

    Ok(SynthesizedFeatures {
        record,
        pca_columns: pca_columns.into_iter().collect(),
    })
}
