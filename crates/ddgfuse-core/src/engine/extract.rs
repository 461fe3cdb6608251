use super::context::BuildContext;
use super::error::PipelineError;
use crate::core::ensemble::error::ConfigurationError;
use crate::core::features::record::{FeatureRecord, feature_key};
use crate::core::models::mutation::Mutation;
use crate::plugins::error::AnalyzeError;
use crate::plugins::{Device, PluginSlot};
use tracing::trace;

/// The merged features of one mutation under one build context.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationFeatures {
    pub mutation: Mutation,
    pub features: FeatureRecord,
}

/// Runs every plugin that analyzes mutations and merges their features under
/// `<plugin>_<coi>_<name>` keys, in plugin order.
pub fn extract(
    mutation: &Mutation,
    context: &BuildContext,
    plugins: &[PluginSlot],
    device: Device,
) -> Result<MutationFeatures, PipelineError> {
    let analyze_failed = |source: AnalyzeError| PipelineError::Analyze {
        mutation: mutation.to_string(),
        source,
    };

    let mut features = FeatureRecord::new();
    for slot in plugins {
        let Some(analyzer) = slot.plugin().as_mutation_analyzer() else {
            continue;
        };
        let data = context.data(slot.name()).ok_or_else(|| {
            analyze_failed(AnalyzeError::MissingData {
                plugin: slot.name(),
            })
        })?;
        let model = slot.load(device)?;
        let record = analyzer
            .analyze_mutation(model, mutation, data)
            .map_err(analyze_failed)?;
        trace!(plugin = slot.name(), features = record.len(), "Plugin analysis finished.");

        let prefix = feature_key(slot.name(), context.coi(), "");
        features
            .merge_prefixed(&prefix, record)
            .map_err(ConfigurationError::from)?;
    }

    Ok(MutationFeatures {
        mutation: *mutation,
        features,
    })
}
