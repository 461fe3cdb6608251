//! # Feature Plugins
//!
//! A plugin turns a structure or sequence into a reusable representation
//! ([`PluginData`]) and then scores point mutations against it. Plugins declare
//! what they can do through the capability accessors on [`FeaturePlugin`]; the
//! engine never calls a capability a plugin does not advertise.
//!
//! Model state is explicit. [`FeaturePlugin::load_model`] returns a
//! [`ModelHandle`] that is passed to every build and analysis call, so the same
//! plugin can be used with several independently loaded models.
//!
//! ## Reference plugins
//!
//! - [`protbert::ProtBert`] - masked language model over the sequence
//! - [`proteinsolver::ProteinSolver`] - graph network over the residue contact map

pub mod device;
pub mod error;
pub mod protbert;
pub mod proteinsolver;

pub use device::Device;
pub use error::{AnalyzeError, BackendError, BuildError, ModelError};

use crate::core::features::record::FeatureRecord;
use crate::core::models::domain::DomainTarget;
use crate::core::models::mutation::Mutation;
use crate::core::models::structure::Structure;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::info;

/// Plugin-specific build output, shared read-only between analyses.
pub type PluginData = Arc<dyn Any + Send + Sync>;

/// Constructs a model backend for a device.
pub type ModelLoader<M> = Box<dyn Fn(Device) -> Result<M, BackendError> + Send + Sync>;

/// A loaded model, owned by one plugin.
///
/// Forward passes through a handle are serialized by an internal mutex; clones
/// share the same model.
#[derive(Clone)]
pub struct ModelHandle {
    plugin: &'static str,
    device: Device,
    model: Arc<dyn Any + Send + Sync>,
}

impl ModelHandle {
    pub fn new<M: Send + 'static>(plugin: &'static str, device: Device, model: M) -> Self {
        Self {
            plugin,
            device,
            model: Arc::new(Mutex::new(model)),
        }
    }

    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Locks the model for a forward pass.
    ///
    /// Fails if the handle holds a model of a different type than `M`.
    pub fn lock<M: Send + 'static>(&self) -> Result<MutexGuard<'_, M>, ModelError> {
        let model = self
            .model
            .downcast_ref::<Mutex<M>>()
            .ok_or(ModelError::WrongHandle {
                plugin: self.plugin,
            })?;
        model.lock().map_err(|_| ModelError::Poisoned {
            plugin: self.plugin,
        })
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("plugin", &self.plugin)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Inputs for plugins that work on sequences alone.
#[derive(Debug, Clone, Copy)]
pub struct SequenceInputs<'a> {
    pub protein_sequence: &'a str,
    pub ligand_sequence: Option<&'a str>,
    pub remove_heteroatoms: bool,
}

impl SequenceInputs<'_> {
    /// The protein sequence followed by the ligand sequence, with unknown
    /// residues dropped when heteroatoms are removed.
    pub fn expected_sequence(&self) -> String {
        let mut sequence = String::from(self.protein_sequence);
        if let Some(ligand) = self.ligand_sequence {
            sequence.push_str(ligand);
        }
        if self.remove_heteroatoms {
            sequence.retain(|c| c != crate::core::utils::identifiers::UNKNOWN_RESIDUE_MARKER);
        }
        sequence
    }
}

/// Inputs for plugins that work on 3D structures.
///
/// `structure` holds only the matched domains: the protein chain first, then
/// the ligand chain if one was requested.
#[derive(Debug, Clone, Copy)]
pub struct StructureInputs<'a> {
    pub structure: &'a Structure,
    pub sequence: SequenceInputs<'a>,
    pub contact_cutoff: f64,
}

pub trait SequenceBuilder {
    fn build_from_sequence(
        &self,
        model: &ModelHandle,
        inputs: &SequenceInputs<'_>,
    ) -> Result<PluginData, BuildError>;
}

pub trait StructureBuilder {
    fn build_from_structure(
        &self,
        model: &ModelHandle,
        inputs: &StructureInputs<'_>,
    ) -> Result<PluginData, BuildError>;
}

pub trait MutationAnalyzer {
    /// Scores one mutation against previously built data.
    ///
    /// Implementations must check that the declared wild-type residue matches
    /// the built representation and fail with
    /// [`AnalyzeError::WildTypeMismatch`] otherwise. Returned keys are not
    /// namespaced; the caller prefixes them.
    fn analyze_mutation(
        &self,
        model: &ModelHandle,
        mutation: &Mutation,
        data: &PluginData,
    ) -> Result<FeatureRecord, AnalyzeError>;
}

pub trait Mutator {
    /// Returns a copy of the built structure with every mutation applied.
    fn mutate(&self, mutations: &[Mutation], data: &PluginData) -> Result<Structure, AnalyzeError>;
}

pub trait HomologyModeler {
    /// Builds a structure with the target sequences threaded onto the
    /// matching template chains of the built structure.
    fn create_model(
        &self,
        targets: &[DomainTarget],
        data: &PluginData,
    ) -> Result<Structure, BuildError>;
}

pub trait FeaturePlugin: Send + Sync {
    /// Name used to namespace this plugin's features.
    fn name(&self) -> &'static str;

    fn load_model(&self, device: Device) -> Result<ModelHandle, ModelError>;

    fn as_sequence_builder(&self) -> Option<&dyn SequenceBuilder> {
        None
    }

    fn as_structure_builder(&self) -> Option<&dyn StructureBuilder> {
        None
    }

    fn as_mutation_analyzer(&self) -> Option<&dyn MutationAnalyzer> {
        None
    }

    fn as_mutator(&self) -> Option<&dyn Mutator> {
        None
    }

    fn as_homology_modeler(&self) -> Option<&dyn HomologyModeler> {
        None
    }
}

/// A registered plugin together with its lazily loaded model.
pub struct PluginSlot {
    plugin: Box<dyn FeaturePlugin>,
    handle: OnceLock<ModelHandle>,
}

impl PluginSlot {
    pub fn new(plugin: Box<dyn FeaturePlugin>) -> Self {
        Self {
            plugin,
            handle: OnceLock::new(),
        }
    }

    pub fn plugin(&self) -> &dyn FeaturePlugin {
        self.plugin.as_ref()
    }

    pub fn name(&self) -> &'static str {
        self.plugin.name()
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn handle(&self) -> Option<&ModelHandle> {
        self.handle.get()
    }

    /// Loads the plugin's model on `device` unless it is already loaded.
    pub fn load(&self, device: Device) -> Result<&ModelHandle, ModelError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let handle = self.plugin.load_model(device)?;
        info!(plugin = self.name(), device = %device, "Loaded model.");
        Ok(self.handle.get_or_init(|| handle))
    }
}

impl fmt::Debug for PluginSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSlot")
            .field("plugin", &self.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
