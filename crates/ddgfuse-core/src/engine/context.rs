use crate::core::features::coi::Coi;
use crate::core::models::domain::DomainDef;
use crate::plugins::PluginData;
use std::collections::BTreeMap;
use std::fmt;

/// Everything built once per (structure, protein sequence, ligand sequence)
/// and shared read-only by every mutation analyzed against it.
#[derive(Clone)]
pub struct BuildContext {
    coi: Coi,
    protein_domain: DomainDef,
    ligand_domain: Option<DomainDef>,
    plugin_data: BTreeMap<&'static str, PluginData>,
}

impl BuildContext {
    pub fn new(
        protein_domain: DomainDef,
        ligand_domain: Option<DomainDef>,
        plugin_data: BTreeMap<&'static str, PluginData>,
    ) -> Self {
        Self {
            coi: Coi::for_ligand(ligand_domain.is_some()),
            protein_domain,
            ligand_domain,
            plugin_data,
        }
    }

    pub fn coi(&self) -> Coi {
        self.coi
    }

    pub fn is_interface(&self) -> bool {
        self.coi == Coi::Interface
    }

    pub fn protein_domain(&self) -> &DomainDef {
        &self.protein_domain
    }

    pub fn ligand_domain(&self) -> Option<&DomainDef> {
        self.ligand_domain.as_ref()
    }

    /// Build output of the named plugin, if it built anything.
    pub fn data(&self, plugin: &str) -> Option<&PluginData> {
        self.plugin_data.get(plugin)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugin_data.keys().copied()
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("coi", &self.coi)
            .field("protein_domain", &self.protein_domain)
            .field("ligand_domain", &self.ligand_domain)
            .field("plugins", &self.plugin_data.keys().collect::<Vec<_>>())
            .finish()
    }
}
