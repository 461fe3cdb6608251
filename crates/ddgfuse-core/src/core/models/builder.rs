use super::atom::Atom;
use super::chain::Chain;
use super::residue::Residue;
use super::structure::Structure;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("A chain must be started before adding residues")]
    NoCurrentChain,
    #[error("A residue must be started before adding atoms")]
    NoCurrentResidue,
}

/// Incrementally assembles a [`Structure`] from streamed atom records.
///
/// Consecutive records with the same chain and residue key are grouped; a
/// chain that reappears later in the stream is continued rather than duplicated.
#[derive(Debug, Default)]
pub struct StructureAssembler {
    structure: Structure,
    chains: Vec<Chain>,
    current_chain_idx: Option<usize>,
    current_residue_idx: Option<usize>,
}

impl StructureAssembler {
    pub fn new(id: &str) -> Self {
        Self {
            structure: Structure::new(id),
            ..Self::default()
        }
    }

    pub fn start_chain(&mut self, id: char) -> &mut Self {
        let idx = match self.chains.iter().position(|chain| chain.id == id) {
            Some(idx) => idx,
            None => {
                self.chains.push(Chain::new(id));
                self.chains.len() - 1
            }
        };
        self.current_chain_idx = Some(idx);
        self.current_residue_idx = None;
        self
    }

    pub fn start_residue(
        &mut self,
        number: isize,
        insertion_code: Option<char>,
        name: &str,
        is_hetero: bool,
    ) -> Result<&mut Self, AssemblyError> {
        let chain_idx = self
            .current_chain_idx
            .ok_or(AssemblyError::NoCurrentChain)?;
        let chain = &mut self.chains[chain_idx];
        chain.push_residue(Residue::new(number, insertion_code, name, is_hetero));
        self.current_residue_idx = Some(chain.len() - 1);
        Ok(self)
    }

    pub fn add_atom(&mut self, atom: Atom) -> Result<&mut Self, AssemblyError> {
        let chain_idx = self
            .current_chain_idx
            .ok_or(AssemblyError::NoCurrentChain)?;
        let res_idx = self
            .current_residue_idx
            .ok_or(AssemblyError::NoCurrentResidue)?;
        self.chains[chain_idx].residues[res_idx].add_atom(atom);
        Ok(self)
    }

    pub fn build(mut self) -> Structure {
        for chain in self.chains {
            self.structure.push_chain(chain);
        }
        self.structure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn assembles_chains_residues_and_atoms_in_order() {
        let mut assembler = StructureAssembler::new("1abc");
        assembler.start_chain('A');
        assembler.start_residue(1, None, "MET", false).unwrap();
        assembler
            .add_atom(Atom::new(1, "N", Point3::origin()))
            .unwrap()
            .add_atom(Atom::new(2, "CA", Point3::new(1.0, 0.0, 0.0)))
            .unwrap();
        assembler.start_residue(2, None, "VAL", false).unwrap();
        assembler.add_atom(Atom::new(3, "CA", Point3::origin())).unwrap();
        assembler.start_chain('B');
        assembler.start_residue(1, None, "GLY", false).unwrap();

        let structure = assembler.build();
        assert_eq!(structure.id, "1abc");
        assert_eq!(structure.chains().len(), 2);
        assert_eq!(structure.sequence(None), "MVG");
        let met = &structure.chain('A').unwrap().residues()[0];
        assert_eq!(met.atoms().len(), 2);
    }

    #[test]
    fn revisiting_a_chain_appends_to_it() {
        let mut assembler = StructureAssembler::new("x");
        assembler.start_chain('A');
        assembler.start_residue(1, None, "ALA", false).unwrap();
        assembler.start_chain('B');
        assembler.start_residue(1, None, "GLY", false).unwrap();
        assembler.start_chain('A');
        assembler.start_residue(100, None, "ZN", true).unwrap();
        let structure = assembler.build();
        assert_eq!(structure.chain('A').unwrap().len(), 2);
        assert_eq!(structure.chains()[0].id, 'A');
    }

    #[test]
    fn adding_without_context_fails() {
        let mut assembler = StructureAssembler::new("x");
        assert_eq!(
            assembler.start_residue(1, None, "ALA", false).err(),
            Some(AssemblyError::NoCurrentChain)
        );
        assembler.start_chain('A');
        assert_eq!(
            assembler.add_atom(Atom::new(1, "CA", Point3::origin())).err(),
            Some(AssemblyError::NoCurrentResidue)
        );
    }
}
