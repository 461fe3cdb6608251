use super::chain::Chain;
use super::domain::DomainDef;
use super::residue::Residue;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Chain '{0}' not found in structure")]
    UnknownChain(char),
    #[error("Domain {start}-{end} is out of range for chain '{chain_id}' with {len} residues")]
    OutOfRange {
        chain_id: char,
        start: usize,
        end: usize,
        len: usize,
    },
}

/// A molecular structure: an ordered list of chains.
///
/// Only the first model of multi-model inputs is represented.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub id: String,
    chains: Vec<Chain>,
}

impl Structure {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            chains: Vec::new(),
        }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, id: char) -> Option<&Chain> {
        self.chains.iter().find(|chain| chain.id == id)
    }

    pub fn chain_mut(&mut self, id: char) -> Option<&mut Chain> {
        self.chains.iter_mut().find(|chain| chain.id == id)
    }

    /// Adds a chain, replacing any existing chain with the same identifier.
    pub fn push_chain(&mut self, chain: Chain) {
        match self.chains.iter_mut().find(|c| c.id == chain.id) {
            Some(existing) => *existing = chain,
            None => self.chains.push(chain),
        }
    }

    /// Iterates over all residues, chain by chain.
    pub fn residues(&self) -> impl Iterator<Item = &Residue> {
        self.chains.iter().flat_map(|chain| chain.residues.iter())
    }

    pub fn residue_count(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    /// Concatenated one-letter sequence of all chains.
    pub fn sequence(&self, unknown_marker: Option<char>) -> String {
        self.chains
            .iter()
            .map(|chain| chain.sequence(unknown_marker))
            .collect()
    }

    /// Extracts the given domains, in the given order, into a new structure.
    ///
    /// When `remove_heteroatoms` is set, hetero residues without a one-letter
    /// code (ligands, ions, waters) are dropped from the extracted chains.
    pub fn extract_domains(
        &self,
        domains: &[DomainDef],
        remove_heteroatoms: bool,
    ) -> Result<Structure, DomainError> {
        let mut extracted = Structure::new(&self.id);
        for domain in domains {
            let chain = self
                .chain(domain.chain_id)
                .ok_or(DomainError::UnknownChain(domain.chain_id))?;
            if domain.start == 0 || domain.end > chain.len() || domain.start > domain.end {
                return Err(DomainError::OutOfRange {
                    chain_id: domain.chain_id,
                    start: domain.start,
                    end: domain.end,
                    len: chain.len(),
                });
            }

            let mut new_chain = Chain::new(chain.id);
            for residue in &chain.residues[domain.start - 1..domain.end] {
                if remove_heteroatoms && residue.is_hetero && residue.one_letter_code().is_none() {
                    continue;
                }
                new_chain.push_residue(residue.clone());
            }
            extracted.push_chain(new_chain);
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_structure() -> Structure {
        let mut structure = Structure::new("test");
        let mut a = Chain::new('A');
        for (i, name) in ["MET", "VAL", "LEU", "HOH"].iter().enumerate() {
            a.push_residue(Residue::new(i as isize + 1, None, name, *name == "HOH"));
        }
        let mut b = Chain::new('B');
        for (i, name) in ["GLY", "SER"].iter().enumerate() {
            b.push_residue(Residue::new(i as isize + 1, None, name, false));
        }
        structure.push_chain(a);
        structure.push_chain(b);
        structure
    }

    #[test]
    fn chain_lookup_and_sequence() {
        let structure = build_structure();
        assert_eq!(structure.chains().len(), 2);
        assert_eq!(structure.chain('B').unwrap().len(), 2);
        assert!(structure.chain('C').is_none());
        assert_eq!(structure.sequence(Some('X')), "MVLXGS");
        assert_eq!(structure.residue_count(), 6);
    }

    #[test]
    fn extract_domains_respects_order_and_heteroatom_removal() {
        let structure = build_structure();
        let extracted = structure
            .extract_domains(&[DomainDef::new('B', 1, 2), DomainDef::new('A', 2, 4)], true)
            .unwrap();
        let ids: Vec<char> = extracted.chains().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!['B', 'A']);
        assert_eq!(extracted.sequence(None), "GSVL");
        assert_eq!(extracted.chain('A').unwrap().len(), 2);
    }

    #[test]
    fn extract_domains_keeps_heteroatoms_when_requested() {
        let structure = build_structure();
        let extracted = structure
            .extract_domains(&[DomainDef::new('A', 1, 4)], false)
            .unwrap();
        assert_eq!(extracted.sequence(Some('X')), "MVLX");
    }

    #[test]
    fn extract_domains_rejects_unknown_chain_and_bad_range() {
        let structure = build_structure();
        assert_eq!(
            structure.extract_domains(&[DomainDef::new('Z', 1, 1)], true),
            Err(DomainError::UnknownChain('Z'))
        );
        assert!(matches!(
            structure.extract_domains(&[DomainDef::new('A', 1, 9)], true),
            Err(DomainError::OutOfRange { len: 4, .. })
        ));
    }

    #[test]
    fn push_chain_replaces_existing_chain_with_same_id() {
        let mut structure = build_structure();
        structure.push_chain(Chain::new('A'));
        assert_eq!(structure.chains().len(), 2);
        assert!(structure.chain('A').unwrap().is_empty());
    }
}
