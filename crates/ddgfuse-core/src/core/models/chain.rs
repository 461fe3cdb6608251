use super::residue::Residue;

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: char,                       // Chain identifier (e.g., 'A', 'B')
    pub(crate) residues: Vec<Residue>, // Residues in file order
}

impl Chain {
    pub fn new(id: char) -> Self {
        Self {
            id,
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn residues_mut(&mut self) -> &mut [Residue] {
        &mut self.residues
    }

    pub fn push_residue(&mut self, residue: Residue) {
        self.residues.push(residue);
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Builds the one-letter sequence of the chain.
    ///
    /// Residues without a one-letter code are written as `unknown_marker`, or
    /// skipped entirely when `unknown_marker` is `None`.
    pub fn sequence(&self, unknown_marker: Option<char>) -> String {
        self.residues
            .iter()
            .filter_map(|residue| residue.one_letter_code().or(unknown_marker))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_from(names: &[&str]) -> Chain {
        let mut chain = Chain::new('A');
        for (i, name) in names.iter().enumerate() {
            let hetero = name.len() != 3 || *name == "HOH";
            chain.push_residue(Residue::new(i as isize + 1, None, name, hetero));
        }
        chain
    }

    #[test]
    fn sequence_replaces_unknown_residues_with_marker() {
        let chain = chain_from(&["MET", "VAL", "ZN", "LEU"]);
        assert_eq!(chain.sequence(Some('X')), "MVXL");
    }

    #[test]
    fn sequence_omits_unknown_residues_without_marker() {
        let chain = chain_from(&["MET", "VAL", "HOH", "LEU"]);
        assert_eq!(chain.sequence(None), "MVL");
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn empty_chain_has_empty_sequence() {
        let chain = Chain::new('B');
        assert!(chain.is_empty());
        assert_eq!(chain.sequence(Some('X')), "");
    }
}
