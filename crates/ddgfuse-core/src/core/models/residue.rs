use super::atom::Atom;
use crate::core::utils::identifiers::three_to_one;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub number: isize,                     // Residue sequence number from source file
    pub insertion_code: Option<char>,      // PDB insertion code, if any
    pub name: String,                      // Name of the residue (e.g., "ALA", "GLY")
    pub is_hetero: bool,                   // Whether the residue came from HETATM records
    pub(crate) atoms: Vec<Atom>,           // Atoms in file order
    atom_name_map: HashMap<String, usize>, // Map from atom name to its index in `atoms`
}

impl Residue {
    pub fn new(number: isize, insertion_code: Option<char>, name: &str, is_hetero: bool) -> Self {
        Self {
            number,
            insertion_code,
            name: name.trim().to_string(),
            is_hetero,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub fn add_atom(&mut self, atom: Atom) {
        self.atom_name_map.insert(atom.name.clone(), self.atoms.len());
        self.atoms.push(atom);
    }

    pub fn remove_atom(&mut self, name: &str) -> Option<Atom> {
        let idx = self.atom_name_map.remove(name)?;
        let atom = self.atoms.remove(idx);
        self.reindex();
        Some(atom)
    }

    /// Keeps only atoms for which `keep` returns true.
    pub fn retain_atoms(&mut self, mut keep: impl FnMut(&Atom) -> bool) {
        self.atoms.retain(|atom| keep(atom));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.atom_name_map = self
            .atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| (atom.name.clone(), i))
            .collect();
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, name: &str) -> Option<&Atom> {
        self.atom_name_map.get(name).map(|&idx| &self.atoms[idx])
    }

    /// One-letter code, or `None` for residues outside the amino-acid alphabet.
    pub fn one_letter_code(&self) -> Option<char> {
        three_to_one(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn atom(serial: usize, name: &str) -> Atom {
        Atom::new(serial, name, Point3::origin())
    }

    #[test]
    fn new_residue_initializes_fields_correctly() {
        let residue = Residue::new(10, Some('A'), " GLY ", false);
        assert_eq!(residue.number, 10);
        assert_eq!(residue.insertion_code, Some('A'));
        assert_eq!(residue.name, "GLY");
        assert!(residue.atoms().is_empty());
        assert!(residue.atom("CA").is_none());
    }

    #[test]
    fn add_atom_adds_atom_and_maps_name() {
        let mut residue = Residue::new(5, None, "ALA", false);
        residue.add_atom(atom(1, "N"));
        residue.add_atom(atom(2, "CA"));
        assert_eq!(residue.atoms().len(), 2);
        assert_eq!(residue.atom("CA").unwrap().serial, 2);
    }

    #[test]
    fn remove_atom_keeps_name_map_consistent() {
        let mut residue = Residue::new(8, None, "THR", false);
        residue.add_atom(atom(1, "N"));
        residue.add_atom(atom(2, "CA"));
        residue.add_atom(atom(3, "OG1"));
        let removed = residue.remove_atom("N").unwrap();
        assert_eq!(removed.serial, 1);
        assert_eq!(residue.atom("OG1").unwrap().serial, 3);
        assert!(residue.remove_atom("N").is_none());
    }

    #[test]
    fn retain_atoms_filters_and_reindexes() {
        let mut residue = Residue::new(9, None, "VAL", false);
        for (i, name) in ["N", "CA", "CB", "CG1", "CG2"].iter().enumerate() {
            residue.add_atom(atom(i + 1, name));
        }
        residue.retain_atoms(|a| !a.name.starts_with("CG"));
        assert_eq!(residue.atoms().len(), 3);
        assert_eq!(residue.atom("CB").unwrap().serial, 3);
        assert!(residue.atom("CG1").is_none());
    }

    #[test]
    fn one_letter_code_maps_known_and_unknown_names() {
        assert_eq!(Residue::new(1, None, "TRP", false).one_letter_code(), Some('W'));
        assert_eq!(Residue::new(2, None, "HOH", true).one_letter_code(), None);
    }
}
