use crate::core::models::domain::DomainDef;
use crate::core::models::structure::Structure;
use crate::core::utils::identifiers::UNKNOWN_RESIDUE_MARKER;
use tracing::debug;

/// Domains of a structure that correspond to the declared sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainMatch {
    pub protein: Option<DomainDef>,
    pub ligand: Option<DomainDef>,
}

/// Finds the chains whose sequences equal the protein and ligand sequences.
///
/// Chains are scanned in order and the first exact match wins. The protein is
/// matched first; a chain it claims is never considered for the ligand.
/// Residues without a one-letter code read as `X`, or are skipped when
/// `remove_heteroatoms` is set.
pub fn match_domains(
    structure: &Structure,
    protein_sequence: &str,
    ligand_sequence: Option<&str>,
    remove_heteroatoms: bool,
) -> DomainMatch {
    let marker = if remove_heteroatoms {
        None
    } else {
        Some(UNKNOWN_RESIDUE_MARKER)
    };

    let mut found = DomainMatch::default();
    for chain in structure.chains() {
        let chain_sequence = chain.sequence(marker);
        if found.protein.is_none() && chain_sequence == protein_sequence {
            debug!(chain = %chain.id, "Protein sequence matched.");
            found.protein = Some(DomainDef::whole_chain(chain));
        } else if found.ligand.is_none() && ligand_sequence == Some(chain_sequence.as_str()) {
            debug!(chain = %chain.id, "Ligand sequence matched.");
            found.ligand = Some(DomainDef::whole_chain(chain));
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::chain::Chain;
    use crate::core::models::residue::Residue;

    fn structure(chains: &[(char, &[&str])]) -> Structure {
        let mut structure = Structure::new("test");
        for (id, names) in chains {
            let mut chain = Chain::new(*id);
            for (i, name) in names.iter().enumerate() {
                let hetero = *name == "HOH" || *name == "ZN";
                chain.push_residue(Residue::new(i as isize + 1, None, name, hetero));
            }
            structure.push_chain(chain);
        }
        structure
    }

    #[test]
    fn matches_protein_and_ligand_chains() {
        let s = structure(&[
            ('A', &["MET", "VAL", "LEU", "HOH"]),
            ('B', &["GLY", "SER"]),
        ]);
        let found = match_domains(&s, "MVL", Some("GS"), true);
        assert_eq!(found.protein, Some(DomainDef::new('A', 1, 4)));
        assert_eq!(found.ligand, Some(DomainDef::new('B', 1, 2)));
    }

    #[test]
    fn unknown_residues_are_marked_when_heteroatoms_are_kept() {
        let s = structure(&[('A', &["MET", "ZN", "LEU"])]);
        assert!(match_domains(&s, "ML", None, false).protein.is_none());
        assert!(match_domains(&s, "MXL", None, false).protein.is_some());
        assert!(match_domains(&s, "ML", None, true).protein.is_some());
    }

    #[test]
    fn protein_chain_is_not_reused_for_identical_ligand() {
        let s = structure(&[('A', &["GLY", "SER"]), ('B', &["GLY", "SER"])]);
        let found = match_domains(&s, "GS", Some("GS"), true);
        assert_eq!(found.protein.map(|d| d.chain_id), Some('A'));
        assert_eq!(found.ligand.map(|d| d.chain_id), Some('B'));

        let single = structure(&[('A', &["GLY", "SER"])]);
        let found = match_domains(&single, "GS", Some("GS"), true);
        assert!(found.protein.is_some());
        assert!(found.ligand.is_none());
    }

    #[test]
    fn returns_nothing_when_no_chain_matches() {
        let s = structure(&[('A', &["MET", "VAL"])]);
        assert_eq!(
            match_domains(&s, "WWW", Some("YY"), true),
            DomainMatch::default()
        );
    }
}
