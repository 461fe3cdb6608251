use crate::core::models::residue::Residue;
use nalgebra::Point3;

/// A residue pair in contact, indexed by position in the concatenated residue list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidueContact {
    pub residue_idx_1: usize,
    pub residue_idx_2: usize,
    pub distance: f64,
}

fn heavy_atom_positions(residue: &Residue) -> Vec<Point3<f64>> {
    residue
        .atoms()
        .iter()
        .filter(|atom| atom.is_heavy())
        .map(|atom| atom.position)
        .collect()
}

fn min_distance(atoms_a: &[Point3<f64>], atoms_b: &[Point3<f64>]) -> Option<f64> {
    atoms_a
        .iter()
        .flat_map(|pa| atoms_b.iter().map(move |pb| nalgebra::distance(pa, pb)))
        .min_by(|x, y| x.total_cmp(y))
}

/// Computes all residue pairs (including self-pairs) whose minimum heavy-atom
/// distance is at most `cutoff`.
///
/// Pairs are reported once with `residue_idx_1 <= residue_idx_2`, ordered by
/// the first index and then the second.
pub fn residue_contacts(residues: &[&Residue], cutoff: f64) -> Vec<ResidueContact> {
    let positions: Vec<Vec<Point3<f64>>> =
        residues.iter().map(|r| heavy_atom_positions(r)).collect();

    let mut contacts = Vec::new();
    for i in 0..positions.len() {
        for j in i..positions.len() {
            if let Some(distance) = min_distance(&positions[i], &positions[j]) {
                if distance <= cutoff {
                    contacts.push(ResidueContact {
                        residue_idx_1: i,
                        residue_idx_2: j,
                        distance,
                    });
                }
            }
        }
    }
    contacts
}
