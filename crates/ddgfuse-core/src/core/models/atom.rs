use crate::core::utils::identifiers::is_heavy_atom;
use nalgebra::Point3;

/// A single atom record of a structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file.
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "N", "O").
    pub name: String,
    /// Element symbol, empty when the source did not provide one.
    pub element: String,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    pub occupancy: f64,
    pub b_factor: f64,
}

impl Atom {
    pub fn new(serial: usize, name: &str, position: Point3<f64>) -> Self {
        Self {
            serial,
            name: name.trim().to_string(),
            element: String::new(),
            position,
            occupancy: 1.0,
            b_factor: 0.0,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = element.trim().to_string();
        self
    }

    pub fn is_heavy(&self) -> bool {
        if self.element.is_empty() {
            is_heavy_atom(&self.name)
        } else {
            !matches!(self.element.to_ascii_uppercase().as_str(), "H" | "D")
        }
    }
}
