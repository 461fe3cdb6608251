//! Reading and writing of molecular structure files.
//!
//! The [`traits::MolecularFile`] trait gives every format the same API; [`pdb`]
//! implements it for fixed-column PDB coordinate records.

pub mod pdb;
pub mod traits;
