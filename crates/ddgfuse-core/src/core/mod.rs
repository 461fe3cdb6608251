//! # Core Module
//!
//! Stateless building blocks of the prediction pipeline.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, residues, chains, structures and mutations
//! - **File I/O** ([`io`]) - Reading and writing PDB coordinate files
//! - **Features** ([`features`]) - Feature records, keys and wild-type/mutant deltas
//! - **Ensemble** ([`ensemble`]) - Trained PCA transforms, boosted trees and fold averaging
//! - **Utilities** ([`utils`]) - Residue identifiers and contact geometry

pub mod ensemble;
pub mod features;
pub mod io;
pub mod models;
pub mod utils;
