//! # Core Models Module
//!
//! Data structures describing the inputs of the prediction pipeline: molecular
//! structures and the point mutations evaluated against them.
//!
//! ## Key Components
//!
//! - [`atom`] - Individual atom records with coordinates
//! - [`residue`] - Residues and their one-letter codes
//! - [`chain`] - Chains and chain sequences
//! - [`structure`] - Complete structures and domain extraction
//! - [`builder`] - Incremental assembly of structures from file records
//! - [`domain`] - Domain definitions and modeling targets
//! - [`mutation`] - Point mutations and the `[<chain>_]<wt><pos><mut>` notation

pub mod atom;
pub mod builder;
pub mod chain;
pub mod domain;
pub mod mutation;
pub mod residue;
pub mod structure;
