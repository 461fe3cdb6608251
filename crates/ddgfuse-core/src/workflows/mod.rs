//! # Workflows Module
//!
//! Top-level entry points that run the complete pipeline from a structure file
//! and a mutation list to per-mutation reports.
//!
//! - **Prediction Workflow** ([`predict`]) - Stability pass, optional affinity
//!   pass, per-mutation error isolation and report writers.

pub mod predict;
