//! # DDGFuse Core Library
//!
//! Predicts the effect of protein point mutations on folding stability and on
//! binding affinity by fusing features from pretrained sequence and structure
//! models and scoring them with a cross-validated boosted-tree ensemble.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict layering, each layer depending only on those
//! below it.
//!
//! - **[`core`]: The Foundation.** Structure models and PDB I/O, typed feature
//!   records with delta synthesis, and the PCA + boosted-tree ensemble.
//!
//! - **[`plugins`]: Feature Extractors.** The capability contract every feature
//!   plugin implements, plus the ProtBert and ProteinSolver plugins built on
//!   injected model backends.
//!
//! - **[`engine`]: The Orchestrator.** Domain matching, build contexts, feature
//!   extraction and the [`engine::predictor::Predictor`] facade.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures such as the
//!   two-pass stability and affinity prediction run.

pub mod core;
pub mod engine;
pub mod plugins;
pub mod workflows;
