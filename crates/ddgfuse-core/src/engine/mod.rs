//! # Engine Module
//!
//! Orchestrates plugins and trained artifacts into mutation-effect predictions.
//!
//! A [`predictor::Predictor`] is created once per session: it loads every
//! plugin's model on the configured device and opens the artifact store.
//! For each structure, [`predictor::Predictor::build`] matches the declared
//! sequences to chains and lets every plugin build its representation into a
//! [`context::BuildContext`]. Mutations are then analyzed against the context,
//! and the merged feature records are scored by the ensemble of the matching
//! core-or-interface model set.
//!
//! - **Configuration** ([`config`]) - Session settings from a builder or a TOML file
//! - **Domain Matching** ([`domain`]) - Locating protein and ligand chains by sequence
//! - **Build Context** ([`context`]) - Per-structure plugin data
//! - **Feature Extraction** ([`extract`]) - Namespaced per-mutation feature records
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Pipeline errors

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod extract;
pub mod predictor;
pub mod progress;
