#![forbid(unsafe_code)]

//! Core domain model and planning logic for medication tapering.
//!
//! This crate provides:
//! - Domain types (doses, pieces, regimens, plan steps)
//! - Catalogue of medicine classes and commercial strengths
//! - Composition engine and per-class reduction strategies
//! - Patch combination optimizer
//! - Schedule orchestrator, request loading and export

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod compose;
pub mod strategy;
pub mod patch;
pub mod request;
pub mod schedule;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalogue, get_default_catalogue, Product};
pub use config::TaperConfig;
pub use compose::compose;
pub use patch::{choose_patch_total, PatchChoice};
pub use request::{load_request, DoseLine, PlanRequest};
pub use schedule::generate_plan;
