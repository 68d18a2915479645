//! Common types for the autowire resolution pipeline.
//!
//! This crate provides the foundational pieces used across all autowire crates:
//! - Stable ids (`TypeId`, `NodeId`) for arena-stored values
//! - Diagnostics (`Diagnostic`, `DiagnosticSink`, numeric codes)
//! - The canonical marker table (`MarkerTable`, `MarkerRole`)

pub mod diagnostics;
pub mod ids;
pub mod markers;

pub use diagnostics::{Diagnostic, DiagnosticSink, Severity, codes};
pub use ids::{NodeId, TypeId};
pub use markers::{MarkerCollision, MarkerRole, MarkerTable, default_marker_table};
