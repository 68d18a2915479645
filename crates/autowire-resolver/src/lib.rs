//! Constructor dependency graph and implementation unification.
//!
//! - `graph` - one `ClassNode` per concrete injectable class, constructor
//!   edges, generalization links and family discovery
//! - `unify` - the bottom-up sweep electing one most-specialized
//!   implementation per family, or reporting ambiguities

pub mod graph;
pub mod unify;

pub use graph::{
    ClassNode, CtorEdge, DependencyGraph, EdgeTarget, Family, FamilyId,
};
pub use unify::{Ambiguity, AmbiguityKind, resolve_families};
