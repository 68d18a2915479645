//! Stable identifiers for arena-stored values.
//!
//! Every structure in the pipeline that needs mutual back-references
//! (generalization/specialization links, constructor edges) lives in an
//! append-only arena and refers to its peers through these indices instead
//! of owning pointers.

use std::fmt;

/// Identifies one `TypeDescriptor` inside a `TypeUniverse`.
///
/// Ids are assigned in registration order and are dense: the id is the
/// index into the universe's backing vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Identifies one `ClassNode` inside a dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}
