//! Canonical marker table.
//!
//! Role markers are recognized by an explicit table mapping canonical
//! identifiers to semantic roles, populated once and queried by exact key.
//! The table is namespace-independent on purpose: any attribute or directly
//! implemented interface whose simple name equals a canonical identifier
//! carries the corresponding role. There is no name probing beyond exact
//! lookup, and duplicate registrations are detected at construction.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// The semantic role a marker confers on the type carrying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    /// Unique, directly-materialized gateway instance.
    RealObject,
    /// Dependency-injected service with an unspecified lifetime.
    AutoService,
    /// Auto service with a scoped lifetime.
    ScopedService,
    /// Auto service with a singleton lifetime.
    SingletonService,
    /// Interface that may be implemented by several services at once.
    Multiple,
    /// Pure data type.
    Poco,
    /// Data type closed to further property extension.
    ClosedPoco,
    /// Carries role flags structurally without being materialized itself;
    /// suppression spans one inheritance level.
    Definer,
    /// Definer whose suppression spans two inheritance levels.
    SuperDefiner,
}

impl fmt::Display for MarkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerRole::RealObject => "RealObject",
            MarkerRole::AutoService => "AutoService",
            MarkerRole::ScopedService => "ScopedService",
            MarkerRole::SingletonService => "SingletonService",
            MarkerRole::Multiple => "Multiple",
            MarkerRole::Poco => "Poco",
            MarkerRole::ClosedPoco => "ClosedPoco",
            MarkerRole::Definer => "Definer",
            MarkerRole::SuperDefiner => "SuperDefiner",
        };
        f.write_str(name)
    }
}

/// Reported when one canonical identifier is mapped twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCollision {
    pub identifier: String,
    pub existing: MarkerRole,
    pub attempted: MarkerRole,
}

impl fmt::Display for MarkerCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "marker identifier '{}' already maps to {} (attempted {})",
            self.identifier, self.existing, self.attempted
        )
    }
}

impl std::error::Error for MarkerCollision {}

impl MarkerCollision {
    /// The sink-ready form of the collision.
    pub fn to_diagnostic(&self) -> crate::diagnostics::Diagnostic {
        use crate::diagnostics::{Diagnostic, Severity, codes};
        Diagnostic::new(
            codes::MARKER_COLLISION,
            Severity::Error,
            self.identifier.clone(),
            &[&self.identifier],
        )
        .with_related(
            self.identifier.clone(),
            format!("maps to both {} and {}", self.existing, self.attempted),
        )
    }
}

/// Exact-key map from canonical marker identifier to role.
#[derive(Debug, Default, Clone)]
pub struct MarkerTable {
    entries: FxHashMap<String, MarkerRole>,
}

impl MarkerTable {
    pub fn empty() -> Self {
        MarkerTable {
            entries: FxHashMap::default(),
        }
    }

    /// Maps a canonical identifier to a role.
    ///
    /// Registering the same identifier twice is a collision even when the
    /// role is identical: a table is populated once, from one authority.
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        role: MarkerRole,
    ) -> Result<(), MarkerCollision> {
        let identifier = identifier.into();
        if let Some(&existing) = self.entries.get(&identifier) {
            return Err(MarkerCollision {
                identifier,
                existing,
                attempted: role,
            });
        }
        self.entries.insert(identifier, role);
        Ok(())
    }

    /// Exact-key lookup of a simple name.
    pub fn lookup(&self, simple_name: &str) -> Option<MarkerRole> {
        self.entries.get(simple_name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The default table covering the interface and attribute spellings of every
/// built-in marker.
static DEFAULT_TABLE: Lazy<MarkerTable> = Lazy::new(|| {
    let mut table = MarkerTable::empty();
    let entries: &[(&str, MarkerRole)] = &[
        // Interface spellings
        ("IRealObject", MarkerRole::RealObject),
        ("IAutoService", MarkerRole::AutoService),
        ("IScopedAutoService", MarkerRole::ScopedService),
        ("ISingletonAutoService", MarkerRole::SingletonService),
        ("IPoco", MarkerRole::Poco),
        ("IClosedPoco", MarkerRole::ClosedPoco),
        // Attribute spellings
        ("RealObject", MarkerRole::RealObject),
        ("AutoService", MarkerRole::AutoService),
        ("Scoped", MarkerRole::ScopedService),
        ("Singleton", MarkerRole::SingletonService),
        ("Multiple", MarkerRole::Multiple),
        ("Poco", MarkerRole::Poco),
        ("ClosedPoco", MarkerRole::ClosedPoco),
        ("Definer", MarkerRole::Definer),
        ("SuperDefiner", MarkerRole::SuperDefiner),
    ];
    for (name, role) in entries {
        // The built-in list is collision-free by construction.
        table
            .register(*name, *role)
            .unwrap_or_else(|c| panic!("default marker table collision: {c}"));
    }
    table
});

/// Returns the lazily-built default marker table.
pub fn default_marker_table() -> &'static MarkerTable {
    &DEFAULT_TABLE
}
