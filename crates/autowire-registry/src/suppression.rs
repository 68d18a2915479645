//! Definer/SuperDefiner suppression levels.
//!
//! A Definer carries role flags structurally without being materialized
//! itself: only its direct specializations are eligible. A SuperDefiner
//! pushes that suppression one extra level down. The level is computed once
//! per type in a single most-general-first walk and memoized; queries never
//! recompute ancestry.

use crate::descriptor::TypeUniverse;
use autowire_common::{MarkerRole, MarkerTable, TypeId};

/// How many inheritance levels below this type materialization resumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SuppressionLevel {
    /// The type's flags, if any, are materialized.
    Materialized = 0,
    /// Flags are transmitted but the type itself is not materialized.
    Definer = 1,
    /// As Definer, for this type and its direct specializations.
    SuperDefiner = 2,
}

impl SuppressionLevel {
    /// The level a direct specialization inherits.
    fn transmitted(self) -> SuppressionLevel {
        match self {
            SuppressionLevel::SuperDefiner => SuppressionLevel::Definer,
            _ => SuppressionLevel::Materialized,
        }
    }

    pub fn is_materialized(self) -> bool {
        self == SuppressionLevel::Materialized
    }
}

/// Memoized suppression level per type, indexed by `TypeId`.
#[derive(Debug)]
pub struct SuppressionMap {
    levels: Vec<SuppressionLevel>,
}

impl SuppressionMap {
    /// Computes every level in one pass over the universe.
    ///
    /// Arena order is ancestry order, so the level of every parent is
    /// already known when a type is visited.
    pub fn compute(universe: &TypeUniverse, markers: &MarkerTable) -> Self {
        let mut levels: Vec<SuppressionLevel> = Vec::with_capacity(universe.len());
        for (_, ty) in universe.iter() {
            let mut level = SuppressionLevel::Materialized;
            // Own markers: attributes plus the type's own simple name
            // (the canonical marker interfaces carry their own role).
            for role in ty
                .attributes
                .iter()
                .filter_map(|a| markers.lookup(a))
                .chain(markers.lookup(&ty.name))
            {
                let own = match role {
                    MarkerRole::Definer => SuppressionLevel::Definer,
                    MarkerRole::SuperDefiner => SuppressionLevel::SuperDefiner,
                    _ => SuppressionLevel::Materialized,
                };
                level = level.max(own);
            }
            // Transmission from direct bases and interfaces.
            for parent in ty.parents() {
                level = level.max(levels[parent.index()].transmitted());
            }
            levels.push(level);
        }
        SuppressionMap { levels }
    }

    pub fn level(&self, id: TypeId) -> SuppressionLevel {
        self.levels[id.index()]
    }
}
