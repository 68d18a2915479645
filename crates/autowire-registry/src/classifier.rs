//! Kind classification.
//!
//! Classification runs over the whole universe in ancestry order, most
//! general first. A type's raw flags are the union of the roles it carries
//! itself (attributes and canonical marker interfaces) and the raw flags of
//! its direct base and interfaces; the materialized kind is those raw flags,
//! or `None` while the type sits under a Definer/SuperDefiner suppression
//! level. Explicit kind assignments on open generic definitions are
//! collected first and validated in one deterministic most-specific-to-
//! most-general step.

use crate::descriptor::TypeUniverse;
use crate::kind::{KindFlags, role_flags};
use crate::suppression::SuppressionMap;
use autowire_common::diagnostics::codes;
use autowire_common::{Diagnostic, DiagnosticSink, MarkerTable, Severity, TypeId};
use rustc_hash::FxHashSet;
use tracing::debug;

/// The outcome of the classification phase.
#[derive(Debug)]
pub struct Classification {
    /// Flags carried structurally, before suppression.
    raw: Vec<KindFlags>,
    /// Materialized flags; empty for Definer/SuperDefiner levels.
    kinds: Vec<KindFlags>,
    suppression: SuppressionMap,
}

impl Classification {
    /// The final, materialized `KindFlags` of a type.
    pub fn kind_of(&self, id: TypeId) -> KindFlags {
        self.kinds[id.index()]
    }

    /// The structural flags a type transmits to its specializations,
    /// regardless of suppression.
    pub fn raw_of(&self, id: TypeId) -> KindFlags {
        self.raw[id.index()]
    }

    pub fn suppression(&self) -> &SuppressionMap {
        &self.suppression
    }
}

/// Classifies every type of the universe.
///
/// Diagnostics (generic assignment conflicts) go to the sink; the pass
/// always completes.
pub fn classify(
    universe: &TypeUniverse,
    markers: &MarkerTable,
    sink: &mut DiagnosticSink,
) -> Classification {
    let suppression = SuppressionMap::compute(universe, markers);
    validate_generic_assignments(universe, sink);

    let mut raw: Vec<KindFlags> = Vec::with_capacity(universe.len());
    let mut kinds: Vec<KindFlags> = Vec::with_capacity(universe.len());

    for (id, ty) in universe.iter() {
        let own: KindFlags = ty
            .attributes
            .iter()
            .filter_map(|a| markers.lookup(a))
            .chain(markers.lookup(&ty.name))
            .map(role_flags)
            .fold(KindFlags::empty(), |acc, f| acc | f);

        let explicit = if ty.generic_arity > 0 {
            universe.generic_assignments.get(&id).copied()
        } else {
            None
        };

        let flags = match explicit {
            // An explicit assignment on an open generic definition takes
            // precedence over flags inherited from non-generic bases; only
            // other generic definitions still contribute.
            Some(assigned) => ty
                .parents()
                .filter(|p| universe.get(*p).generic_arity > 0)
                .map(|p| raw[p.index()])
                .fold(assigned, |acc, f| acc | f),
            None => ty
                .parents()
                .map(|p| raw[p.index()])
                .fold(own, |acc, f| acc | f),
        };

        let kind = if suppression.level(id).is_materialized() {
            flags
        } else {
            KindFlags::empty()
        };
        if !kind.is_none() {
            debug!(ty = %ty.full_name(), kind = %kind.describe(), "classified");
        }
        raw.push(flags);
        kinds.push(kind);
    }

    Classification {
        raw,
        kinds,
        suppression,
    }
}

// =============================================================================
// Generic kind assignments
// =============================================================================

/// Validates the collected generic assignments most-specific-first.
///
/// A more general definition whose assignment carries flags beyond those
/// already fixed by a more specific derived definition is rejected, with
/// both registration sites named.
fn validate_generic_assignments(universe: &TypeUniverse, sink: &mut DiagnosticSink) {
    if universe.generic_assignments.is_empty() {
        return;
    }

    // Deterministic application order: deepest (most specific) first,
    // id order as tie-break.
    let depths = ancestry_depths(universe);
    let mut order: Vec<TypeId> = universe.generic_assignments.keys().copied().collect();
    order.sort_by_key(|&id| (std::cmp::Reverse(depths[id.index()]), id));

    let mut applied: Vec<TypeId> = Vec::new();
    for &general in &order {
        let general_flags = universe.generic_assignments[&general];
        for &specific in &applied {
            if !derives_from(universe, specific, general) {
                continue;
            }
            let specific_flags = universe.generic_assignments[&specific];
            if !specific_flags.contains(general_flags) {
                let general_name = universe.get(general).full_name();
                let specific_name = universe.get(specific).full_name();
                sink.push(
                    Diagnostic::new(
                        codes::GENERIC_ASSIGNMENT_CONFLICT,
                        Severity::Error,
                        general_name.clone(),
                        &[&general_name, &specific_name],
                    )
                    .with_related(
                        specific_name.clone(),
                        format!(
                            "'{}' already fixed kind {}",
                            specific_name,
                            specific_flags.describe()
                        ),
                    ),
                );
            }
        }
        applied.push(general);
    }
}

/// Longest ancestry chain above every type, filled in one arena-order pass
/// so diamond-shaped ancestry is walked once per edge.
fn ancestry_depths(universe: &TypeUniverse) -> Vec<usize> {
    let mut depths: Vec<usize> = Vec::with_capacity(universe.len());
    for (_, ty) in universe.iter() {
        let depth = ty
            .parents()
            .map(|p| 1 + depths[p.index()])
            .max()
            .unwrap_or(0);
        depths.push(depth);
    }
    depths
}

/// Whether `specific` transitively derives from `general`.
fn derives_from(universe: &TypeUniverse, specific: TypeId, general: TypeId) -> bool {
    let mut stack: Vec<TypeId> = universe.get(specific).parents().collect();
    let mut seen = FxHashSet::default();
    while let Some(p) = stack.pop() {
        if p == general {
            return true;
        }
        if seen.insert(p) {
            stack.extend(universe.get(p).parents());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{TypeDef, UniverseBuilder};
    use autowire_common::default_marker_table;

    fn classified(
        build: impl FnOnce(&mut UniverseBuilder) -> Vec<TypeId>,
    ) -> (Vec<KindFlags>, DiagnosticSink) {
        let mut b = UniverseBuilder::new();
        let ids = build(&mut b);
        let universe = b.build().unwrap();
        let mut sink = DiagnosticSink::new();
        let classification = classify(&universe, default_marker_table(), &mut sink);
        (
            ids.into_iter().map(|id| classification.kind_of(id)).collect(),
            sink,
        )
    }

    #[test]
    fn marker_on_ancestor_propagates_to_class() {
        let (kinds, sink) = classified(|b| {
            let iscoped = b.add(TypeDef::interface("IScopedAutoService"));
            let iservice = b.add(TypeDef::interface("IOrderService").implements(iscoped));
            let class = b.add(TypeDef::class("OrderService").implements(iservice));
            vec![iscoped, iservice, class]
        });
        assert!(sink.is_empty());
        assert_eq!(kinds[1], KindFlags::AUTO_SERVICE | KindFlags::SCOPED);
        assert_eq!(kinds[2], KindFlags::AUTO_SERVICE | KindFlags::SCOPED);
    }

    #[test]
    fn definer_has_kind_none_but_transmits() {
        let (kinds, _) = classified(|b| {
            let definer = b.add(TypeDef::class("ServiceBase").attr("Singleton").attr("Definer"));
            let child = b.add(TypeDef::class("Service").base(definer));
            vec![definer, child]
        });
        assert!(kinds[0].is_none());
        assert_eq!(kinds[1], KindFlags::AUTO_SERVICE | KindFlags::SINGLETON);
    }

    #[test]
    fn super_definer_materializes_at_second_level() {
        let (kinds, _) = classified(|b| {
            let sd = b.add(TypeDef::interface("IRoot").attr("RealObject").attr("SuperDefiner"));
            let mid = b.add(TypeDef::interface("IMid").implements(sd));
            let leaf = b.add(TypeDef::class("Leaf").implements(mid));
            vec![sd, mid, leaf]
        });
        assert!(kinds[0].is_none());
        assert!(kinds[1].is_none());
        assert_eq!(kinds[2], KindFlags::REAL_OBJECT);
    }

    #[test]
    fn explicit_generic_kind_overrides_non_generic_base() {
        let (kinds, sink) = classified(|b| {
            let base = b.add(TypeDef::class("SingletonBase").attr("Singleton"));
            let open = b.add(TypeDef::class("Repository").base(base).generic(1));
            b.assign_generic_kind(open, KindFlags::AUTO_SERVICE | KindFlags::SCOPED);
            vec![base, open]
        });
        assert!(sink.is_empty());
        assert_eq!(kinds[1], KindFlags::AUTO_SERVICE | KindFlags::SCOPED);
    }

    #[test]
    fn broader_assignment_on_more_general_generic_is_rejected() {
        let (_, sink) = classified(|b| {
            let general = b.add(TypeDef::interface("IRepository").generic(1));
            let specific = b.add(TypeDef::interface("IUserRepository").generic(1).implements(general));
            // Most-specific fixes a narrow kind, the general one asks for more.
            b.assign_generic_kind(specific, KindFlags::AUTO_SERVICE);
            b.assign_generic_kind(general, KindFlags::AUTO_SERVICE | KindFlags::SINGLETON);
            vec![general, specific]
        });
        let diags: Vec<_> = sink.iter().collect();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::GENERIC_ASSIGNMENT_CONFLICT);
        assert!(diags[0].message.contains("IRepository"));
        assert!(diags[0].message.contains("IUserRepository"));
        assert_eq!(diags[0].related.len(), 1);
    }

    #[test]
    fn generic_assignment_validation_is_order_independent() {
        let run = |reversed: bool| {
            let (_, sink) = classified(|b| {
                let general = b.add(TypeDef::interface("IRepository").generic(1));
                let specific =
                    b.add(TypeDef::interface("IUserRepository").generic(1).implements(general));
                if reversed {
                    b.assign_generic_kind(general, KindFlags::AUTO_SERVICE | KindFlags::SINGLETON);
                    b.assign_generic_kind(specific, KindFlags::AUTO_SERVICE);
                } else {
                    b.assign_generic_kind(specific, KindFlags::AUTO_SERVICE);
                    b.assign_generic_kind(general, KindFlags::AUTO_SERVICE | KindFlags::SINGLETON);
                }
                vec![general, specific]
            });
            sink.len()
        };
        assert_eq!(run(false), run(true));
        assert_eq!(run(false), 1);
    }

    #[test]
    fn diamond_ancestry_is_ordered_most_specific_first() {
        let (_, sink) = classified(|b| {
            let top = b.add(TypeDef::interface("IRepository").generic(1));
            let left = b.add(TypeDef::interface("ILeft").generic(1).implements(top));
            let right = b.add(TypeDef::interface("IRight").generic(1).implements(top));
            let bottom = b.add(
                TypeDef::interface("IUserRepository")
                    .generic(1)
                    .implements(left)
                    .implements(right),
            );
            b.assign_generic_kind(top, KindFlags::AUTO_SERVICE | KindFlags::SINGLETON);
            b.assign_generic_kind(bottom, KindFlags::AUTO_SERVICE);
            vec![top, bottom]
        });
        let diags: Vec<_> = sink.iter().collect();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::GENERIC_ASSIGNMENT_CONFLICT);
        assert!(diags[0].message.contains("IUserRepository"));
    }

    #[test]
    fn matching_general_assignment_is_accepted() {
        let (_, sink) = classified(|b| {
            let general = b.add(TypeDef::interface("IRepository").generic(1));
            let specific =
                b.add(TypeDef::interface("IUserRepository").generic(1).implements(general));
            b.assign_generic_kind(general, KindFlags::AUTO_SERVICE);
            b.assign_generic_kind(specific, KindFlags::AUTO_SERVICE | KindFlags::SCOPED);
            vec![general, specific]
        });
        assert!(sink.is_empty());
    }
}
