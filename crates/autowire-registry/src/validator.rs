//! Combination validation.
//!
//! Runs once the whole universe is classified and checks every type's final
//! `KindFlags` against its form. Interfaces are stricter than classes: a
//! class may be a RealObject and implement an AutoService-shaped interface
//! at the same time, an interface may not combine the two roles.

use crate::classifier::Classification;
use crate::descriptor::TypeUniverse;
use crate::kind::KindFlags;
use autowire_common::diagnostics::codes;
use autowire_common::DiagnosticSink;
use tracing::debug;

/// Validates every classified type, accumulating one diagnostic per
/// violation. Never stops early.
pub fn validate_combinations(
    universe: &TypeUniverse,
    classification: &Classification,
    sink: &mut DiagnosticSink,
) {
    for (id, ty) in universe.iter() {
        let kind = classification.kind_of(id);
        if kind.is_none() {
            continue;
        }
        let mut reject = |reason: &str| {
            debug!(ty = %ty.full_name(), kind = %kind.describe(), reason, "invalid combination");
            let name = ty.full_name();
            sink.error(codes::INVALID_COMBINATION, name.clone(), &[&name, reason]);
        };

        if kind.contains(KindFlags::SCOPED | KindFlags::SINGLETON) {
            reject("a service lifetime cannot be both Scoped and Singleton");
        }
        if ty.is_interface()
            && kind.contains(KindFlags::REAL_OBJECT)
            && kind.contains(KindFlags::AUTO_SERVICE)
        {
            reject("an interface cannot combine the RealObject and AutoService roles");
        }
        if kind.contains(KindFlags::POCO)
            && kind.intersects(KindFlags::REAL_OBJECT | KindFlags::AUTO_SERVICE)
        {
            reject("a Poco cannot also be a RealObject or an AutoService");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::descriptor::{TypeDef, UniverseBuilder};
    use autowire_common::default_marker_table;

    fn validate(build: impl FnOnce(&mut UniverseBuilder)) -> DiagnosticSink {
        let mut b = UniverseBuilder::new();
        build(&mut b);
        let universe = b.build().unwrap();
        let mut sink = DiagnosticSink::new();
        let classification = classify(&universe, default_marker_table(), &mut sink);
        validate_combinations(&universe, &classification, &mut sink);
        sink
    }

    #[test]
    fn class_may_combine_scoped_service_and_real_object() {
        // class NotPossible0 : ScopedDefiner, IRealObject {} is accepted.
        let sink = validate(|b| {
            let definer = b.add(TypeDef::class("ScopedDefiner").attr("Scoped").attr("Definer"));
            let ireal = b.add(TypeDef::interface("IRealObject"));
            b.add(TypeDef::class("NotPossible0").base(definer).implements(ireal));
        });
        assert!(sink.is_empty(), "{:?}", sink.iter().collect::<Vec<_>>());
    }

    #[test]
    fn interface_combining_both_roles_is_rejected() {
        let sink = validate(|b| {
            let iscoped = b.add(TypeDef::interface("IScopedAutoService"));
            let ireal = b.add(TypeDef::interface("IRealObject"));
            b.add(
                TypeDef::interface("INotPossible0")
                    .implements(iscoped)
                    .implements(ireal),
            );
        });
        let diags: Vec<_> = sink.iter().collect();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::INVALID_COMBINATION);
        assert_eq!(diags[0].type_name, "INotPossible0");
    }

    #[test]
    fn scoped_and_singleton_rejected_for_classes_and_interfaces() {
        let sink = validate(|b| {
            b.add(TypeDef::class("BothLifetimes").attr("Scoped").attr("Singleton"));
            b.add(TypeDef::interface("IBothLifetimes").attr("Scoped").attr("Singleton"));
        });
        assert_eq!(sink.len(), 2);
        assert!(sink.iter().all(|d| d.code == codes::INVALID_COMBINATION));
    }

    #[test]
    fn poco_excludes_services_and_real_objects() {
        let sink = validate(|b| {
            b.add(TypeDef::class("Bad1").attr("Poco").attr("AutoService"));
            b.add(TypeDef::interface("IBad2").attr("Poco").attr("RealObject"));
        });
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn suppressed_definer_is_not_validated() {
        // The definer itself carries an illegal-looking union but has kind
        // None; only its materialized specialization is checked.
        let sink = validate(|b| {
            let definer = b.add(
                TypeDef::interface("IBothRoles")
                    .attr("RealObject")
                    .attr("AutoService")
                    .attr("Definer"),
            );
            b.add(TypeDef::interface("IChild").implements(definer));
        });
        let diags: Vec<_> = sink.iter().collect();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].type_name, "IChild");
    }
}
