//! The closed type universe.
//!
//! A `TypeUniverse` is an append-only arena of immutable `TypeDescriptor`s,
//! assembled once through a `UniverseBuilder` and read-only afterwards.
//! Ids are dense insertion indices; base and interface links may only point
//! at earlier ids, so the ancestry relation is acyclic by construction and
//! arena order is a valid most-general-first classification order.
//! Constructor parameters may reference any id in the universe.

use crate::kind::KindFlags;
use autowire_common::TypeId;
use indexmap::IndexMap;
use std::fmt;

/// Whether a descriptor denotes a class or an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeForm {
    Class,
    Interface,
}

/// How a type participates in registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// Part of the resolved universe.
    Registered,
    /// Known but explicitly excluded from registration.
    Excluded,
    /// Known only because something references it; never registered.
    External,
}

/// One constructor parameter: the referenced type and whether the parameter
/// declares a default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    pub ty: TypeId,
    pub has_default: bool,
}

/// One public constructor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constructor {
    pub params: Vec<Param>,
}

/// Immutable view of one candidate type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    /// Simple name, without namespace.
    pub name: String,
    pub namespace: String,
    pub form: TypeForm,
    /// Direct base type; classes only.
    pub base: Option<TypeId>,
    /// Directly implemented interfaces, in declaration order.
    pub interfaces: Vec<TypeId>,
    /// Simple names of the attributes present on the type.
    pub attributes: Vec<String>,
    /// Public constructors only.
    pub constructors: Vec<Constructor>,
    /// Number of generic parameters; 0 for non-generic types, > 0 for an
    /// open generic type definition.
    pub generic_arity: usize,
    pub registration: Registration,
}

impl TypeDescriptor {
    pub fn is_class(&self) -> bool {
        self.form == TypeForm::Class
    }

    pub fn is_interface(&self) -> bool {
        self.form == TypeForm::Interface
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Direct base followed by declared interfaces, in order.
    pub fn parents(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.base.into_iter().chain(self.interfaces.iter().copied())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Declarative description of one type, consumed by `UniverseBuilder::add`.
#[derive(Clone, Debug)]
pub struct TypeDef {
    name: String,
    namespace: String,
    form: TypeForm,
    base: Option<TypeId>,
    interfaces: Vec<TypeId>,
    attributes: Vec<String>,
    constructors: Vec<Constructor>,
    generic_arity: usize,
    registration: Registration,
}

impl TypeDef {
    fn new(name: &str, form: TypeForm) -> Self {
        TypeDef {
            name: name.to_string(),
            namespace: String::new(),
            form,
            base: None,
            interfaces: Vec::new(),
            attributes: Vec::new(),
            constructors: Vec::new(),
            generic_arity: 0,
            registration: Registration::Registered,
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, TypeForm::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name, TypeForm::Interface)
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn base(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Attaches an attribute by simple name.
    pub fn attr(mut self, name: &str) -> Self {
        self.attributes.push(name.to_string());
        self
    }

    /// Adds one public constructor taking `(type, has_default)` parameters.
    pub fn ctor(mut self, params: &[(TypeId, bool)]) -> Self {
        self.constructors.push(Constructor {
            params: params
                .iter()
                .map(|&(ty, has_default)| Param { ty, has_default })
                .collect(),
        });
        self
    }

    /// Marks the type as an open generic definition with the given arity.
    pub fn generic(mut self, arity: usize) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.registration = Registration::Excluded;
        self
    }

    pub fn external(mut self) -> Self {
        self.registration = Registration::External;
        self
    }
}

/// Structural misuse of the builder, reported at `build()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniverseError {
    /// A link references an id not yet (or never) added.
    DanglingReference { referrer: String, id: TypeId },
    /// A class names a non-class as its base.
    BaseNotClass { referrer: String, base: String },
    /// An interface declares a base class.
    BaseOnInterface { referrer: String },
    /// An `implements` link points at a class.
    ImplementsNotInterface { referrer: String, target: String },
    /// A generic kind assignment targets a non-generic type.
    AssignmentNotGeneric { target: String },
}

impl fmt::Display for UniverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseError::DanglingReference { referrer, id } => {
                write!(f, "'{referrer}' references unknown type {id}")
            }
            UniverseError::BaseNotClass { referrer, base } => {
                write!(f, "'{referrer}' declares non-class base '{base}'")
            }
            UniverseError::BaseOnInterface { referrer } => {
                write!(f, "interface '{referrer}' declares a base class")
            }
            UniverseError::ImplementsNotInterface { referrer, target } => {
                write!(f, "'{referrer}' implements non-interface '{target}'")
            }
            UniverseError::AssignmentNotGeneric { target } => {
                write!(f, "kind assignment targets non-generic type '{target}'")
            }
        }
    }
}

impl std::error::Error for UniverseError {}

/// Assembles a `TypeUniverse`.
#[derive(Debug, Default)]
pub struct UniverseBuilder {
    types: Vec<TypeDescriptor>,
    generic_assignments: IndexMap<TypeId, KindFlags>,
}

impl UniverseBuilder {
    pub fn new() -> Self {
        UniverseBuilder::default()
    }

    /// Adds a type and returns its id. Ancestry links must point at types
    /// added before this one.
    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDescriptor {
            name: def.name,
            namespace: def.namespace,
            form: def.form,
            base: def.base,
            interfaces: def.interfaces,
            attributes: def.attributes,
            constructors: def.constructors,
            generic_arity: def.generic_arity,
            registration: def.registration,
        });
        id
    }

    /// Requests an explicit kind assignment for an open generic definition.
    ///
    /// Requests are collected here and validated in one deterministic step
    /// during classification; registration order does not matter.
    pub fn assign_generic_kind(&mut self, target: TypeId, flags: KindFlags) {
        self.generic_assignments.insert(target, flags);
    }

    pub fn build(self) -> Result<TypeUniverse, UniverseError> {
        let count = self.types.len() as u32;
        for (index, ty) in self.types.iter().enumerate() {
            let own = index as u32;
            if let Some(base) = ty.base {
                if base.0 >= own {
                    return Err(UniverseError::DanglingReference {
                        referrer: ty.full_name(),
                        id: base,
                    });
                }
                if ty.is_interface() {
                    return Err(UniverseError::BaseOnInterface {
                        referrer: ty.full_name(),
                    });
                }
                if !self.types[base.index()].is_class() {
                    return Err(UniverseError::BaseNotClass {
                        referrer: ty.full_name(),
                        base: self.types[base.index()].full_name(),
                    });
                }
            }
            for &itf in &ty.interfaces {
                if itf.0 >= own {
                    return Err(UniverseError::DanglingReference {
                        referrer: ty.full_name(),
                        id: itf,
                    });
                }
                if !self.types[itf.index()].is_interface() {
                    return Err(UniverseError::ImplementsNotInterface {
                        referrer: ty.full_name(),
                        target: self.types[itf.index()].full_name(),
                    });
                }
            }
            for ctor in &ty.constructors {
                for param in &ctor.params {
                    if param.ty.0 >= count {
                        return Err(UniverseError::DanglingReference {
                            referrer: ty.full_name(),
                            id: param.ty,
                        });
                    }
                }
            }
        }
        for &target in self.generic_assignments.keys() {
            if target.0 >= count {
                return Err(UniverseError::DanglingReference {
                    referrer: "generic kind assignment".to_string(),
                    id: target,
                });
            }
            if self.types[target.index()].generic_arity == 0 {
                return Err(UniverseError::AssignmentNotGeneric {
                    target: self.types[target.index()].full_name(),
                });
            }
        }
        Ok(TypeUniverse {
            types: self.types,
            generic_assignments: self.generic_assignments,
        })
    }
}

// =============================================================================
// Universe
// =============================================================================

/// The closed, immutable universe of candidate types for one resolution run.
#[derive(Debug)]
pub struct TypeUniverse {
    types: Vec<TypeDescriptor>,
    /// Explicit kind assignments to open generic definitions, in request order.
    pub generic_assignments: IndexMap<TypeId, KindFlags>,
}

impl TypeUniverse {
    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates descriptors in id order, which is ancestry order: every
    /// type's bases and interfaces precede it.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_insertion_indices() {
        let mut b = UniverseBuilder::new();
        let a = b.add(TypeDef::interface("IA"));
        let c = b.add(TypeDef::class("C").implements(a));
        assert_eq!(a, TypeId(0));
        assert_eq!(c, TypeId(1));
        let universe = b.build().unwrap();
        assert_eq!(universe.get(c).interfaces, vec![a]);
    }

    #[test]
    fn forward_ancestry_reference_is_rejected() {
        let mut b = UniverseBuilder::new();
        b.add(TypeDef::class("C").base(TypeId(7)));
        assert!(matches!(
            b.build(),
            Err(UniverseError::DanglingReference { .. })
        ));
    }

    #[test]
    fn base_must_be_a_class() {
        let mut b = UniverseBuilder::new();
        let i = b.add(TypeDef::interface("IA"));
        b.add(TypeDef::class("C").base(i));
        assert!(matches!(b.build(), Err(UniverseError::BaseNotClass { .. })));
    }

    #[test]
    fn interfaces_cannot_have_a_base_class() {
        let mut b = UniverseBuilder::new();
        let c = b.add(TypeDef::class("C"));
        b.add(TypeDef::interface("IA").base(c));
        assert!(matches!(
            b.build(),
            Err(UniverseError::BaseOnInterface { .. })
        ));
    }

    #[test]
    fn ctor_params_may_reference_later_types() {
        let mut b = UniverseBuilder::new();
        let c = b.add(TypeDef::class("C").ctor(&[(TypeId(1), false)]));
        let d = b.add(TypeDef::class("D"));
        let universe = b.build().unwrap();
        assert_eq!(universe.get(c).constructors[0].params[0].ty, d);
    }

    #[test]
    fn generic_assignment_requires_generic_target() {
        let mut b = UniverseBuilder::new();
        let c = b.add(TypeDef::class("C"));
        b.assign_generic_kind(c, KindFlags::AUTO_SERVICE);
        assert!(matches!(
            b.build(),
            Err(UniverseError::AssignmentNotGeneric { .. })
        ));
    }

    #[test]
    fn full_name_joins_namespace() {
        let mut b = UniverseBuilder::new();
        let c = b.add(TypeDef::class("C").in_namespace("App.Services"));
        let universe = b.build().unwrap();
        assert_eq!(universe.get(c).full_name(), "App.Services.C");
    }
}
