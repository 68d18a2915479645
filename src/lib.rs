//! Static type-role classification and implementation unification.
//!
//! Given a closed universe of candidate types with their inheritance
//! relationships, constructors and declared markers, one [`resolve`] call:
//!
//! 1. assigns each type a structural kind ([`KindFlags`]),
//! 2. validates that the assigned kinds do not combine illegally,
//! 3. builds one dependency-graph node per concrete injectable class, and
//! 4. elects a single most-specialized implementation per family, reporting
//!    a precise [`Ambiguity`] when no unique implementation exists.
//!
//! The pass is single-threaded, fully synchronous and pure: diagnostics are
//! accumulated rather than raised, the whole universe is always processed,
//! and the produced [`Resolution`] is immutable and safe to share. There is
//! no wire protocol or CLI surface; this is an in-process library boundary
//! consumed by a downstream generation stage.
//!
//! ```
//! use autowire::{TypeDef, UniverseBuilder, resolve};
//!
//! let mut builder = UniverseBuilder::new();
//! let iscoped = builder.add(TypeDef::interface("IScopedAutoService"));
//! let imailer = builder.add(TypeDef::interface("IMailer").implements(iscoped));
//! let mailer = builder.add(TypeDef::class("SmtpMailer").implements(imailer).ctor(&[]));
//! let universe = builder.build().unwrap();
//!
//! let resolution = resolve(&universe);
//! assert!(!resolution.has_fatal_error);
//! assert!(resolution.kind_of(mailer).contains(autowire::KindFlags::AUTO_SERVICE));
//! ```

use rustc_hash::FxHashMap;
use tracing::{Level, span};

pub use autowire_common::{
    Diagnostic, DiagnosticSink, MarkerRole, MarkerTable, NodeId, Severity, TypeId, codes,
    default_marker_table,
};
pub use autowire_registry::{
    Classification, Constructor, KindFlags, Param, Registration, SuppressionLevel, TypeDef,
    TypeDescriptor, TypeForm, TypeUniverse, UniverseBuilder, UniverseError, classify,
    validate_combinations,
};
pub use autowire_resolver::{
    Ambiguity, AmbiguityKind, ClassNode, CtorEdge, DependencyGraph, EdgeTarget, Family, FamilyId,
    resolve_families,
};

/// The immutable outcome of one resolution run.
///
/// Read-only once returned; safe to share across threads.
#[derive(Debug)]
pub struct Resolution {
    /// Final `KindFlags` per type of the universe.
    pub kinds: FxHashMap<TypeId, KindFlags>,
    /// The class-node forest per family, with elected representatives.
    pub graph: DependencyGraph,
    /// Every unification failure found in this pass.
    pub ambiguities: Vec<Ambiguity>,
    /// Every diagnostic accumulated by the pass.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when any error-severity diagnostic exists. A caller must treat
    /// a set flag as "do not proceed to generation".
    pub has_fatal_error: bool,
}

impl Resolution {
    pub fn kind_of(&self, id: TypeId) -> KindFlags {
        self.kinds.get(&id).copied().unwrap_or_default()
    }

    pub fn diagnostics_with_code(&self, code: u32) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }
}

/// Runs the whole pipeline with the default marker table.
pub fn resolve(universe: &TypeUniverse) -> Resolution {
    resolve_with(universe, default_marker_table())
}

/// Runs the whole pipeline with a caller-provided marker table.
pub fn resolve_with(universe: &TypeUniverse, markers: &MarkerTable) -> Resolution {
    let mut sink = DiagnosticSink::new();

    let classification = {
        let phase = span!(Level::DEBUG, "classify");
        let _enter = phase.enter();
        classify(universe, markers, &mut sink)
    };
    {
        let phase = span!(Level::DEBUG, "validate");
        let _enter = phase.enter();
        validate_combinations(universe, &classification, &mut sink);
    }
    let mut graph = {
        let phase = span!(Level::DEBUG, "graph");
        let _enter = phase.enter();
        DependencyGraph::build(universe, &classification, markers, &mut sink)
    };
    let ambiguities = {
        let phase = span!(Level::DEBUG, "unify");
        let _enter = phase.enter();
        resolve_families(&mut graph, universe, &mut sink)
    };

    let kinds = universe
        .iter()
        .map(|(id, _)| (id, classification.kind_of(id)))
        .collect();
    let diagnostics = sink.into_vec();
    let has_fatal_error = diagnostics.iter().any(|d| d.severity == Severity::Error);
    Resolution {
        kinds,
        graph,
        ambiguities,
        diagnostics,
        has_fatal_error,
    }
}
