//! Dependency graph construction.
//!
//! One `ClassNode` is created for every registered concrete class whose kind
//! contains `AUTO_SERVICE`, and one edge for every constructor parameter
//! that references another in-scope type. Every node lives in one
//! append-only arena and references its peers by `NodeId`; the
//! generalization links within a family form a forest, never a cycle,
//! because ancestry ids always point backwards in the universe.

use autowire_common::diagnostics::codes;
use autowire_common::{DiagnosticSink, MarkerTable, NodeId, TypeId};
use autowire_registry::{Classification, KindFlags, Registration, TypeUniverse};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

/// Identifies one family inside a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FamilyId(pub u32);

impl FamilyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a constructor edge points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeTarget {
    /// Another class node.
    Class(NodeId),
    /// A service interface with no registered implementation yet; bound by
    /// a later stage, never inside this resolver.
    Placeholder(TypeId),
}

/// One constructor dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CtorEdge {
    /// The parameter's declared type.
    pub param: TypeId,
    pub target: EdgeTarget,
}

/// One concrete injectable class.
#[derive(Debug)]
pub struct ClassNode {
    pub ty: TypeId,
    pub family: FamilyId,
    /// Nearest strict class-ancestor inside the same family.
    pub generalization: Option<NodeId>,
    /// Children, in node creation order.
    pub specializations: SmallVec<[NodeId; 4]>,
    pub ctor_edges: SmallVec<[CtorEdge; 4]>,
    /// The elected representative of this node's subtree, filled by
    /// resolution. `None` when the subtree is ambiguous.
    pub most_specialized: Option<NodeId>,
}

/// One family: every type reachable from one materialized role origin.
#[derive(Debug)]
pub struct Family {
    /// The materialized role origin the family grew from.
    pub origin: TypeId,
    /// Top nodes of the generalization forest (no in-family class ancestor).
    pub roots: SmallVec<[NodeId; 2]>,
    /// The family's single elected implementation, if unification converged.
    pub most_specialized: Option<NodeId>,
}

/// The whole graph for one resolution run.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<ClassNode>,
    families: Vec<Family>,
    node_of: FxHashMap<TypeId, NodeId>,
}

impl DependencyGraph {
    pub fn node(&self, id: NodeId) -> &ClassNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ClassNode {
        &mut self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ClassNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn family(&self, id: FamilyId) -> &Family {
        &self.families[id.index()]
    }

    pub(crate) fn family_mut(&mut self, id: FamilyId) -> &mut Family {
        &mut self.families[id.index()]
    }

    pub fn families(&self) -> impl Iterator<Item = (FamilyId, &Family)> {
        self.families
            .iter()
            .enumerate()
            .map(|(i, f)| (FamilyId(i as u32), f))
    }

    pub fn node_of_type(&self, ty: TypeId) -> Option<NodeId> {
        self.node_of.get(&ty).copied()
    }

    /// Finds the family grown from the given origin type.
    pub fn family_of_origin(&self, origin: TypeId) -> Option<FamilyId> {
        self.families
            .iter()
            .position(|f| f.origin == origin)
            .map(|i| FamilyId(i as u32))
    }

    /// Builds the graph for every registered concrete service class.
    pub fn build(
        universe: &TypeUniverse,
        classification: &Classification,
        markers: &MarkerTable,
        sink: &mut DiagnosticSink,
    ) -> DependencyGraph {
        let origins = compute_origins(universe, classification, markers);

        // Nodes, in universe order for determinism.
        let mut nodes: Vec<ClassNode> = Vec::new();
        let mut node_of: FxHashMap<TypeId, NodeId> = FxHashMap::default();
        let mut families: Vec<Family> = Vec::new();
        let mut family_of_origin: FxHashMap<TypeId, FamilyId> = FxHashMap::default();

        for (id, _) in universe.iter() {
            if !is_service_class(universe, classification, id) {
                continue;
            }
            // Every service class has an origin: at worst itself.
            let origin = origins[id.index()].unwrap_or(id);
            let family = *family_of_origin.entry(origin).or_insert_with(|| {
                let fid = FamilyId(families.len() as u32);
                debug!(origin = %universe.get(origin).full_name(), "new family");
                families.push(Family {
                    origin,
                    roots: SmallVec::new(),
                    most_specialized: None,
                });
                fid
            });
            let node_id = NodeId(nodes.len() as u32);
            node_of.insert(id, node_id);
            nodes.push(ClassNode {
                ty: id,
                family,
                generalization: None,
                specializations: SmallVec::new(),
                ctor_edges: SmallVec::new(),
                most_specialized: None,
            });
        }

        // Interface -> implementing nodes, for constructor parameter binding.
        let mut implementors: FxHashMap<TypeId, SmallVec<[NodeId; 2]>> = FxHashMap::default();
        for idx in 0..nodes.len() {
            let node_id = NodeId(idx as u32);
            let mut stack: Vec<TypeId> = universe.get(nodes[idx].ty).parents().collect();
            let mut seen: FxHashSet<TypeId> = FxHashSet::default();
            while let Some(ancestor) = stack.pop() {
                if !seen.insert(ancestor) {
                    continue;
                }
                if universe.get(ancestor).is_interface() {
                    implementors.entry(ancestor).or_default().push(node_id);
                }
                stack.extend(universe.get(ancestor).parents());
            }
        }

        // Generalization links: nearest strict class-ancestor with a node in
        // the same family, skipping anything else along the base chain.
        for idx in 0..nodes.len() {
            let node_id = NodeId(idx as u32);
            let ty = nodes[idx].ty;
            let family = nodes[idx].family;
            let mut ancestor = universe.get(ty).base;
            while let Some(a) = ancestor {
                if let Some(&candidate) = node_of.get(&a)
                    && nodes[candidate.index()].family == family
                {
                    nodes[idx].generalization = Some(candidate);
                    nodes[candidate.index()].specializations.push(node_id);
                    break;
                }
                ancestor = universe.get(a).base;
            }
            if nodes[idx].generalization.is_none() {
                families[family.index()].roots.push(node_id);
            }
        }

        // Constructor edges.
        for idx in 0..nodes.len() {
            let ty = nodes[idx].ty;
            let descriptor = universe.get(ty);
            let owner = descriptor.full_name();
            if descriptor.constructors.len() != 1 {
                sink.error(
                    codes::CONSTRUCTOR_ARITY,
                    owner.clone(),
                    &[&owner, &descriptor.constructors.len().to_string()],
                );
                continue;
            }
            let mut edges: SmallVec<[CtorEdge; 4]> = SmallVec::new();
            for param in &descriptor.constructors[0].params {
                let target = universe.get(param.ty);
                if let Some(&dep) = node_of.get(&param.ty) {
                    edges.push(CtorEdge {
                        param: param.ty,
                        target: EdgeTarget::Class(dep),
                    });
                } else if target.is_interface() {
                    // An interface with exactly one registered implementation
                    // binds to that class; canonical marker interfaces stay
                    // transparent. Anything else is optimistic: resolved by a
                    // later stage, never here.
                    let unique = (markers.lookup(&target.name).is_none())
                        .then(|| implementors.get(&param.ty))
                        .flatten()
                        .filter(|nodes| nodes.len() == 1)
                        .map(|nodes| nodes[0]);
                    if let Some(dep) = unique {
                        edges.push(CtorEdge {
                            param: param.ty,
                            target: EdgeTarget::Class(dep),
                        });
                    } else {
                        debug!(owner = %owner, param = %target.full_name(), "placeholder edge");
                        edges.push(CtorEdge {
                            param: param.ty,
                            target: EdgeTarget::Placeholder(param.ty),
                        });
                    }
                } else if target.registration == Registration::Excluded && param.has_default {
                    debug!(owner = %owner, param = %target.full_name(), "excluded parameter dropped");
                } else {
                    sink.error(
                        codes::UNRESOLVABLE_DEPENDENCY,
                        owner.clone(),
                        &[&owner, &target.full_name()],
                    );
                }
            }
            nodes[idx].ctor_edges = edges;
        }

        DependencyGraph {
            nodes,
            families,
            node_of,
        }
    }
}

/// A registered concrete class whose materialized kind contains AUTO_SERVICE.
fn is_service_class(
    universe: &TypeUniverse,
    classification: &Classification,
    id: TypeId,
) -> bool {
    let ty = universe.get(id);
    ty.is_class()
        && ty.registration == Registration::Registered
        && classification.kind_of(id).contains(KindFlags::AUTO_SERVICE)
}

/// The materialized role origin of every type, memoized in one pass.
///
/// A type's origin is the origin of the first parent that has one (base
/// chain first, then declared interfaces in order), or the type itself when
/// it is a materialized service. The canonical marker interfaces are
/// transparent: they confer flags but never anchor a family.
fn compute_origins(
    universe: &TypeUniverse,
    classification: &Classification,
    markers: &MarkerTable,
) -> Vec<Option<TypeId>> {
    let mut origins: Vec<Option<TypeId>> = Vec::with_capacity(universe.len());
    for (id, ty) in universe.iter() {
        let origin = if markers.lookup(&ty.name).is_some() {
            None
        } else if let Some(o) = ty.parents().find_map(|p| origins[p.index()]) {
            Some(o)
        } else if classification.kind_of(id).contains(KindFlags::AUTO_SERVICE) {
            Some(id)
        } else {
            None
        };
        origins.push(origin);
    }
    origins
}
