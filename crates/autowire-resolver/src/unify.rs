//! Implementation unification.
//!
//! For every family, the generalization links define a tree of class nodes
//! (root = the family's own root class when one is registered, synthetic
//! otherwise). Resolution is a single deterministic bottom-up sweep: at a
//! level where two or more sibling subtrees compete, a unifier is looked
//! for - a class node, inside or outside the family, whose constructor
//! edges transitively reach every competing representative. Exactly one
//! unifier collapses the level; zero or several produce an ambiguity. The
//! sweep never retries and never picks arbitrarily, and every independent
//! ambiguity present in the input is reported in the same pass.

use crate::graph::{DependencyGraph, EdgeTarget, FamilyId};
use autowire_common::diagnostics::codes;
use autowire_common::{DiagnosticSink, NodeId, TypeId};
use autowire_registry::TypeUniverse;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

/// Where a unification failure sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbiguityKind {
    /// The unresolved level is the family's own root.
    Supergraph,
    /// The unresolved level is an internal branch of the family.
    Subgraph,
    /// More than one equally valid unifier candidate at one level.
    DuplicateUnifier,
}

/// A unification failure: the scope where resolution could not converge and
/// the competing types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ambiguity {
    pub kind: AmbiguityKind,
    pub scope: TypeId,
    pub conflicting: Vec<TypeId>,
}

/// Resolves every family of the graph, filling `most_specialized` on nodes
/// and families, and returns every ambiguity found.
pub fn resolve_families(
    graph: &mut DependencyGraph,
    universe: &TypeUniverse,
    sink: &mut DiagnosticSink,
) -> Vec<Ambiguity> {
    let mut sweep = Sweep::new(graph, universe);
    let family_ids: Vec<FamilyId> = graph.families().map(|(id, _)| id).collect();
    let mut family_results: Vec<Option<NodeId>> = Vec::with_capacity(family_ids.len());
    for &fid in &family_ids {
        family_results.push(sweep.resolve_family(fid));
    }

    // Write the sweep's results back into the graph.
    let Sweep {
        most, ambiguities, ..
    } = sweep;
    for (index, rep) in most.into_iter().enumerate() {
        graph.node_mut(NodeId(index as u32)).most_specialized = rep;
    }
    for (&fid, result) in family_ids.iter().zip(family_results) {
        graph.family_mut(fid).most_specialized = result;
    }

    for ambiguity in &ambiguities {
        report(ambiguity, universe, sink);
    }
    ambiguities
}

fn report(ambiguity: &Ambiguity, universe: &TypeUniverse, sink: &mut DiagnosticSink) {
    let code = match ambiguity.kind {
        AmbiguityKind::Supergraph => codes::SUPERGRAPH_AMBIGUITY,
        AmbiguityKind::Subgraph => codes::SUBGRAPH_AMBIGUITY,
        AmbiguityKind::DuplicateUnifier => codes::DUPLICATE_UNIFIER,
    };
    let scope = universe.get(ambiguity.scope).full_name();
    let conflicting = ambiguity
        .conflicting
        .iter()
        .map(|&t| format!("'{}'", universe.get(t).full_name()))
        .collect::<Vec<_>>()
        .join(", ");
    sink.error(code, scope.clone(), &[&scope, &conflicting]);
}

/// One bottom-up sweep over every family.
///
/// Works on plain adjacency snapshots so reachability queries and result
/// recording never fight over the graph borrow.
struct Sweep<'a> {
    universe: &'a TypeUniverse,
    /// Constructor class-edge adjacency, per node.
    depends_on: Vec<SmallVec<[NodeId; 4]>>,
    /// Specialization children, per node.
    children: Vec<SmallVec<[NodeId; 4]>>,
    /// Descriptor of each node.
    node_ty: Vec<TypeId>,
    /// Family roots and origin, per family.
    roots: Vec<SmallVec<[NodeId; 2]>>,
    origins: Vec<TypeId>,
    /// Memoized transitive constructor reachability.
    reach: Vec<Option<FxHashSet<NodeId>>>,
    /// Elected representative per node; `None` for ambiguous subtrees.
    most: Vec<Option<NodeId>>,
    ambiguities: Vec<Ambiguity>,
}

impl<'a> Sweep<'a> {
    fn new(graph: &DependencyGraph, universe: &'a TypeUniverse) -> Self {
        let node_count = graph.node_count();
        let mut depends_on = Vec::with_capacity(node_count);
        let mut children = Vec::with_capacity(node_count);
        let mut node_ty = Vec::with_capacity(node_count);
        for (_, node) in graph.nodes() {
            depends_on.push(
                node.ctor_edges
                    .iter()
                    .filter_map(|e| match e.target {
                        EdgeTarget::Class(dep) => Some(dep),
                        EdgeTarget::Placeholder(_) => None,
                    })
                    .collect(),
            );
            children.push(node.specializations.clone());
            node_ty.push(node.ty);
        }
        let mut roots = Vec::new();
        let mut origins = Vec::new();
        for (_, family) in graph.families() {
            roots.push(family.roots.clone());
            origins.push(family.origin);
        }
        Sweep {
            universe,
            depends_on,
            children,
            node_ty,
            roots,
            origins,
            reach: vec![None; node_count],
            most: vec![None; node_count],
            ambiguities: Vec::new(),
        }
    }

    fn resolve_family(&mut self, fid: FamilyId) -> Option<NodeId> {
        let roots = self.roots[fid.index()].clone();
        let single_root = roots.len() == 1;
        let mut reps = Vec::new();
        let mut subtrees = Vec::new();
        let mut poisoned = false;
        for &root in &roots {
            match self.resolve_subtree(root, single_root) {
                Some(rep) => {
                    reps.push(rep);
                    subtrees.push(self.subtree_set(root));
                }
                None => poisoned = true,
            }
        }
        if poisoned {
            return None;
        }
        match reps.len() {
            0 => None,
            1 => Some(reps[0]),
            // Several otherwise-unrelated top-level subtrees: the family
            // root is synthetic and this level is the supergraph.
            _ => self.elect(self.origins[fid.index()], None, &reps, &subtrees, true),
        }
    }

    /// Resolves one subtree, returning its representative or `None` when it
    /// is (or contains) an unresolved level on this path.
    fn resolve_subtree(&mut self, node: NodeId, is_family_root: bool) -> Option<NodeId> {
        let kids = self.children[node.index()].clone();
        let mut reps = Vec::new();
        let mut subtrees = Vec::new();
        let mut poisoned = false;
        for &kid in &kids {
            match self.resolve_subtree(kid, false) {
                Some(rep) => {
                    reps.push(rep);
                    subtrees.push(self.subtree_set(kid));
                }
                None => poisoned = true,
            }
        }
        // An ambiguous branch below stops resolution on this path without a
        // second report; independent branches keep going.
        if poisoned {
            return None;
        }
        let rep = match reps.len() {
            0 => node,
            1 => reps[0],
            _ => self.elect(
                self.node_ty[node.index()],
                Some(node),
                &reps,
                &subtrees,
                is_family_root,
            )?,
        };
        self.most[node.index()] = Some(rep);
        Some(rep)
    }

    /// Looks for the single unifier of a competing sibling set.
    ///
    /// A candidate is any class node whose constructor edges transitively
    /// reach every competing representative; a candidate lying inside one of
    /// the subtrees must be that subtree's own representative. When no full
    /// cover exists, siblings that depend on other siblings are themselves
    /// the would-be unifiers: several of them covering all independent
    /// siblings is a duplicate-unifier ambiguity, never an arbitrary pick.
    fn elect(
        &mut self,
        scope: TypeId,
        scope_node: Option<NodeId>,
        reps: &[NodeId],
        subtrees: &[FxHashSet<NodeId>],
        at_family_root: bool,
    ) -> Option<NodeId> {
        let mut membership: FxHashMap<NodeId, usize> = FxHashMap::default();
        for (index, subtree) in subtrees.iter().enumerate() {
            for &member in subtree {
                membership.insert(member, index);
            }
        }

        let rep_set: FxHashSet<NodeId> = reps.iter().copied().collect();
        let dependent: FxHashSet<NodeId> = reps
            .iter()
            .copied()
            .filter(|&r| {
                self.reach_of(r)
                    .iter()
                    .any(|d| rep_set.contains(d) && *d != r)
            })
            .collect();
        let independent: Vec<NodeId> = reps
            .iter()
            .copied()
            .filter(|r| !dependent.contains(r))
            .collect();

        let mut full: Vec<NodeId> = Vec::new();
        let mut partial: Vec<NodeId> = Vec::new();
        for index in 0..self.node_ty.len() {
            let candidate = NodeId(index as u32);
            if Some(candidate) == scope_node {
                continue;
            }
            if let Some(&subtree) = membership.get(&candidate)
                && reps[subtree] != candidate
            {
                // Inside a competing subtree but not its elected
                // representative: cannot stand for that branch.
                continue;
            }
            let reach = self.reach_of(candidate);
            if reps.iter().all(|&r| r == candidate || reach.contains(&r)) {
                full.push(candidate);
            } else if !dependent.is_empty()
                && independent
                    .iter()
                    .all(|&r| r == candidate || reach.contains(&r))
            {
                partial.push(candidate);
            }
        }

        let kind = if at_family_root {
            AmbiguityKind::Supergraph
        } else {
            AmbiguityKind::Subgraph
        };
        match full.len() {
            1 => {
                debug!(
                    scope = %self.universe.get(scope).full_name(),
                    unifier = %self.universe.get(self.node_ty[full[0].index()]).full_name(),
                    "level unified"
                );
                return Some(full[0]);
            }
            0 => {}
            _ => {
                self.push_ambiguity(AmbiguityKind::DuplicateUnifier, scope, &full);
                return None;
            }
        }
        // No full cover. The dependent siblings are the would-be unifiers;
        // they only stand when each of them covers every independent
        // sibling (otherwise one of them would be left out of the pick).
        if !partial.is_empty() && dependent.iter().all(|d| partial.contains(d)) {
            if partial.len() == 1 {
                return Some(partial[0]);
            }
            self.push_ambiguity(AmbiguityKind::DuplicateUnifier, scope, &partial);
            return None;
        }
        self.push_ambiguity(kind, scope, reps);
        None
    }

    fn push_ambiguity(&mut self, kind: AmbiguityKind, scope: TypeId, nodes: &[NodeId]) {
        self.ambiguities.push(Ambiguity {
            kind,
            scope,
            conflicting: nodes.iter().map(|&n| self.node_ty[n.index()]).collect(),
        });
    }

    /// Transitive constructor reachability of one node, memoized.
    fn reach_of(&mut self, start: NodeId) -> &FxHashSet<NodeId> {
        if self.reach[start.index()].is_none() {
            let mut seen = FxHashSet::default();
            let mut stack: Vec<NodeId> = self.depends_on[start.index()].to_vec();
            while let Some(node) = stack.pop() {
                if seen.insert(node) {
                    stack.extend(self.depends_on[node.index()].iter().copied());
                }
            }
            self.reach[start.index()] = Some(seen);
        }
        self.reach[start.index()].as_ref().expect("just filled")
    }

    /// Every node of the subtree rooted at `root`.
    fn subtree_set(&self, root: NodeId) -> FxHashSet<NodeId> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.children[node.index()].iter().copied());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autowire_common::{DiagnosticSink, default_marker_table};
    use autowire_registry::{TypeDef, UniverseBuilder, classify};

    struct Fixture {
        universe: TypeUniverse,
        graph: DependencyGraph,
        sink: DiagnosticSink,
        ambiguities: Vec<Ambiguity>,
        ids: Vec<TypeId>,
    }

    fn resolved(build: impl FnOnce(&mut UniverseBuilder) -> Vec<TypeId>) -> Fixture {
        let mut b = UniverseBuilder::new();
        let ids = build(&mut b);
        let universe = b.build().unwrap();
        let mut sink = DiagnosticSink::new();
        let classification = classify(&universe, default_marker_table(), &mut sink);
        let mut graph = DependencyGraph::build(
            &universe,
            &classification,
            default_marker_table(),
            &mut sink,
        );
        let ambiguities = resolve_families(&mut graph, &universe, &mut sink);
        Fixture {
            universe,
            graph,
            sink,
            ambiguities,
            ids,
        }
    }

    fn node_ty(f: &Fixture, ty: TypeId) -> NodeId {
        f.graph.node_of_type(ty).unwrap()
    }

    #[test]
    fn single_chain_elects_the_leaf() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let root = b.add(TypeDef::class("A").implements(ia).ctor(&[]));
            let leaf = b.add(TypeDef::class("ASpec").base(root).ctor(&[]));
            vec![ia, root, leaf]
        });
        assert!(f.ambiguities.is_empty());
        let (_, family) = f.graph.families().next().unwrap();
        assert_eq!(family.most_specialized, Some(node_ty(&f, f.ids[2])));
    }

    #[test]
    fn sibling_unifier_is_elected() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let as1 = b.add(TypeDef::class("AS1").implements(ia).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ia).ctor(&[]));
            let unified = b.add(
                TypeDef::class("UnifiedA")
                    .implements(ia)
                    .ctor(&[(as1, false), (as2, false)]),
            );
            vec![ia, as1, as2, unified]
        });
        assert!(f.ambiguities.is_empty(), "{:?}", f.ambiguities);
        assert!(!f.sink.has_errors());
        let (_, family) = f.graph.families().next().unwrap();
        assert_eq!(family.most_specialized, Some(node_ty(&f, f.ids[3])));
    }

    #[test]
    fn missing_unifier_is_a_supergraph_ambiguity() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let as1 = b.add(TypeDef::class("AS1").implements(ia).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ia).ctor(&[]));
            vec![ia, as1, as2]
        });
        assert_eq!(f.ambiguities.len(), 1);
        let ambiguity = &f.ambiguities[0];
        assert_eq!(ambiguity.kind, AmbiguityKind::Supergraph);
        assert_eq!(ambiguity.scope, f.ids[0]);
        assert_eq!(ambiguity.conflicting, vec![f.ids[1], f.ids[2]]);
        let reported: Vec<_> = f
            .sink
            .iter()
            .filter(|d| d.code == codes::SUPERGRAPH_AMBIGUITY)
            .collect();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].type_name, f.universe.get(f.ids[0]).full_name());
        assert!(reported[0].message.contains("'AS1', 'AS2'"));
    }

    #[test]
    fn duplicate_unifiers_are_never_picked_arbitrarily() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let as1 = b.add(TypeDef::class("AS1").implements(ia).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ia).ctor(&[]));
            let u1 = b.add(
                TypeDef::class("UnifiedA")
                    .implements(ia)
                    .ctor(&[(as1, false), (as2, false)]),
            );
            let u2 = b.add(
                TypeDef::class("UnifiedD")
                    .implements(ia)
                    .ctor(&[(as1, false), (as2, false)]),
            );
            vec![ia, as1, as2, u1, u2]
        });
        assert_eq!(f.ambiguities.len(), 1);
        let ambiguity = &f.ambiguities[0];
        assert_eq!(ambiguity.kind, AmbiguityKind::DuplicateUnifier);
        assert_eq!(ambiguity.scope, f.ids[0]);
        assert_eq!(ambiguity.conflicting, vec![f.ids[3], f.ids[4]]);
        let (_, family) = f.graph.families().next().unwrap();
        assert_eq!(family.most_specialized, None);
    }

    #[test]
    fn inner_branch_ambiguity_leaves_the_rest_of_the_family_alone() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let root = b.add(TypeDef::class("A").attr("Scoped").ctor(&[]));
            let branch = b.add(TypeDef::class("B").base(root).ctor(&[]));
            let b1 = b.add(TypeDef::class("B1").base(branch).ctor(&[]));
            let b2 = b.add(TypeDef::class("B2").base(branch).ctor(&[]));
            let clean = b.add(TypeDef::class("C").base(root).ctor(&[]));
            vec![iservice, root, branch, b1, b2, clean]
        });
        assert_eq!(f.ambiguities.len(), 1);
        let ambiguity = &f.ambiguities[0];
        assert_eq!(ambiguity.kind, AmbiguityKind::Subgraph);
        assert_eq!(ambiguity.scope, f.ids[2]);
        assert_eq!(ambiguity.conflicting, vec![f.ids[3], f.ids[4]]);
        // The clean sibling still resolved; the poisoned path did not.
        let clean_node = node_ty(&f, f.ids[5]);
        assert_eq!(f.graph.node(clean_node).most_specialized, Some(clean_node));
        let branch_node = node_ty(&f, f.ids[2]);
        assert_eq!(f.graph.node(branch_node).most_specialized, None);
        let (_, family) = f.graph.families().next().unwrap();
        assert_eq!(family.most_specialized, None);
    }

    #[test]
    fn out_of_family_unifier_is_found() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let ib = b.add(TypeDef::interface("IB").implements(iservice));
            let as1 = b.add(TypeDef::class("AS1").implements(ia).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ia).ctor(&[]));
            // Lives in the IB family but unifies the IA siblings.
            let bridge = b.add(
                TypeDef::class("Bridge")
                    .implements(ib)
                    .ctor(&[(as1, false), (as2, false)]),
            );
            vec![ia, as1, as2, bridge]
        });
        assert!(f.ambiguities.is_empty(), "{:?}", f.ambiguities);
        let family_a = f.graph.family_of_origin(f.ids[0]).unwrap();
        assert_eq!(
            f.graph.family(family_a).most_specialized,
            Some(node_ty(&f, f.ids[3]))
        );
    }

    #[test]
    fn unifier_written_against_uniquely_implemented_interfaces_is_found() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let ias1 = b.add(TypeDef::interface("IAS1").implements(ia));
            let ias2 = b.add(TypeDef::interface("IAS2").implements(ia));
            let as1 = b.add(TypeDef::class("AS1").implements(ias1).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ias2).ctor(&[]));
            let unified = b.add(
                TypeDef::class("UnifiedA")
                    .implements(ia)
                    .ctor(&[(ias1, false), (ias2, false)]),
            );
            vec![ia, as1, as2, unified]
        });
        assert!(f.ambiguities.is_empty(), "{:?}", f.ambiguities);
        assert!(!f.sink.has_errors());
        let family = f.graph.family_of_origin(f.ids[0]).unwrap();
        assert_eq!(
            f.graph.family(family).most_specialized,
            Some(node_ty(&f, f.ids[3]))
        );
    }

    #[test]
    fn transitive_constructor_reach_counts() {
        let f = resolved(|b| {
            let iservice = b.add(TypeDef::interface("IScopedAutoService"));
            let ia = b.add(TypeDef::interface("IA").implements(iservice));
            let ib = b.add(TypeDef::interface("IB").implements(iservice));
            let as1 = b.add(TypeDef::class("AS1").implements(ia).ctor(&[]));
            let as2 = b.add(TypeDef::class("AS2").implements(ia).ctor(&[]));
            // Middle service depends on AS2; unifier reaches AS2 through it.
            let middle = b.add(TypeDef::class("Middle").implements(ib).ctor(&[(as2, false)]));
            let unified = b.add(
                TypeDef::class("UnifiedA")
                    .implements(ia)
                    .ctor(&[(as1, false), (middle, false)]),
            );
            vec![ia, as1, as2, middle, unified]
        });
        assert!(f.ambiguities.is_empty(), "{:?}", f.ambiguities);
        let family_a = f.graph.family_of_origin(f.ids[0]).unwrap();
        assert_eq!(
            f.graph.family(family_a).most_specialized,
            Some(node_ty(&f, f.ids[4]))
        );
    }
}
