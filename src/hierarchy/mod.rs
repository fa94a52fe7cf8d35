//! Hierarchy of typed graphs: a DAG of [`Graph`]s connected by typing
//! homomorphisms (edges that must commute) and symmetric relation
//! edges that carry no typing obligation of their own.
//!
//! Every typing edge `S -> T` is a homomorphism `h: S -> T`. The
//! defining invariant is commutativity: for any two typing paths
//! between the same pair of graphs, their composite maps must agree
//! node-wise. `add_typing` enforces this with a tentative-install,
//! validate, rollback-or-commit protocol, mirroring the
//! validate-fully-then-commit shape the rewriting executor itself uses.

pub mod json;

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::attributes::AttrDict;
use crate::graph::Graph;
use crate::homomorphism::{self, HomomorphismReport};

/// A single graph entry in the hierarchy: its structure plus whatever
/// attributes are attached to the hierarchy node itself (distinct from
/// the attributes on the graph's own nodes/edges).
#[derive(Debug, Clone)]
pub struct GraphHandle {
    pub graph: Graph,
    pub attrs: AttrDict,
}

/// A typing edge `from -> to`: a homomorphism plus hierarchy-edge attrs.
#[derive(Debug, Clone)]
pub struct Typing {
    pub mapping: HashMap<String, String>,
    pub attrs: AttrDict,
}

/// A symmetric relation edge between two graphs: `rel` maps a node in
/// one graph to the set of nodes in the other it relates to. Relations
/// carry no typing obligation and are not used by propagation.
#[derive(Debug, Clone)]
pub struct Relation {
    pub rel: HashMap<String, Vec<String>>,
    pub attrs: AttrDict,
}

/// Errors raised mutating or querying a [`Hierarchy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("graph '{0}' already exists")]
    DuplicateGraph(String),

    #[error("graph '{0}' does not exist")]
    UnknownGraph(String),

    #[error("typing edge '{0}' -> '{1}' does not exist")]
    UnknownTyping(String, String),

    #[error("typing '{from}' -> '{to}' is not a valid homomorphism: {report}")]
    InvalidTyping {
        from: String,
        to: String,
        report: HomomorphismReport,
    },

    #[error(
        "adding typing '{from}' -> '{to}' would break commutativity: \
         ancestor '{ancestor}' disagrees on node '{node}' ('{via_new}' vs '{via_existing}')"
    )]
    CommutativityViolation {
        from: String,
        to: String,
        ancestor: String,
        node: String,
        via_new: String,
        via_existing: String,
    },

    #[error("typing '{from}' -> '{to}' would create a cycle through '{via}'")]
    Cycle {
        from: String,
        to: String,
        via: String,
    },
}

/// A DAG of typed graphs. Graphs are identified by string labels.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    graphs: HashMap<String, GraphHandle>,
    typings: HashMap<(String, String), Typing>,
    relations: HashMap<(String, String), Relation>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Hierarchy::default()
    }

    pub fn has_graph(&self, id: &str) -> bool {
        self.graphs.contains_key(id)
    }

    pub fn graph(&self, id: &str) -> Option<&Graph> {
        self.graphs.get(id).map(|h| &h.graph)
    }

    pub fn graph_mut(&mut self, id: &str) -> Option<&mut Graph> {
        self.graphs.get_mut(id).map(|h| &mut h.graph)
    }

    pub fn handle(&self, id: &str) -> Option<&GraphHandle> {
        self.graphs.get(id)
    }

    pub fn graph_ids(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn typing(&self, from: &str, to: &str) -> Option<&Typing> {
        self.typings.get(&(from.to_string(), to.to_string()))
    }

    /// Mutable access to an existing typing edge's map, used by the
    /// propagation engine to redistribute/update it after an edit to
    /// either endpoint. Does not re-run the commutativity check — the
    /// propagation engine is itself responsible for keeping the
    /// invariant as it walks the hierarchy.
    pub fn typing_mut(&mut self, from: &str, to: &str) -> Option<&mut Typing> {
        self.typings.get_mut(&(from.to_string(), to.to_string()))
    }

    /// Direct typing successors of `id`: graphs `id` is typed into.
    pub fn successors(&self, id: &str) -> Vec<String> {
        self.typings
            .keys()
            .filter(|(from, _)| from == id)
            .map(|(_, to)| to.clone())
            .collect()
    }

    /// Direct typing predecessors of `id`: graphs typed by `id`.
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        self.typings
            .keys()
            .filter(|(_, to)| to == id)
            .map(|(from, _)| from.clone())
            .collect()
    }

    pub fn add_graph(&mut self, id: impl Into<String>, graph: Graph, attrs: AttrDict) -> Result<(), HierarchyError> {
        let id = id.into();
        if self.graphs.contains_key(&id) {
            return Err(HierarchyError::DuplicateGraph(id));
        }
        self.graphs.insert(id, GraphHandle { graph, attrs });
        Ok(())
    }

    pub fn add_relation(
        &mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        rel: HashMap<String, Vec<String>>,
        attrs: AttrDict,
    ) -> Result<(), HierarchyError> {
        let a = a.into();
        let b = b.into();
        self.require_graph(&a)?;
        self.require_graph(&b)?;
        self.relations.insert((a, b), Relation { rel, attrs });
        Ok(())
    }

    fn require_graph(&self, id: &str) -> Result<(), HierarchyError> {
        if self.graphs.contains_key(id) {
            Ok(())
        } else {
            Err(HierarchyError::UnknownGraph(id.to_string()))
        }
    }

    /// Install typing edge `from -> to` with homomorphism `h`.
    ///
    /// When `check` is `true`: (1) tentatively install, (2) verify `h` is
    /// a valid homomorphism, rolling back on failure, (3) verify every
    /// pre-existing path into `from` still commutes with every
    /// pre-existing path out of `to`, rolling back on failure, (4)
    /// commit. When `check` is `false`, the edge installs unconditionally
    /// (the caller is asserting it is already known-consistent).
    pub fn add_typing(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        h: HashMap<String, String>,
        attrs: AttrDict,
        check: bool,
    ) -> Result<(), HierarchyError> {
        let from = from.into();
        let to = to.into();
        self.require_graph(&from)?;
        self.require_graph(&to)?;

        if self.reachable_from(&to).contains(&from) {
            return Err(HierarchyError::Cycle { from, to, via: String::new() });
        }

        // Snapshot the commutativity witnesses before the tentative install.
        let pre_existing = if check {
            Some(self.commutativity_witnesses(&from, &to))
        } else {
            None
        };

        self.typings.insert(
            (from.clone(), to.clone()),
            Typing { mapping: h.clone(), attrs },
        );

        if check {
            let g_from = &self.graphs[&from].graph;
            let g_to = &self.graphs[&to].graph;
            if let Err(report) = homomorphism::check(&h, g_from, g_to) {
                self.typings.remove(&(from.clone(), to.clone()));
                return Err(HierarchyError::InvalidTyping { from, to, report });
            }

            if let Some(witnesses) = pre_existing {
                for (ancestor, comp_to_from, old_comp_to_to) in witnesses {
                    let new_comp_to_to = compose(&comp_to_from, &h);
                    if let Some(old) = old_comp_to_to {
                        if let Some((node, via_new, via_existing)) = first_disagreement(&new_comp_to_to, &old) {
                            self.typings.remove(&(from.clone(), to.clone()));
                            return Err(HierarchyError::CommutativityViolation {
                                from,
                                to,
                                ancestor,
                                node,
                                via_new,
                                via_existing,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// For every ancestor `A` of `from` (plus `from` itself), returns
    /// `(A, A->from composite, pre-existing A->to composite if any)`.
    fn commutativity_witnesses(&self, from: &str, to: &str) -> Vec<(String, HashMap<String, String>, Option<HashMap<String, String>>)> {
        let mut out = Vec::new();
        for ancestor in self.transitive_predecessors_inclusive(from) {
            let Some(comp_to_from) = self.composite_typing(&ancestor, from) else { continue };
            let old_comp_to_to = self.composite_typing(&ancestor, to);
            out.push((ancestor, comp_to_from, old_comp_to_to));
        }
        out
    }

    /// All graphs with a typing path into `id`, including `id` itself
    /// (via the empty/identity path).
    fn transitive_predecessors_inclusive(&self, id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(id.to_string());
        queue.push_back(id.to_string());
        while let Some(current) = queue.pop_front() {
            for pred in self.predecessors(&current) {
                if seen.insert(pred.clone()) {
                    queue.push_back(pred);
                }
            }
        }
        seen.into_iter().collect()
    }

    /// All graphs reachable from `id` via typing edges, including `id`.
    fn reachable_from(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(id.to_string());
        queue.push_back(id.to_string());
        while let Some(current) = queue.pop_front() {
            for succ in self.successors(&current) {
                if seen.insert(succ.clone()) {
                    queue.push_back(succ);
                }
            }
        }
        seen
    }

    /// The composite typing `from -> to` along any one existing path (by
    /// the commutativity invariant, any path gives the same answer).
    /// Returns `Some(identity)` when `from == to`.
    pub fn composite_typing(&self, from: &str, to: &str) -> Option<HashMap<String, String>> {
        if from == to {
            return self
                .graphs
                .get(from)
                .map(|h| h.graph.nodes().map(|n| (n.to_string(), n.to_string())).collect());
        }
        let path = self.find_path(from, to)?;
        let mut composite: HashMap<String, String> = self
            .graphs
            .get(from)?
            .graph
            .nodes()
            .map(|n| (n.to_string(), n.to_string()))
            .collect();
        for (u, v) in path.windows(2).map(|w| (w[0].clone(), w[1].clone())) {
            let edge = self.typings.get(&(u, v))?;
            composite = compose(&composite, &edge.mapping);
        }
        Some(composite)
    }

    /// BFS for any one typing path `from -> ... -> to`.
    fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(vec![from.to_string()]);
        visited.insert(from.to_string());
        while let Some(path) = queue.pop_front() {
            let last = path.last().unwrap();
            if last == to {
                return Some(path);
            }
            for succ in self.successors(last) {
                if visited.insert(succ.clone()) {
                    let mut next = path.clone();
                    next.push(succ);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// All transitive predecessors of `id`, reverse-topologically ordered
    /// (farthest-from-`id` last is NOT guaranteed; direct predecessors of
    /// `id` come before their own predecessors, i.e. visiting this order
    /// and propagating in turn sees each graph exactly once with its
    /// direct successor already updated).
    pub fn reverse_topological_predecessors(&self, id: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier: Vec<String> = self.predecessors(id);
        while let Some(next) = frontier.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            order.push(next.clone());
            frontier.extend(self.predecessors(&next));
        }
        order
    }

    /// All transitive successors of `id`, topologically ordered (direct
    /// successors of `id` come before graphs only reachable through them).
    pub fn topological_successors(&self, id: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = self.successors(id).into();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            order.push(next.clone());
            for succ in self.successors(&next) {
                queue.push_back(succ);
            }
        }
        order
    }

    /// Remove graph `id`. When `reconnect` is `true`, every
    /// predecessor/successor pair gets a new typing composing
    /// `pred -> id -> succ` before `id` and its incident typings/relations
    /// are deleted.
    pub fn remove_graph(&mut self, id: &str, reconnect: bool) -> Result<(), HierarchyError> {
        self.require_graph(id)?;
        if reconnect {
            let preds = self.predecessors(id);
            let succs = self.successors(id);
            for pred in &preds {
                for succ in &succs {
                    let Some(to_id) = self.composite_typing(pred, id) else { continue };
                    let Some(id_to_succ) = self.composite_typing(id, succ) else { continue };
                    let composed = compose(&to_id, &id_to_succ);
                    if !self.typings.contains_key(&(pred.clone(), succ.clone())) {
                        self.typings.insert(
                            (pred.clone(), succ.clone()),
                            Typing { mapping: composed, attrs: AttrDict::new() },
                        );
                    }
                }
            }
        }
        self.typings.retain(|(from, to), _| from != id && to != id);
        self.relations.retain(|(a, b), _| a != id && b != id);
        self.graphs.remove(id);
        Ok(())
    }
}

/// Compose two homomorphism maps: `f: X -> Y` then `g: Y -> Z`, giving
/// `X -> Z`. Nodes of `X` with no image under `f`, or whose image has no
/// image under `g`, are dropped (callers only rely on composites being
/// total when both inputs are total, which holds for typing edges).
fn compose(f: &HashMap<String, String>, g: &HashMap<String, String>) -> HashMap<String, String> {
    f.iter()
        .filter_map(|(x, y)| g.get(y).map(|z| (x.clone(), z.clone())))
        .collect()
}

fn first_disagreement(a: &HashMap<String, String>, b: &HashMap<String, String>) -> Option<(String, String, String)> {
    let mut keys: Vec<&String> = a.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(b_value) = b.get(key) {
            let a_value = &a[key];
            if a_value != b_value {
                return Some((key.clone(), a_value.clone(), b_value.clone()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_graph(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id, AttrDict::new()).unwrap();
        }
        g
    }

    #[test]
    fn add_typing_and_query_successors_predecessors() {
        let mut h = Hierarchy::new();
        h.add_graph("g", node_graph(&["a", "b"]), AttrDict::new()).unwrap();
        h.add_graph("t", node_graph(&["x"]), AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> =
            [("a".into(), "x".into()), ("b".into(), "x".into())].into();
        h.add_typing("g", "t", mapping, AttrDict::new(), true).unwrap();
        assert_eq!(h.successors("g"), vec!["t".to_string()]);
        assert_eq!(h.predecessors("t"), vec!["g".to_string()]);
    }

    #[test]
    fn invalid_homomorphism_is_rolled_back() {
        let mut h = Hierarchy::new();
        h.add_graph("g", node_graph(&["a"]), AttrDict::new()).unwrap();
        h.add_graph("t", node_graph(&["x"]), AttrDict::new()).unwrap();
        let mapping = HashMap::new(); // not total: "a" has no image
        let err = h.add_typing("g", "t", mapping, AttrDict::new(), true).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidTyping { .. }));
        assert!(h.typing("g", "t").is_none());
    }

    #[test]
    fn s6_cycle_is_rejected() {
        let mut h = Hierarchy::new();
        h.add_graph("a", node_graph(&["a1"]), AttrDict::new()).unwrap();
        h.add_graph("b", node_graph(&["b1"]), AttrDict::new()).unwrap();
        let a_to_b: HashMap<String, String> = [("a1".into(), "b1".into())].into();
        h.add_typing("a", "b", a_to_b, AttrDict::new(), true).unwrap();

        let b_to_a: HashMap<String, String> = [("b1".into(), "a1".into())].into();
        let err = h.add_typing("b", "a", b_to_a, AttrDict::new(), true).unwrap_err();
        assert!(matches!(err, HierarchyError::Cycle { .. }));
    }

    #[test]
    fn commutativity_violation_is_detected_and_rolled_back() {
        // a -> b -> d already exists with a1 |-> b1 |-> d1.
        // Adding a -> d directly with a1 |-> d2 (a different D node)
        // disagrees with the existing composite a -> b -> d (a1 -> d1).
        let mut h = Hierarchy::new();
        h.add_graph("a", node_graph(&["a1"]), AttrDict::new()).unwrap();
        h.add_graph("b", node_graph(&["b1"]), AttrDict::new()).unwrap();
        h.add_graph("d", node_graph(&["d1", "d2"]), AttrDict::new()).unwrap();

        let a_to_b: HashMap<String, String> = [("a1".into(), "b1".into())].into();
        h.add_typing("a", "b", a_to_b, AttrDict::new(), true).unwrap();
        let b_to_d: HashMap<String, String> = [("b1".into(), "d1".into())].into();
        h.add_typing("b", "d", b_to_d, AttrDict::new(), true).unwrap();

        let a_to_d: HashMap<String, String> = [("a1".into(), "d2".into())].into();
        let err = h.add_typing("a", "d", a_to_d, AttrDict::new(), true).unwrap_err();
        assert!(matches!(err, HierarchyError::CommutativityViolation { .. }));
        assert!(h.typing("a", "d").is_none());
    }

    #[test]
    fn remove_graph_with_reconnect_composes_typing() {
        let mut h = Hierarchy::new();
        h.add_graph("a", node_graph(&["a1"]), AttrDict::new()).unwrap();
        h.add_graph("b", node_graph(&["b1"]), AttrDict::new()).unwrap();
        h.add_graph("d", node_graph(&["d1"]), AttrDict::new()).unwrap();
        let a_to_b: HashMap<String, String> = [("a1".into(), "b1".into())].into();
        h.add_typing("a", "b", a_to_b, AttrDict::new(), true).unwrap();
        let b_to_d: HashMap<String, String> = [("b1".into(), "d1".into())].into();
        h.add_typing("b", "d", b_to_d, AttrDict::new(), true).unwrap();

        h.remove_graph("b", true).unwrap();
        assert!(!h.has_graph("b"));
        let composite = h.typing("a", "d").unwrap();
        assert_eq!(composite.mapping.get("a1"), Some(&"d1".to_string()));
    }
}
