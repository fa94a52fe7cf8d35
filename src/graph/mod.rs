//! Typed attributed directed graph store and its primitive edits.
//!
//! A [`Graph`] is a set of string node ids, a set of directed edges over
//! those ids (no parallel edges; self-loops allowed), and attribute
//! dictionaries on both nodes and edges. All mutators normalize their
//! input attribute dictionaries and enforce node-id uniqueness, using
//! flat `HashSet`/`HashMap` registries rather than pulling in an
//! external graph library.

pub mod json;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::attributes::AttrDict;

/// A directed edge, identified by its endpoints.
pub type EdgeId = (String, String);

/// Errors raised by direct graph edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    DuplicateNode(String),

    #[error("node '{0}' does not exist")]
    UnknownNode(String),

    #[error("edge ({0:?} -> {1:?}) already exists")]
    DuplicateEdge(String, String),

    #[error("edge ({0:?} -> {1:?}) does not exist")]
    UnknownEdge(String, String),

    #[error("cannot relabel '{old}' to '{new}': target id already exists")]
    RelabelTargetExists { old: String, new: String },

    #[error("attribute error: {0}")]
    Attribute(#[from] crate::attributes::AttributeError),
}

/// A typed attributed directed graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: HashSet<String>,
    edges: HashSet<EdgeId>,
    node_attrs: HashMap<String, AttrDict>,
    edge_attrs: HashMap<EdgeId, AttrDict>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    // -- queries ----------------------------------------------------

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains(&(from.to_string(), to.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(u, v)| (u.as_str(), v.as_str()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_attrs(&self, id: &str) -> Option<&AttrDict> {
        self.node_attrs.get(id)
    }

    pub fn edge_attrs(&self, from: &str, to: &str) -> Option<&AttrDict> {
        self.edge_attrs.get(&(from.to_string(), to.to_string()))
    }

    pub fn successors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(move |(u, _)| u == id)
            .map(|(_, v)| v.as_str())
    }

    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(move |(_, v)| v == id)
            .map(|(u, _)| u.as_str())
    }

    fn require_node(&self, id: &str) -> Result<(), GraphError> {
        if self.nodes.contains(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id.to_string()))
        }
    }

    // -- primitive edits ---------------------------------------------

    pub fn add_node(&mut self, id: impl Into<String>, attrs: AttrDict) -> Result<(), GraphError> {
        let id = id.into();
        if self.nodes.contains(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id.clone());
        if !attrs.is_empty() {
            self.node_attrs.insert(id, attrs);
        }
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        attrs: AttrDict,
    ) -> Result<(), GraphError> {
        let from = from.into();
        let to = to.into();
        self.require_node(&from)?;
        self.require_node(&to)?;
        let edge = (from, to);
        if self.edges.contains(&edge) {
            return Err(GraphError::DuplicateEdge(edge.0, edge.1));
        }
        self.edges.insert(edge.clone());
        if !attrs.is_empty() {
            self.edge_attrs.insert(edge, attrs);
        }
        Ok(())
    }

    /// Remove a node, detaching (deleting) every incident edge.
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        self.require_node(id)?;
        self.nodes.remove(id);
        self.node_attrs.remove(id);
        self.edges.retain(|(u, v)| u != id && v != id);
        self.edge_attrs.retain(|(u, v), _| u != id && v != id);
        Ok(())
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let edge = (from.to_string(), to.to_string());
        if !self.edges.remove(&edge) {
            return Err(GraphError::UnknownEdge(edge.0, edge.1));
        }
        self.edge_attrs.remove(&edge);
        Ok(())
    }

    /// Rename a node in place; the new id must not already exist.
    pub fn relabel_node(&mut self, old: &str, new: impl Into<String>) -> Result<(), GraphError> {
        self.require_node(old)?;
        let new = new.into();
        if new == old {
            return Ok(());
        }
        if self.nodes.contains(&new) {
            return Err(GraphError::RelabelTargetExists {
                old: old.to_string(),
                new,
            });
        }
        self.nodes.remove(old);
        self.nodes.insert(new.clone());
        if let Some(attrs) = self.node_attrs.remove(old) {
            self.node_attrs.insert(new.clone(), attrs);
        }
        let renamed_edges: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(u, v)| u == old || v == old)
            .cloned()
            .collect();
        for (u, v) in renamed_edges {
            self.edges.remove(&(u.clone(), v.clone()));
            let attrs = self.edge_attrs.remove(&(u.clone(), v.clone()));
            let u2 = if u == old { new.clone() } else { u };
            let v2 = if v == old { new.clone() } else { v };
            self.edges.insert((u2.clone(), v2.clone()));
            if let Some(attrs) = attrs {
                self.edge_attrs.insert((u2, v2), attrs);
            }
        }
        Ok(())
    }

    pub fn update_node_attrs(&mut self, id: &str, attrs: AttrDict) -> Result<(), GraphError> {
        self.require_node(id)?;
        if attrs.is_empty() {
            self.node_attrs.remove(id);
        } else {
            self.node_attrs.insert(id.to_string(), attrs);
        }
        Ok(())
    }

    pub fn update_edge_attrs(
        &mut self,
        from: &str,
        to: &str,
        attrs: AttrDict,
    ) -> Result<(), GraphError> {
        let edge = (from.to_string(), to.to_string());
        if !self.edges.contains(&edge) {
            return Err(GraphError::UnknownEdge(edge.0, edge.1));
        }
        if attrs.is_empty() {
            self.edge_attrs.remove(&edge);
        } else {
            self.edge_attrs.insert(edge, attrs);
        }
        Ok(())
    }

    pub fn add_node_attrs(&mut self, id: &str, attrs: &AttrDict) -> Result<(), GraphError> {
        self.require_node(id)?;
        let entry = self.node_attrs.entry(id.to_string()).or_default();
        entry.add_values(attrs)?;
        Ok(())
    }

    pub fn remove_node_attrs(&mut self, id: &str, attrs: &AttrDict) -> Result<(), GraphError> {
        self.require_node(id)?;
        if let Some(entry) = self.node_attrs.get_mut(id) {
            entry.remove_values(attrs)?;
            if entry.is_empty() {
                self.node_attrs.remove(id);
            }
        }
        Ok(())
    }

    pub fn add_edge_attrs(&mut self, from: &str, to: &str, attrs: &AttrDict) -> Result<(), GraphError> {
        let edge = (from.to_string(), to.to_string());
        if !self.edges.contains(&edge) {
            return Err(GraphError::UnknownEdge(edge.0, edge.1));
        }
        let entry = self.edge_attrs.entry(edge).or_default();
        entry.add_values(attrs)?;
        Ok(())
    }

    pub fn remove_edge_attrs(&mut self, from: &str, to: &str, attrs: &AttrDict) -> Result<(), GraphError> {
        let edge = (from.to_string(), to.to_string());
        if !self.edges.contains(&edge) {
            return Err(GraphError::UnknownEdge(edge.0, edge.1));
        }
        if let Some(entry) = self.edge_attrs.get_mut(&edge) {
            entry.remove_values(attrs)?;
            if entry.is_empty() {
                self.edge_attrs.remove(&edge);
            }
        }
        Ok(())
    }

    // -- composite primitives -----------------------------------------

    /// Clone node `n` into a fresh node, copying its attributes and
    /// redirecting every incident edge to the clone as well (so both `n`
    /// and the clone keep the edge), except edges to/from nodes listed in
    /// `exclude_successors`/`exclude_predecessors`. Self-loops on `n` are
    /// preserved on both `n` and the clone. Returns the new node's id.
    pub fn clone_node(
        &mut self,
        n: &str,
        new_id: Option<String>,
        exclude_successors: &HashSet<String>,
        exclude_predecessors: &HashSet<String>,
    ) -> Result<String, GraphError> {
        self.require_node(n)?;
        let clone_id = new_id.unwrap_or_else(|| format!("{n}_clone_{}", short_uuid()));
        if self.nodes.contains(&clone_id) {
            return Err(GraphError::DuplicateNode(clone_id));
        }
        self.nodes.insert(clone_id.clone());
        if let Some(attrs) = self.node_attrs.get(n).cloned() {
            self.node_attrs.insert(clone_id.clone(), attrs);
        }

        let successors: Vec<(String, Option<AttrDict>)> = self
            .edges
            .iter()
            .filter(|(u, _)| u == n)
            .map(|(_, v)| (v.clone(), self.edge_attrs.get(&(n.to_string(), v.clone())).cloned()))
            .collect();
        let predecessors: Vec<(String, Option<AttrDict>)> = self
            .edges
            .iter()
            .filter(|(_, v)| v == n)
            .map(|(u, _)| (u.clone(), self.edge_attrs.get(&(u.clone(), n.to_string())).cloned()))
            .collect();

        for (v, attrs) in successors {
            if v == n {
                // self-loop: preserved on both n and the clone
                self.edges.insert((clone_id.clone(), clone_id.clone()));
                if let Some(attrs) = attrs {
                    self.edge_attrs.insert((clone_id.clone(), clone_id.clone()), attrs);
                }
                continue;
            }
            if exclude_successors.contains(&v) {
                continue;
            }
            self.edges.insert((clone_id.clone(), v.clone()));
            if let Some(attrs) = attrs {
                self.edge_attrs.insert((clone_id.clone(), v), attrs);
            }
        }
        for (u, attrs) in predecessors {
            if u == n {
                continue; // already handled as a self-loop above
            }
            if exclude_predecessors.contains(&u) {
                continue;
            }
            self.edges.insert((u.clone(), clone_id.clone()));
            if let Some(attrs) = attrs {
                self.edge_attrs.insert((u, clone_id.clone()), attrs);
            }
        }

        Ok(clone_id)
    }

    /// Merge the nodes in `members` into a single node. The resulting
    /// attributes are the key-wise union of all members' attributes; for
    /// every neighbor outside `members`, the union of incident-edge
    /// attributes is attached to the merged edge; internal edges and
    /// self-loops among `members` collapse to a single self-loop on the
    /// result. `target_id` is either reused (if it names one of the
    /// members) or a fresh id is generated.
    pub fn merge_nodes(
        &mut self,
        members: &[String],
        target_id: Option<String>,
    ) -> Result<String, GraphError> {
        if members.is_empty() {
            return Err(GraphError::UnknownNode(String::new()));
        }
        let mut sorted_members: Vec<&String> = members.iter().collect();
        sorted_members.sort();
        for m in &sorted_members {
            self.require_node(m)?;
        }
        let member_set: HashSet<String> = members.iter().cloned().collect();
        let target = target_id.unwrap_or_else(|| sorted_members[0].clone());

        let mut merged_attrs = AttrDict::new();
        for m in &sorted_members {
            if let Some(attrs) = self.node_attrs.get(m.as_str()) {
                merged_attrs = merged_attrs.union(attrs)?;
            }
        }

        // Collect external neighbor edges and internal edges before mutating.
        let mut outgoing: HashMap<String, AttrDict> = HashMap::new();
        let mut incoming: HashMap<String, AttrDict> = HashMap::new();
        let mut internal = AttrDict::new();
        let mut has_internal = false;

        for (u, v) in self.edges.iter() {
            let u_in = member_set.contains(u);
            let v_in = member_set.contains(v);
            if u_in && v_in {
                has_internal = true;
                if let Some(attrs) = self.edge_attrs.get(&(u.clone(), v.clone())) {
                    internal = internal.union(attrs)?;
                }
            } else if u_in {
                let entry = outgoing.entry(v.clone()).or_default();
                if let Some(attrs) = self.edge_attrs.get(&(u.clone(), v.clone())) {
                    *entry = entry.union(attrs)?;
                }
            } else if v_in {
                let entry = incoming.entry(u.clone()).or_default();
                if let Some(attrs) = self.edge_attrs.get(&(u.clone(), v.clone())) {
                    *entry = entry.union(attrs)?;
                }
            }
        }

        // Remove all member nodes (and their incident edges), then recreate
        // the target with the merged attributes and edges.
        let target_existed_as_member = member_set.contains(&target);
        for m in &sorted_members {
            self.nodes.remove(m.as_str());
            self.node_attrs.remove(m.as_str());
        }
        self.edges
            .retain(|(u, v)| !member_set.contains(u) && !member_set.contains(v));
        self.edge_attrs
            .retain(|(u, v), _| !member_set.contains(u) && !member_set.contains(v));

        self.nodes.insert(target.clone());
        if !merged_attrs.is_empty() {
            self.node_attrs.insert(target.clone(), merged_attrs);
        }
        if has_internal {
            self.edges.insert((target.clone(), target.clone()));
            if !internal.is_empty() {
                self.edge_attrs.insert((target.clone(), target.clone()), internal);
            }
        }
        for (v, attrs) in outgoing {
            let v = if member_set.contains(&v) { target.clone() } else { v };
            self.edges.insert((target.clone(), v.clone()));
            if !attrs.is_empty() {
                self.edge_attrs.insert((target.clone(), v), attrs);
            }
        }
        for (u, attrs) in incoming {
            let u = if member_set.contains(&u) { target.clone() } else { u };
            self.edges.insert((u.clone(), target.clone()));
            if !attrs.is_empty() {
                self.edge_attrs.insert((u, target.clone()), attrs);
            }
        }
        let _ = target_existed_as_member;

        Ok(target)
    }
}

fn short_uuid() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttrValueSet, Value};

    fn dict(pairs: &[(&str, &[&str])]) -> AttrDict {
        let mut d = AttrDict::new();
        for (k, vs) in pairs {
            d.insert(
                *k,
                AttrValueSet::finite(vs.iter().map(|v| Value::Str(v.to_string()))),
            );
        }
        d
    }

    #[test]
    fn add_and_remove_node_detaches_edges() {
        let mut g = Graph::new();
        g.add_node("a", AttrDict::new()).unwrap();
        g.add_node("b", AttrDict::new()).unwrap();
        g.add_edge("a", "b", AttrDict::new()).unwrap();
        g.remove_node("a").unwrap();
        assert!(!g.has_node("a"));
        assert!(!g.has_edge("a", "b"));
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut g = Graph::new();
        g.add_node("a", AttrDict::new()).unwrap();
        assert_eq!(
            g.add_node("a", AttrDict::new()),
            Err(GraphError::DuplicateNode("a".into()))
        );
    }

    #[test]
    fn s2_clone_excludes_redirected_edges() {
        // G = {a,b,c}, edges {(a,b),(a,c),(b,c)}
        let mut g = Graph::new();
        for n in ["a", "b", "c"] {
            g.add_node(n, AttrDict::new()).unwrap();
        }
        g.add_edge("a", "b", AttrDict::new()).unwrap();
        g.add_edge("a", "c", AttrDict::new()).unwrap();
        g.add_edge("b", "c", AttrDict::new()).unwrap();

        // a1 keeps (a1,b); a2 (the clone) excludes b, keeping (a2,c)
        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();
        let a2 = g
            .clone_node("a", Some("a2".into()), &exclude, &HashSet::new())
            .unwrap();

        assert!(g.has_edge("a", "b"));
        assert!(!g.has_edge(&a2, "b"));
        assert!(g.has_edge(&a2, "c"));
        assert!(g.has_edge("b", "c"));
        assert_eq!(g.node_count(), 4);
    }

    #[test]
    fn s3_merge_unions_attributes_and_collapses_edges() {
        // G = {a,b,c}, edges {(a,c),(b,c)}
        let mut g = Graph::new();
        g.add_node("a", dict(&[("color", &["red"])])).unwrap();
        g.add_node("b", dict(&[("color", &["blue"])])).unwrap();
        g.add_node("c", AttrDict::new()).unwrap();
        g.add_edge("a", "c", AttrDict::new()).unwrap();
        g.add_edge("b", "c", AttrDict::new()).unwrap();

        let m = g
            .merge_nodes(&["a".to_string(), "b".to_string()], Some("m".into()))
            .unwrap();

        assert_eq!(g.node_count(), 2);
        assert!(g.has_edge(&m, "c"));
        let attrs = g.node_attrs(&m).unwrap();
        assert_eq!(
            attrs.get("color").unwrap(),
            &AttrValueSet::finite([Value::Str("red".into()), Value::Str("blue".into())])
        );
    }

    #[test]
    fn merge_collapses_internal_edges_to_one_self_loop() {
        let mut g = Graph::new();
        g.add_node("a", AttrDict::new()).unwrap();
        g.add_node("b", AttrDict::new()).unwrap();
        g.add_edge("a", "b", AttrDict::new()).unwrap();
        let m = g
            .merge_nodes(&["a".to_string(), "b".to_string()], None)
            .unwrap();
        assert!(g.has_edge(&m, &m));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn relabel_node_moves_attrs_and_edges() {
        let mut g = Graph::new();
        g.add_node("a", dict(&[("k", &["v"])])).unwrap();
        g.add_node("b", AttrDict::new()).unwrap();
        g.add_edge("a", "b", AttrDict::new()).unwrap();
        g.relabel_node("a", "a2").unwrap();
        assert!(!g.has_node("a"));
        assert!(g.has_node("a2"));
        assert!(g.has_edge("a2", "b"));
        assert!(g.node_attrs("a2").is_some());
    }
}
