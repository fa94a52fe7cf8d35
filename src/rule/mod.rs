//! Rule representation `ρ = (L, P, R, l, r)` and its derived edit sets.
//!
//! `l: P -> L` and `r: P -> R` are total homomorphisms. Non-injectivity
//! of `l` expresses cloning (two P-nodes share an L-image); non-injectivity
//! of `r` expresses merging (two P-nodes share an R-image). Neither needs
//! to be surjective: an L-node outside `range(l)` is a removed node, an
//! R-node outside `range(r)` is an added node. The derived queries below
//! compute the primitive edits the rewriting executor applies, purely
//! from `l`/`r` and the three graphs — no separate bookkeeping is kept
//! in sync by hand.

pub mod json;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::attributes::AttrDict;
use crate::graph::Graph;
use crate::homomorphism;

/// Errors raised constructing or validating a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("p_lhs is not total: P-node '{0}' has no L-image")]
    DanglingLhsReference(String),

    #[error("p_rhs is not total: P-node '{0}' has no R-image")]
    DanglingRhsReference(String),

    #[error("p_lhs is not a valid homomorphism P -> L: {0}")]
    InvalidLhsMorphism(String),

    #[error("p_rhs is not a valid homomorphism P -> R: {0}")]
    InvalidRhsMorphism(String),
}

/// A rewriting rule `(L, P, R, l, r)`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub lhs: Graph,
    pub p: Graph,
    pub rhs: Graph,
    /// `l: P -> L`, surjective.
    pub p_lhs: HashMap<String, String>,
    /// `r: P -> R`.
    pub p_rhs: HashMap<String, String>,
}

impl Rule {
    /// Build and validate a rule. `l` and `r` must both be total
    /// homomorphisms; neither needs to be surjective (see module docs).
    pub fn new(
        lhs: Graph,
        p: Graph,
        rhs: Graph,
        p_lhs: HashMap<String, String>,
        p_rhs: HashMap<String, String>,
    ) -> Result<Self, RuleError> {
        for node in p.nodes() {
            if !p_lhs.contains_key(node) {
                return Err(RuleError::DanglingLhsReference(node.to_string()));
            }
            if !p_rhs.contains_key(node) {
                return Err(RuleError::DanglingRhsReference(node.to_string()));
            }
        }
        if let Err(report) = homomorphism::check(&p_lhs, &p, &lhs) {
            return Err(RuleError::InvalidLhsMorphism(report.to_string()));
        }
        if let Err(report) = homomorphism::check(&p_rhs, &p, &rhs) {
            return Err(RuleError::InvalidRhsMorphism(report.to_string()));
        }
        Ok(Rule { lhs, p, rhs, p_lhs, p_rhs })
    }

    /// An identity rule `L = P = R`, `l = r = id`. Applying it changes
    /// nothing (invariant 4 in the testable-properties list).
    pub fn identity(graph: Graph) -> Self {
        let ids: HashMap<String, String> = graph.nodes().map(|n| (n.to_string(), n.to_string())).collect();
        Rule {
            lhs: graph.clone(),
            p: graph.clone(),
            rhs: graph,
            p_lhs: ids.clone(),
            p_rhs: ids,
        }
    }

    /// L-nodes with two or more P-preimages, i.e. nodes this rule clones.
    /// Each bucket is sorted by P-node id so callers can deterministically
    /// pick the "first" preimage to keep as the original instance target.
    pub fn cloned_nodes(&self) -> HashMap<String, Vec<String>> {
        group_preimages(&self.p_lhs)
            .into_iter()
            .filter(|(_, preimages)| preimages.len() > 1)
            .collect()
    }

    /// R-nodes with two or more P-preimages, i.e. nodes this rule merges.
    pub fn merged_nodes(&self) -> HashMap<String, Vec<String>> {
        group_preimages(&self.p_rhs)
            .into_iter()
            .filter(|(_, preimages)| preimages.len() > 1)
            .collect()
    }

    /// L-nodes with no P-preimage: deleted by the rule.
    pub fn removed_nodes(&self) -> HashSet<String> {
        let image: HashSet<&str> = self.p_lhs.values().map(String::as_str).collect();
        self.lhs
            .nodes()
            .filter(|n| !image.contains(n))
            .map(str::to_string)
            .collect()
    }

    /// R-nodes with no P-preimage: created by the rule.
    pub fn added_nodes(&self) -> HashSet<String> {
        let image: HashSet<&str> = self.p_rhs.values().map(String::as_str).collect();
        self.rhs
            .nodes()
            .filter(|n| !image.contains(n))
            .map(str::to_string)
            .collect()
    }

    /// L-edges with no transported-through-P counterpart implied by `r`.
    /// An L-edge `(u,v)` survives iff some P-edge `(p,q)` has `l(p)=u`,
    /// `l(q)=v`, *and* the R-image `(r(p),r(q))` is an edge of R.
    pub fn removed_edges(&self) -> HashSet<(String, String)> {
        let mut survives: HashSet<(String, String)> = HashSet::new();
        for (p, q) in self.p.edges() {
            let (Some(lu), Some(lv)) = (self.p_lhs.get(p), self.p_lhs.get(q)) else { continue };
            let (Some(ru), Some(rv)) = (self.p_rhs.get(p), self.p_rhs.get(q)) else { continue };
            if self.rhs.has_edge(ru, rv) {
                survives.insert((lu.clone(), lv.clone()));
            }
        }
        self.lhs
            .edges()
            .map(|(u, v)| (u.to_string(), v.to_string()))
            .filter(|e| !survives.contains(e))
            .collect()
    }

    /// R-edges with no P-edge transporting through `l` into an L-edge.
    pub fn added_edges(&self) -> HashSet<(String, String)> {
        let mut implied: HashSet<(String, String)> = HashSet::new();
        for (p, q) in self.p.edges() {
            let (Some(ru), Some(rv)) = (self.p_rhs.get(p), self.p_rhs.get(q)) else { continue };
            let (Some(lu), Some(lv)) = (self.p_lhs.get(p), self.p_lhs.get(q)) else { continue };
            if self.lhs.has_edge(lu, lv) {
                implied.insert((ru.clone(), rv.clone()));
            }
        }
        self.rhs
            .edges()
            .map(|(u, v)| (u.to_string(), v.to_string()))
            .filter(|e| !implied.contains(e))
            .collect()
    }

    /// Node attribute values removed between `L`'s restriction on `p_lhs`
    /// preimages and `P`'s attributes: `attrs(l(p)) \ attrs(p)` per P-node.
    pub fn removed_node_attrs(&self) -> HashMap<String, AttrDict> {
        let mut out = HashMap::new();
        for p in self.p.nodes() {
            let Some(l_node) = self.p_lhs.get(p) else { continue };
            let l_attrs = self.lhs.node_attrs(l_node).cloned().unwrap_or_default();
            let p_attrs = self.p.node_attrs(p).cloned().unwrap_or_default();
            if let Ok(diff) = l_attrs.difference_safe(&p_attrs) {
                if !diff.is_empty() {
                    out.insert(p.to_string(), diff);
                }
            }
        }
        out
    }

    /// Node attribute values added between `P`'s attributes and `R`'s
    /// restriction on `p_rhs` images: `attrs(r(p)) \ attrs(p)` per P-node.
    pub fn added_node_attrs(&self) -> HashMap<String, AttrDict> {
        let mut out = HashMap::new();
        for p in self.p.nodes() {
            let Some(r_node) = self.p_rhs.get(p) else { continue };
            let r_attrs = self.rhs.node_attrs(r_node).cloned().unwrap_or_default();
            let p_attrs = self.p.node_attrs(p).cloned().unwrap_or_default();
            if let Ok(diff) = r_attrs.difference_safe(&p_attrs) {
                if !diff.is_empty() {
                    out.insert(p.to_string(), diff);
                }
            }
        }
        out
    }

    /// Edge attribute values removed, keyed by the surviving L-edge.
    pub fn removed_edge_attrs(&self) -> HashMap<(String, String), AttrDict> {
        let mut out = HashMap::new();
        for (p, q) in self.p.edges() {
            let (Some(lu), Some(lv)) = (self.p_lhs.get(p), self.p_lhs.get(q)) else { continue };
            if !self.lhs.has_edge(lu, lv) {
                continue;
            }
            let l_attrs = self.lhs.edge_attrs(lu, lv).cloned().unwrap_or_default();
            let p_attrs = self.p.edge_attrs(p, q).cloned().unwrap_or_default();
            if let Ok(diff) = l_attrs.difference_safe(&p_attrs) {
                if !diff.is_empty() {
                    out.insert((lu.clone(), lv.clone()), diff);
                }
            }
        }
        out
    }

    /// Edge attribute values added, keyed by the R-edge.
    pub fn added_edge_attrs(&self) -> HashMap<(String, String), AttrDict> {
        let mut out = HashMap::new();
        for (p, q) in self.p.edges() {
            let (Some(ru), Some(rv)) = (self.p_rhs.get(p), self.p_rhs.get(q)) else { continue };
            if !self.rhs.has_edge(ru, rv) {
                continue;
            }
            let r_attrs = self.rhs.edge_attrs(ru, rv).cloned().unwrap_or_default();
            let p_attrs = self.p.edge_attrs(p, q).cloned().unwrap_or_default();
            if let Ok(diff) = r_attrs.difference_safe(&p_attrs) {
                if !diff.is_empty() {
                    out.insert((ru.clone(), rv.clone()), diff);
                }
            }
        }
        out
    }

    pub fn is_restrictive(&self) -> bool {
        !self.cloned_nodes().is_empty()
            || !self.removed_nodes().is_empty()
            || !self.removed_edges().is_empty()
            || !self.removed_node_attrs().is_empty()
            || !self.removed_edge_attrs().is_empty()
    }

    pub fn is_relaxing(&self) -> bool {
        !self.merged_nodes().is_empty()
            || !self.added_nodes().is_empty()
            || !self.added_edges().is_empty()
            || !self.added_node_attrs().is_empty()
            || !self.added_edge_attrs().is_empty()
    }
}

fn group_preimages(map: &HashMap<String, String>) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    let mut preimage_ids: Vec<&String> = map.keys().collect();
    preimage_ids.sort();
    for p in preimage_ids {
        let image = &map[p];
        groups.entry(image.clone()).or_default().push(p.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrDict;

    fn node_only_graph(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id, AttrDict::new()).unwrap();
        }
        g
    }

    #[test]
    fn clone_rule_reports_two_preimages() {
        // L = {a}, P = {p1,p2}, R = {a}; l(p1)=l(p2)=a clones a
        let lhs = node_only_graph(&["a"]);
        let p = node_only_graph(&["p1", "p2"]);
        let rhs = node_only_graph(&["a"]);
        let p_lhs: HashMap<String, String> =
            [("p1".into(), "a".into()), ("p2".into(), "a".into())].into();
        let p_rhs: HashMap<String, String> =
            [("p1".into(), "a".into()), ("p2".into(), "a".into())].into();
        let rule = Rule::new(lhs, p, rhs, p_lhs, p_rhs).unwrap();
        let clones = rule.cloned_nodes();
        assert_eq!(clones.get("a").unwrap().len(), 2);
        assert!(rule.is_restrictive());
    }

    #[test]
    fn merge_rule_reports_two_preimages() {
        let lhs = node_only_graph(&["a", "b"]);
        let p = node_only_graph(&["a", "b"]);
        let rhs = node_only_graph(&["m"]);
        let p_lhs: HashMap<String, String> = [("a".into(), "a".into()), ("b".into(), "b".into())].into();
        let p_rhs: HashMap<String, String> = [("a".into(), "m".into()), ("b".into(), "m".into())].into();
        let rule = Rule::new(lhs, p, rhs, p_lhs, p_rhs).unwrap();
        let merges = rule.merged_nodes();
        assert_eq!(merges.get("m").unwrap().len(), 2);
        assert!(rule.is_relaxing());
    }

    #[test]
    fn non_surjective_l_is_allowed_and_reports_a_removed_node() {
        // L = {a,b}, P = {a}; b has no P-preimage, so it's removed by the rule.
        let lhs = node_only_graph(&["a", "b"]);
        let p = node_only_graph(&["a"]);
        let rhs = node_only_graph(&["a"]);
        let p_lhs: HashMap<String, String> = [("a".into(), "a".into())].into();
        let p_rhs: HashMap<String, String> = [("a".into(), "a".into())].into();
        let rule = Rule::new(lhs, p, rhs, p_lhs, p_rhs).unwrap();
        assert_eq!(rule.removed_nodes(), ["b".to_string()].into());
        assert!(rule.is_restrictive());
    }

    #[test]
    fn dangling_lhs_reference_is_rejected() {
        let lhs = node_only_graph(&["a"]);
        let p = node_only_graph(&["a", "stray"]);
        let rhs = node_only_graph(&["a"]);
        let p_lhs: HashMap<String, String> = [("a".into(), "a".into())].into();
        let p_rhs: HashMap<String, String> = [("a".into(), "a".into()), ("stray".into(), "a".into())].into();
        assert!(matches!(
            Rule::new(lhs, p, rhs, p_lhs, p_rhs),
            Err(RuleError::DanglingLhsReference(_))
        ));
    }

    #[test]
    fn identity_rule_has_no_edits() {
        let g = node_only_graph(&["a", "b"]);
        let rule = Rule::identity(g);
        assert!(rule.cloned_nodes().is_empty());
        assert!(rule.merged_nodes().is_empty());
        assert!(rule.removed_nodes().is_empty());
        assert!(rule.added_nodes().is_empty());
        assert!(!rule.is_restrictive());
        assert!(!rule.is_relaxing());
    }
}
