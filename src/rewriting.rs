//! The SqPO (single-pushout with partial overlap) rewriting executor.
//!
//! Applies a [`Rule`] at a match `m: L -> G` to a host graph in place,
//! through nine deterministically ordered phases (clone, remove-node,
//! remove-edge, remove-attr, merge, add-node, add-attr, add-edge, then
//! return the `R -> G'` map). The executor is total: every phase either
//! fully applies or the whole call returns `Err` before any of the
//! remaining phases run, so a host graph never ends up half-rewritten.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::attributes::{AttrDict, AttributeError};
use crate::graph::{Graph, GraphError};
use crate::matching::Match;
use crate::rule::Rule;

/// Errors raised applying a rule to a host graph, or statically rejected
/// by strict-mode propagation before any successor is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewritingError {
    /// The supplied match doesn't cover an L-node the rule needs.
    #[error("match does not cover L-node '{0}'")]
    UnmatchedNode(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// A freshly added R-node has no typing in successor `successor` and
    /// no RHS-typing hint was supplied to resolve one.
    #[error("strict mode: added node '{node}' has no typing hint for successor '{successor}'")]
    StrictUntypedAddition { successor: String, node: String },

    /// Two merged L-nodes type distinct images in successor `successor`;
    /// strict mode refuses to merge them there.
    #[error(
        "strict mode: merge would need to unify distinct images '{left_image}' and \
         '{right_image}' in successor '{successor}'"
    )]
    StrictMergeImagesDiverge { successor: String, left_image: String, right_image: String },

    /// An added edge has no counterpart edge in successor `successor`.
    #[error("strict mode: added edge '{0}' -> '{1}' has no counterpart in successor '{2}'")]
    StrictMissingEdge(String, String, String),

    /// Added attributes aren't already present on the node's image in
    /// successor `successor`.
    #[error("strict mode: attributes added to '{node}' are not already present on its image in successor '{successor}'")]
    StrictMissingAttributes { successor: String, node: String },
}

/// Everything the propagation engine needs to know about one rewrite of
/// a host graph, in terms of the host's own node/edge ids (not the
/// rule's `L`/`P`/`R` ids, which are meaningless to any other graph in
/// the hierarchy).
#[derive(Debug, Clone, Default)]
pub struct RewriteEffects {
    /// `R -> host` node map.
    pub r_to_g: HashMap<String, String>,
    /// Original host node id -> resulting host node id(s); more than one
    /// entry means that node was cloned.
    pub clone_mapping: HashMap<String, Vec<String>>,
    /// Original host node ids deleted outright.
    pub removed_nodes: HashSet<String>,
    /// Original host edges deleted outright.
    pub removed_edges: HashSet<(String, String)>,
    /// Attribute values removed from a surviving (pre-merge) host node.
    pub node_attr_removals: HashMap<String, AttrDict>,
    /// Attribute values removed from a surviving host edge.
    pub edge_attr_removals: HashMap<(String, String), AttrDict>,
    /// Resulting merged host node id -> the original host node ids that
    /// were merged into it (only entries with >1 original id are merges).
    pub merged_nodes: HashMap<String, Vec<String>>,
    /// Freshly created host node ids.
    pub added_nodes: HashSet<String>,
    /// Freshly created host edges (by final id).
    pub added_edges: HashSet<(String, String)>,
    /// Attribute values added to a surviving host node.
    pub node_attr_additions: HashMap<String, AttrDict>,
    /// Attribute values added to a surviving host edge.
    pub edge_attr_additions: HashMap<(String, String), AttrDict>,
}

/// Apply `rule` to `host` at the injective match `m: L -> host`,
/// mutating `host` in place. On success, returns a [`RewriteEffects`]
/// summarizing the edit in terms of `host`'s own ids, which the
/// propagation engine uses to update the rest of a containing
/// hierarchy.
pub fn apply(rule: &Rule, host: &mut Graph, m: &Match) -> Result<RewriteEffects, RewritingError> {
    for l_node in rule.lhs.nodes() {
        if !m.contains_key(l_node) {
            return Err(RewritingError::UnmatchedNode(l_node.to_string()));
        }
    }

    let mut p_g = clone_phase(rule, host, m)?;
    let p_g_after_clone = p_g.clone();
    remove_node_phase(rule, host, m)?;
    remove_edge_phase(rule, host, m)?;
    remove_attr_phase(rule, host, &p_g)?;
    let mut r_g = merge_phase(rule, host, &mut p_g)?;
    add_node_phase(rule, host, &mut r_g)?;
    add_attr_phase(rule, host, &p_g, &r_g)?;
    add_edge_phase(rule, host, &r_g)?;

    Ok(build_effects(rule, m, &p_g_after_clone, &p_g, r_g))
}

fn build_effects(
    rule: &Rule,
    m: &Match,
    p_g_after_clone: &HashMap<String, String>,
    p_g_after_merge: &HashMap<String, String>,
    r_g: HashMap<String, String>,
) -> RewriteEffects {
    let mut effects = RewriteEffects { r_to_g: r_g.clone(), ..Default::default() };

    for l_node in rule.lhs.nodes() {
        let preimages: Vec<&String> = rule
            .p_lhs
            .iter()
            .filter(|(_, image)| image.as_str() == l_node)
            .map(|(p, _)| p)
            .collect();
        if preimages.is_empty() {
            continue;
        }
        let Some(original) = m.get(l_node) else { continue };
        let mut images: Vec<String> = preimages
            .iter()
            .filter_map(|p| p_g_after_clone.get(*p).cloned())
            .collect();
        images.sort();
        images.dedup();
        effects.clone_mapping.insert(original.clone(), images);
    }

    for l_node in rule.removed_nodes() {
        if let Some(g) = m.get(&l_node) {
            effects.removed_nodes.insert(g.clone());
        }
    }
    for (lu, lv) in rule.removed_edges() {
        if let (Some(gu), Some(gv)) = (m.get(&lu), m.get(&lv)) {
            effects.removed_edges.insert((gu.clone(), gv.clone()));
        }
    }
    for (p, diff) in rule.removed_node_attrs() {
        if let Some(g) = p_g_after_clone.get(&p) {
            effects.node_attr_removals.insert(g.clone(), diff);
        }
    }
    for ((lu, lv), diff) in rule.removed_edge_attrs() {
        if let (Some(gu), Some(gv)) = (m.get(&lu), m.get(&lv)) {
            effects.edge_attr_removals.insert((gu.clone(), gv.clone()), diff);
        }
    }

    for (r_node, preimages) in rule.merged_nodes() {
        let mut originals: Vec<String> = preimages
            .iter()
            .filter_map(|p| p_g_after_clone.get(p).cloned())
            .collect();
        originals.sort();
        originals.dedup();
        if let Some(target) = r_g.get(&r_node) {
            effects.merged_nodes.insert(target.clone(), originals);
        }
    }

    for r_node in rule.added_nodes() {
        if let Some(g) = r_g.get(&r_node) {
            effects.added_nodes.insert(g.clone());
        }
    }
    for (ru, rv) in rule.added_edges() {
        if let (Some(gu), Some(gv)) = (r_g.get(&ru), r_g.get(&rv)) {
            effects.added_edges.insert((gu.clone(), gv.clone()));
        }
    }
    for (p, diff) in rule.added_node_attrs() {
        if let Some(g) = p_g_after_merge.get(&p) {
            effects.node_attr_additions.insert(g.clone(), diff);
        }
    }
    for ((ru, rv), diff) in rule.added_edge_attrs() {
        if let (Some(gu), Some(gv)) = (r_g.get(&ru), r_g.get(&rv)) {
            effects.edge_attr_additions.insert((gu.clone(), gv.clone()), diff);
        }
    }

    effects
}

fn preimages_by_image(map: &HashMap<String, String>) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        groups.entry(map[key].clone()).or_default().push(key.clone());
    }
    groups
}

/// For P-node `p`, the L-neighbors (by id in the host graph) its own
/// incident P-edges do *not* carry into R — these are excluded from the
/// clone representing `p` so they're never created only to be deleted
/// moments later in the remove-edge phase.
fn non_surviving_neighbors(rule: &Rule, p: &str, m: &Match) -> (HashSet<String>, HashSet<String>) {
    let mut exclude_successors = HashSet::new();
    let mut exclude_predecessors = HashSet::new();

    for q in rule.p.successors(p) {
        if !p_edge_survives(rule, p, q) {
            if let Some(l_q) = rule.p_lhs.get(q) {
                if let Some(g_q) = m.get(l_q) {
                    exclude_successors.insert(g_q.clone());
                }
            }
        }
    }
    let preds: Vec<String> = rule.p.predecessors(p).map(str::to_string).collect();
    for q in preds {
        if !p_edge_survives(rule, &q, p) {
            if let Some(l_q) = rule.p_lhs.get(&q) {
                if let Some(g_q) = m.get(l_q) {
                    exclude_predecessors.insert(g_q.clone());
                }
            }
        }
    }
    (exclude_successors, exclude_predecessors)
}

fn p_edge_survives(rule: &Rule, p: &str, q: &str) -> bool {
    match (rule.p_rhs.get(p), rule.p_rhs.get(q)) {
        (Some(rp), Some(rq)) => rule.rhs.has_edge(rp, rq),
        _ => false,
    }
}

/// Phase 1: for every L-node with k P-preimages, keep the original match
/// for the smallest-index preimage and clone once per remaining
/// preimage. Returns the P -> host map.
fn clone_phase(rule: &Rule, host: &mut Graph, m: &Match) -> Result<HashMap<String, String>, RewritingError> {
    let mut p_g = HashMap::new();
    let groups = preimages_by_image(&rule.p_lhs);
    let mut l_nodes: Vec<&String> = groups.keys().collect();
    l_nodes.sort();

    for l_node in l_nodes {
        let preimages = &groups[l_node];
        let g_node = m.get(l_node).ok_or_else(|| RewritingError::UnmatchedNode(l_node.clone()))?;
        let mut preimages = preimages.clone();
        preimages.sort();
        let (first, rest) = preimages.split_first().expect("groups are never empty");
        p_g.insert(first.clone(), g_node.clone());
        for p in rest {
            let (exclude_successors, exclude_predecessors) = non_surviving_neighbors(rule, p, m);
            let clone_id = host.clone_node(g_node, None, &exclude_successors, &exclude_predecessors)?;
            p_g.insert(p.clone(), clone_id);
        }
    }
    Ok(p_g)
}

fn remove_node_phase(rule: &Rule, host: &mut Graph, m: &Match) -> Result<(), RewritingError> {
    for l_node in rule.removed_nodes() {
        let g_node = m.get(&l_node).ok_or_else(|| RewritingError::UnmatchedNode(l_node.clone()))?;
        host.remove_node(g_node)?;
    }
    Ok(())
}

fn remove_edge_phase(rule: &Rule, host: &mut Graph, m: &Match) -> Result<(), RewritingError> {
    for (lu, lv) in rule.removed_edges() {
        let (Some(gu), Some(gv)) = (m.get(&lu), m.get(&lv)) else { continue };
        if host.has_edge(gu, gv) {
            host.remove_edge(gu, gv)?;
        }
    }
    Ok(())
}

fn remove_attr_phase(
    rule: &Rule,
    host: &mut Graph,
    p_g: &HashMap<String, String>,
) -> Result<(), RewritingError> {
    for (p, diff) in rule.removed_node_attrs() {
        if let Some(g) = p_g.get(&p) {
            if host.has_node(g) {
                host.remove_node_attrs(g, &diff)?;
            }
        }
    }
    for ((lu, lv), diff) in rule.removed_edge_attrs() {
        let (Some(gu), Some(gv)) = (p_g_image_of_l(rule, p_g, &lu), p_g_image_of_l(rule, p_g, &lv)) else {
            continue;
        };
        if host.has_edge(&gu, &gv) {
            host.remove_edge_attrs(&gu, &gv, &diff)?;
        }
    }
    Ok(())
}

/// An L-node's host image via the P -> host map: find any P-node mapped
/// to `l` by `p_lhs` and look up its host image (the kept/original
/// preimage always has one; this is only used for edges that survive,
/// which by construction have at least one surviving P-preimage).
fn p_g_image_of_l(rule: &Rule, p_g: &HashMap<String, String>, l: &str) -> Option<String> {
    rule.p_lhs
        .iter()
        .find(|(_, image)| image.as_str() == l)
        .and_then(|(p, _)| p_g.get(p))
        .cloned()
}

fn merge_phase(
    rule: &Rule,
    host: &mut Graph,
    p_g: &mut HashMap<String, String>,
) -> Result<HashMap<String, String>, RewritingError> {
    let mut r_g = HashMap::new();
    let groups = preimages_by_image(&rule.p_rhs);
    let mut r_nodes: Vec<&String> = groups.keys().collect();
    r_nodes.sort();

    for r_node in r_nodes {
        let preimages = &groups[r_node];
        let mut g_ids: Vec<String> = preimages
            .iter()
            .filter_map(|p| p_g.get(p).cloned())
            .collect();
        g_ids.sort();
        g_ids.dedup();
        if g_ids.is_empty() {
            continue; // every preimage was removed upstream (e.g. a dangling P-node)
        }
        let merged = if g_ids.len() == 1 {
            g_ids.into_iter().next().unwrap()
        } else {
            let target = host.merge_nodes(&g_ids, Some(g_ids[0].clone()))?;
            for p in preimages {
                if let Some(g) = p_g.get_mut(p) {
                    *g = target.clone();
                }
            }
            target
        };
        r_g.insert(r_node.clone(), merged);
    }
    Ok(r_g)
}

fn add_node_phase(
    rule: &Rule,
    host: &mut Graph,
    r_g: &mut HashMap<String, String>,
) -> Result<(), RewritingError> {
    for r_node in rule.added_nodes() {
        let attrs = rule.rhs.node_attrs(&r_node).cloned().unwrap_or_default();
        let id = unique_node_id(host, &r_node);
        host.add_node(id.clone(), attrs)?;
        r_g.insert(r_node, id);
    }
    Ok(())
}

fn unique_node_id(host: &Graph, preferred: &str) -> String {
    if !host.has_node(preferred) {
        return preferred.to_string();
    }
    format!("{preferred}_{}", uuid::Uuid::new_v4().simple())
}

fn add_attr_phase(
    rule: &Rule,
    host: &mut Graph,
    p_g: &HashMap<String, String>,
    r_g: &HashMap<String, String>,
) -> Result<(), RewritingError> {
    for (p, diff) in rule.added_node_attrs() {
        if let Some(g) = p_g.get(&p) {
            host.add_node_attrs(g, &diff)?;
        }
    }
    for ((ru, rv), diff) in rule.added_edge_attrs() {
        if let (Some(gu), Some(gv)) = (r_g.get(&ru), r_g.get(&rv)) {
            if host.has_edge(gu, gv) {
                host.add_edge_attrs(gu, gv, &diff)?;
            }
        }
    }
    Ok(())
}

fn add_edge_phase(rule: &Rule, host: &mut Graph, r_g: &HashMap<String, String>) -> Result<(), RewritingError> {
    for (ru, rv) in rule.added_edges() {
        let (Some(gu), Some(gv)) = (r_g.get(&ru), r_g.get(&rv)) else {
            continue;
        };
        if host.has_edge(gu, gv) {
            continue;
        }
        let attrs: AttrDict = rule.rhs.edge_attrs(&ru, &rv).cloned().unwrap_or_default();
        host.add_edge(gu.clone(), gv.clone(), attrs)?;
    }
    Ok(())
}
