//! Subgraph pattern matching.
//!
//! Finds every injective homomorphism `m: pattern -> host`, optionally
//! restricted to an allowed-node-set and a set of pattern-typing
//! constraints (ancestor graphs the match must respect). Classical
//! backtracking subgraph isomorphism:
//!
//! 1. Order pattern nodes by decreasing degree, so the most constrained
//!    nodes are bound first and bad branches die early.
//! 2. Pre-compute each node's candidate set: allowed-node-set membership,
//!    pattern-typing agreement, and attribute inclusion.
//! 3. Backtrack over the order, checking edge consistency (both
//!    directions, with edge-attribute inclusion) and injectivity at each
//!    step.
//! 4. Collect every full map; there is no early exit on first match.

use std::collections::{HashMap, HashSet};

use crate::graph::Graph;

/// A single ancestor-typing constraint a match must respect: `typing`
/// maps host-graph node ids to ids in some ancestor graph, and
/// `pattern_typing` records what each pattern node is expected to map to
/// in that same ancestor (where defined).
pub struct PatternTyping<'a> {
    pub typing: &'a HashMap<String, String>,
    pub pattern_typing: &'a HashMap<String, String>,
}

/// One match of `pattern` into `host`: pattern node id -> host node id.
pub type Match = HashMap<String, String>;

/// Enumerate every injective homomorphism `pattern -> host`.
///
/// `allowed_nodes` restricts candidate host nodes to a subset (`None`
/// means the whole host graph). `pattern_typings` are zero or more
/// ancestor-typing constraints every candidate binding must agree with.
pub fn find_matches(
    pattern: &Graph,
    host: &Graph,
    allowed_nodes: Option<&HashSet<String>>,
    pattern_typings: &[PatternTyping],
) -> Vec<Match> {
    let order = node_order(pattern);
    if order.is_empty() {
        return vec![Match::new()];
    }

    let candidates: HashMap<&str, Vec<String>> = order
        .iter()
        .map(|n| (*n, candidate_set(pattern, host, n, allowed_nodes, pattern_typings)))
        .collect();

    let mut results = Vec::new();
    let mut current = Match::new();
    let mut used: HashSet<String> = HashSet::new();
    backtrack(pattern, host, &order, 0, &candidates, &mut current, &mut used, &mut results);
    results
}

/// `true` iff at least one match exists.
pub fn has_match(
    pattern: &Graph,
    host: &Graph,
    allowed_nodes: Option<&HashSet<String>>,
    pattern_typings: &[PatternTyping],
) -> bool {
    !find_matches(pattern, host, allowed_nodes, pattern_typings).is_empty()
}

/// Pattern nodes ordered by decreasing degree (in-degree + out-degree),
/// ties broken by id for determinism. Disconnected components fall out
/// naturally: a node with degree zero just sorts last.
fn node_order(pattern: &Graph) -> Vec<&str> {
    let mut nodes: Vec<&str> = pattern.nodes().collect();
    nodes.sort_by(|a, b| {
        let degree = |n: &str| pattern.successors(n).count() + pattern.predecessors(n).count();
        degree(b).cmp(&degree(a)).then_with(|| a.cmp(b))
    });
    nodes
}

fn candidate_set(
    pattern: &Graph,
    host: &Graph,
    node: &str,
    allowed_nodes: Option<&HashSet<String>>,
    pattern_typings: &[PatternTyping],
) -> Vec<String> {
    let mut out = Vec::new();
    'candidates: for candidate in host.nodes() {
        if let Some(allowed) = allowed_nodes {
            if !allowed.contains(candidate) {
                continue;
            }
        }
        for pt in pattern_typings {
            if let Some(expected) = pt.pattern_typing.get(node) {
                match pt.typing.get(candidate) {
                    Some(actual) if actual == expected => {}
                    _ => continue 'candidates,
                }
            }
        }
        let pattern_attrs = pattern.node_attrs(node);
        let host_attrs = host.node_attrs(candidate);
        if !attrs_included(pattern_attrs, host_attrs) {
            continue;
        }
        out.push(candidate.to_string());
    }
    out
}

fn attrs_included(
    pattern: Option<&crate::attributes::AttrDict>,
    host: Option<&crate::attributes::AttrDict>,
) -> bool {
    match (pattern, host) {
        (None, _) => true,
        (Some(p), None) => p.is_empty(),
        (Some(p), Some(h)) => p.is_subset(h).unwrap_or(false),
    }
}

fn backtrack(
    pattern: &Graph,
    host: &Graph,
    order: &[&str],
    index: usize,
    candidates: &HashMap<&str, Vec<String>>,
    current: &mut Match,
    used: &mut HashSet<String>,
    results: &mut Vec<Match>,
) {
    if index == order.len() {
        results.push(current.clone());
        return;
    }
    let node = order[index];
    for candidate in &candidates[node] {
        if used.contains(candidate) {
            continue;
        }
        if !consistent_with_mapped_neighbors(pattern, host, node, candidate, current) {
            continue;
        }
        current.insert(node.to_string(), candidate.clone());
        used.insert(candidate.clone());

        backtrack(pattern, host, order, index + 1, candidates, current, used, results);

        current.remove(node);
        used.remove(candidate);
    }
}

/// Edge consistency against neighbors already bound in `current`: every
/// pattern edge touching `node` and a mapped neighbor must have an image
/// edge in `host` with attribute inclusion, in both directions.
fn consistent_with_mapped_neighbors(
    pattern: &Graph,
    host: &Graph,
    node: &str,
    candidate: &str,
    current: &Match,
) -> bool {
    for succ in pattern.successors(node) {
        let Some(mapped_succ) = current.get(succ) else { continue };
        if !host.has_edge(candidate, mapped_succ) {
            return false;
        }
        if !attrs_included(pattern.edge_attrs(node, succ), host.edge_attrs(candidate, mapped_succ)) {
            return false;
        }
    }
    for pred in pattern.predecessors(node) {
        let Some(mapped_pred) = current.get(pred) else { continue };
        if !host.has_edge(mapped_pred, candidate) {
            return false;
        }
        if !attrs_included(pattern.edge_attrs(pred, node), host.edge_attrs(mapped_pred, candidate)) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrDict;

    fn path_graph(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id, AttrDict::new()).unwrap();
        }
        for pair in ids.windows(2) {
            g.add_edge(pair[0], pair[1], AttrDict::new()).unwrap();
        }
        g
    }

    #[test]
    fn empty_pattern_matches_once_with_empty_map() {
        let pattern = Graph::new();
        let host = path_graph(&["a", "b"]);
        let matches = find_matches(&pattern, &host, None, &[]);
        assert_eq!(matches, vec![Match::new()]);
    }

    #[test]
    fn finds_both_embeddings_of_an_edge_in_a_triangle() {
        let mut pattern = Graph::new();
        pattern.add_node("x", AttrDict::new()).unwrap();
        pattern.add_node("y", AttrDict::new()).unwrap();
        pattern.add_edge("x", "y", AttrDict::new()).unwrap();

        let mut host = Graph::new();
        for n in ["a", "b", "c"] {
            host.add_node(n, AttrDict::new()).unwrap();
        }
        host.add_edge("a", "b", AttrDict::new()).unwrap();
        host.add_edge("b", "c", AttrDict::new()).unwrap();

        let matches = find_matches(&pattern, &host, None, &[]);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn allowed_node_set_restricts_candidates() {
        let mut pattern = Graph::new();
        pattern.add_node("x", AttrDict::new()).unwrap();

        let host = path_graph(&["a", "b"]);
        let allowed: HashSet<String> = ["b".to_string()].into_iter().collect();
        let matches = find_matches(&pattern, &host, Some(&allowed), &[]);
        assert_eq!(matches, vec![[("x".to_string(), "b".to_string())].into()]);
    }

    #[test]
    fn pattern_typing_constraint_filters_candidates() {
        let mut pattern = Graph::new();
        pattern.add_node("x", AttrDict::new()).unwrap();
        let host = path_graph(&["a", "b"]);

        let typing: HashMap<String, String> =
            [("a".to_string(), "T1".to_string()), ("b".to_string(), "T2".to_string())].into();
        let pattern_typing: HashMap<String, String> = [("x".to_string(), "T2".to_string())].into();
        let pt = PatternTyping { typing: &typing, pattern_typing: &pattern_typing };

        let matches = find_matches(&pattern, &host, None, std::slice::from_ref(&pt));
        assert_eq!(matches, vec![[("x".to_string(), "b".to_string())].into()]);
    }

    #[test]
    fn injective_map_rejects_reusing_a_host_node() {
        let mut pattern = Graph::new();
        pattern.add_node("x", AttrDict::new()).unwrap();
        pattern.add_node("y", AttrDict::new()).unwrap();
        pattern.add_edge("x", "y", AttrDict::new()).unwrap();
        pattern.add_edge("y", "x", AttrDict::new()).unwrap();

        // host only has a single node with a self-loop: x and y would both
        // have to map to it, which injectivity forbids.
        let mut host = Graph::new();
        host.add_node("a", AttrDict::new()).unwrap();
        host.add_edge("a", "a", AttrDict::new()).unwrap();

        assert!(find_matches(&pattern, &host, None, &[]).is_empty());
    }
}
