//! Downward propagation of relaxing edits (merge, node/edge addition,
//! attribute addition) to every successor of the rewritten graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::attributes::AttrDict;
use crate::hierarchy::{Hierarchy, HierarchyError};
use crate::rewriting::{RewriteEffects, RewritingError};

use super::TypingWarning;

/// Check, without mutating anything, that every direct successor of `g0`
/// already has everything `effects` would otherwise relax downward:
/// a typing for each added node, a shared image for each pair of merged
/// originals, a counterpart for each added edge, and the added attribute
/// values already present on the node's image. Used by strict-mode
/// rewrites, which skip [`propagate_down`] entirely and must reject the
/// rewrite instead of silently leaving a successor out of sync.
///
/// Only direct successors are inspected: strict mode never computes the
/// hypothetical edits a deeper successor would need, since that's exactly
/// the work downward propagation — which strict mode disables — would
/// otherwise do.
pub fn validate_strict(
    hierarchy: &Hierarchy,
    g0: &str,
    effects: &RewriteEffects,
    rhs_typing_hints: &HashMap<String, HashMap<String, String>>,
) -> Result<(), RewritingError> {
    for t in hierarchy.successors(g0) {
        validate_strict_one_level(hierarchy, g0, &t, effects, rhs_typing_hints.get(&t))?;
    }
    Ok(())
}

fn validate_strict_one_level(
    hierarchy: &Hierarchy,
    predecessor: &str,
    t: &str,
    effects: &RewriteEffects,
    rhs_typing_hint: Option<&HashMap<String, String>>,
) -> Result<(), RewritingError> {
    let old_typing = &hierarchy
        .typing(predecessor, t)
        .expect("hierarchy::successors only names graphs with a typing back to predecessor")
        .mapping;
    let t_graph = hierarchy.graph(t).expect("a typed successor graph always exists");

    let mut resolved: HashMap<String, String> = HashMap::new();

    // merges: both merged originals must already share a T-image.
    for (merged_id, originals) in &effects.merged_nodes {
        let mut images: Vec<&String> = originals.iter().filter_map(|o| old_typing.get(o)).collect();
        images.sort();
        images.dedup();
        match images.as_slice() {
            [] => {}
            [single] => {
                resolved.insert(merged_id.clone(), (*single).clone());
            }
            [first, second, ..] => {
                return Err(RewritingError::StrictMergeImagesDiverge {
                    successor: t.to_string(),
                    left_image: (*first).clone(),
                    right_image: (*second).clone(),
                });
            }
        }
    }

    // added nodes: need a hint naming an existing T-node.
    for added in &effects.added_nodes {
        match rhs_typing_hint.and_then(|hint| hint.get(added)) {
            Some(image) if t_graph.has_node(image) => {
                resolved.insert(added.clone(), image.clone());
            }
            _ => {
                return Err(RewritingError::StrictUntypedAddition {
                    successor: t.to_string(),
                    node: added.clone(),
                });
            }
        }
    }

    // added edges: both endpoints must already type onto an existing T-edge.
    for (u, v) in &effects.added_edges {
        let image_of = |n: &str| resolved.get(n).cloned().or_else(|| old_typing.get(n).cloned());
        let (Some(tu), Some(tv)) = (image_of(u), image_of(v)) else { continue };
        if !t_graph.has_edge(&tu, &tv) {
            return Err(RewritingError::StrictMissingEdge(u.clone(), v.clone(), t.to_string()));
        }
    }

    // added node attributes: must already be present on the node's image.
    for (node, diff) in &effects.node_attr_additions {
        let Some(image) = old_typing.get(node).or_else(|| resolved.get(node)) else { continue };
        let Some(existing) = t_graph.node_attrs(image) else { continue };
        if !diff.is_subset(existing)? {
            return Err(RewritingError::StrictMissingAttributes { successor: t.to_string(), node: node.clone() });
        }
    }

    // added edge attributes: same requirement, on the image edge.
    for ((u, v), diff) in &effects.edge_attr_additions {
        let image_of = |n: &str| resolved.get(n).cloned().or_else(|| old_typing.get(n).cloned());
        let (Some(tu), Some(tv)) = (image_of(u), image_of(v)) else { continue };
        let Some(existing) = t_graph.edge_attrs(&tu, &tv) else { continue };
        if !diff.is_subset(existing)? {
            return Err(RewritingError::StrictMissingAttributes { successor: t.to_string(), node: u.clone() });
        }
    }

    Ok(())
}

/// Walk every successor of `g0`, applying the edits each typing edge
/// implies one level at a time, same dedup/level-by-level discipline as
/// [`super::up::propagate_up`].
pub fn propagate_down(
    hierarchy: &mut Hierarchy,
    g0: &str,
    effects: &RewriteEffects,
    rhs_typing_hints: &HashMap<String, HashMap<String, String>>,
) -> Result<Vec<TypingWarning>, HierarchyError> {
    let mut warnings = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String, RewriteEffects)> = hierarchy
        .successors(g0)
        .into_iter()
        .map(|t| (t, g0.to_string(), effects.clone()))
        .collect();

    while let Some((t, predecessor, pred_effects)) = queue.pop_front() {
        if !visited.insert(t.clone()) {
            continue;
        }
        let hint = rhs_typing_hints.get(&t);
        let t_effects = propagate_one_level(hierarchy, &predecessor, &t, &pred_effects, hint, &mut warnings)?;
        for succ in hierarchy.successors(&t) {
            queue.push_back((succ, t.clone(), t_effects.clone()));
        }
    }
    Ok(warnings)
}

fn propagate_one_level(
    hierarchy: &mut Hierarchy,
    predecessor: &str,
    t: &str,
    pred_effects: &RewriteEffects,
    rhs_typing_hint: Option<&HashMap<String, String>>,
    warnings: &mut Vec<TypingWarning>,
) -> Result<RewriteEffects, HierarchyError> {
    // The typing map here is `predecessor -> t`, keyed by predecessor's
    // node ids *before* this round's merges/additions — exactly what
    // `pred_effects` describes its edits in terms of.
    let mut old_typing = hierarchy
        .typing(predecessor, t)
        .ok_or_else(|| HierarchyError::UnknownTyping(predecessor.to_string(), t.to_string()))?
        .mapping
        .clone();

    let mut t_effects = RewriteEffects::default();
    let mut new_typing: HashMap<String, String> = HashMap::new();

    // -- merge propagation: every predecessor node the typing still maps
    // gets the image its original (pre-merge) id mapped to; nodes merged
    // together necessarily collapse onto the same T-image, so T must
    // merge too whenever that image differs across the merged originals.
    for (merged_id, originals) in &pred_effects.merged_nodes {
        let images: Vec<String> = originals.iter().filter_map(|o| old_typing.get(o).cloned()).collect();
        let mut distinct = images.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() <= 1 {
            if let Some(image) = distinct.into_iter().next() {
                new_typing.insert(merged_id.clone(), image);
            }
            continue;
        }
        let graph = hierarchy.graph_mut(t).ok_or_else(|| HierarchyError::UnknownGraph(t.to_string()))?;
        let target = graph.merge_nodes(&distinct, Some(distinct[0].clone()))?;
        t_effects.merged_nodes.insert(target.clone(), distinct);
        new_typing.insert(merged_id.clone(), target);
    }

    // everything not touched by a merge keeps its existing image
    for (node, image) in &old_typing {
        if !new_typing.contains_key(node) {
            // if `node` was one of the merged originals its id no longer
            // exists in predecessor; skip it, the merged_id entry above covers it
            if pred_effects.merged_nodes.values().any(|originals| originals.contains(node)) {
                continue;
            }
            new_typing.insert(node.clone(), image.clone());
        }
    }

    // -- node addition: a freshly added predecessor node needs a T-image.
    // Use the RHS-typing hint if it names an existing T-node, else create
    // a fresh, identically attributed T-node and type onto it.
    for added in &pred_effects.added_nodes {
        let hinted = rhs_typing_hint.and_then(|hint| hint.get(added)).cloned();
        let image = match hinted {
            Some(image) if hierarchy.graph(t).is_some_and(|g| g.has_node(&image)) => image,
            Some(bad) => {
                warnings.push(TypingWarning {
                    graph: t.to_string(),
                    message: format!(
                        "RHS-typing hint names image '{bad}' which does not exist in '{t}'; creating a fresh node instead"
                    ),
                });
                create_companion_node(hierarchy, predecessor, t, added)?
            }
            None => create_companion_node(hierarchy, predecessor, t, added)?,
        };
        new_typing.insert(added.clone(), image.clone());
        t_effects.added_nodes.insert(image);
    }

    // -- edge addition: mirror any added predecessor edge whose endpoints
    // both type into T, adding the T-edge if it's missing.
    for (u, v) in &pred_effects.added_edges {
        let (Some(tu), Some(tv)) = (new_typing.get(u), new_typing.get(v)) else { continue };
        let graph = hierarchy.graph_mut(t).ok_or_else(|| HierarchyError::UnknownGraph(t.to_string()))?;
        if !graph.has_edge(tu, tv) {
            graph.add_edge(tu.clone(), tv.clone(), AttrDict::new())?;
            t_effects.added_edges.insert((tu.clone(), tv.clone()));
        }
    }

    // -- node attribute addition: union onto the typed image.
    for (node, diff) in &pred_effects.node_attr_additions {
        let Some(image) = new_typing.get(node) else { continue };
        let graph = hierarchy.graph_mut(t).ok_or_else(|| HierarchyError::UnknownGraph(t.to_string()))?;
        if graph.has_node(image) {
            graph.add_node_attrs(image, diff)?;
            t_effects.node_attr_additions.insert(image.clone(), diff.clone());
        }
    }

    // -- edge attribute addition: union onto the typed image edge, if present.
    for ((u, v), diff) in &pred_effects.edge_attr_additions {
        let (Some(tu), Some(tv)) = (new_typing.get(u), new_typing.get(v)) else { continue };
        let graph = hierarchy.graph_mut(t).ok_or_else(|| HierarchyError::UnknownGraph(t.to_string()))?;
        if graph.has_edge(tu, tv) {
            graph.add_edge_attrs(tu, tv, diff)?;
            t_effects.edge_attr_additions.insert((tu.clone(), tv.clone()), diff.clone());
        }
    }

    std::mem::swap(&mut old_typing, &mut new_typing);
    hierarchy
        .typing_mut(predecessor, t)
        .ok_or_else(|| HierarchyError::UnknownTyping(predecessor.to_string(), t.to_string()))?
        .mapping = old_typing;

    Ok(t_effects)
}

fn create_companion_node(
    hierarchy: &mut Hierarchy,
    predecessor: &str,
    t: &str,
    added: &str,
) -> Result<String, HierarchyError> {
    let attrs = hierarchy
        .graph(predecessor)
        .and_then(|g| g.node_attrs(added).cloned())
        .unwrap_or_default();
    let graph = hierarchy.graph_mut(t).ok_or_else(|| HierarchyError::UnknownGraph(t.to_string()))?;
    let id = unique_id(graph, added);
    graph.add_node(id.clone(), attrs)?;
    Ok(id)
}

fn unique_id(graph: &crate::graph::Graph, preferred: &str) -> String {
    if !graph.has_node(preferred) {
        return preferred.to_string();
    }
    format!("{preferred}_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttrDict, AttrValueSet, Value};
    use crate::graph::Graph;

    fn node_graph(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id, AttrDict::new()).unwrap();
        }
        g
    }

    #[test]
    fn merge_propagates_downward_and_unions_typing() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["m"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("t", node_graph(&["tx", "ty"]), AttrDict::new()).unwrap();

        let mapping: HashMap<String, String> = [("a".into(), "tx".into()), ("b".into(), "ty".into())].into();
        // pretend g0 still has a,b before the merge happened in rewriting;
        // here we model the typing that *was* true before the merge.
        hierarchy.add_graph("pre", node_graph(&["a", "b"]), AttrDict::new()).unwrap();
        hierarchy.add_typing("pre", "t", mapping, AttrDict::new(), true).unwrap();

        let mut effects = RewriteEffects::default();
        effects.merged_nodes.insert("m".to_string(), vec!["a".to_string(), "b".to_string()]);

        propagate_down(&mut hierarchy, "pre", &effects, &HashMap::new()).unwrap();

        let t_graph = hierarchy.graph("t").unwrap();
        assert_eq!(t_graph.node_count(), 1);
        let typing = hierarchy.typing("pre", "t").unwrap();
        assert_eq!(typing.mapping.get("m"), typing.mapping.get("m"));
    }

    #[test]
    fn added_node_gets_fresh_companion_in_successor() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("t", node_graph(&["tx"]), AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> = [("a".into(), "tx".into())].into();
        hierarchy.add_typing("g0", "t", mapping, AttrDict::new(), true).unwrap();

        let mut attrs = AttrDict::new();
        attrs.insert("color", AttrValueSet::finite([Value::Str("red".into())]));
        hierarchy.graph_mut("g0").unwrap().add_node("new", attrs).unwrap();

        let mut effects = RewriteEffects::default();
        effects.added_nodes.insert("new".to_string());

        propagate_down(&mut hierarchy, "g0", &effects, &HashMap::new()).unwrap();

        let t_graph = hierarchy.graph("t").unwrap();
        assert_eq!(t_graph.node_count(), 2);
        let typing = hierarchy.typing("g0", "t").unwrap();
        assert!(typing.mapping.contains_key("new"));
    }

    #[test]
    fn validate_strict_rejects_an_added_edge_with_no_counterpart() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a", "b"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("t", node_graph(&["p", "q"]), AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> = [("a".into(), "p".into()), ("b".into(), "q".into())].into();
        hierarchy.add_typing("g0", "t", mapping, AttrDict::new(), true).unwrap();

        let mut effects = RewriteEffects::default();
        effects.added_edges.insert(("a".to_string(), "b".to_string()));

        let err = validate_strict(&hierarchy, "g0", &effects, &HashMap::new());
        assert!(matches!(err, Err(RewritingError::StrictMissingEdge(..))));
    }

    #[test]
    fn validate_strict_accepts_an_added_edge_already_present_in_successor() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a", "b"]), AttrDict::new()).unwrap();
        let mut t = node_graph(&["p", "q"]);
        t.add_edge("p", "q", AttrDict::new()).unwrap();
        hierarchy.add_graph("t", t, AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> = [("a".into(), "p".into()), ("b".into(), "q".into())].into();
        hierarchy.add_typing("g0", "t", mapping, AttrDict::new(), true).unwrap();

        let mut effects = RewriteEffects::default();
        effects.added_edges.insert(("a".to_string(), "b".to_string()));

        assert!(validate_strict(&hierarchy, "g0", &effects, &HashMap::new()).is_ok());
    }

    #[test]
    fn validate_strict_rejects_an_added_node_with_no_hint() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a", "new"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("t", node_graph(&["p"]), AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> = [("a".into(), "p".into())].into();
        hierarchy.add_typing("g0", "t", mapping, AttrDict::new(), true).unwrap();

        let mut effects = RewriteEffects::default();
        effects.added_nodes.insert("new".to_string());

        let err = validate_strict(&hierarchy, "g0", &effects, &HashMap::new());
        assert!(matches!(err, Err(RewritingError::StrictUntypedAddition { .. })));
    }

    #[test]
    fn validate_strict_rejects_a_merge_with_diverging_images() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["m"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("pre", node_graph(&["a", "b"]), AttrDict::new()).unwrap();
        hierarchy.add_graph("t", node_graph(&["tx", "ty"]), AttrDict::new()).unwrap();
        let mapping: HashMap<String, String> = [("a".into(), "tx".into()), ("b".into(), "ty".into())].into();
        hierarchy.add_typing("pre", "t", mapping, AttrDict::new(), true).unwrap();

        let mut effects = RewriteEffects::default();
        effects.merged_nodes.insert("m".to_string(), vec!["a".to_string(), "b".to_string()]);

        let err = validate_strict(&hierarchy, "pre", &effects, &HashMap::new());
        assert!(matches!(err, Err(RewritingError::StrictMergeImagesDiverge { .. })));
    }
}
