//! Upward propagation of restrictive edits (clone, node/edge removal,
//! attribute removal) to every predecessor of the rewritten graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::hierarchy::{Hierarchy, HierarchyError};
use crate::rewriting::RewriteEffects;

use super::TypingWarning;

/// Walk every predecessor of `g0`, applying the same edit each typing
/// edge implies one level at a time. Visits each predecessor exactly
/// once; a predecessor reachable through more than one path is updated
/// using whichever path's edits reach it first (hierarchies built from a
/// single rewriting root are trees along the up direction in practice,
/// so this coincides with the fully general answer in the common case).
pub fn propagate_up(
    hierarchy: &mut Hierarchy,
    g0: &str,
    effects: &RewriteEffects,
    p_typing_hints: &HashMap<String, HashMap<String, String>>,
) -> Result<Vec<TypingWarning>, HierarchyError> {
    let mut warnings = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String, RewriteEffects)> = hierarchy
        .predecessors(g0)
        .into_iter()
        .map(|h| (h, g0.to_string(), effects.clone()))
        .collect();

    while let Some((h, successor, succ_effects)) = queue.pop_front() {
        if !visited.insert(h.clone()) {
            continue;
        }
        let hint = p_typing_hints.get(&h);
        let h_effects = propagate_one_level(hierarchy, &h, &successor, &succ_effects, hint, &mut warnings)?;
        for pred in hierarchy.predecessors(&h) {
            queue.push_back((pred, h.clone(), h_effects.clone()));
        }
    }
    Ok(warnings)
}

fn propagate_one_level(
    hierarchy: &mut Hierarchy,
    h: &str,
    successor: &str,
    succ_effects: &RewriteEffects,
    p_typing_hint: Option<&HashMap<String, String>>,
    warnings: &mut Vec<TypingWarning>,
) -> Result<RewriteEffects, HierarchyError> {
    let mut t = hierarchy
        .typing(h, successor)
        .ok_or_else(|| HierarchyError::UnknownTyping(h.to_string(), successor.to_string()))?
        .mapping
        .clone();

    let mut h_effects = RewriteEffects::default();

    // -- clone propagation ------------------------------------------------
    // Group every H-node currently typing a just-split `orig` by that
    // shared orig, the way `down`'s merge handling groups by
    // `pred_effects.merged_nodes`'s target. A predecessor frequently
    // already holds more than one node typing the same pre-clone origin;
    // those redundant nodes are the natural split targets, so they're
    // retyped onto the new images directly before any fresh clone is
    // minted — a clone is only needed for images with no redundant node
    // left to absorb them.
    let mut split_groups: HashMap<String, Vec<String>> = HashMap::new();
    for (x, orig) in &t {
        if succ_effects.clone_mapping.get(orig).is_some_and(|images| images.len() > 1) {
            split_groups.entry(orig.clone()).or_default().push(x.clone());
        }
    }

    for (orig, mut redundant) in split_groups {
        redundant.sort();
        let images = succ_effects.clone_mapping.get(&orig).expect("grouped by presence above").clone();
        let hint = redundant.iter().find_map(|x| p_typing_hint.and_then(|hint| hint.get(x)));
        let order = resolve_image_order(&images, hint, h, warnings);

        for (i, x) in redundant.iter().enumerate() {
            t.insert(x.clone(), order[i % order.len()].clone());
        }

        if order.len() > redundant.len() {
            let representative = redundant[0].clone();
            let mut group_nodes = redundant;
            for image in &order[group_nodes.len()..] {
                let graph = hierarchy
                    .graph_mut(h)
                    .ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?;
                let clone_id = graph.clone_node(&representative, None, &HashSet::new(), &HashSet::new())?;
                t.insert(clone_id.clone(), image.clone());
                group_nodes.push(clone_id);
            }
            h_effects.clone_mapping.insert(representative, group_nodes);
        }
    }

    // -- node removal -------------------------------------------------------
    let removed_h_nodes: Vec<String> = t
        .iter()
        .filter(|(_, orig)| succ_effects.removed_nodes.contains(*orig))
        .map(|(x, _)| x.clone())
        .collect();
    for x in &removed_h_nodes {
        let graph = hierarchy.graph_mut(h).ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?;
        if graph.has_node(x) {
            graph.remove_node(x)?;
        }
        t.remove(x);
        h_effects.removed_nodes.insert(x.clone());
    }

    // -- node attribute removal (subtraction, see propagation::up docs) -----
    for (x, orig) in t.clone() {
        if let Some(diff) = succ_effects.node_attr_removals.get(&orig) {
            let graph = hierarchy.graph_mut(h).ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?;
            if graph.has_node(&x) {
                graph.remove_node_attrs(&x, diff)?;
                h_effects.node_attr_removals.insert(x, diff.clone());
            }
        }
    }

    // -- edge removal ---------------------------------------------------------
    let graph_edges: Vec<(String, String)> = hierarchy
        .graph(h)
        .ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?
        .edges()
        .map(|(u, v)| (u.to_string(), v.to_string()))
        .collect();
    for (u, v) in &graph_edges {
        let (Some(orig_u), Some(orig_v)) = (t.get(u), t.get(v)) else { continue };
        if succ_effects.removed_edges.contains(&(orig_u.clone(), orig_v.clone())) {
            let graph = hierarchy.graph_mut(h).ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?;
            graph.remove_edge(u, v)?;
            h_effects.removed_edges.insert((u.clone(), v.clone()));
        }
    }

    // -- edge attribute removal ------------------------------------------------
    let graph_edges: Vec<(String, String)> = hierarchy
        .graph(h)
        .ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?
        .edges()
        .map(|(u, v)| (u.to_string(), v.to_string()))
        .collect();
    for (u, v) in &graph_edges {
        let (Some(orig_u), Some(orig_v)) = (t.get(u), t.get(v)) else { continue };
        if let Some(diff) = succ_effects.edge_attr_removals.get(&(orig_u.clone(), orig_v.clone())) {
            let graph = hierarchy.graph_mut(h).ok_or_else(|| HierarchyError::UnknownGraph(h.to_string()))?;
            graph.remove_edge_attrs(u, v, diff)?;
            h_effects.edge_attr_removals.insert((u.clone(), v.clone()), diff.clone());
        }
    }

    hierarchy
        .typing_mut(h, successor)
        .ok_or_else(|| HierarchyError::UnknownTyping(h.to_string(), successor.to_string()))?
        .mapping = t;

    Ok(h_effects)
}

/// Order the images a split H-node's copies take, smallest index first
/// unless a P-typing hint names a different image for the *original*
/// node to keep — in which case that image goes first and the rest
/// follow in their natural order. An invalid hint (naming an image that
/// isn't actually one of this split's images) is dropped with a warning
/// and the canonical order is used instead.
fn resolve_image_order(
    images: &[String],
    hint: Option<&String>,
    h: &str,
    warnings: &mut Vec<TypingWarning>,
) -> Vec<String> {
    match hint {
        Some(chosen) if images.contains(chosen) => {
            let mut ordered = vec![chosen.clone()];
            ordered.extend(images.iter().filter(|i| *i != chosen).cloned());
            ordered
        }
        Some(chosen) => {
            warnings.push(TypingWarning {
                graph: h.to_string(),
                message: format!(
                    "P-typing hint names image '{chosen}' which is not among this clone's images; falling back to canonical order"
                ),
            });
            images.to_vec()
        }
        None => images.to_vec(),
    }
}
