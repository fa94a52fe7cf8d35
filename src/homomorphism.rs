//! Homomorphism checking between two [`Graph`]s.
//!
//! A homomorphism `h: G -> H` is a total node map such that every edge of
//! `G` has an image edge in `H`, and every node/edge attribute dictionary
//! of `G` is included in its image's. The check collects *every*
//! offending node/edge/attribute pair in one pass rather than failing on
//! the first violation, so a caller gets a complete diagnostic.

use std::collections::HashMap;
use std::fmt;

use crate::attributes::AttrDict;
use crate::graph::Graph;

/// A structured report of everything wrong with a candidate homomorphism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomomorphismReport {
    /// G-nodes with no image under the candidate map.
    pub untotal_nodes: Vec<String>,
    /// G-edges with no corresponding image edge in H.
    pub missing_edge_images: Vec<(String, String)>,
    /// G-nodes whose attributes are not included in their image's.
    pub offending_node_attrs: Vec<String>,
    /// G-edges whose attributes are not included in their image's.
    pub offending_edge_attrs: Vec<(String, String)>,
}

impl HomomorphismReport {
    pub fn is_empty(&self) -> bool {
        self.untotal_nodes.is_empty()
            && self.missing_edge_images.is_empty()
            && self.offending_node_attrs.is_empty()
            && self.offending_edge_attrs.is_empty()
    }
}

impl fmt::Display for HomomorphismReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.untotal_nodes.is_empty() {
            parts.push(format!("not total for nodes {:?}", self.untotal_nodes));
        }
        if !self.missing_edge_images.is_empty() {
            parts.push(format!("missing edge images {:?}", self.missing_edge_images));
        }
        if !self.offending_node_attrs.is_empty() {
            parts.push(format!(
                "node attribute mismatch at {:?}",
                self.offending_node_attrs
            ));
        }
        if !self.offending_edge_attrs.is_empty() {
            parts.push(format!(
                "edge attribute mismatch at {:?}",
                self.offending_edge_attrs
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

fn attrs_included(source: Option<&AttrDict>, image: Option<&AttrDict>) -> bool {
    match (source, image) {
        (None, _) => true,
        (Some(s), None) => s.is_empty(),
        (Some(s), Some(i)) => s.is_subset(i).unwrap_or(false),
    }
}

/// Check that `map: nodes(g) -> nodes(h)` is a valid homomorphism.
/// Returns `Ok(())` if valid, or `Err(report)` describing every violation.
pub fn check(
    map: &HashMap<String, String>,
    g: &Graph,
    h: &Graph,
) -> Result<(), HomomorphismReport> {
    let mut report = HomomorphismReport::default();

    for node in g.nodes() {
        if !map.contains_key(node) {
            report.untotal_nodes.push(node.to_string());
        }
    }

    for (u, v) in g.edges() {
        let (Some(hu), Some(hv)) = (map.get(u), map.get(v)) else {
            continue; // already reported as untotal
        };
        if !h.has_edge(hu, hv) {
            report
                .missing_edge_images
                .push((u.to_string(), v.to_string()));
        }
    }

    for node in g.nodes() {
        let Some(image) = map.get(node) else { continue };
        if !attrs_included(g.node_attrs(node), h.node_attrs(image)) {
            report.offending_node_attrs.push(node.to_string());
        }
    }

    for (u, v) in g.edges() {
        let (Some(hu), Some(hv)) = (map.get(u), map.get(v)) else {
            continue;
        };
        if h.has_edge(hu, hv)
            && !attrs_included(g.edge_attrs(u, v), h.edge_attrs(hu, hv))
        {
            report.offending_edge_attrs.push((u.to_string(), v.to_string()));
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(report)
    }
}

/// `true` iff `map` is a valid homomorphism `g -> h`.
pub fn is_homomorphism(map: &HashMap<String, String>, g: &Graph, h: &Graph) -> bool {
    check(map, g, h).is_ok()
}
