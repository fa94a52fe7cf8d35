//! JSON wire format for [`super::Graph`]:
//! `{ "nodes": [{ "id", "attrs" }], "edges": [{ "from", "to", "attrs" }] }`.

use serde::{Deserialize, Serialize};

use crate::attributes::json::{AttrDictJson, AttrJsonError};
use crate::attributes::AttrDict;

use super::{Graph, GraphError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: String,
    #[serde(default)]
    pub attrs: AttrDictJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeJson {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub attrs: AttrDictJson,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphJson {
    #[serde(default)]
    pub nodes: Vec<NodeJson>,
    #[serde(default)]
    pub edges: Vec<EdgeJson>,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphJsonError {
    #[error(transparent)]
    Attr(#[from] AttrJsonError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl TryFrom<GraphJson> for Graph {
    type Error = GraphJsonError;

    fn try_from(raw: GraphJson) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in raw.nodes {
            let attrs = AttrDict::try_from(node.attrs)?;
            graph.add_node(node.id, attrs)?;
        }
        for edge in raw.edges {
            let attrs = AttrDict::try_from(edge.attrs)?;
            graph.add_edge(edge.from, edge.to, attrs)?;
        }
        Ok(graph)
    }
}

impl From<&Graph> for GraphJson {
    fn from(graph: &Graph) -> Self {
        let mut nodes: Vec<NodeJson> = graph
            .nodes()
            .map(|id| NodeJson {
                id: id.to_string(),
                attrs: graph
                    .node_attrs(id)
                    .map(AttrDictJson::from)
                    .unwrap_or_default(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<EdgeJson> = graph
            .edges()
            .map(|(from, to)| EdgeJson {
                from: from.to_string(),
                to: to.to_string(),
                attrs: graph
                    .edge_attrs(from, to)
                    .map(AttrDictJson::from)
                    .unwrap_or_default(),
            })
            .collect();
        edges.sort_by(|a, b| (a.from.as_str(), a.to.as_str()).cmp(&(b.from.as_str(), b.to.as_str())));

        GraphJson { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nodes_and_edges() {
        let json = r#"{
            "nodes": [{"id": "a", "attrs": {"color": ["red"]}}, {"id": "b"}],
            "edges": [{"from": "a", "to": "b", "attrs": {"w": ["1"]}}]
        }"#;
        let raw: GraphJson = serde_json::from_str(json).unwrap();
        let graph = Graph::try_from(raw).unwrap();
        assert!(graph.has_node("a"));
        assert!(graph.has_edge("a", "b"));

        let back = GraphJson::from(&graph);
        assert_eq!(back.nodes.len(), 2);
        assert_eq!(back.edges.len(), 1);
    }

    #[test]
    fn dangling_edge_endpoint_is_an_error() {
        let json = r#"{"nodes": [{"id": "a"}], "edges": [{"from": "a", "to": "missing"}]}"#;
        let raw: GraphJson = serde_json::from_str(json).unwrap();
        assert!(matches!(Graph::try_from(raw), Err(GraphJsonError::Graph(_))));
    }
}
