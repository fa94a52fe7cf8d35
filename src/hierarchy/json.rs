//! JSON wire format for [`super::Hierarchy`]:
//! `{ "graphs": [...], "typing": [...], "relations": [...] }`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attributes::json::{AttrDictJson, AttrJsonError};
use crate::attributes::AttrDict;
use crate::graph::json::{GraphJson, GraphJsonError};
use crate::graph::Graph;

use super::{Hierarchy, HierarchyError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntryJson {
    pub id: String,
    pub graph: GraphJson,
    #[serde(default)]
    pub attrs: AttrDictJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingEntryJson {
    pub from: String,
    pub to: String,
    pub mapping: HashMap<String, String>,
    #[serde(default)]
    pub attrs: AttrDictJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEntryJson {
    pub from: String,
    pub to: String,
    pub rel: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub attrs: AttrDictJson,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyJson {
    #[serde(default)]
    pub graphs: Vec<GraphEntryJson>,
    #[serde(default)]
    pub typing: Vec<TypingEntryJson>,
    #[serde(default)]
    pub relations: Vec<RelationEntryJson>,
}

#[derive(Debug, thiserror::Error)]
pub enum HierarchyJsonError {
    #[error(transparent)]
    Attr(#[from] AttrJsonError),
    #[error(transparent)]
    Graph(#[from] GraphJsonError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

impl TryFrom<HierarchyJson> for Hierarchy {
    type Error = HierarchyJsonError;

    fn try_from(raw: HierarchyJson) -> Result<Self, Self::Error> {
        let mut hierarchy = Hierarchy::new();
        for entry in raw.graphs {
            let graph = Graph::try_from(entry.graph)?;
            let attrs = AttrDict::try_from(entry.attrs)?;
            hierarchy.add_graph(entry.id, graph, attrs)?;
        }
        // Typing edges are loaded unchecked: a serialized hierarchy is
        // assumed to already satisfy commutativity (it was valid when it
        // was written out), and re-deriving O(paths) checks for every
        // edge on every load would be wasted work.
        for entry in raw.typing {
            let attrs = AttrDict::try_from(entry.attrs)?;
            hierarchy.add_typing(entry.from, entry.to, entry.mapping, attrs, false)?;
        }
        for entry in raw.relations {
            let attrs = AttrDict::try_from(entry.attrs)?;
            hierarchy.add_relation(entry.from, entry.to, entry.rel, attrs)?;
        }
        Ok(hierarchy)
    }
}

impl From<&Hierarchy> for HierarchyJson {
    fn from(hierarchy: &Hierarchy) -> Self {
        let mut graph_ids: Vec<&str> = hierarchy.graph_ids().collect();
        graph_ids.sort();
        let graphs = graph_ids
            .into_iter()
            .map(|id| {
                let handle = hierarchy.handle(id).expect("id came from graph_ids()");
                GraphEntryJson {
                    id: id.to_string(),
                    graph: GraphJson::from(&handle.graph),
                    attrs: AttrDictJson::from(&handle.attrs),
                }
            })
            .collect();

        let mut typing_keys: Vec<(String, String)> = Vec::new();
        for from in hierarchy.graph_ids() {
            for to in hierarchy.successors(from) {
                typing_keys.push((from.to_string(), to));
            }
        }
        typing_keys.sort();
        let typing = typing_keys
            .into_iter()
            .map(|(from, to)| {
                let edge = hierarchy.typing(&from, &to).expect("key came from successors()");
                TypingEntryJson {
                    from,
                    to,
                    mapping: edge.mapping.clone(),
                    attrs: AttrDictJson::from(&edge.attrs),
                }
            })
            .collect();

        HierarchyJson {
            graphs,
            typing,
            relations: Vec::new(),
        }
    }
}
