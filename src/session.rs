//! Concurrency wrapper around a [`Hierarchy`]: the single-writer/many-
//! reader front door a caller actually holds onto, with structured
//! `tracing` events at every stateful boundary.
//!
//! `rewrite()` takes the write lock for the whole match-apply-propagate
//! chain: it runs every step against a scratch clone of the hierarchy and
//! only swaps the clone in once every step has succeeded, so a failure
//! partway through a multi-hop propagation never leaves the real
//! hierarchy half-edited. Read-only operations (`matches`, `read`) take
//! the read lock and never block each other.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::hierarchy::{Hierarchy, HierarchyError};
use crate::matching::{self, Match, PatternTyping};
use crate::propagation::{self, TypingWarning};
use crate::rewriting;
use crate::rule::Rule;

/// Outcome of one [`HierarchySession::rewrite`] call: the rule's
/// `R -> G'` node map, plus any non-fatal typing-hint fallbacks raised
/// while propagating the edit through the rest of the hierarchy.
#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    pub mapping: HashMap<String, String>,
    pub warnings: Vec<TypingWarning>,
}

/// Guards a [`Hierarchy`] behind a single-writer/many-reader lock: at
/// most one rewrite in flight at a time, any number of concurrent
/// readers, no async, no cancellation.
pub struct HierarchySession {
    hierarchy: parking_lot::RwLock<Hierarchy>,
}

impl HierarchySession {
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self { hierarchy: parking_lot::RwLock::new(hierarchy) }
    }

    /// Run `f` with read-only access to the current hierarchy snapshot.
    pub fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Hierarchy) -> T,
    {
        f(&self.hierarchy.read())
    }

    /// Every match of `pattern` into graph `host`'s current snapshot.
    /// Returns an empty `Vec` if `host` doesn't exist.
    pub fn matches(&self, host: &str, pattern: &Graph, pattern_typings: &[PatternTyping]) -> Vec<Match> {
        self.read(|hierarchy| {
            hierarchy
                .graph(host)
                .map(|g| matching::find_matches(pattern, g, None, pattern_typings))
                .unwrap_or_default()
        })
    }

    /// Apply `rule` at match `m` to graph `g0`, then propagate the edit
    /// through the rest of the hierarchy: restrictive edits always flow
    /// upward to predecessors, relaxing edits flow downward to
    /// successors unless `strict` is set. On any failure the hierarchy
    /// is left completely untouched — the whole chain runs against a
    /// scratch clone first and is only swapped in once every step
    /// succeeds.
    pub fn rewrite(
        &self,
        g0: &str,
        rule: &Rule,
        m: &Match,
        p_typing_hints: &HashMap<String, HashMap<String, String>>,
        rhs_typing_hints: &HashMap<String, HashMap<String, String>>,
        strict: bool,
    ) -> Result<RewriteReport> {
        let mut guard = self.hierarchy.write();
        let mut scratch = guard.clone();

        tracing::debug!(
            g0,
            restrictive = rule.is_restrictive(),
            relaxing = rule.is_relaxing(),
            strict,
            "rewrite_start"
        );

        let host = scratch
            .graph_mut(g0)
            .ok_or_else(|| Error::Hierarchy(HierarchyError::UnknownGraph(g0.to_string())))?;
        let effects = rewriting::apply(rule, host, m)?;

        let warnings =
            propagation::propagate(&mut scratch, g0, &effects, p_typing_hints, rhs_typing_hints, strict)?;
        for warning in &warnings {
            tracing::warn!(graph = %warning.graph, message = %warning.message, "typing_hint_fallback");
        }

        let mapping = effects.r_to_g.clone();
        *guard = scratch;
        tracing::info!(g0, r_nodes = mapping.len(), warnings = warnings.len(), "rewrite_committed");

        Ok(RewriteReport { mapping, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrDict;

    fn node_graph(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id, AttrDict::new()).unwrap();
        }
        g
    }

    #[test]
    fn rewrite_commits_on_success() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a", "v"]), AttrDict::new()).unwrap();
        hierarchy.graph_mut("g0").unwrap().add_edge("a", "v", AttrDict::new()).unwrap();

        let session = HierarchySession::new(hierarchy);

        let mut lhs = Graph::new();
        lhs.add_node("n", AttrDict::new()).unwrap();
        let rule = Rule::identity(lhs);
        let m: Match = [("n".to_string(), "a".to_string())].into();

        let report = session.rewrite("g0", &rule, &m, &HashMap::new(), &HashMap::new(), false).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.mapping.get("n"), Some(&"a".to_string()));
        assert!(session.read(|h| h.graph("g0").unwrap().has_node("a")));
    }

    #[test]
    fn rewrite_leaves_hierarchy_untouched_on_unmatched_node() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", node_graph(&["a"]), AttrDict::new()).unwrap();
        let before = hierarchy.clone();
        let session = HierarchySession::new(hierarchy);

        let mut lhs = Graph::new();
        lhs.add_node("n", AttrDict::new()).unwrap();
        lhs.add_node("missing", AttrDict::new()).unwrap();
        let rule = Rule::identity(lhs);
        let m: Match = [("n".to_string(), "a".to_string())].into();

        let err = session.rewrite("g0", &rule, &m, &HashMap::new(), &HashMap::new(), false);
        assert!(err.is_err());
        session.read(|after| {
            assert_eq!(after.graph_ids().count(), before.graph_ids().count());
            assert!(after.graph("g0").unwrap().has_node("a"));
        });
    }
}
