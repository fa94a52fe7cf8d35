//! # Typed graph rewriting engine
//!
//! A typed graph rewriting engine with hierarchical typing and change
//! propagation: graphs carry attribute-decorated nodes and edges, rules
//! are single-pushout (SqPO) rewrites `(L <- P -> R)`, and graphs can be
//! related to each other by typing homomorphisms arranged into a DAG
//! (the [`hierarchy`]). Rewriting one graph in the hierarchy propagates
//! the edit to every graph it types or is typed by, keeping every
//! homomorphism in the hierarchy commuting.
//!
//! ## Pipeline
//!
//! ```text
//! Pattern + host graph
//!     ↓
//! [matching]            → every injective homomorphism match : L -> G
//!     ↓
//! [rewriting]            → apply rule at a chosen match, nine-phase SqPO executor
//!     ↓
//! [propagation::up]      → restrictive edits (clone, removal) flow to predecessors
//! [propagation::down]    → relaxing edits (merge, addition) flow to successors
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graph_rewriting::attributes::AttrDict;
//! use graph_rewriting::graph::Graph;
//! use graph_rewriting::hierarchy::Hierarchy;
//! use graph_rewriting::rule::Rule;
//! use graph_rewriting::session::HierarchySession;
//!
//! let mut hierarchy = Hierarchy::new();
//! hierarchy.add_graph("g0", Graph::new(), AttrDict::new())?;
//! let session = HierarchySession::new(hierarchy);
//!
//! let matches = session.matches("g0", &pattern, &[]);
//! let report = session.rewrite("g0", &rule, &matches[0], &Default::default(), &Default::default(), false)?;
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attributes`] | Attribute sets and the attribute algebra |
//! | [`graph`] | Graph store and primitive edits |
//! | [`homomorphism`] | Homomorphism validity checking |
//! | [`rule`] | Rule representation and derived sets |
//! | [`matching`] | Subgraph pattern matching |
//! | [`rewriting`] | SqPO rewriting executor |
//! | [`hierarchy`] | Hierarchy and commutativity enforcement |
//! | [`propagation`] | Change propagation (up and down) |
//! | [`session`] | Concurrency wrapper around a [`hierarchy::Hierarchy`] |
//! | [`error`] | Composed top-level error type |

pub mod attributes;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod homomorphism;
pub mod matching;
pub mod propagation;
pub mod rewriting;
pub mod rule;
pub mod session;

pub use attributes::{AttrDict, AttrValueSet, AttributeError, Value};
pub use error::{Error, Result};
pub use graph::{Graph, GraphError};
pub use hierarchy::{GraphHandle, Hierarchy, HierarchyError, Relation, Typing};
pub use homomorphism::HomomorphismReport;
pub use matching::{Match, PatternTyping};
pub use propagation::TypingWarning;
pub use rewriting::{RewriteEffects, RewritingError};
pub use rule::{Rule, RuleError};
pub use session::{HierarchySession, RewriteReport};
