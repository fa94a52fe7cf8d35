//! Crate-wide error types for the graph rewriting engine.
//!
//! Each subsystem owns a narrow error enum (`AttributeError`, `GraphError`,
//! `RuleError`, `HierarchyError`, `RewritingError`); this module composes
//! them into one top-level [`Error`] so callers can use a single `?` chain
//! across subsystem boundaries.

use thiserror::Error;

use crate::attributes::AttributeError;
use crate::graph::GraphError;
use crate::homomorphism::HomomorphismReport;
use crate::hierarchy::HierarchyError;
use crate::rewriting::RewritingError;
use crate::rule::RuleError;

/// Top-level error for every fallible operation this crate exposes.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid graph edit (duplicate id, missing endpoint, ...).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A candidate map failed the homomorphism check; carries a structured
    /// report of every offending node/edge/attribute pair found.
    #[error("invalid homomorphism: {0}")]
    Homomorphism(HomomorphismReport),

    /// Malformed rule (non-homomorphic `l`/`r`, dangling references).
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Missing graph, duplicate graph id, or a typing that would break the
    /// commutativity invariant.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Strict-mode violation, or an inherent contradiction discovered
    /// mid-rewrite.
    #[error(transparent)]
    Rewriting(#[from] RewritingError),

    /// Attribute-algebra error: a non-universal symbolic set was requested,
    /// or two incompatible variants were combined.
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

impl From<HomomorphismReport> for Error {
    fn from(report: HomomorphismReport) -> Self {
        Error::Homomorphism(report)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
