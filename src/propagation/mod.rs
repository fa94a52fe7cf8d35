//! Hierarchy-wide change propagation, triggered by every rewrite of a
//! graph `G0` inside a [`Hierarchy`].
//!
//! Restrictive edits (clones, removals) flow **upward** to predecessors
//! ([`up`]); relaxing edits (merges, additions) flow **downward** to
//! successors ([`down`]). Both walk the hierarchy one level at a time,
//! starting at `G0` and feeding each level's own edits to the next as
//! they're computed — a multi-hop predecessor/successor is therefore
//! updated using the edits actually applied to its *direct* neighbor,
//! not `G0`'s original edits, which is what keeps the commutativity
//! invariant intact across the whole chain.
//!
//! In strict mode, downward propagation never runs at all: instead,
//! every direct successor is statically checked ([`down::validate_strict`])
//! to confirm it already has everything a relaxing edit would otherwise
//! create there, and the whole rewrite is rejected if it doesn't.

pub mod down;
pub mod up;

use crate::error::Error;
use crate::hierarchy::Hierarchy;
use crate::rewriting::RewriteEffects;

/// A non-fatal diagnostic: a caller-supplied typing hint (P-typing for
/// upward propagation, RHS-typing for downward) couldn't be honored, so
/// propagation fell back to its canonical, non-selective behavior for
/// that graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingWarning {
    pub graph: String,
    pub message: String,
}

/// Propagate a rewrite of `g0` (summarized by `effects`) through the
/// whole hierarchy: restrictive edits upward, relaxing edits downward.
/// Returns every [`TypingWarning`] raised falling back from a typing
/// hint. `strict` disables downward propagation entirely and instead
/// statically validates it would have been a no-op on every direct
/// successor, raising `Error::Rewriting` if a successor is missing a
/// typing, image, edge, or attribute the rewrite would otherwise need to
/// add there.
pub fn propagate(
    hierarchy: &mut Hierarchy,
    g0: &str,
    effects: &RewriteEffects,
    p_typing_hints: &std::collections::HashMap<String, std::collections::HashMap<String, String>>,
    rhs_typing_hints: &std::collections::HashMap<String, std::collections::HashMap<String, String>>,
    strict: bool,
) -> Result<Vec<TypingWarning>, Error> {
    let mut warnings = up::propagate_up(hierarchy, g0, effects, p_typing_hints)?;
    if strict {
        down::validate_strict(hierarchy, g0, effects, rhs_typing_hints)?;
    } else {
        warnings.extend(down::propagate_down(hierarchy, g0, effects, rhs_typing_hints)?);
    }
    Ok(warnings)
}
