//! Attribute value sets and attribute dictionaries.
//!
//! Every node/edge attribute value in a typed attributed graph is a *set*
//! of values rather than a single scalar, with three polymorphic variants:
//! a finite set of scalars, a (possibly universal) integer interval set,
//! and a (possibly universal) string regex set. This module implements
//! the algebra over those sets (union, intersection, subset test,
//! membership, emptiness) and over the dictionaries built from them.
//!
//! Only the universal case of the interval/regex variants is required to
//! round-trip; anything else raises [`AttributeError::Unsupported`].

pub mod json;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// A single scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Errors raised by the attribute algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// A non-universal `IntegerSet`/`RegexSet` was requested; only the
    /// universal case is supported.
    #[error("unsupported attribute value set: {0}")]
    Unsupported(String),

    /// Two incompatible attribute-set variants were combined (e.g. a
    /// restricted integer set intersected with a finite string set in a
    /// way that can't be reconciled).
    #[error("type mismatch combining attribute sets: {left} vs {right}")]
    TypeMismatch { left: String, right: String },
}

/// The set of values an attribute may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValueSet {
    /// An explicit, finite set of scalar values.
    Finite(BTreeSet<Value>),
    /// An interval set over the integers. Only `universal = true` round-trips.
    IntegerSet { universal: bool },
    /// A regex set over strings. Only `universal = true` round-trips.
    RegexSet { universal: bool },
    /// The symbolic "any boolean" set used by `["BooleanSet"]` image
    /// attributes during homomorphism checking. Always universal.
    BooleanSet,
}

impl AttrValueSet {
    pub fn finite<I: IntoIterator<Item = Value>>(values: I) -> Self {
        AttrValueSet::Finite(values.into_iter().collect())
    }

    pub fn universal_integers() -> Self {
        AttrValueSet::IntegerSet { universal: true }
    }

    pub fn universal_strings() -> Self {
        AttrValueSet::RegexSet { universal: true }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            AttrValueSet::Finite(_) => "Finite",
            AttrValueSet::IntegerSet { .. } => "IntegerSet",
            AttrValueSet::RegexSet { .. } => "RegexSet",
            AttrValueSet::BooleanSet => "BooleanSet",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AttrValueSet::Finite(s) => s.is_empty(),
            AttrValueSet::IntegerSet { universal } | AttrValueSet::RegexSet { universal } => {
                !*universal
            }
            AttrValueSet::BooleanSet => false,
        }
    }

    pub fn is_universal(&self) -> bool {
        match self {
            AttrValueSet::Finite(_) => false,
            AttrValueSet::IntegerSet { universal } | AttrValueSet::RegexSet { universal } => {
                *universal
            }
            AttrValueSet::BooleanSet => true,
        }
    }

    pub fn contains(&self, value: &Value) -> Result<bool, AttributeError> {
        match (self, value) {
            (AttrValueSet::Finite(s), v) => Ok(s.contains(v)),
            (AttrValueSet::IntegerSet { universal }, Value::Int(_)) => Ok(*universal),
            (AttrValueSet::IntegerSet { universal: false }, _) => Err(
                AttributeError::Unsupported("non-universal IntegerSet".into()),
            ),
            (AttrValueSet::IntegerSet { universal: true }, _) => Ok(false),
            (AttrValueSet::RegexSet { universal }, Value::Str(_)) => Ok(*universal),
            (AttrValueSet::RegexSet { universal: false }, _) => {
                Err(AttributeError::Unsupported("non-universal RegexSet".into()))
            }
            (AttrValueSet::RegexSet { universal: true }, _) => Ok(false),
            (AttrValueSet::BooleanSet, Value::Bool(_)) => Ok(true),
            (AttrValueSet::BooleanSet, _) => Ok(false),
        }
    }

    /// Union of two attribute-value sets, following the mixed-variant
    /// absorption rule: a universal integer/regex set absorbs anything
    /// unioned into it.
    pub fn union(&self, other: &Self) -> Result<Self, AttributeError> {
        use AttrValueSet::*;
        match (self, other) {
            (Finite(a), Finite(b)) => Ok(Finite(a.union(b).cloned().collect())),
            (BooleanSet, _) | (_, BooleanSet) => Ok(BooleanSet),
            (IntegerSet { universal: true }, _) | (_, IntegerSet { universal: true }) => {
                Ok(IntegerSet { universal: true })
            }
            (RegexSet { universal: true }, _) | (_, RegexSet { universal: true }) => {
                Ok(RegexSet { universal: true })
            }
            (IntegerSet { universal: false }, _) | (_, IntegerSet { universal: false }) => Err(
                AttributeError::Unsupported("non-universal IntegerSet".into()),
            ),
            (RegexSet { universal: false }, _) | (_, RegexSet { universal: false }) => {
                Err(AttributeError::Unsupported("non-universal RegexSet".into()))
            }
        }
    }

    /// Intersection, mirroring `union` with the dual absorbing element: a
    /// universal set intersected with anything yields the other operand.
    pub fn intersection(&self, other: &Self) -> Result<Self, AttributeError> {
        use AttrValueSet::*;
        match (self, other) {
            (Finite(a), Finite(b)) => Ok(Finite(a.intersection(b).cloned().collect())),
            (BooleanSet, BooleanSet) => Ok(BooleanSet),
            (BooleanSet, other) | (other, BooleanSet) => Ok(other.clone()),
            (IntegerSet { universal: true }, IntegerSet { universal: true }) => {
                Ok(IntegerSet { universal: true })
            }
            (IntegerSet { universal: true }, other) | (other, IntegerSet { universal: true }) => {
                Ok(other.clone())
            }
            (RegexSet { universal: true }, RegexSet { universal: true }) => {
                Ok(RegexSet { universal: true })
            }
            (RegexSet { universal: true }, other) | (other, RegexSet { universal: true }) => {
                Ok(other.clone())
            }
            (IntegerSet { universal: false }, _) | (_, IntegerSet { universal: false }) => Err(
                AttributeError::Unsupported("non-universal IntegerSet".into()),
            ),
            (RegexSet { universal: false }, _) | (_, RegexSet { universal: false }) => {
                Err(AttributeError::Unsupported("non-universal RegexSet".into()))
            }
        }
    }

    /// Set difference `self \ other`. Only defined for finite sets; a
    /// universal set on either side is unsupported since the complement
    /// of "everything" isn't representable in this algebra.
    pub fn difference(&self, other: &Self) -> Result<Self, AttributeError> {
        match (self, other) {
            (AttrValueSet::Finite(a), AttrValueSet::Finite(b)) => {
                Ok(AttrValueSet::Finite(a.difference(b).cloned().collect()))
            }
            (AttrValueSet::BooleanSet, AttrValueSet::BooleanSet) => {
                Ok(AttrValueSet::Finite(BTreeSet::new()))
            }
            (a, b) if a.is_universal() || b.is_universal() => Err(AttributeError::Unsupported(
                format!("difference over universal set: {} \\ {}", a.variant_name(), b.variant_name()),
            )),
            (a, b) => Err(AttributeError::TypeMismatch {
                left: a.variant_name().into(),
                right: b.variant_name().into(),
            }),
        }
    }

    /// `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> Result<bool, AttributeError> {
        use AttrValueSet::*;
        match (self, other) {
            (Finite(a), Finite(b)) => Ok(a.is_subset(b)),
            (BooleanSet, BooleanSet) => Ok(true),
            (BooleanSet, _) => Ok(false),
            (_, BooleanSet) => Ok(false),
            (_, IntegerSet { universal: true }) if matches!(self, IntegerSet { .. } | Finite(_)) => {
                Ok(true)
            }
            (_, RegexSet { universal: true }) if matches!(self, RegexSet { .. } | Finite(_)) => {
                Ok(true)
            }
            (IntegerSet { universal: true }, other) => Ok(other.is_universal()),
            (RegexSet { universal: true }, other) => Ok(other.is_universal()),
            (IntegerSet { universal: false }, _) => Err(AttributeError::Unsupported(
                "non-universal IntegerSet".into(),
            )),
            (RegexSet { universal: false }, _) => {
                Err(AttributeError::Unsupported("non-universal RegexSet".into()))
            }
            (Finite(_), _) => Ok(false),
        }
    }
}

/// A dictionary mapping attribute keys to attribute-value sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttrDict(pub BTreeMap<String, AttrValueSet>);

impl AttrDict {
    pub fn new() -> Self {
        AttrDict(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValueSet> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttrValueSet) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValueSet> {
        self.0.remove(key)
    }

    /// `self` is included in `other`: every key on `self` is present on
    /// `other` with a subset value-set.
    pub fn is_subset(&self, other: &Self) -> Result<bool, AttributeError> {
        for (key, value) in &self.0 {
            match other.0.get(key) {
                Some(other_value) => {
                    if !value.is_subset(other_value)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Key-wise union: keys present in only one dict pass through
    /// unchanged, keys present in both are unioned.
    pub fn union(&self, other: &Self) -> Result<Self, AttributeError> {
        let mut result = self.0.clone();
        for (key, value) in &other.0 {
            match result.get(key) {
                Some(existing) => {
                    let merged = existing.union(value)?;
                    result.insert(key.clone(), merged);
                }
                None => {
                    result.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(AttrDict(result))
    }

    /// Key-wise intersection: only keys present in both dicts survive,
    /// intersected.
    pub fn intersection(&self, other: &Self) -> Result<Self, AttributeError> {
        let mut result = BTreeMap::new();
        for (key, value) in &self.0 {
            if let Some(other_value) = other.0.get(key) {
                result.insert(key.clone(), value.intersection(other_value)?);
            }
        }
        Ok(AttrDict(result))
    }

    /// Apply a set of attribute removals: for each key in `removed`,
    /// subtract the given value-set from the dict's current value (used
    /// to implement `remove_node_attrs`/`remove_edge_attrs`).
    pub fn remove_values(&mut self, removed: &AttrDict) -> Result<(), AttributeError> {
        for (key, remove_set) in &removed.0 {
            if let Some(current) = self.0.get(key) {
                let remaining = current.difference(remove_set)?;
                if remaining.is_empty() {
                    self.0.remove(key);
                } else {
                    self.0.insert(key.clone(), remaining);
                }
            }
        }
        Ok(())
    }

    /// Apply a set of attribute additions: union `added` into `self`
    /// key-wise (used to implement `add_node_attrs`/`add_edge_attrs`).
    pub fn add_values(&mut self, added: &AttrDict) -> Result<(), AttributeError> {
        let merged = self.union(added)?;
        self.0 = merged.0;
        Ok(())
    }

    /// Key-wise difference `self \ other`: for each key present in both,
    /// subtracts `other`'s value-set and keeps the key only if values
    /// remain. Keys present only in `self` are dropped (there is nothing
    /// to subtract them from, so they aren't part of the diff). Used to
    /// compute the removed/added attribute diffs a [`crate::rule::Rule`]
    /// derives between `P` and its `L`/`R` images.
    pub fn difference_safe(&self, other: &Self) -> Result<Self, AttributeError> {
        let mut result = BTreeMap::new();
        for (key, value) in &self.0 {
            let diff = match other.0.get(key) {
                Some(other_value) => value.difference(other_value)?,
                None => value.clone(),
            };
            if !diff.is_empty() {
                result.insert(key.clone(), diff);
            }
        }
        Ok(AttrDict(result))
    }
}
