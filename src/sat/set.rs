#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The formula node: a conjunction of clauses, or a terminal boolean.
//!
//! A `Set` is created by input parsing (the root) or by splitting (children).
//! The canonicalizer mutates it in place until it reaches linear-order form;
//! from that point its identity is the BLAKE3 digest of its canonical textual
//! body and it is treated as immutable. The body text doubles as the store
//! payload and as the serialized form for the transient frontier, so it must
//! round-trip through [`Set::parse_body`].

use crate::sat::clause::{var_of_lit, Clause, Variable};
use crate::sat::error::SolverError;
use rustc_hash::FxHashSet;
use std::fmt;

/// Content hash of a canonical set body. The store's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetHash([u8; 32]);

impl SetHash {
    #[must_use]
    pub fn of_body(body: &str) -> Self {
        Self(*blake3::hash(body.as_bytes()).as_bytes())
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for SetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A conjunction of clauses, or a terminal boolean value.
///
/// Invariant: a set with `value == Some(_)` has no clauses left to evaluate,
/// and a set without a value owns at least its clause list. Every `Set`
/// allocates its own containers; nothing is shared between instances.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Set {
    pub clauses: Vec<Clause>,
    pub value: Option<bool>,
    /// Rename mapping from the last canonicalization pass: `mapping[i - 1]`
    /// is the original variable id that was renamed to `i`. Ephemeral; not
    /// part of equality-relevant state but persisted alongside the record.
    pub mapping: Vec<Variable>,
}

impl Set {
    #[must_use]
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self {
            clauses,
            value: None,
            mapping: Vec::new(),
        }
    }

    /// A terminal node carrying a final boolean value.
    #[must_use]
    pub fn terminal(value: bool) -> Self {
        Self {
            clauses: Vec::new(),
            value: Some(value),
            mapping: Vec::new(),
        }
    }

    /// When all clauses of a set are decided, the set has a final value and
    /// its remaining clauses are discarded.
    pub fn set_value(&mut self, value: bool) {
        self.value = Some(value);
        self.clauses.clear();
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.value.is_some()
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Number of distinct variables across all clauses.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        let mut seen: FxHashSet<Variable> = FxHashSet::default();
        for clause in &self.clauses {
            for &lit in clause.iter() {
                seen.insert(var_of_lit(lit));
            }
        }
        seen.len()
    }

    /// The canonical textual body: `T`/`F` for terminals, otherwise the
    /// clause list in its current order.
    ///
    /// # Errors
    ///
    /// A set with no value and no clauses violates the node invariant and is
    /// rejected rather than rendered.
    pub fn body(&self) -> Result<String, SolverError> {
        if let Some(value) = self.value {
            return Ok(if value { "T" } else { "F" }.to_string());
        }

        if self.clauses.is_empty() {
            return Err(SolverError::PreconditionViolation(
                "set has no clauses and no evaluated value",
            ));
        }

        let rendered: Vec<String> = self.clauses.iter().map(ToString::to_string).collect();
        Ok(rendered.join(" & "))
    }

    /// BLAKE3 digest of the body. Only meaningful once the set is canonical.
    ///
    /// # Errors
    ///
    /// Propagates the invariant check from [`Set::body`].
    pub fn content_hash(&self) -> Result<SetHash, SolverError> {
        Ok(SetHash::of_body(&self.body()?))
    }

    /// Parses a body produced by [`Set::body`]. Used to rehydrate frontier
    /// records.
    ///
    /// # Errors
    ///
    /// `MalformedInput` on anything that does not round-trip.
    pub fn parse_body(body: &str) -> Result<Self, SolverError> {
        let body = body.trim();
        match body {
            "T" => return Ok(Self::terminal(true)),
            "F" => return Ok(Self::terminal(false)),
            "" => {
                return Err(SolverError::MalformedInput(
                    "empty set body".to_string(),
                ))
            }
            _ => {}
        }

        let mut clauses = Vec::new();
        for part in body.split('&') {
            let part = part.trim();
            let inner = part
                .strip_prefix('(')
                .and_then(|p| p.strip_suffix(')'))
                .ok_or_else(|| {
                    SolverError::MalformedInput(format!("clause missing parentheses: {part:?}"))
                })?;

            let mut clause = Clause::default();
            for token in inner.split('|') {
                let token = token.trim();
                let lit: i32 = token.parse().map_err(|_| {
                    SolverError::MalformedInput(format!("invalid literal token: {token:?}"))
                })?;
                if lit == 0 {
                    return Err(SolverError::MalformedInput(
                        "literal 0 is not allowed".to_string(),
                    ));
                }
                clause.literals.push(lit);
            }
            clauses.push(clause);
        }

        Ok(Self::new(clauses))
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body() {
            Ok(body) => f.write_str(&body),
            Err(_) => f.write_str("<invalid set>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(clauses: &[&[i32]]) -> Set {
        Set::new(clauses.iter().map(|c| Clause::from(*c)).collect())
    }

    #[test]
    fn test_body_renders_clauses_in_order() {
        let s = set(&[&[1, 2], &[-1, 3]]);
        assert_eq!(s.body().unwrap(), "(1 | 2) & (-1 | 3)");
    }

    #[test]
    fn test_body_terminals() {
        assert_eq!(Set::terminal(true).body().unwrap(), "T");
        assert_eq!(Set::terminal(false).body().unwrap(), "F");
    }

    #[test]
    fn test_body_rejects_invariant_violation() {
        let s = Set::new(Vec::new());
        assert!(matches!(
            s.body(),
            Err(SolverError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_set_value_clears_clauses() {
        let mut s = set(&[&[1, 2]]);
        s.set_value(false);
        assert!(s.clauses.is_empty());
        assert_eq!(s.value, Some(false));
    }

    #[test]
    fn test_body_round_trips() {
        let s = set(&[&[1, 2], &[-1, 3]]);
        let parsed = Set::parse_body(&s.body().unwrap()).unwrap();
        assert_eq!(parsed.clauses, s.clauses);

        let t = Set::parse_body("T").unwrap();
        assert_eq!(t.value, Some(true));
    }

    #[test]
    fn test_parse_body_rejects_garbage() {
        assert!(Set::parse_body("").is_err());
        assert!(Set::parse_body("(1 | x)").is_err());
        assert!(Set::parse_body("1 | 2").is_err());
        assert!(Set::parse_body("(1 | 0)").is_err());
    }

    #[test]
    fn test_hash_depends_only_on_body() {
        let a = set(&[&[1, 2]]);
        let mut b = set(&[&[1, 2]]);
        b.mapping = vec![7, 3];
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());

        let c = set(&[&[1, 3]]);
        assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());
    }

    #[test]
    fn test_num_vars_counts_distinct_magnitudes() {
        let s = set(&[&[1, -2], &[2, 3]]);
        assert_eq!(s.num_vars(), 3);
    }

    #[test]
    fn test_hash_hex_round_trip() {
        let h = SetHash::of_body("T");
        let bytes = *h.as_bytes();
        assert_eq!(SetHash::from_bytes(bytes), h);
        assert_eq!(h.to_hex().len(), 64);
    }
}
