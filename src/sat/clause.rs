#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Clauses as ordered sequences of signed integer literals.
//!
//! A literal is a nonzero `i32`: the magnitude is the variable id, the sign
//! the polarity. A clause is the disjunction of its literals. Clauses sort
//! ascending by literal magnitude (sign preserved) and compare
//! lexicographically over their literal sequence, which gives the solver a
//! deterministic clause order to canonicalize against.

use core::cmp::Ordering;
use core::ops::{Index, IndexMut};
use smallvec::SmallVec;
use std::fmt;

/// A propositional literal. Never zero.
pub type Literal = i32;

/// A variable id, the magnitude of a literal.
pub type Variable = u32;

/// Inline storage for clause literals. Most clauses in practice are short.
pub type LiteralVec = SmallVec<[Literal; 8]>;

/// The variable a literal refers to.
#[inline]
#[must_use]
pub const fn var_of_lit(l: Literal) -> Variable {
    l.unsigned_abs()
}

/// A disjunction of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Clause {
    pub literals: LiteralVec,
}

impl Clause {
    #[must_use]
    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            literals: literals.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.len() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Literal> {
        self.literals.iter_mut()
    }

    /// The first literal, if any. Canonical form guarantees this is the
    /// smallest-magnitude literal of the clause.
    #[must_use]
    pub fn first(&self) -> Option<Literal> {
        self.literals.first().copied()
    }

    /// Sorts literals ascending by variable magnitude. Stable, so a positive
    /// and a negative literal of the same variable keep their relative order.
    pub fn sort(&mut self) {
        self.literals.sort_by_key(|l| var_of_lit(*l));
    }

    /// Whether literals are already in ascending magnitude order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.literals
            .windows(2)
            .all(|w| var_of_lit(w[0]) <= var_of_lit(w[1]))
    }

    /// True if the clause contains both `v` and `-v` for some variable.
    #[must_use]
    pub fn is_tautology(&self) -> bool {
        self.literals.iter().any(|&l| self.literals.contains(&-l))
    }
}

impl PartialOrd for Clause {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Clause {
    /// Lexicographic over the literal sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        self.literals.cmp(&other.literals)
    }
}

impl Index<usize> for Clause {
    type Output = Literal;

    fn index(&self, index: usize) -> &Self::Output {
        &self.literals[index]
    }
}

impl IndexMut<usize> for Clause {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.literals[index]
    }
}

impl From<Vec<Literal>> for Clause {
    fn from(literals: Vec<Literal>) -> Self {
        Self::new(literals)
    }
}

impl From<&[Literal]> for Clause {
    fn from(literals: &[Literal]) -> Self {
        Self::new(literals.iter().copied())
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, l) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{l}")?;
        }
        write!(f, ")")
    }
}
