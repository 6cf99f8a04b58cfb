#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Linear-order (LO) canonicalization.
//!
//! A set is in LO form when:
//! 1. literals within each clause are ascending by variable magnitude,
//! 2. the clauses themselves are in ascending lexicographic order,
//! 3. scanning clauses in that order, every variable encountered is either
//!    already seen or is the smallest unseen variable at that point (new
//!    variables never introduce a gap relative to what has been seen), and
//! 4. the minimum variable id across the set equals [`MIN_VARIABLE`].
//!
//! Two structurally identical formulas in LO form have identical bodies and
//! therefore identical content hashes, regardless of how their variables were
//! originally named. The split operation is only correct on LO input.

use crate::sat::clause::{var_of_lit, Clause, Variable};
use crate::sat::config::Mode;
use crate::sat::error::SolverError;
use crate::sat::set::Set;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// Variable ids are renamed to start from this baseline.
pub const MIN_VARIABLE: Variable = 1;

/// Sorts the literals of every clause ascending by magnitude.
pub fn sort_within_clauses(set: &mut Set) {
    for clause in &mut set.clauses {
        clause.sort();
    }
}

/// Sorts the clauses into the canonical lexicographic order.
pub fn sort_clauses(set: &mut Set) {
    set.clauses.sort();
}

/// Renames variables to consecutive ids starting at [`MIN_VARIABLE`], in
/// first-occurrence order over the current clause order. Signs are preserved.
/// The mapping (original id per new id) is recorded on the set, replacing any
/// previous one.
pub fn rename_variables(set: &mut Set) {
    let mut next: Variable = MIN_VARIABLE;
    let mut names: FxHashMap<Variable, Variable> = FxHashMap::default();
    let mut mapping: Vec<Variable> = Vec::new();

    for clause in &mut set.clauses {
        for lit in clause.iter_mut() {
            let old = var_of_lit(*lit);
            let new = *names.entry(old).or_insert_with(|| {
                let id = next;
                next += 1;
                mapping.push(old);
                id
            });
            #[allow(clippy::cast_possible_wrap)]
            let renamed = new as i32;
            *lit = if *lit < 0 { -renamed } else { renamed };
        }
    }

    set.mapping = mapping;
}

/// Non-mutating LO check over the set as it currently stands. All four
/// conditions, including the two orderings.
#[must_use]
pub fn check_linear_order(set: &Set) -> bool {
    if !set.clauses.iter().all(Clause::is_sorted) {
        return false;
    }

    if !set.clauses.windows(2).all(|w| w[0] <= w[1]) {
        return false;
    }

    let mut seen: FxHashSet<Variable> = FxHashSet::default();
    let mut next_unseen = MIN_VARIABLE;

    for clause in &set.clauses {
        for &lit in clause.iter() {
            let var = var_of_lit(lit);
            if seen.contains(&var) {
                continue;
            }
            // A new variable must be exactly the smallest id not yet seen.
            if var != next_unseen {
                return false;
            }
            seen.insert(var);
            next_unseen += 1;
        }
    }

    true
}

/// Applies the two sort steps, then checks the LO conditions. Mutates only
/// through the sorts.
pub fn is_canonical(set: &mut Set) -> bool {
    sort_within_clauses(set);
    sort_clauses(set);
    check_linear_order(set)
}

/// Brings the set to LO form by alternating renaming and re-sorting until the
/// LO conditions hold.
///
/// Each non-canonical iteration renames into a strictly smaller, contiguous
/// id space, so convergence is guaranteed for finite clause sets; the bound
/// exists to turn a broken invariant into a loud failure instead of a hang.
///
/// # Errors
///
/// `CanonicalizationDivergence` if the fixed point is not reached within the
/// bound.
pub fn canonicalize(set: &mut Set) -> Result<(), SolverError> {
    if set.is_terminal() {
        return Ok(());
    }

    let bound = set.num_vars() + 8;
    let mut iterations = 0;

    while !is_canonical(set) {
        iterations += 1;
        if iterations > bound {
            return Err(SolverError::CanonicalizationDivergence { iterations });
        }
        trace!(iteration = iterations, "renaming variables");
        rename_variables(set);
    }

    if iterations > 0 {
        debug!(iterations, clauses = set.num_clauses(), "canonicalized set");
    }
    Ok(())
}

/// Applies the normalization the configured mode asks for at this tree level.
///
/// `flo` brings every node to LO form; `flo+` additionally orders clauses
/// shortest-first before the first renaming pass, so unit clauses drive the
/// id assignment; `lo` canonicalizes the root only and leaves the rest at
/// LOU; `lou` applies the two sorts without renaming; `normal` only sorts
/// literals within clauses.
///
/// # Errors
///
/// Propagates `CanonicalizationDivergence` from [`canonicalize`].
pub fn normalize(set: &mut Set, mode: Mode, is_root: bool) -> Result<(), SolverError> {
    match mode {
        Mode::Flo => canonicalize(set),
        Mode::FloPlus => {
            set.clauses.sort_by(|a, b| {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            });
            rename_variables(set);
            canonicalize(set)
        }
        Mode::Lo => {
            if is_root {
                canonicalize(set)
            } else {
                sort_within_clauses(set);
                sort_clauses(set);
                Ok(())
            }
        }
        Mode::Lou => {
            sort_within_clauses(set);
            sort_clauses(set);
            Ok(())
        }
        Mode::Normal => {
            sort_within_clauses(set);
            Ok(())
        }
    }
}
