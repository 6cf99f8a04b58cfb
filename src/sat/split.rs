#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Shannon expansion of a canonical set.
//!
//! The pivot is the magnitude of the first literal of the first clause. In
//! linear-order form that literal is the globally minimal variable of the
//! whole set and every clause is sorted, so testing only each clause's first
//! literal against the pivot is a complete case split. On non-canonical input
//! the same test silently mis-partitions, which is why the precondition is
//! enforced on every call instead of trusted.

use crate::sat::canonical::check_linear_order;
use crate::sat::clause::{var_of_lit, Clause, Variable};
use crate::sat::error::SolverError;
use crate::sat::set::Set;

/// The two children of a split, plus the pivot variable that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub pivot: Variable,
    /// Branch where the pivot is assigned true.
    pub left: Set,
    /// Branch where the pivot is assigned false.
    pub right: Set,
}

/// Splits a canonical set on its leading variable.
///
/// Returns `Ok(None)` for a set that is already terminal or has no clauses
/// at all; that is a normal leaf, not a failure.
///
/// # Errors
///
/// `PreconditionViolation` if the set is not in linear-order form, or if its
/// first clause is empty — the precondition is a first clause with at least
/// one literal, and an empty one must fail loudly rather than pass as
/// "nothing to split".
pub fn split(set: &Set) -> Result<Option<Split>, SolverError> {
    if set.is_terminal() {
        return Ok(None);
    }
    let Some(first_clause) = set.clauses.first() else {
        return Ok(None);
    };
    if first_clause.is_empty() {
        return Err(SolverError::PreconditionViolation(
            "split requires a first clause with at least one literal",
        ));
    }
    if !check_linear_order(set) {
        return Err(SolverError::PreconditionViolation(
            "split requires a set in linear-order form",
        ));
    }
    Ok(split_unchecked(set))
}

/// Splits on the leading literal without checking linear-order form.
///
/// The non-renaming modes (`lo` below the root, `lou`, `normal`) feed sorted
/// but non-contiguous sets through here. The partition still makes progress
/// at every call, since the first clause is always dropped or shortened, but
/// the linear-order guarantees do not hold and structural sharing suffers
/// accordingly.
#[must_use]
pub fn split_unchecked(set: &Set) -> Option<Split> {
    if set.is_terminal() {
        return None;
    }

    let first_lit = set.clauses.first().and_then(Clause::first)?;

    let pivot = var_of_lit(first_lit);
    #[allow(clippy::cast_possible_wrap)]
    let pivot_lit = pivot as i32;

    let mut left_clauses: Vec<Clause> = Vec::new();
    let mut right_clauses: Vec<Clause> = Vec::new();
    let mut left_forced_false = false;
    let mut right_forced_false = false;

    for clause in &set.clauses {
        // Canonical order guarantees the first literal is the only place the
        // pivot can occur in this clause.
        match clause.first() {
            Some(l) if l == pivot_lit => {
                // Satisfied on the true branch; shortened on the false one.
                let rest = Clause::new(clause.iter().skip(1).copied());
                if rest.is_empty() {
                    right_forced_false = true;
                } else {
                    right_clauses.push(rest);
                }
            }
            Some(l) if l == -pivot_lit => {
                let rest = Clause::new(clause.iter().skip(1).copied());
                if rest.is_empty() {
                    left_forced_false = true;
                } else {
                    left_clauses.push(rest);
                }
            }
            _ => {
                left_clauses.push(clause.clone());
                right_clauses.push(clause.clone());
            }
        }
    }

    let left = branch(left_clauses, left_forced_false);
    let right = branch(right_clauses, right_forced_false);

    Some(Split { pivot, left, right })
}

/// A branch with an emptied clause is `False` regardless of what else
/// survived; one with no clauses at all is the empty conjunction, `True`.
fn branch(clauses: Vec<Clause>, forced_false: bool) -> Set {
    if forced_false {
        Set::terminal(false)
    } else if clauses.is_empty() {
        Set::terminal(true)
    } else {
        Set::new(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::canonical::canonicalize;
    use crate::sat::clause::var_of_lit;

    fn canonical_set(clauses: &[&[i32]]) -> Set {
        let mut s = Set::new(clauses.iter().map(|c| Clause::from(*c)).collect());
        canonicalize(&mut s).unwrap();
        s
    }

    #[test]
    fn test_split_rejects_non_canonical_input() {
        let s = Set::new(vec![Clause::new([5, 9])]);
        assert!(matches!(
            split(&s),
            Err(SolverError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_split_terminal_and_empty_are_none() {
        assert_eq!(split(&Set::terminal(true)).unwrap(), None);
        assert_eq!(split(&Set::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn test_split_rejects_empty_first_clause() {
        // An empty clause is not "nothing to split"; the precondition is a
        // first clause with at least one literal.
        let s = Set::new(vec![Clause::new([]), Clause::new([1])]);
        assert!(matches!(
            split(&s),
            Err(SolverError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_split_drops_satisfied_clause_and_shortens_mirror() {
        // a|b & -a|c canonicalizes to (-1 | 2) & (1 | 3).
        let s = canonical_set(&[&[1, 2], &[-1, 3]]);
        assert_eq!(s.body().unwrap(), "(-1 | 2) & (1 | 3)");
        let result = split(&s).unwrap().unwrap();
        assert_eq!(result.pivot, 1);

        // pivot = true: (-1|2) loses its literal, (1|3) is satisfied.
        assert_eq!(result.left.clauses, vec![Clause::new([2])]);
        assert_eq!(result.left.value, None);

        // pivot = false: (-1|2) satisfied, (1|3) becomes (3).
        assert_eq!(result.right.clauses, vec![Clause::new([3])]);
        assert_eq!(result.right.value, None);
    }

    #[test]
    fn test_split_unit_clause_yields_terminals() {
        let s = canonical_set(&[&[1]]);
        let result = split(&s).unwrap().unwrap();
        assert_eq!(result.left.value, Some(true));
        assert_eq!(result.right.value, Some(false));
    }

    #[test]
    fn test_emptied_clause_forces_false_over_survivors() {
        // (-1) & (1 | 2): true branch empties (-1) and is False even though
        // (1 | 2) would survive into it.
        let s = canonical_set(&[&[-1], &[1, 2]]);
        let result = split(&s).unwrap().unwrap();
        assert_eq!(result.left.value, Some(false));
        assert!(result.left.clauses.is_empty());
        // False branch: (-1) satisfied, (1|2) loses the pivot.
        assert_eq!(result.right.clauses, vec![Clause::new([2])]);
    }

    #[test]
    fn test_untouched_clauses_copied_to_both_branches() {
        let s = canonical_set(&[&[1, 2], &[2, 3]]);
        let result = split(&s).unwrap().unwrap();
        assert!(result.left.clauses.contains(&Clause::new([2, 3])));
        assert!(result.right.clauses.contains(&Clause::new([2, 3])));
    }

    #[test]
    fn test_neither_child_references_the_pivot() {
        let s = canonical_set(&[&[1, 2], &[-1, 3], &[2, 3]]);
        let result = split(&s).unwrap().unwrap();
        for child in [&result.left, &result.right] {
            for clause in &child.clauses {
                assert!(clause.iter().all(|&l| var_of_lit(l) != result.pivot));
            }
        }
    }

    #[test]
    fn test_children_allocate_their_own_containers() {
        let s = canonical_set(&[&[1, 2], &[2, 3]]);
        let mut result = split(&s).unwrap().unwrap();
        result.left.clauses.clear();
        assert_eq!(result.right.clauses.len(), 2);
        assert_eq!(s.clauses.len(), 2);
    }

    #[test]
    fn test_unchecked_split_handles_non_contiguous_ids() {
        // Sorted but never renamed, so the checked entry point refuses it.
        let s = Set::new(vec![Clause::new([4, 9]), Clause::new([-4, 7])]);
        assert!(split(&s).is_err());

        let result = split_unchecked(&s).unwrap();
        assert_eq!(result.pivot, 4);
        assert_eq!(result.left.clauses, vec![Clause::new([7])]);
        assert_eq!(result.right.clauses, vec![Clause::new([9])]);
    }

    #[test]
    fn test_split_covers_all_assignments() {
        // Exhaustively check: every assignment satisfies the parent iff it
        // satisfies the child for its pivot polarity.
        let s = canonical_set(&[&[1, 2], &[-1, 3], &[-2, -3]]);
        let result = split(&s).unwrap().unwrap();

        let eval = |set: &Set, assignment: &[bool]| -> bool {
            set.value.unwrap_or_else(|| {
                set.clauses.iter().all(|c| {
                    c.iter().any(|&l| {
                        let v = assignment[var_of_lit(l) as usize - 1];
                        if l > 0 {
                            v
                        } else {
                            !v
                        }
                    })
                })
            })
        };

        for bits in 0..8u8 {
            let assignment: Vec<bool> = (0..3).map(|i| bits & (1 << i) != 0).collect();
            let parent = eval(&s, &assignment);
            let child = if assignment[result.pivot as usize - 1] {
                eval(&result.left, &assignment)
            } else {
                eval(&result.right, &assignment)
            };
            assert_eq!(parent, child, "assignment {assignment:?}");
        }
    }
}
