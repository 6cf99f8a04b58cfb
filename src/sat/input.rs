#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Input readers for the two supported text forms.
//!
//! Line format: `a|b|c&d|e|f` — `|` separates literals of a clause, `&`
//! separates clauses, a leading `-` negates. Names are mapped to integer ids
//! in first-occurrence order.
//!
//! DIMACS CNF: a `p cnf <vars> <clauses>` header followed by clauses of
//! whitespace-separated literals, each terminated by `0`. Unlike permissive
//! parsers, the header here is validated against the body: a declared count
//! that disagrees with the clauses that follow is malformed input and fails
//! before any solving starts.
//!
//! Both readers normalize as they go: literals are sorted within each clause,
//! duplicate literals and duplicate clauses are dropped, and tautological
//! clauses (`x | -x`) are removed since they cannot constrain any branch.

use crate::sat::clause::{Clause, Literal};
use crate::sat::error::SolverError;
use crate::sat::set::Set;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::BufRead;

/// Parses the single-line form `a|b|c&d|e|f`.
///
/// # Errors
///
/// `MalformedInput` on empty clauses, empty names or a bare `-`.
pub fn parse_line_format(input: &str) -> Result<Set, SolverError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SolverError::MalformedInput("empty input".to_string()));
    }

    let mut ids: FxHashMap<String, Literal> = FxHashMap::default();
    let mut next_id: Literal = 1;
    let mut clauses: Vec<Clause> = Vec::new();

    for clause_text in input.split('&') {
        let mut clause = Clause::default();
        for token in clause_text.split('|') {
            let token = token.trim();
            let (negated, name) = match token.strip_prefix('-') {
                Some(rest) => (true, rest.trim()),
                None => (false, token),
            };
            if name.is_empty() {
                return Err(SolverError::MalformedInput(format!(
                    "empty variable name in clause {clause_text:?}"
                )));
            }

            let id = *ids.entry(name.to_string()).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            clause.literals.push(if negated { -id } else { id });
        }

        if clause.is_empty() {
            return Err(SolverError::MalformedInput(format!(
                "empty clause in input: {clause_text:?}"
            )));
        }
        clauses.push(clause);
    }

    Ok(normalized_set(clauses))
}

/// Parses DIMACS CNF from a buffered reader, validating the header.
///
/// # Errors
///
/// `MalformedInput` on read failures, non-integer literal tokens, a missing
/// header, or declared counts that disagree with the body.
pub fn parse_dimacs<R: BufRead>(reader: R) -> Result<Set, SolverError> {
    let mut declared: Option<(u32, usize)> = None;
    let mut clauses: Vec<Clause> = Vec::new();
    let mut current = Clause::default();

    'lines: for line in reader.lines() {
        let line = line
            .map_err(|e| SolverError::MalformedInput(format!("failed to read line: {e}")))?;
        let mut parts = line.split_whitespace().peekable();

        match parts.peek() {
            None | Some(&"c") => continue,
            Some(&"%") => break,
            Some(&"p") => {
                let tokens = parts.collect_vec();
                declared = Some(parse_header(&tokens)?);
                continue;
            }
            Some(_) => {}
        }

        if declared.is_none() {
            return Err(SolverError::MalformedInput(
                "clause data before the 'p cnf' header".to_string(),
            ));
        }

        for token in parts {
            if token == "%" {
                break 'lines;
            }
            let lit: Literal = token.parse().map_err(|_| {
                SolverError::MalformedInput(format!("invalid literal token: {token:?}"))
            })?;
            if lit == 0 {
                // Clause terminator. An immediately empty clause is the
                // always-false clause; keep it so the root evaluates to F.
                clauses.push(std::mem::take(&mut current));
            } else {
                current.literals.push(lit);
            }
        }
    }

    if !current.is_empty() {
        return Err(SolverError::MalformedInput(
            "last clause is not terminated by 0".to_string(),
        ));
    }

    let Some((num_vars, num_clauses)) = declared else {
        return Err(SolverError::MalformedInput(
            "missing 'p cnf' header".to_string(),
        ));
    };

    if clauses.len() != num_clauses {
        return Err(SolverError::MalformedInput(format!(
            "header declares {num_clauses} clauses but body has {}",
            clauses.len()
        )));
    }

    let max_var = clauses
        .iter()
        .flat_map(Clause::iter)
        .map(|l| l.unsigned_abs())
        .max()
        .unwrap_or(0);
    if max_var > num_vars {
        return Err(SolverError::MalformedInput(format!(
            "header declares {num_vars} variables but body uses variable {max_var}"
        )));
    }

    if clauses.iter().any(Clause::is_empty) {
        // An explicit empty clause makes the whole formula false.
        return Ok(Set::terminal(false));
    }

    Ok(normalized_set(clauses))
}

/// Parses a DIMACS CNF file from a path.
///
/// # Errors
///
/// `MalformedInput` if the file cannot be opened, plus everything
/// [`parse_dimacs`] rejects.
pub fn parse_dimacs_file(path: &std::path::Path) -> Result<Set, SolverError> {
    let file = std::fs::File::open(path).map_err(|e| {
        SolverError::MalformedInput(format!("cannot open {}: {e}", path.display()))
    })?;
    parse_dimacs(std::io::BufReader::new(file))
}

fn parse_header(tokens: &[&str]) -> Result<(u32, usize), SolverError> {
    match tokens {
        ["p", "cnf", vars, clauses] => {
            let num_vars: u32 = vars.parse().map_err(|_| {
                SolverError::MalformedInput(format!("invalid variable count: {vars:?}"))
            })?;
            let num_clauses: usize = clauses.parse().map_err(|_| {
                SolverError::MalformedInput(format!("invalid clause count: {clauses:?}"))
            })?;
            Ok((num_vars, num_clauses))
        }
        _ => Err(SolverError::MalformedInput(format!(
            "invalid problem line: {}",
            tokens.join(" ")
        ))),
    }
}

/// Sorts literals within each clause, drops duplicate literals, tautologies
/// and duplicate clauses. First-occurrence clause order is preserved.
fn normalized_set(clauses: Vec<Clause>) -> Set {
    let mut seen: FxHashSet<Vec<Literal>> = FxHashSet::default();
    let mut out: Vec<Clause> = Vec::new();

    for mut clause in clauses {
        clause.sort();
        clause.literals.dedup();
        if clause.is_tautology() {
            continue;
        }
        if seen.insert(clause.literals.to_vec()) {
            out.push(clause);
        }
    }

    // Every clause was a tautology: the conjunction is vacuously true.
    if out.is_empty() {
        return Set::terminal(true);
    }

    Set::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_format_first_occurrence_ids() {
        let set = parse_line_format("a|b&-a|c").unwrap();
        assert_eq!(set.clauses.len(), 2);
        assert_eq!(set.clauses[0].literals.as_slice(), &[1, 2]);
        assert_eq!(set.clauses[1].literals.as_slice(), &[-1, 3]);
    }

    #[test]
    fn test_line_format_repeated_name_keeps_id() {
        let set = parse_line_format("x|y&y|x").unwrap();
        // Second clause sorts to (1 | 2) and is deduplicated away.
        assert_eq!(set.clauses.len(), 1);
        assert_eq!(set.clauses[0].literals.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_line_format_drops_tautology() {
        let set = parse_line_format("a|-a").unwrap();
        assert_eq!(set.value, Some(true));
    }

    #[test]
    fn test_line_format_rejects_empty_name() {
        assert!(parse_line_format("a|&b").is_err());
        assert!(parse_line_format("-|b").is_err());
        assert!(parse_line_format("").is_err());
    }

    #[test]
    fn test_dimacs_simple() {
        let input = "c comment\np cnf 3 2\n1 -2 0\n2 3 0\n";
        let set = parse_dimacs(Cursor::new(input)).unwrap();
        assert_eq!(set.clauses.len(), 2);
        assert_eq!(set.clauses[0].literals.as_slice(), &[1, -2]);
        assert_eq!(set.clauses[1].literals.as_slice(), &[2, 3]);
    }

    #[test]
    fn test_dimacs_clause_spanning_lines() {
        let input = "p cnf 3 1\n1 2\n3 0\n";
        let set = parse_dimacs(Cursor::new(input)).unwrap();
        assert_eq!(set.clauses.len(), 1);
        assert_eq!(set.clauses[0].literals.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_dimacs_end_marker() {
        let input = "p cnf 2 2\n1 0\n-2 0\n%\nignored";
        let set = parse_dimacs(Cursor::new(input)).unwrap();
        assert_eq!(set.clauses.len(), 2);
    }

    #[test]
    fn test_dimacs_missing_header() {
        let input = "1 2 0\n";
        assert!(matches!(
            parse_dimacs(Cursor::new(input)),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_dimacs_clause_count_mismatch() {
        let input = "p cnf 2 3\n1 0\n-2 0\n";
        let err = parse_dimacs(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("clauses"));
    }

    #[test]
    fn test_dimacs_variable_count_mismatch() {
        let input = "p cnf 2 1\n1 5 0\n";
        let err = parse_dimacs(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("variable"));
    }

    #[test]
    fn test_dimacs_unterminated_clause() {
        let input = "p cnf 2 1\n1 2\n";
        assert!(parse_dimacs(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_dimacs_bad_literal() {
        let input = "p cnf 2 1\n1 abc 0\n";
        assert!(matches!(
            parse_dimacs(Cursor::new(input)),
            Err(SolverError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_dimacs_empty_clause_is_false() {
        let input = "p cnf 1 1\n0\n";
        let set = parse_dimacs(Cursor::new(input)).unwrap();
        assert_eq!(set.value, Some(false));
    }
}
