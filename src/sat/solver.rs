#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The pattern solver: a worker pool driving the canonicalize → split →
//! store-lookup loop over a shared frontier.
//!
//! Workers share nothing in memory except the frontier queue and a handful
//! of counters; deduplication is coordinated entirely through the store's
//! at-most-once insert. A node whose canonical hash is already stored is a
//! redundant rediscovery: its counter is bumped and its subtree is not
//! expanded again, which is where the structural sharing pays off.
//!
//! Satisfiability falls out of the traversal: every explored node was derived
//! from the root by splits, so any `True` leaf proves the root satisfiable.
//! Pruning at a stored hash must not swallow that contribution, so a hit on a
//! record written by an earlier run is resolved by walking the stored
//! subgraph for a reachable `T` leaf; only then does a completed traversal
//! without a solution prove the root unsatisfiable.

use crate::sat::canonical::normalize;
use crate::sat::config::{Mode, SolverConfig};
use crate::sat::error::{SolverError, StoreError};
use crate::sat::set::{Set, SetHash};
use crate::sat::split::{split, split_unchecked, Split};
use crate::store::{FrontierStore, InsertOutcome, NewRecord, SetStore};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// What a finished (or aborted) run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Canonical hash of the root node, the run's problem id.
    pub root_hash: SetHash,
    pub satisfiable: bool,
    /// Nodes inserted for the first time during this run.
    pub unique_nodes: u64,
    /// Distinct canonical nodes rediscovered at least once during this run.
    pub redundant_nodes: u64,
    /// Total rediscovery events; `k` occurrences of a node yield `k - 1`.
    pub redundant_hits: u64,
    /// True when the run stopped at the first solution instead of walking
    /// the whole tree.
    pub stopped_early: bool,
}

/// The work queue of nodes awaiting expansion, optionally written through to
/// a per-run frontier store so the queue itself never has to fit in memory.
enum Frontier {
    Memory(VecDeque<Set>),
    Stored {
        backend: Arc<dyn FrontierStore>,
        ids: VecDeque<u64>,
        next_id: u64,
    },
}

impl Frontier {
    fn push(&mut self, set: Set) -> Result<(), SolverError> {
        match self {
            Self::Memory(queue) => {
                queue.push_back(set);
                Ok(())
            }
            Self::Stored {
                backend,
                ids,
                next_id,
            } => {
                let body = set.body()?;
                backend.enqueue(*next_id, &body)?;
                ids.push_back(*next_id);
                *next_id += 1;
                Ok(())
            }
        }
    }

    fn pop(&mut self) -> Result<Option<Set>, SolverError> {
        match self {
            Self::Memory(queue) => Ok(queue.pop_front()),
            Self::Stored { backend, ids, .. } => {
                let Some(id) = ids.pop_front() else {
                    return Ok(None);
                };
                let body = backend.dequeue(id)?.ok_or_else(|| {
                    SolverError::PreconditionViolation("frontier record vanished before dequeue")
                })?;
                Set::parse_body(&body).map(Some)
            }
        }
    }
}

/// State shared by all workers of one run.
struct Shared {
    store: Arc<dyn SetStore>,
    frontier: Mutex<Frontier>,
    mode: Mode,
    exit_on_solution: bool,
    /// Nodes popped but not yet fully expanded; the run is over when this is
    /// zero and the frontier is empty.
    in_flight: AtomicUsize,
    stop: AtomicBool,
    found_true: AtomicBool,
    unique: AtomicU64,
    hits: AtomicU64,
    rediscovered: Mutex<FxHashSet<SetHash>>,
    /// Hashes this run inserted itself. A hit on one of these is covered by
    /// the inserting worker's own walk; a hit on anything else came from an
    /// earlier run and its truth must be recovered from the store.
    inserted: Mutex<FxHashSet<SetHash>>,
    failure: Mutex<Option<SolverError>>,
}

impl Shared {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn fail(&self, err: SolverError) {
        warn!(error = %err, "worker failed, stopping run");
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.stop.store(true, Ordering::Release);
    }
}

/// Drives a full run over one root formula.
pub struct PatternSolver {
    config: SolverConfig,
    store: Arc<dyn SetStore>,
    frontier: Option<Arc<dyn FrontierStore>>,
}

impl PatternSolver {
    #[must_use]
    pub fn new(config: SolverConfig, store: Arc<dyn SetStore>) -> Self {
        Self {
            config,
            store,
            frontier: None,
        }
    }

    /// Attaches a per-run frontier store; the queue is written through to it
    /// and destroyed when the run ends.
    #[must_use]
    pub fn with_frontier(mut self, frontier: Arc<dyn FrontierStore>) -> Self {
        self.frontier = Some(frontier);
        self
    }

    /// Solves one root formula to completion (or to the first solution when
    /// so configured) and records the run totals on the root's store record.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization and store failures; the frontier store, if
    /// attached, is destroyed even on the failure path.
    pub fn solve(&self, mut root: Set) -> Result<RunReport, SolverError> {
        let started = Instant::now();
        normalize(&mut root, self.config.mode, true)?;
        let root_hash = root.content_hash()?;

        let threads = self.config.effective_threads();
        info!(
            root = %root_hash.short(),
            mode = %self.config.mode,
            threads,
            clauses = root.num_clauses(),
            vars = root.num_vars(),
            "starting run"
        );

        let queue = match &self.frontier {
            Some(backend) => Frontier::Stored {
                backend: Arc::clone(backend),
                ids: VecDeque::new(),
                next_id: 1,
            },
            None => Frontier::Memory(VecDeque::new()),
        };

        let shared = Arc::new(Shared {
            store: Arc::clone(&self.store),
            frontier: Mutex::new(queue),
            mode: self.config.mode,
            exit_on_solution: self.config.exit_on_solution,
            in_flight: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            found_true: AtomicBool::new(false),
            unique: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            rediscovered: Mutex::new(FxHashSet::default()),
            inserted: Mutex::new(FxHashSet::default()),
            failure: Mutex::new(None),
        });

        shared.frontier.lock().push(root)?;

        if threads <= 1 {
            worker_loop(&shared);
        } else {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let shared = Arc::clone(&shared);
                    std::thread::spawn(move || worker_loop(&shared))
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    shared.fail(SolverError::PreconditionViolation("worker panicked"));
                }
            }
        }

        let destroy_result = match &self.frontier {
            Some(backend) => backend.destroy().map_err(SolverError::from),
            None => Ok(()),
        };

        if let Some(err) = shared.failure.lock().take() {
            return Err(err);
        }
        destroy_result?;

        let unique = shared.unique.load(Ordering::Acquire);
        let hits = shared.hits.load(Ordering::Acquire);
        let redundant = shared.rediscovered.lock().len() as u64;
        let satisfiable = shared.found_true.load(Ordering::Acquire);
        let stopped_early = shared.stopped();

        // A run that inserted nothing rediscovered a previously solved root;
        // its existing record keeps the original totals.
        if unique > 0 {
            self.store.update_stats(&root_hash, unique, redundant, hits)?;
        }

        let report = RunReport {
            root_hash,
            satisfiable,
            unique_nodes: unique,
            redundant_nodes: redundant,
            redundant_hits: hits,
            stopped_early,
        };
        info!(
            root = %root_hash.short(),
            satisfiable,
            unique,
            redundant,
            hits,
            elapsed_ms = elapsed_millis(started.elapsed()),
            "run finished"
        );
        Ok(report)
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// One worker: pop, expand, push children, until the frontier drains or the
/// run is stopped.
fn worker_loop(shared: &Shared) {
    loop {
        if shared.stopped() {
            break;
        }

        let node = {
            let mut frontier = shared.frontier.lock();
            match frontier.pop() {
                Ok(Some(node)) => {
                    shared.in_flight.fetch_add(1, Ordering::AcqRel);
                    Some(node)
                }
                Ok(None) => None,
                Err(err) => {
                    shared.fail(err);
                    break;
                }
            }
        };

        let Some(node) = node else {
            // Empty frontier: the run is over only once no peer still holds
            // a node that could push more work.
            if shared.in_flight.load(Ordering::Acquire) == 0 {
                break;
            }
            std::thread::yield_now();
            continue;
        };

        match expand(shared, node) {
            Ok(children) => {
                // A stopped run discards pending children instead of paying
                // for more frontier round-trips.
                if !shared.stopped() {
                    let mut frontier = shared.frontier.lock();
                    for child in children {
                        if let Err(err) = frontier.push(child) {
                            shared.fail(err);
                            break;
                        }
                    }
                }
            }
            Err(err) => shared.fail(err),
        }
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Expands one already-normalized node: dedup against the store, split if it
/// was new, and hand back the children to enqueue.
fn expand(shared: &Shared, node: Set) -> Result<Vec<Set>, SolverError> {
    let hash = node.content_hash()?;

    if let Some(value) = node.value {
        if value {
            shared.found_true.store(true, Ordering::Release);
        }
        record_node(shared, &node, hash, None, None)?;
        if value && shared.exit_on_solution {
            debug!(leaf = %hash.short(), "solution found, stopping run");
            shared.stop.store(true, Ordering::Release);
        }
        return Ok(Vec::new());
    }

    if shared.stopped() {
        return Ok(Vec::new());
    }
    if shared.store.exists(&hash)? {
        count_rediscovery(shared, hash)?;
        return match stored_outcome(shared, &hash)? {
            Some(true) => {
                shared.found_true.store(true, Ordering::Release);
                if shared.exit_on_solution {
                    debug!(node = %hash.short(), "stored subtree is satisfiable, stopping run");
                    shared.stop.store(true, Ordering::Release);
                }
                Ok(Vec::new())
            }
            Some(false) => Ok(Vec::new()),
            // Unknown outcome: either a peer inserted this hash during the
            // current run and its in-flight walk covers the subtree, or an
            // earlier aborted run left the subtree dangling and it must be
            // walked again to recover its truth contribution.
            None => {
                if shared.stopped() || shared.inserted.lock().contains(&hash) {
                    Ok(Vec::new())
                } else {
                    expand_children(shared, &node)
                }
            }
        };
    }

    let children = expand_children(shared, &node)?;
    let cid1 = children[0].content_hash()?;
    let cid2 = children[1].content_hash()?;

    match record_node(shared, &node, hash, Some(cid1), Some(cid2))? {
        InsertOutcome::Inserted => Ok(children),
        // Lost the race to a concurrent worker; its expansion covers this
        // subtree.
        InsertOutcome::AlreadyExists => Ok(Vec::new()),
    }
}

/// Splits a non-terminal node and hands back its two normalized children.
fn expand_children(shared: &Shared, node: &Set) -> Result<Vec<Set>, SolverError> {
    let parts = match shared.mode {
        Mode::Flo | Mode::FloPlus => split(node)?,
        Mode::Lo | Mode::Lou | Mode::Normal => split_unchecked(node),
    };
    let Some(Split {
        pivot,
        mut left,
        mut right,
    }) = parts
    else {
        // A node with neither a value nor a splittable clause violates the
        // node invariant; parsing and splitting never produce one.
        return Err(SolverError::PreconditionViolation(
            "unsplittable node without a value",
        ));
    };
    trace!(pivot, "expanded node");

    normalize(&mut left, shared.mode, false)?;
    normalize(&mut right, shared.mode, false)?;
    Ok(vec![left, right])
}

/// Resolves the satisfiability of a subtree already in the store: `Some(true)`
/// when a stored `T` leaf is reachable from `root`, `Some(false)` when the
/// stored subgraph is complete without one, `None` when part of it is missing
/// (a record still pending or left behind by an aborted run).
fn stored_outcome(shared: &Shared, root: &SetHash) -> Result<Option<bool>, SolverError> {
    let mut stack = vec![*root];
    let mut visited = FxHashSet::default();

    while let Some(hash) = stack.pop() {
        if shared.stopped() {
            return Ok(None);
        }
        if !visited.insert(hash) {
            continue;
        }
        let record = match shared.store.record(&hash) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match record.body.as_str() {
            "T" => return Ok(Some(true)),
            "F" => {}
            _ => match (record.cid1, record.cid2) {
                (Some(left), Some(right)) => {
                    stack.push(left);
                    stack.push(right);
                }
                _ => return Ok(None),
            },
        }
    }
    Ok(Some(false))
}

/// Inserts a node, counting it as unique or as a rediscovery.
fn record_node(
    shared: &Shared,
    node: &Set,
    hash: SetHash,
    cid1: Option<SetHash>,
    cid2: Option<SetHash>,
) -> Result<InsertOutcome, SolverError> {
    if shared.stopped() {
        return Ok(InsertOutcome::AlreadyExists);
    }

    // Registered before the insert so a peer that already sees the row in
    // the store also sees it as this run's work. Terminal records may
    // pre-date the run, but terminals never reach the pruning path that
    // consults this set.
    shared.inserted.lock().insert(hash);

    let body = node.body()?;
    let outcome = shared.store.insert(&NewRecord {
        hash,
        body: &body,
        cid1,
        cid2,
        mapping: &node.mapping,
        num_clauses: node.num_clauses(),
        num_vars: node.num_vars(),
    })?;

    match outcome {
        InsertOutcome::Inserted => {
            shared.unique.fetch_add(1, Ordering::AcqRel);
        }
        InsertOutcome::AlreadyExists => count_rediscovery(shared, hash)?,
    }
    Ok(outcome)
}

fn count_rediscovery(shared: &Shared, hash: SetHash) -> Result<(), SolverError> {
    // A stopped run no longer needs redundancy bookkeeping; skip the store
    // round-trip.
    if shared.stopped() {
        return Ok(());
    }
    shared.hits.fetch_add(1, Ordering::AcqRel);
    shared.rediscovered.lock().insert(hash);
    shared.store.bump_redundant(&hash, 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::input::parse_line_format;
    use crate::store::memory::{MemoryFrontier, MemoryStore};
    use crate::store::SetStore;

    fn solve(input: &str, config: SolverConfig) -> (RunReport, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let solver = PatternSolver::new(config, store.clone() as Arc<dyn SetStore>);
        let report = solver.solve(parse_line_format(input).unwrap()).unwrap();
        (report, store)
    }

    #[test]
    fn test_two_clause_formula_is_satisfiable() {
        let (report, store) = solve("a|b&-a|c", SolverConfig::default());
        assert!(report.satisfiable);
        assert!(!report.stopped_early);
        assert!(report.unique_nodes > 0);

        // Run totals land on the root record.
        let root = store.record(&report.root_hash).unwrap();
        assert_eq!(root.unique_nodes, report.unique_nodes);
        assert_eq!(root.redundant_nodes, report.redundant_nodes);
        assert_eq!(root.body, "(-1 | 2) & (1 | 3)");
    }

    #[test]
    fn test_contradiction_is_unsatisfiable() {
        let (report, _) = solve("a&-a", SolverConfig::default());
        assert!(!report.satisfiable);
        // Root, one F leaf; the second F branch is a rediscovery.
        assert_eq!(report.unique_nodes, 2);
        assert_eq!(report.redundant_nodes, 1);
        assert_eq!(report.redundant_hits, 1);
    }

    #[test]
    fn test_rediscovered_node_bumped_once_per_extra_occurrence() {
        // Both branches of the root reduce to the same canonical child, so
        // the child occurs twice and is bumped exactly once.
        let (report, store) = solve("a|b&-a|b", SolverConfig::default());
        assert!(report.satisfiable);

        let (cid1, cid2) = store.children(&report.root_hash).unwrap();
        assert_eq!(cid1, cid2);
        let child = store.record(&cid1.unwrap()).unwrap();
        assert_eq!(child.body, "(1)");
        assert_eq!(child.redundant_times, 1);
    }

    #[test]
    fn test_exit_on_solution_stops_before_full_walk() {
        let config = SolverConfig {
            exit_on_solution: true,
            ..SolverConfig::default()
        };
        let (report, _) = solve("a", config);
        assert!(report.satisfiable);
        assert!(report.stopped_early);
        // Root and the T leaf; the F branch is never expanded.
        assert_eq!(report.unique_nodes, 2);
    }

    #[test]
    fn test_multi_threaded_run_matches_single_threaded_counts() {
        let input = "a|b|c&-a|d&-b|-d&c|d&-c|a";
        let (sequential, _) = solve(input, SolverConfig::default());
        let (parallel, _) = solve(
            input,
            SolverConfig {
                threads: 4,
                ..SolverConfig::default()
            },
        );

        assert_eq!(parallel.satisfiable, sequential.satisfiable);
        // Unique nodes are the distinct canonical forms of the tree, which
        // no interleaving can change.
        assert_eq!(parallel.unique_nodes, sequential.unique_nodes);
        assert_eq!(parallel.redundant_hits, sequential.redundant_hits);
    }

    #[test]
    fn test_non_renaming_mode_completes() {
        let config = SolverConfig {
            mode: Mode::Lou,
            ..SolverConfig::default()
        };
        let (report, _) = solve("a|b&-a|c", config);
        assert!(report.satisfiable);
    }

    #[test]
    fn test_canonical_mode_shares_more_than_plain_evaluation() {
        // Structurally identical subtrees under different variable names
        // only merge when renaming is on.
        let input = "a|b&c|d&-a|-b&-c|-d";
        let (canonical, _) = solve(input, SolverConfig::default());
        let (plain, _) = solve(
            input,
            SolverConfig {
                mode: Mode::Normal,
                ..SolverConfig::default()
            },
        );
        assert_eq!(canonical.satisfiable, plain.satisfiable);
        assert!(canonical.unique_nodes <= plain.unique_nodes);
    }

    #[test]
    fn test_terminal_root_reports_immediately() {
        let store = Arc::new(MemoryStore::new());
        let solver = PatternSolver::new(SolverConfig::default(), store as Arc<dyn SetStore>);
        let report = solver.solve(Set::terminal(true)).unwrap();
        assert!(report.satisfiable);
        assert_eq!(report.unique_nodes, 1);

        let solver2 = PatternSolver::new(
            SolverConfig::default(),
            Arc::new(MemoryStore::new()) as Arc<dyn SetStore>,
        );
        let report = solver2.solve(Set::terminal(false)).unwrap();
        assert!(!report.satisfiable);
    }

    #[test]
    fn test_frontier_store_round_trip_and_teardown() {
        let store = Arc::new(MemoryStore::new());
        let frontier = Arc::new(MemoryFrontier::new());
        let solver = PatternSolver::new(SolverConfig::default(), store as Arc<dyn SetStore>)
            .with_frontier(frontier.clone() as Arc<dyn FrontierStore>);

        let report = solver
            .solve(parse_line_format("a|b&-a|c").unwrap())
            .unwrap();
        assert!(report.satisfiable);
        // The per-run queue is gone once the run ends.
        assert!(frontier.enqueue(99, "T").is_err());
    }

    #[test]
    fn test_rerun_against_same_store_is_fully_redundant() {
        let store = Arc::new(MemoryStore::new());
        let solver = PatternSolver::new(
            SolverConfig::default(),
            store.clone() as Arc<dyn SetStore>,
        );

        let first = solver.solve(parse_line_format("a|b&-a|c").unwrap()).unwrap();
        let second = solver.solve(parse_line_format("a|b&-a|c").unwrap()).unwrap();

        // Pruning at the solved root keeps its truth contribution.
        assert!(first.satisfiable);
        assert!(second.satisfiable);
        assert_eq!(second.unique_nodes, 0);
        assert_eq!(second.redundant_nodes, 1);
        assert_eq!(store.len() as u64, first.unique_nodes);

        // The rediscovering run does not clobber the solved root's totals.
        let root = store.record(&first.root_hash).unwrap();
        assert_eq!(root.unique_nodes, first.unique_nodes);
    }

    #[test]
    fn test_shared_canonical_root_keeps_truth_across_problems() {
        // x|y and p|q rename to the same canonical root, so the second
        // problem is answered entirely from the store.
        let store = Arc::new(MemoryStore::new());
        let solver = PatternSolver::new(
            SolverConfig::default(),
            store.clone() as Arc<dyn SetStore>,
        );

        let first = solver.solve(parse_line_format("x|y").unwrap()).unwrap();
        let second = solver.solve(parse_line_format("p|q").unwrap()).unwrap();

        assert_eq!(first.root_hash, second.root_hash);
        assert!(first.satisfiable);
        assert!(second.satisfiable);
        assert_eq!(second.unique_nodes, 0);
        assert_eq!(second.redundant_nodes, 1);
    }

    #[test]
    fn test_warm_store_rerun_stays_unsatisfiable() {
        let store = Arc::new(MemoryStore::new());
        let solver = PatternSolver::new(
            SolverConfig::default(),
            store.clone() as Arc<dyn SetStore>,
        );

        let first = solver.solve(parse_line_format("a&-a").unwrap()).unwrap();
        let second = solver.solve(parse_line_format("a&-a").unwrap()).unwrap();

        assert!(!first.satisfiable);
        assert!(!second.satisfiable);
        assert_eq!(second.unique_nodes, 0);
    }

    #[test]
    fn test_stopped_run_skips_redundancy_bookkeeping() {
        let shared = Shared {
            store: Arc::new(MemoryStore::new()) as Arc<dyn SetStore>,
            frontier: Mutex::new(Frontier::Memory(VecDeque::new())),
            mode: Mode::Flo,
            exit_on_solution: true,
            in_flight: AtomicUsize::new(0),
            stop: AtomicBool::new(true),
            found_true: AtomicBool::new(false),
            unique: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            rediscovered: Mutex::new(FxHashSet::default()),
            inserted: Mutex::new(FxHashSet::default()),
            failure: Mutex::new(None),
        };

        count_rediscovery(&shared, SetHash::of_body("T")).unwrap();
        assert_eq!(shared.hits.load(Ordering::Acquire), 0);
        assert!(shared.rediscovered.lock().is_empty());
    }
}
