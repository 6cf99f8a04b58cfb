#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Content-addressed persistence for canonical sets.
//!
//! The store memoizes canonical node bodies keyed by content hash and tracks
//! subgraph statistics per record. It is the only shared mutable resource in
//! a run: workers coordinate exclusively through it, and its at-most-once
//! insert per hash ("first successful writer wins") is the sole cross-worker
//! ordering primitive.
//!
//! Two implementations share these traits: [`sqlite::SqliteStore`], the
//! transactional backing store, and [`memory::MemoryStore`], the in-memory
//! stub used by tests and store-less runs.

pub mod memory;
pub mod sqlite;

use crate::sat::clause::Variable;
use crate::sat::error::StoreError;
use crate::sat::set::SetHash;

/// Outcome of an insert attempt.
///
/// `AlreadyExists` is an expected, frequent and countable outcome — it is
/// how structural sharing manifests — and is deliberately not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Payload of a first-time insert.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub hash: SetHash,
    pub body: &'a str,
    pub cid1: Option<SetHash>,
    pub cid2: Option<SetHash>,
    /// Ordered by new id: `mapping[i - 1]` is the original variable renamed
    /// to `i`.
    pub mapping: &'a [Variable],
    pub num_clauses: usize,
    pub num_vars: usize,
}

/// A fully materialized store record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRecord {
    pub hash: SetHash,
    pub body: String,
    pub cid1: Option<SetHash>,
    pub cid2: Option<SetHash>,
    pub mapping: Vec<Variable>,
    pub num_clauses: usize,
    pub num_vars: usize,
    /// Unique nodes in this record's subgraph. `0` marks a pending record;
    /// `> 0` marks a solved one.
    pub unique_nodes: u64,
    /// Redundant nodes encountered in this record's subgraph.
    pub redundant_nodes: u64,
    /// Redundant hits accumulated in this record's subgraph.
    pub redundant_hits: u64,
    /// How many times this exact canonical form was independently
    /// rediscovered across the whole traversal.
    pub redundant_times: u64,
    /// Unix seconds.
    pub created_at: i64,
}

/// Summary row returned by [`SetStore::load_solved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolvedSummary {
    pub hash: SetHash,
    pub unique_nodes: u64,
    pub redundant_nodes: u64,
}

/// The global set store contract. All operations are scoped to the namespace
/// the implementation was created with.
pub trait SetStore: Send + Sync {
    /// Indexed point lookup.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn exists(&self, hash: &SetHash) -> Result<bool, StoreError>;

    /// Inserts a record at most once per hash. Concurrent duplicate inserts
    /// are safe: exactly one caller observes `Inserted`, the rest observe
    /// `AlreadyExists`.
    ///
    /// # Errors
    ///
    /// `StoreError` on genuine backend failure only; a duplicate hash is an
    /// `Ok(AlreadyExists)`.
    fn insert(&self, record: &NewRecord<'_>) -> Result<InsertOutcome, StoreError>;

    /// Writes the subgraph statistics of a completed record. Returns `false`
    /// if the hash is not present.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn update_stats(
        &self,
        hash: &SetHash,
        unique_nodes: u64,
        redundant_nodes: u64,
        redundant_hits: u64,
    ) -> Result<bool, StoreError>;

    /// Atomically adds `delta` to the record's rediscovery counter. Returns
    /// `false` if the hash is not present. The increment happens inside the
    /// store, never as a read-modify-write in the caller.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn bump_redundant(&self, hash: &SetHash, delta: u64) -> Result<bool, StoreError>;

    /// Solved records (`unique_nodes > 0`) with at most `max_clauses`
    /// clauses.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn load_solved(&self, max_clauses: usize) -> Result<Vec<SolvedSummary>, StoreError>;

    /// Pending records (`unique_nodes == 0`) with at most `max_clauses`
    /// clauses.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn load_unsolved(&self, max_clauses: usize) -> Result<Vec<SetHash>, StoreError>;

    /// The full record for a hash.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the hash is absent.
    fn record(&self, hash: &SetHash) -> Result<SetRecord, StoreError>;

    /// The two child hashes of a record.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the hash is absent.
    fn children(&self, hash: &SetHash) -> Result<(Option<SetHash>, Option<SetHash>), StoreError>;

    /// The canonical body of a record.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the hash is absent.
    fn body(&self, hash: &SetHash) -> Result<String, StoreError>;
}

/// Transient per-run frontier persistence: a FIFO of serialized node bodies
/// addressed by sequential id, living outside process memory so a traversal
/// can be resumed or distributed. The whole queue is dropped at run end.
pub trait FrontierStore: Send + Sync {
    /// Persists a frontier record under a sequential id.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn enqueue(&self, id: u64, body: &str) -> Result<(), StoreError>;

    /// Consumes the record with the given id, if present.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn dequeue(&self, id: u64) -> Result<Option<String>, StoreError>;

    /// Drops the whole queue. Called once at run end.
    ///
    /// # Errors
    ///
    /// `StoreError` on backend failure.
    fn destroy(&self) -> Result<(), StoreError>;
}
