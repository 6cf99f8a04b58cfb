#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! In-memory store implementations.
//!
//! Same outcome semantics as the SQLite backend, backed by a mutex-guarded
//! map. Used by tests and by runs that opt out of persistence.

use crate::sat::set::SetHash;
use crate::sat::error::StoreError;
use crate::store::{FrontierStore, InsertOutcome, NewRecord, SetRecord, SetStore, SolvedSummary};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Non-persistent set store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<FxHashMap<SetHash, SetRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Test hook.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl SetStore for MemoryStore {
    fn exists(&self, hash: &SetHash) -> Result<bool, StoreError> {
        Ok(self.records.lock().contains_key(hash))
    }

    fn insert(&self, record: &NewRecord<'_>) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.hash) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.insert(
            record.hash,
            SetRecord {
                hash: record.hash,
                body: record.body.to_string(),
                cid1: record.cid1,
                cid2: record.cid2,
                mapping: record.mapping.to_vec(),
                num_clauses: record.num_clauses,
                num_vars: record.num_vars,
                unique_nodes: 0,
                redundant_nodes: 0,
                redundant_hits: 0,
                redundant_times: 0,
                created_at: unix_now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    fn update_stats(
        &self,
        hash: &SetHash,
        unique_nodes: u64,
        redundant_nodes: u64,
        redundant_hits: u64,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(hash) else {
            return Ok(false);
        };
        record.unique_nodes = unique_nodes;
        record.redundant_nodes = redundant_nodes;
        record.redundant_hits = redundant_hits;
        Ok(true)
    }

    fn bump_redundant(&self, hash: &SetHash, delta: u64) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(hash) else {
            return Ok(false);
        };
        record.redundant_times += delta;
        Ok(true)
    }

    fn load_solved(&self, max_clauses: usize) -> Result<Vec<SolvedSummary>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.num_clauses <= max_clauses && r.unique_nodes > 0)
            .map(|r| SolvedSummary {
                hash: r.hash,
                unique_nodes: r.unique_nodes,
                redundant_nodes: r.redundant_nodes,
            })
            .collect())
    }

    fn load_unsolved(&self, max_clauses: usize) -> Result<Vec<SetHash>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.num_clauses <= max_clauses && r.unique_nodes == 0)
            .map(|r| r.hash)
            .collect())
    }

    fn record(&self, hash: &SetHash) -> Result<SetRecord, StoreError> {
        self.records
            .lock()
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.to_hex()))
    }

    fn children(&self, hash: &SetHash) -> Result<(Option<SetHash>, Option<SetHash>), StoreError> {
        let records = self.records.lock();
        let record = records
            .get(hash)
            .ok_or_else(|| StoreError::NotFound(hash.to_hex()))?;
        Ok((record.cid1, record.cid2))
    }

    fn body(&self, hash: &SetHash) -> Result<String, StoreError> {
        let records = self.records.lock();
        records
            .get(hash)
            .map(|r| r.body.clone())
            .ok_or_else(|| StoreError::NotFound(hash.to_hex()))
    }
}

/// Non-persistent frontier queue.
#[derive(Default)]
pub struct MemoryFrontier {
    state: Mutex<FrontierState>,
}

#[derive(Default)]
struct FrontierState {
    queue: BTreeMap<u64, String>,
    destroyed: bool,
}

impl MemoryFrontier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrontierStore for MemoryFrontier {
    fn enqueue(&self, id: u64, body: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(StoreError::Unavailable("frontier destroyed".to_string()));
        }
        state.queue.insert(id, body.to_string());
        Ok(())
    }

    fn dequeue(&self, id: u64) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(StoreError::Unavailable("frontier destroyed".to_string()));
        }
        Ok(state.queue.remove(&id))
    }

    fn destroy(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.queue.clear();
        state.destroyed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record<'a>(hash: &'a SetHash, body: &'a str) -> NewRecord<'a> {
        NewRecord {
            hash: *hash,
            body,
            cid1: None,
            cid2: None,
            mapping: &[],
            num_clauses: 1,
            num_vars: 1,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        let hash = SetHash::of_body("(1 | 2)");
        assert_eq!(
            store.insert(&record(&hash, "(1 | 2)")).unwrap(),
            InsertOutcome::Inserted
        );
        assert!(store.exists(&hash).unwrap());
        assert_eq!(store.body(&hash).unwrap(), "(1 | 2)");
    }

    #[test]
    fn test_duplicate_insert_keeps_first_payload() {
        let store = MemoryStore::new();
        let hash = SetHash::of_body("x");
        store.insert(&record(&hash, "first")).unwrap();
        assert_eq!(
            store.insert(&record(&hash, "second")).unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert_eq!(store.body(&hash).unwrap(), "first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_bump_and_stats() {
        let store = MemoryStore::new();
        let hash = SetHash::of_body("x");
        store.insert(&record(&hash, "x")).unwrap();

        assert!(store.bump_redundant(&hash, 1).unwrap());
        assert!(store.bump_redundant(&hash, 1).unwrap());
        assert!(store.update_stats(&hash, 3, 1, 2).unwrap());

        let rec = store.record(&hash).unwrap();
        assert_eq!(rec.redundant_times, 2);
        assert_eq!(rec.unique_nodes, 3);
        assert_eq!(rec.redundant_nodes, 1);
        assert_eq!(rec.redundant_hits, 2);
    }

    #[test]
    fn test_missing_hash_is_not_found() {
        let store = MemoryStore::new();
        let hash = SetHash::of_body("missing");
        assert!(matches!(store.record(&hash), Err(StoreError::NotFound(_))));
        assert!(!store.bump_redundant(&hash, 1).unwrap());
        assert!(!store.update_stats(&hash, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let hash = SetHash::of_body("contended");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(&record(&hash, "body")).unwrap())
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == InsertOutcome::Inserted)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_solved_unsolved_partition() {
        let store = MemoryStore::new();
        let solved = SetHash::of_body("solved");
        let pending = SetHash::of_body("pending");
        store.insert(&record(&solved, "solved")).unwrap();
        store.insert(&record(&pending, "pending")).unwrap();
        store.update_stats(&solved, 2, 0, 0).unwrap();

        let solved_rows = store.load_solved(10).unwrap();
        assert_eq!(solved_rows.len(), 1);
        assert_eq!(solved_rows[0].hash, solved);
        assert_eq!(store.load_unsolved(10).unwrap(), vec![pending]);
    }

    #[test]
    fn test_frontier_consumes_once_and_destroys() {
        let frontier = MemoryFrontier::new();
        frontier.enqueue(1, "(1 | 2)").unwrap();
        assert_eq!(frontier.dequeue(1).unwrap().as_deref(), Some("(1 | 2)"));
        assert_eq!(frontier.dequeue(1).unwrap(), None);

        frontier.destroy().unwrap();
        assert!(frontier.enqueue(2, "T").is_err());
    }
}
