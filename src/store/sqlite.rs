#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! SQLite-backed implementation of the set store and the frontier queue.
//!
//! The schema mirrors the global sets relation: hash as primary key over the
//! canonical body, nullable child hashes, the rename mapping, size counters
//! and the four redundancy statistics, with secondary indexes on the columns
//! the load queries filter on. The PRIMARY KEY constraint is what makes
//! concurrent duplicate inserts safe: the first writer wins and every other
//! writer observes a constraint violation, which is translated into
//! [`InsertOutcome::AlreadyExists`].

use crate::sat::clause::Variable;
use crate::sat::error::StoreError;
use crate::sat::set::SetHash;
use crate::store::{FrontierStore, InsertOutcome, NewRecord, SetRecord, SetStore, SolvedSummary};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Validates a namespace before it is spliced into SQL as an identifier.
fn check_namespace(namespace: &str) -> Result<(), StoreError> {
    let ok = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::Unavailable(format!(
            "invalid namespace: {namespace:?}"
        )))
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn encode_mapping(mapping: &[Variable]) -> Vec<u8> {
    mapping.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_mapping(blob: &[u8]) -> Vec<Variable> {
    blob.chunks_exact(4)
        .map(|chunk| Variable::from_le_bytes(chunk.try_into().expect("chunk of 4")))
        .collect()
}

fn decode_hash(blob: &[u8]) -> Result<SetHash, StoreError> {
    let bytes: [u8; 32] = blob
        .try_into()
        .map_err(|_| StoreError::Unavailable(format!("corrupt hash of {} bytes", blob.len())))?;
    Ok(SetHash::from_bytes(bytes))
}

fn is_duplicate(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// The transactional global set store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path`, scoped to the given namespace.
    ///
    /// # Errors
    ///
    /// `StoreError` if the database cannot be opened or the schema created.
    pub fn open(path: impl AsRef<Path>, namespace: &str) -> Result<Self, StoreError> {
        check_namespace(namespace)?;
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace)
    }

    /// An in-memory store for tests.
    ///
    /// # Errors
    ///
    /// `StoreError` if the schema cannot be created.
    pub fn in_memory(namespace: &str) -> Result<Self, StoreError> {
        check_namespace(namespace)?;
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            table: format!("sets_{namespace}"),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let t = &self.table;
        self.conn.lock().execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {t} (
                hash BLOB PRIMARY KEY,
                body TEXT NOT NULL,
                cid1 BLOB,
                cid2 BLOB,
                mapping BLOB NOT NULL,
                num_of_clauses INTEGER NOT NULL DEFAULT 0,
                num_of_vars INTEGER NOT NULL DEFAULT 0,
                unique_nodes INTEGER NOT NULL DEFAULT 0,
                redundant_nodes INTEGER NOT NULL DEFAULT 0,
                redundant_hits INTEGER NOT NULL DEFAULT 0,
                redundant_times INTEGER NOT NULL DEFAULT 0,
                date_created INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{t}_num_clauses ON {t} (num_of_clauses);
            CREATE INDEX IF NOT EXISTS idx_{t}_num_vars ON {t} (num_of_vars);
            CREATE INDEX IF NOT EXISTS idx_{t}_date_created ON {t} (date_created);
            CREATE INDEX IF NOT EXISTS idx_{t}_unique_nodes ON {t} (unique_nodes);
            CREATE INDEX IF NOT EXISTS idx_{t}_redundant_times ON {t} (redundant_times);
            "
        ))?;
        info!(table = %self.table, "set store schema initialized");
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            hash: row.get(0)?,
            body: row.get(1)?,
            cid1: row.get(2)?,
            cid2: row.get(3)?,
            mapping: row.get(4)?,
            num_clauses: row.get(5)?,
            num_vars: row.get(6)?,
            unique_nodes: row.get(7)?,
            redundant_nodes: row.get(8)?,
            redundant_hits: row.get(9)?,
            redundant_times: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

/// Column values before blob decoding.
struct RawRecord {
    hash: Vec<u8>,
    body: String,
    cid1: Option<Vec<u8>>,
    cid2: Option<Vec<u8>>,
    mapping: Vec<u8>,
    num_clauses: i64,
    num_vars: i64,
    unique_nodes: i64,
    redundant_nodes: i64,
    redundant_hits: i64,
    redundant_times: i64,
    created_at: i64,
}

impl RawRecord {
    fn decode(self) -> Result<SetRecord, StoreError> {
        #[allow(clippy::cast_sign_loss)]
        Ok(SetRecord {
            hash: decode_hash(&self.hash)?,
            body: self.body,
            cid1: self.cid1.as_deref().map(decode_hash).transpose()?,
            cid2: self.cid2.as_deref().map(decode_hash).transpose()?,
            mapping: decode_mapping(&self.mapping),
            num_clauses: self.num_clauses as usize,
            num_vars: self.num_vars as usize,
            unique_nodes: self.unique_nodes as u64,
            redundant_nodes: self.redundant_nodes as u64,
            redundant_hits: self.redundant_hits as u64,
            redundant_times: self.redundant_times as u64,
            created_at: self.created_at,
        })
    }
}

impl SetStore for SqliteStore {
    fn exists(&self, hash: &SetHash) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE hash = ?1 LIMIT 1", self.table),
                [hash.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&self, record: &NewRecord<'_>) -> Result<InsertOutcome, StoreError> {
        let result = self.conn.lock().execute(
            &format!(
                "INSERT INTO {}
                 (hash, body, cid1, cid2, mapping, num_of_clauses, num_of_vars, date_created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                self.table
            ),
            params![
                record.hash.as_bytes().as_slice(),
                record.body,
                record.cid1.as_ref().map(|h| h.as_bytes().to_vec()),
                record.cid2.as_ref().map(|h| h.as_bytes().to_vec()),
                encode_mapping(record.mapping),
                record.num_clauses as i64,
                record.num_vars as i64,
                unix_now(),
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate(&e) => {
                debug!(hash = %record.hash.short(), "set already in global store");
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_stats(
        &self,
        hash: &SetHash,
        unique_nodes: u64,
        redundant_nodes: u64,
        redundant_hits: u64,
    ) -> Result<bool, StoreError> {
        let changed = self.conn.lock().execute(
            &format!(
                "UPDATE {} SET unique_nodes = ?1, redundant_nodes = ?2, redundant_hits = ?3
                 WHERE hash = ?4",
                self.table
            ),
            params![
                i64::try_from(unique_nodes).unwrap_or(i64::MAX),
                i64::try_from(redundant_nodes).unwrap_or(i64::MAX),
                i64::try_from(redundant_hits).unwrap_or(i64::MAX),
                hash.as_bytes().as_slice(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn bump_redundant(&self, hash: &SetHash, delta: u64) -> Result<bool, StoreError> {
        // The increment runs inside the engine, so concurrent bumps never
        // lose updates.
        let changed = self.conn.lock().execute(
            &format!(
                "UPDATE {} SET redundant_times = redundant_times + ?1 WHERE hash = ?2",
                self.table
            ),
            params![
                i64::try_from(delta).unwrap_or(i64::MAX),
                hash.as_bytes().as_slice()
            ],
        )?;
        Ok(changed > 0)
    }

    fn load_solved(&self, max_clauses: usize) -> Result<Vec<SolvedSummary>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT hash, unique_nodes, redundant_nodes FROM {}
             WHERE num_of_clauses <= ?1 AND unique_nodes > 0",
            self.table
        ))?;
        let rows = stmt
            .query_map([max_clauses as i64], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(hash, unique, redundant)| {
                #[allow(clippy::cast_sign_loss)]
                Ok(SolvedSummary {
                    hash: decode_hash(&hash)?,
                    unique_nodes: unique as u64,
                    redundant_nodes: redundant as u64,
                })
            })
            .collect()
    }

    fn load_unsolved(&self, max_clauses: usize) -> Result<Vec<SetHash>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT hash FROM {} WHERE num_of_clauses <= ?1 AND unique_nodes = 0",
            self.table
        ))?;
        let rows = stmt
            .query_map([max_clauses as i64], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter().map(|blob| decode_hash(blob)).collect()
    }

    fn record(&self, hash: &SetHash) -> Result<SetRecord, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE hash = ?1", self.table),
                [hash.as_bytes().as_slice()],
                Self::row_to_record,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(hash.to_hex()))?;
        raw.decode()
    }

    fn children(&self, hash: &SetHash) -> Result<(Option<SetHash>, Option<SetHash>), StoreError> {
        let conn = self.conn.lock();
        let row: Option<(Option<Vec<u8>>, Option<Vec<u8>>)> = conn
            .query_row(
                &format!("SELECT cid1, cid2 FROM {} WHERE hash = ?1", self.table),
                [hash.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (cid1, cid2) = row.ok_or_else(|| StoreError::NotFound(hash.to_hex()))?;
        Ok((
            cid1.as_deref().map(decode_hash).transpose()?,
            cid2.as_deref().map(decode_hash).transpose()?,
        ))
    }

    fn body(&self, hash: &SetHash) -> Result<String, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT body FROM {} WHERE hash = ?1", self.table),
            [hash.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(hash.to_hex()))
    }
}

/// The per-run frontier queue, one table per run, dropped at run end.
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteFrontier {
    /// Creates the frontier table for a run.
    ///
    /// # Errors
    ///
    /// `StoreError` if the database cannot be opened or the table created.
    pub fn create(path: impl AsRef<Path>, namespace: &str) -> Result<Self, StoreError> {
        check_namespace(namespace)?;
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace)
    }

    /// An in-memory frontier for tests.
    ///
    /// # Errors
    ///
    /// `StoreError` if the table cannot be created.
    pub fn in_memory(namespace: &str) -> Result<Self, StoreError> {
        check_namespace(namespace)?;
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> Result<Self, StoreError> {
        let frontier = Self {
            conn: Mutex::new(conn),
            table: format!("frontier_{namespace}"),
        };
        frontier.conn.lock().execute_batch(&format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
            frontier.table
        ))?;
        Ok(frontier)
    }
}

impl FrontierStore for SqliteFrontier {
    fn enqueue(&self, id: u64, body: &str) -> Result<(), StoreError> {
        self.conn.lock().execute(
            &format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", self.table),
            params![i64::try_from(id).unwrap_or(i64::MAX), body],
        )?;
        Ok(())
    }

    fn dequeue(&self, id: u64) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock();
        let id = i64::try_from(id).unwrap_or(i64::MAX);
        let body: Option<String> = conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1", self.table),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        if body.is_some() {
            conn.execute(&format!("DELETE FROM {} WHERE id = ?1", self.table), [id])?;
        }
        Ok(body)
    }

    fn destroy(&self) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", self.table))?;
        Ok(())
    }
}
