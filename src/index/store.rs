//! Durable secure index: `get`/`get_all`/`add`/`add_or_update`/`remove`/
//! `clear`/`flush`/`has_changes`, with delayed-write coalescing and the
//! intentionally inverted reader/writer lock described in §4.D and §9.
//!
//! **Locking.** The spec's source language lets "mutations take the read
//! lock, flush takes the write lock" mean something directly: the
//! in-memory map is mutated in place under a shared lock because the
//! scheduler guarantees disjoint keys across concurrent actions (§5).
//! Safe Rust cannot mutate shared data through a shared (`read`) guard,
//! so this is modeled with two pieces that together reproduce the same
//! behavior and the same *intent*:
//! - `gate: RwLock<()>` is held for its documented purpose only — a
//!   mutation takes `gate.read()`, a flush takes `gate.write()`. This is
//!   the lock the spec is talking about, and it has the same blocking
//!   behavior: many mutations proceed concurrently, a flush excludes all
//!   of them.
//! - `entries: Mutex<HashMap<String, IndexEntry>>` is the actual storage,
//!   locked only for the duration of one map operation (insert/remove),
//!   which is what makes concurrent mutation under a shared `gate` read
//!   guard memory-safe. This inner lock is not the lock the spec
//!   describes; it is the minimum extra synchronization Rust requires to
//!   express that lock's semantics without `unsafe`.
//!
//! Do not "fix" this by making mutations take `gate.write()` — that
//! would serialize all logical mutations behind each other, which is
//! exactly the regression §9 warns against.

use crate::error::{Result, SyncError};
use crate::index::entry::{EntryStatus, IndexEntry};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

const TABLE: &str = "files";

/// Default idle timer: reset on every mutation (§4.D).
pub const DEFAULT_IDLE_TIMER: Duration = Duration::from_secs(2);
/// Default max timer: not reset by mutations (§4.D).
pub const DEFAULT_MAX_TIMER: Duration = Duration::from_secs(5);

#[derive(Clone)]
enum PendingOp {
    AddOrUpdate(IndexEntry),
    Remove(String),
    Clear,
}

struct TimerState {
    idle_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
}

/// Durable, coalesced-write index. Cloning an `Arc<SecureIndex>` (via
/// [`SecureIndex::handle`]) is how the background flush thread and the
/// callers share ownership.
pub struct SecureIndex {
    path: PathBuf,
    conn: Mutex<Connection>,
    gate: RwLock<()>,
    entries: Mutex<HashMap<String, IndexEntry>>,
    pending: Mutex<Vec<PendingOp>>,
    sorted_cache: RwLock<Option<Vec<IndexEntry>>>,
    has_changes: AtomicBool,
    timers: Mutex<TimerState>,
    flush_now: Condvar,
    idle_timer: Duration,
    max_timer: Duration,
    shutdown: AtomicBool,
}

impl SecureIndex {
    /// Open (creating if absent) the index file at `path` and load its
    /// current contents into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        Self::open_with_timers(path, DEFAULT_IDLE_TIMER, DEFAULT_MAX_TIMER)
    }

    pub fn open_with_timers(
        path: impl AsRef<Path>,
        idle_timer: Duration,
        max_timer: Duration,
    ) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(SyncError::config(format!(
                "index path {} is a directory",
                path.display()
            )));
        }

        let conn = Connection::open(&path)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {TABLE} (
                    path TEXT PRIMARY KEY,
                    is_dir INTEGER NOT NULL,
                    size INTEGER NOT NULL,
                    mod_time INTEGER NOT NULL,
                    hash TEXT,
                    remote_id TEXT,
                    remote_name TEXT,
                    status TEXT NOT NULL
                )"
            ),
            [],
        )?;

        let entries = load_all(&conn)?;

        let index = Arc::new(Self {
            path,
            conn: Mutex::new(conn),
            gate: RwLock::new(()),
            entries: Mutex::new(entries),
            pending: Mutex::new(Vec::new()),
            sorted_cache: RwLock::new(None),
            has_changes: AtomicBool::new(false),
            timers: Mutex::new(TimerState {
                idle_deadline: None,
                max_deadline: None,
            }),
            flush_now: Condvar::new(),
            idle_timer,
            max_timer,
            shutdown: AtomicBool::new(false),
        });

        spawn_flush_thread(Arc::clone(&index));

        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// O(1) lookup; `None` if absent.
    pub fn get(&self, path: &str) -> Option<IndexEntry> {
        let _permit = self.gate.read().unwrap();
        self.entries.lock().unwrap().get(&key_for(path)).cloned()
    }

    /// Snapshot in case-insensitive path order (§4.D, §8 property 3).
    pub fn get_all(&self) -> Vec<IndexEntry> {
        {
            let cached = self.sorted_cache.read().unwrap();
            if let Some(sorted) = cached.as_ref() {
                return sorted.clone();
            }
        }
        let mut sorted: Vec<IndexEntry> = {
            let entries = self.entries.lock().unwrap();
            entries.values().cloned().collect()
        };
        sorted.sort();
        *self.sorted_cache.write().unwrap() = Some(sorted.clone());
        sorted
    }

    /// Fails if `path` already present.
    pub fn add(&self, entry: IndexEntry) -> Result<()> {
        let _permit = self.gate.read().unwrap();
        let key = key_for(&entry.path);
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(&key) {
                return Err(SyncError::index(format!(
                    "entry already exists: {}",
                    entry.path
                )));
            }
            entries.insert(key, entry.clone());
        }
        self.record_mutation(PendingOp::AddOrUpdate(entry));
        Ok(())
    }

    /// Insert or replace.
    pub fn add_or_update(&self, entry: IndexEntry) {
        let _permit = self.gate.read().unwrap();
        let key = key_for(&entry.path);
        self.entries.lock().unwrap().insert(key, entry.clone());
        self.record_mutation(PendingOp::AddOrUpdate(entry));
    }

    /// Idempotent.
    pub fn remove(&self, path: &str) {
        let _permit = self.gate.read().unwrap();
        let key = key_for(path);
        self.entries.lock().unwrap().remove(&key);
        self.record_mutation(PendingOp::Remove(key));
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let _permit = self.gate.read().unwrap();
        self.entries.lock().unwrap().clear();
        self.record_mutation(PendingOp::Clear);
    }

    /// `true` if any mutation has been recorded since open.
    pub fn has_changes(&self) -> bool {
        self.has_changes.load(Ordering::SeqCst)
    }

    /// Drain all pending mutations to the durable store immediately,
    /// bypassing both timers.
    pub fn flush(&self) -> Result<()> {
        self.flush_now.notify_all();
        self.flush_internal()
    }

    fn record_mutation(&self, op: PendingOp) {
        self.pending.lock().unwrap().push(op);
        *self.sorted_cache.write().unwrap() = None;
        self.has_changes.store(true, Ordering::SeqCst);

        let mut timers = self.timers.lock().unwrap();
        let now = Instant::now();
        timers.idle_deadline = Some(now + self.idle_timer);
        if timers.max_deadline.is_none() {
            timers.max_deadline = Some(now + self.max_timer);
        }
        self.flush_now.notify_all();
    }

    fn flush_internal(&self) -> Result<()> {
        let _exclusive = self.gate.write().unwrap();
        let pending: Vec<PendingOp> = std::mem::take(&mut *self.pending.lock().unwrap());
        if pending.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for op in pending {
            match op {
                PendingOp::AddOrUpdate(entry) => write_entry(&tx, &entry)?,
                PendingOp::Remove(key) => {
                    tx.execute(&format!("DELETE FROM {TABLE} WHERE path = ?1"), params![key])?;
                }
                PendingOp::Clear => {
                    tx.execute(&format!("DELETE FROM {TABLE}"), [])?;
                }
            }
        }
        tx.commit()?;

        let mut timers = self.timers.lock().unwrap();
        timers.idle_deadline = None;
        timers.max_deadline = None;
        Ok(())
    }

    fn shutdown_flush_thread(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.flush_now.notify_all();
    }
}

impl Drop for SecureIndex {
    fn drop(&mut self) {
        self.shutdown_flush_thread();
    }
}

fn key_for(path: &str) -> String {
    path.to_lowercase()
}

fn load_all(conn: &Connection) -> Result<HashMap<String, IndexEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT path, is_dir, size, mod_time, hash, remote_id, remote_name, status FROM {TABLE}"
    ))?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(7)?;
        Ok(IndexEntry {
            path: row.get(0)?,
            is_dir: row.get::<_, i64>(1)? != 0,
            size: row.get::<_, i64>(2)? as u64,
            mod_time: row.get(3)?,
            hash: row.get(4)?,
            remote_id: row.get(5)?,
            remote_name: row.get(6)?,
            status: if status == "uploading" {
                EntryStatus::Uploading
            } else {
                EntryStatus::Absent
            },
        })
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let entry = row?;
        map.insert(key_for(&entry.path), entry);
    }
    Ok(map)
}

fn write_entry(tx: &rusqlite::Transaction, entry: &IndexEntry) -> Result<()> {
    let status = match entry.status {
        EntryStatus::Uploading => "uploading",
        EntryStatus::Absent => "absent",
    };
    tx.execute(
        &format!(
            "INSERT INTO {TABLE} (path, is_dir, size, mod_time, hash, remote_id, remote_name, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                is_dir = excluded.is_dir,
                size = excluded.size,
                mod_time = excluded.mod_time,
                hash = excluded.hash,
                remote_id = excluded.remote_id,
                remote_name = excluded.remote_name,
                status = excluded.status"
        ),
        params![
            key_for(&entry.path),
            entry.is_dir as i64,
            entry.size as i64,
            entry.mod_time,
            entry.hash,
            entry.remote_id,
            entry.remote_name,
            status,
        ],
    )?;
    Ok(())
}

/// Upper bound on how long the flush thread ever sleeps with no pending
/// mutations, so it wakes up periodically to notice shutdown.
const IDLE_POLL: Duration = Duration::from_secs(60);

fn spawn_flush_thread(index: Arc<SecureIndex>) {
    std::thread::spawn(move || loop {
        let wait_for = {
            let timers = index.timers.lock().unwrap();
            let now = Instant::now();
            match (timers.idle_deadline, timers.max_deadline) {
                (None, None) => IDLE_POLL,
                (idle, max) => {
                    let deadline = match (idle, max) {
                        (Some(i), Some(m)) => i.min(m),
                        (Some(i), None) => i,
                        (None, Some(m)) => m,
                        (None, None) => unreachable!(),
                    };
                    deadline.saturating_duration_since(now)
                }
            }
        };

        let guard = index.timers.lock().unwrap();
        let _ = index.flush_now.wait_timeout(guard, wait_for).unwrap();

        if index.shutdown.load(Ordering::SeqCst) {
            let _ = index.flush_internal();
            return;
        }

        if should_flush_now(&index) {
            let _ = index.flush_internal();
        }
    });
}

fn should_flush_now(index: &SecureIndex) -> bool {
    let timers = index.timers.lock().unwrap();
    let now = Instant::now();
    matches!(timers.idle_deadline, Some(d) if d <= now)
        || matches!(timers.max_deadline, Some(d) if d <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_index() -> (Arc<SecureIndex>, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        (SecureIndex::open(&path).unwrap(), dir)
    }

    #[test]
    fn add_then_get_all_is_sorted_case_insensitively() {
        let (index, _dir) = open_index();
        index
            .add(IndexEntry::new_file(
                "Zebra.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        index
            .add(IndexEntry::new_file(
                "apple.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        let all = index.get_all();
        let paths: Vec<_> = all.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["apple.txt", "Zebra.txt"]);
    }

    #[test]
    fn add_rejects_duplicate_path() {
        let (index, _dir) = open_index();
        index
            .add(IndexEntry::new_file(
                "a.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        let err = index.add(IndexEntry::new_file(
            "a.txt",
            2,
            0,
            None,
            None,
            None,
            EntryStatus::Absent,
        ));
        assert!(err.is_err());
    }

    #[test]
    fn flush_then_reopen_round_trips_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let index = SecureIndex::open(&path).unwrap();
            index.add_or_update(IndexEntry::new_file(
                "a.txt",
                10,
                1000,
                Some("abc123".into()),
                Some("rid".into()),
                Some("rname".into()),
                EntryStatus::Absent,
            ));
            index.add_or_update(IndexEntry::new_dir("sub/", 2000));
            index.flush().unwrap();
            assert!(index.has_changes());
        }

        let reopened = SecureIndex::open(&path).unwrap();
        let all = reopened.get_all();
        assert_eq!(all.len(), 2);
        let a = reopened.get("a.txt").unwrap();
        assert_eq!(a.size, 10);
        assert_eq!(a.hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn remove_is_idempotent() {
        let (index, _dir) = open_index();
        index.remove("nonexistent.txt");
        index
            .add(IndexEntry::new_file(
                "a.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        index.remove("a.txt");
        index.remove("a.txt");
        assert!(index.get("a.txt").is_none());
    }

    #[test]
    fn clear_empties_the_index() {
        let (index, _dir) = open_index();
        index
            .add(IndexEntry::new_file(
                "a.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        index.clear();
        assert!(index.get_all().is_empty());
    }

    #[test]
    fn sorted_cache_is_invalidated_by_mutation() {
        let (index, _dir) = open_index();
        index
            .add(IndexEntry::new_file(
                "a.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        assert_eq!(index.get_all().len(), 1);
        index
            .add(IndexEntry::new_file(
                "b.txt",
                1,
                0,
                None,
                None,
                None,
                EntryStatus::Absent,
            ))
            .unwrap();
        assert_eq!(index.get_all().len(), 2);
    }
}
