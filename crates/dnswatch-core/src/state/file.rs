// # File Store
//
// File-backed implementation of Store with crash recovery.
//
// ## Purpose
//
// Persists monitoring state across daemon restarts so a restart does not
// reset dampening clocks or replay first-seen passes.
//
// ## Durability model
//
// Two slot files (`<path>.a` / `<path>.b`) are written alternately. Each
// slot carries a generation counter and a checksum of its payload, so a
// slot proves its own integrity instead of the loader guessing at
// corruption. A torn or interrupted write can only damage the slot being
// replaced; the other slot still holds the last committed generation.
//
// On load, both slots are read, slots failing the checksum are ignored,
// and the highest surviving generation wins. With no valid slot the
// store starts empty.
//
// ## Slot format
//
// ```json
// {
//   "version": "1.0",
//   "generation": 7,
//   "checksum": "a1b2c3d4e5f60718",
//   "payload": "{\"dns:example.com:ips\":{\"value\":\"1.2.3.4\",\"expires_at\":null}}"
// }
// ```
//
// The checksum covers the exact payload string, sidestepping any
// serialization-order questions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tokio::sync::RwLock;

use crate::traits::store::Store;
use crate::Error;

/// Slot format version
const SLOT_VERSION: &str = "1.0";

/// Suffixes of the two alternating slot files
const SLOT_SUFFIXES: [&str; 2] = ["a", "b"];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct FileEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// One self-validating slot on disk
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SlotFile {
    version: String,
    generation: u64,
    /// FNV-1a 64 of `payload`, lowercase hex
    checksum: String,
    /// The entry map, serialized as its own JSON document
    payload: String,
}

#[derive(Debug)]
struct FileState {
    entries: HashMap<String, FileEntry>,
    /// Generation of the last committed slot
    generation: u64,
    /// Index into `SLOT_SUFFIXES` for the next write
    write_to: usize,
    dirty: bool,
}

/// 64-bit FNV-1a over the payload bytes.
///
/// The goal is torn-write detection, not tamper resistance, so a small
/// dependency-free hash is enough.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// File-backed store with dual-slot crash recovery
///
/// Every write commits a full snapshot to the slot not holding the
/// current state. Expired entries read as absent and are dropped on the
/// next write.
#[derive(Debug)]
pub struct FileStore {
    base: PathBuf,
    state: Arc<RwLock<FileState>>,
}

impl FileStore {
    /// Open a file store rooted at `path`.
    ///
    /// The slot files live at `<path>.a` and `<path>.b`; parent
    /// directories are created as needed. A slot that is missing, does
    /// not parse, or fails its checksum is skipped; the newest
    /// surviving generation becomes the working state.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let base = path.as_ref().to_path_buf();

        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "cannot create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut best: Option<(u64, HashMap<String, FileEntry>, usize)> = None;
        for (idx, _) in SLOT_SUFFIXES.iter().enumerate() {
            let slot_path = Self::slot_path(&base, idx);
            if let Some((generation, entries)) = Self::read_slot(&slot_path).await {
                tracing::debug!(
                    slot = %slot_path.display(),
                    generation,
                    entries = entries.len(),
                    "state slot is valid"
                );
                if best.as_ref().is_none_or(|(g, _, _)| generation > *g) {
                    best = Some((generation, entries, idx));
                }
            }
        }

        let (generation, entries, write_to) = match best {
            Some((generation, entries, idx)) => {
                tracing::info!(generation, entries = entries.len(), "state loaded");
                // Overwrite the stale slot first, never the one just loaded
                (generation, entries, 1 - idx)
            }
            None => {
                tracing::info!("no valid state slot, starting empty");
                (0, HashMap::new(), 0)
            }
        };

        Ok(Self {
            base,
            state: Arc::new(RwLock::new(FileState {
                entries,
                generation,
                write_to,
                dirty: false,
            })),
        })
    }

    fn slot_path(base: &Path, idx: usize) -> PathBuf {
        PathBuf::from(format!("{}.{}", base.display(), SLOT_SUFFIXES[idx]))
    }

    /// Read and verify one slot. Any defect disqualifies the slot; the
    /// generation race is settled by the caller.
    async fn read_slot(path: &Path) -> Option<(u64, HashMap<String, FileEntry>)> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(slot = %path.display(), error = %e, "state slot unreadable, skipping");
                return None;
            }
        };

        let slot: SlotFile = match serde_json::from_str(&raw) {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(slot = %path.display(), error = %e, "state slot unparseable, skipping");
                return None;
            }
        };

        if slot.version != SLOT_VERSION {
            tracing::warn!(
                slot = %path.display(),
                version = %slot.version,
                "unexpected slot version, reading anyway"
            );
        }

        let computed = format!("{:016x}", fnv1a64(slot.payload.as_bytes()));
        if computed != slot.checksum {
            tracing::warn!(slot = %path.display(), "state slot failed checksum, skipping");
            return None;
        }

        match serde_json::from_str(&slot.payload) {
            Ok(entries) => Some((slot.generation, entries)),
            Err(e) => {
                tracing::warn!(slot = %path.display(), error = %e, "slot payload undecodable, skipping");
                None
            }
        }
    }

    /// Commit the current entries as a new generation in the inactive
    /// slot, then flip slots.
    async fn write_state(&self) -> Result<(), Error> {
        let now = Utc::now();
        let (slot_path, contents, generation, slot_idx) = {
            let mut guard = self.state.write().await;
            guard.entries.retain(|_, e| !e.is_expired(now));

            let payload = serde_json::to_string(&guard.entries)
                .map_err(|e| Error::store(format!("cannot serialize state: {}", e)))?;
            let generation = guard.generation + 1;
            let slot = SlotFile {
                version: SLOT_VERSION.to_string(),
                generation,
                checksum: format!("{:016x}", fnv1a64(payload.as_bytes())),
                payload,
            };
            let contents = serde_json::to_string(&slot)
                .map_err(|e| Error::store(format!("cannot serialize slot: {}", e)))?;
            (
                Self::slot_path(&self.base, guard.write_to),
                contents,
                generation,
                guard.write_to,
            )
        };

        fs::write(&slot_path, contents).await.map_err(|e| {
            Error::store(format!(
                "cannot write state slot {}: {}",
                slot_path.display(),
                e
            ))
        })?;

        let mut guard = self.state.write().await;
        guard.generation = generation;
        guard.write_to = 1 - slot_idx;
        guard.dirty = false;

        tracing::trace!(slot = %slot_path.display(), generation, "state committed");
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Utc::now();
        let guard = self.state.read().await;
        Ok(guard
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.entries.insert(
                key.to_string(),
                FileEntry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
            guard.dirty = true;
        }

        // Immediate commit for durability
        self.write_state().await
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.entries.insert(
                key.to_string(),
                FileEntry {
                    value: value.to_string(),
                    expires_at: Some(Utc::now() + Duration::seconds(ttl_secs as i64)),
                },
            );
            guard.dirty = true;
        }

        self.write_state().await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.entries.remove(key);
            guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let now = Utc::now();
        let guard = self.state.read().await;
        Ok(guard
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
