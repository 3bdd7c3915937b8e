//! Reader Snapshots
//!
//! A committed reader holds a `Snapshot`: the memtable view captured at its
//! commit point, plus a marker file on disk recording that the snapshot is
//! live.
//!
//! ## Marker Lifecycle
//! ```text
//!   begin ──► register path in LIVE set ──► write {dir}/snapshots/snapshot-<pid>-<id>
//!   end   ──► remove file ──► unregister
//! ```
//! A crash (or a reader that is never ended) leaves the marker behind.
//! `cleanup_stale` removes every marker that no live snapshot in this process
//! has registered. A data directory is owned by one process at a time, so
//! markers written under another pid are always stale.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{BurrowError, Result};
use crate::item::{now_millis, Item};
use crate::memtable::{list_view, Record, View};

/// Directory (under the data dir) holding snapshot markers
pub const SNAPSHOT_DIR: &str = "snapshots";

/// File name prefix of every snapshot marker
pub const SNAPSHOT_FILE_PREFIX: &str = "snapshot-";

/// Process-wide id source; unique across every engine in the process
static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Marker paths of snapshots that are still owned by a reader
fn live_markers() -> &'static Mutex<HashSet<PathBuf>> {
    static LIVE: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    LIVE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Contents of a marker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub pid: u32,
    pub id: u64,
    /// Unix millis at creation
    pub created: u64,
    /// Keys the reader staged
    pub keys: Vec<Vec<u8>>,
}

impl SnapshotManifest {
    /// Read a marker file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        bincode::deserialize(&bytes).map_err(Into::into)
    }
}

/// On-disk evidence of a live snapshot; removed on drop
#[derive(Debug)]
pub(crate) struct SnapshotMarker {
    id: u64,
    path: PathBuf,
}

impl SnapshotMarker {
    /// Register and write a marker for a reader about to commit
    pub(crate) fn create(dir: &Path, keys: &[Vec<u8>]) -> Result<Self> {
        let id = NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        let path = dir.join(format!("{}{}-{}", SNAPSHOT_FILE_PREFIX, pid, id));

        let manifest = SnapshotManifest {
            pid,
            id,
            created: now_millis(),
            keys: keys.to_vec(),
        };
        let bytes = bincode::serialize(&manifest)?;

        // Registered before the file exists so a concurrent cleanup never
        // sees an unregistered live marker.
        live_markers().lock().insert(path.clone());
        if let Err(e) = fs::write(&path, bytes) {
            live_markers().lock().remove(&path);
            return Err(e.into());
        }

        tracing::debug!(id, path = %path.display(), keys = keys.len(), "Created snapshot marker");
        Ok(Self { id, path })
    }
}

impl Drop for SnapshotMarker {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            // Already reclaimed, e.g. by another process's cleanup
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove snapshot marker"
                )
            }
        }
        live_markers().lock().remove(&self.path);
    }
}

/// A reader's committed, immutable view of the store
#[derive(Debug)]
pub struct Snapshot {
    view: View,
    marker: SnapshotMarker,
}

impl Snapshot {
    pub(crate) fn new(view: View, marker: SnapshotMarker) -> Self {
        Self { view, marker }
    }

    /// Process-unique snapshot id
    pub fn id(&self) -> u64 {
        self.marker.id
    }

    /// Path of this snapshot's marker file
    pub fn marker_path(&self) -> &Path {
        &self.marker.path
    }

    /// A key's record as of the commit point
    pub fn get(&self, key: &[u8]) -> Option<&Record> {
        self.view.get(key)
    }

    /// Items as of the commit point whose key starts with `prefix`
    pub fn list_items(&self, prefix: &[u8]) -> Vec<Item> {
        list_view(&self.view, prefix)
    }
}

/// Remove snapshot markers that no live snapshot owns.
///
/// Returns the number of markers removed. Entries that are not snapshot
/// markers are left alone.
pub fn cleanup_stale(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BurrowError::Io(e)),
    };

    // Held for the whole scan so no marker can be registered mid-way.
    let live = live_markers().lock();
    let mut removed = 0;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_marker = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with(SNAPSHOT_FILE_PREFIX));
        if !is_marker || live.contains(&path) {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed stale snapshot marker");
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    if removed > 0 {
        tracing::info!(dir = %dir.display(), removed, "Cleaned up stale snapshots");
    }
    Ok(removed)
}
