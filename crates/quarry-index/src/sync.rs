//! Content-hash snapshots of a workspace and change detection between them.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::discovery::{PathFilter, absolute_path, discover_files};
use crate::error::{IndexError, Result};

const READ_CHUNK: usize = 64 * 1024;
const WORKSPACE_HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub relative_path: String,
    /// Hex sha256 of the file bytes.
    pub content_hash: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub workspace_path: PathBuf,
    /// Keyed by workspace-relative path.
    pub files: BTreeMap<String, FileSnapshot>,
    pub created_at: DateTime<Utc>,
}

/// Paths that differ between two snapshots. The three sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} removed",
            self.added.len(),
            self.modified.len(),
            self.removed.len()
        )
    }
}

/// Stable short hex id of a workspace, derived from its canonical absolute path.
///
/// # Errors
///
/// Returns an error if the path cannot be canonicalized.
pub fn workspace_hash(root: &Path) -> Result<String> {
    let canonical = root.canonicalize()?;
    let mut hex = hex::encode(Sha256::digest(canonical.to_string_lossy().as_bytes()));
    hex.truncate(WORKSPACE_HASH_LEN);
    Ok(hex)
}

/// Streaming sha256 of a file, read in fixed-size chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn snapshot_file(root: &Path, relative: &str) -> Result<FileSnapshot> {
    let path = absolute_path(root, relative);
    let meta = std::fs::metadata(&path)?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64());
    Ok(FileSnapshot {
        relative_path: relative.to_owned(),
        content_hash: hash_file(&path)?,
        size: meta.len(),
        mtime,
    })
}

/// Hash every file under `root` that passes `filter`. Unreadable files are skipped.
#[must_use]
pub fn scan_workspace(root: &Path, filter: &PathFilter) -> WorkspaceSnapshot {
    let mut files = BTreeMap::new();
    for relative in discover_files(root, filter, None) {
        match snapshot_file(root, &relative) {
            Ok(snapshot) => {
                files.insert(relative, snapshot);
            }
            Err(e) => tracing::warn!(file = %relative, "skipping unreadable file: {e}"),
        }
    }
    WorkspaceSnapshot {
        workspace_path: root.to_path_buf(),
        files,
        created_at: Utc::now(),
    }
}

/// Compare two snapshots. With no previous snapshot every path is added.
#[must_use]
pub fn diff(old: Option<&WorkspaceSnapshot>, new: &WorkspaceSnapshot) -> ChangeSet {
    let Some(old) = old else {
        return ChangeSet {
            added: new.files.keys().cloned().collect(),
            ..ChangeSet::default()
        };
    };

    let mut changes = ChangeSet::default();
    for (path, file) in &new.files {
        match old.files.get(path) {
            None => {
                changes.added.insert(path.clone());
            }
            Some(prev) if prev.content_hash != file.content_hash => {
                changes.modified.insert(path.clone());
            }
            Some(_) => {}
        }
    }
    changes.removed = old
        .files
        .keys()
        .filter(|p| !new.files.contains_key(*p))
        .cloned()
        .collect();
    changes
}

/// Owns the persisted snapshot of one workspace.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    root: PathBuf,
    hash: String,
    snapshot_dir: PathBuf,
    filter: PathFilter,
}

impl ChangeTracker {
    /// # Errors
    ///
    /// Returns `IndexError::InvalidPath` if `root` is not an existing directory.
    pub fn new(root: &Path, snapshot_dir: PathBuf, filter: PathFilter) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| IndexError::InvalidPath(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(IndexError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let hash = workspace_hash(&root)?;
        Ok(Self {
            root,
            hash,
            snapshot_dir,
            filter,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn workspace_hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_dir.join(format!("{}.json", self.hash))
    }

    #[must_use]
    pub fn scan(&self) -> WorkspaceSnapshot {
        scan_workspace(&self.root, &self.filter)
    }

    /// Previously saved snapshot. Missing or corrupt files yield `None`.
    #[must_use]
    pub fn load(&self) -> Option<WorkspaceSnapshot> {
        let path = self.snapshot_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read snapshot: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring corrupt snapshot: {e}");
                None
            }
        }
    }

    /// Write the snapshot to a temp file and rename it over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write fails.
    pub fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.snapshot_dir)?;
        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Changes since the stored snapshot, without advancing it.
    #[must_use]
    pub fn pending_changes(&self) -> ChangeSet {
        diff(self.load().as_ref(), &self.scan())
    }

    /// Scan, diff against the stored snapshot, then store the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the new snapshot cannot be saved.
    pub fn check_changes(&self) -> Result<ChangeSet> {
        let new = self.scan();
        let changes = diff(self.load().as_ref(), &new);
        self.save(&new)?;
        tracing::debug!(workspace = %self.root.display(), %changes, "snapshot advanced");
        Ok(changes)
    }

    /// Remove the stored snapshot so the next run starts cold.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn reset(&self) -> Result<()> {
        match std::fs::remove_file(self.snapshot_path()) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
