//! Asset directory tree with path containment checks.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ErrorCode, Result, ServerError};

/// Directory tree keyed by opaque asset identifiers.
///
/// The root is canonicalized once when the store is opened; all
/// containment checks compare against that canonical root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens the store, creating the root directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            ServerError::with_source(
                ErrorCode::StorageFailed,
                "Failed to create assets directory",
                e,
            )
        })?;
        let root = root.canonicalize().map_err(|e| {
            ServerError::with_source(
                ErrorCode::StorageFailed,
                "Failed to resolve assets directory",
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Returns the canonical assets root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generates a fresh asset identifier (UUID v4).
    pub fn new_asset_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Creates the directory for `id`.
    ///
    /// Creating a directory that already exists is not an error.
    pub fn allocate(&self, id: &str) -> Result<PathBuf> {
        let dir = self.asset_dir(id).ok_or_else(|| {
            ServerError::storage_failed(format!("invalid asset id {:?}", id))
        })?;
        fs::create_dir_all(&dir).map_err(|e| {
            ServerError::with_source(
                ErrorCode::StorageFailed,
                "Failed to create asset directory",
                e,
            )
        })?;
        Ok(dir)
    }

    /// Resolves `root/id/filename` to an absolute path inside the root.
    ///
    /// The check runs on the normalized path first, so traversal attempts
    /// are rejected without touching the filesystem, then again after
    /// symlinks in the existing part of the path have been followed.
    pub fn resolve(&self, id: &str, filename: &str) -> Result<PathBuf> {
        let candidate = normalize(&self.root.join(id).join(filename));
        if !self.is_strictly_inside(&candidate) {
            warn!(asset_id = %id, filename = %filename, "rejected path outside assets root");
            return Err(ServerError::access_denied());
        }

        let resolved = canonicalize_existing(&candidate);
        if !self.is_strictly_inside(&resolved) {
            warn!(asset_id = %id, filename = %filename, "rejected symlink escaping assets root");
            return Err(ServerError::access_denied());
        }

        Ok(resolved)
    }

    /// Deletes the directory for `id` and everything under it.
    ///
    /// Best-effort: failures are logged and swallowed.
    pub fn remove(&self, id: &str) {
        let Some(dir) = self.asset_dir(id) else {
            debug!(asset_id = %id, "skipping removal of invalid asset id");
            return;
        };
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(asset_id = %id, "removed asset directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(asset_id = %id, error = %e, "failed to remove asset directory"),
        }
    }

    /// Returns true if an asset directory exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.asset_dir(id).map(|d| d.is_dir()).unwrap_or(false)
    }

    /// Maps an id to its directory, or None unless it is a direct child of the root.
    fn asset_dir(&self, id: &str) -> Option<PathBuf> {
        let mut components = Path::new(id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }

    fn is_strictly_inside(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && path != self.root
    }
}

/// Lexically resolves `.` and `..` components.
///
/// `..` at the filesystem root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                out = PathBuf::from(p.as_os_str());
            }
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Canonicalizes the longest existing ancestor and appends the rest.
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for name in tail.iter().rev() {
                out.push(name);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
