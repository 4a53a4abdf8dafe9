//! Flat one-file-per-object sub-storage.
//!
//! Each payload lives in its own file named `<container>.<object>` (hex),
//! fanned out over a directory tree of configurable depth derived from the
//! object id. Cheap for large payloads, where one file per object costs
//! little relative to the payload itself.

use std::fs;
use std::path::{Path, PathBuf};

use cask_types::{Address, ContainerId, ObjectId};
use tracing::info;
use walkdir::WalkDir;

use crate::error::{BlobError, BlobResult};
use crate::storage::SubStorage;

/// Characters of the object id hex consumed per directory level.
const DIR_NAME_LEN: usize = 2;

/// Configuration for an [`FsTree`].
#[derive(Clone, Debug)]
pub struct FsTreeConfig {
    /// Root directory of the tree.
    pub path: PathBuf,
    /// Number of directory levels between the root and the object files.
    pub depth: usize,
    /// Unix permission bits applied to created directories.
    pub permissions: u32,
}

impl FsTreeConfig {
    /// Default configuration rooted at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            depth: 2,
            permissions: 0o700,
        }
    }

    /// Set the directory fan-out depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the unix permission bits for created directories.
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Flat per-object file tree.
pub struct FsTree {
    config: FsTreeConfig,
}

impl FsTree {
    /// Create a tree with the given configuration.
    pub fn new(config: FsTreeConfig) -> Self {
        Self { config }
    }

    fn file_path(&self, address: &Address) -> PathBuf {
        let oid_hex = address.object.to_hex();
        let mut path = self.config.path.clone();
        for level in 0..self.config.depth {
            let start = level * DIR_NAME_LEN;
            path.push(&oid_hex[start..start + DIR_NAME_LEN]);
        }
        path.push(format!("{}.{}", address.container.to_hex(), oid_hex));
        path
    }

    fn create_dir(&self, path: &Path) -> BlobResult<()> {
        fs::create_dir_all(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.config.permissions))?;
        }
        Ok(())
    }

    /// Visit every address stored in the tree.
    ///
    /// Files whose names do not parse as addresses are skipped. Used by
    /// maintenance tooling; not part of the [`SubStorage`] capability set.
    pub fn iterate(&self, f: &mut dyn FnMut(Address) -> BlobResult<()>) -> BlobResult<()> {
        for entry in WalkDir::new(&self.config.path).min_depth(self.config.depth + 1) {
            let entry = entry.map_err(|e| BlobError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((cnr, obj)) = name.split_once('.') else {
                continue;
            };
            let (Ok(container), Ok(object)) =
                (ContainerId::from_hex(cnr), ObjectId::from_hex(obj))
            else {
                continue;
            };
            f(Address::new(container, object))?;
        }
        Ok(())
    }
}

impl SubStorage for FsTree {
    fn open(&self) -> BlobResult<()> {
        self.create_dir(&self.config.path)?;
        info!(path = %self.config.path.display(), "opened fstree");
        Ok(())
    }

    fn init(&self) -> BlobResult<()> {
        Ok(())
    }

    fn close(&self) -> BlobResult<()> {
        Ok(())
    }

    fn put(&self, address: &Address, data: &[u8]) -> BlobResult<()> {
        let path = self.file_path(address);
        if let Some(parent) = path.parent() {
            self.create_dir(parent)?;
        }

        // Write to a temporary sibling first, then rename into place, so a
        // crash never leaves a partial payload under the final name.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, address: &Address) -> BlobResult<Vec<u8>> {
        match fs::read(self.file_path(address)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(*address))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, address: &Address) -> BlobResult<bool> {
        match fs::metadata(self.file_path(address)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, address: &Address) -> BlobResult<()> {
        match fs::remove_file(self.file_path(address)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(*address))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> &'static str {
        "fstree"
    }

    fn path(&self) -> &Path {
        &self.config.path
    }
}
