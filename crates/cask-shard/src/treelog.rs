//! Optional auxiliary tree-log store.
//!
//! An append-only log of hierarchical tree operations, kept per shard next
//! to the metabase. Containers use it to maintain named tree structures
//! (directory listings and the like) without touching the object index.
//! Operations get monotone sequence numbers at append time and replay in
//! order.

use std::path::{Path, PathBuf};

use cask_types::ContainerId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ShardError, ShardResult};

/// Configuration for a [`TreeLog`].
#[derive(Clone, Debug)]
pub struct TreeLogConfig {
    /// Database directory path.
    pub path: PathBuf,
}

impl TreeLogConfig {
    /// Configuration rooted at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// One logged tree operation: attach `child` under `parent` with metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOp {
    /// Parent node id (`0` is the root).
    pub parent: u64,
    /// Child node id being attached or moved.
    pub child: u64,
    /// Free-form metadata key-value pairs (name, timestamps, ...).
    pub meta: Vec<(String, Vec<u8>)>,
}

/// Append-only per-shard tree operation log.
pub struct TreeLog {
    db: sled::Db,
    ops: sled::Tree,
    path: PathBuf,
}

impl TreeLog {
    /// Open (or create) the log at the configured path.
    pub fn open(config: &TreeLogConfig) -> ShardResult<Self> {
        let db = sled::open(&config.path)?;
        let ops = db.open_tree("ops")?;
        info!(path = %config.path.display(), "opened tree log");
        Ok(Self {
            db,
            ops,
            path: config.path.clone(),
        })
    }

    /// Flush and release the database.
    pub fn close(&self) -> ShardResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Append an operation to the named tree; returns its sequence number.
    pub fn apply(&self, container: &ContainerId, tree: &str, op: &TreeOp) -> ShardResult<u64> {
        let seq = self.db.generate_id()?;
        let value =
            bincode::serialize(op).map_err(|e| ShardError::Decode(e.to_string()))?;
        self.ops.insert(op_key(container, tree, seq), value)?;
        Ok(seq)
    }

    /// Replay the named tree's operations in sequence order.
    pub fn list(&self, container: &ContainerId, tree: &str) -> ShardResult<Vec<(u64, TreeOp)>> {
        let prefix = tree_prefix(container, tree);
        let mut out = Vec::new();
        for item in self.ops.scan_prefix(&prefix) {
            let (key, value) = item?;
            let seq_bytes: [u8; 8] = key[key.len() - 8..]
                .try_into()
                .map_err(|_| ShardError::Decode("sequence suffix missing".into()))?;
            let op = bincode::deserialize(&value)
                .map_err(|e| ShardError::Decode(e.to_string()))?;
            out.push((u64::from_be_bytes(seq_bytes), op));
        }
        Ok(out)
    }

    /// The database directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tree_prefix(container: &ContainerId, tree: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + tree.len() + 1 + 8);
    key.extend_from_slice(container.as_bytes());
    key.extend_from_slice(tree.as_bytes());
    key.push(0);
    key
}

fn op_key(container: &ContainerId, tree: &str, seq: u64) -> Vec<u8> {
    let mut key = tree_prefix(container, tree);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_log(dir: &TempDir) -> TreeLog {
        TreeLog::open(&TreeLogConfig::new(dir.path().join("treelog"))).unwrap()
    }

    fn op(parent: u64, child: u64) -> TreeOp {
        TreeOp {
            parent,
            child,
            meta: vec![("name".into(), b"node".to_vec())],
        }
    }

    #[test]
    fn apply_assigns_increasing_sequence_numbers() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir);
        let cnr = ContainerId::from_bytes(b"cnr");

        let s1 = log.apply(&cnr, "files", &op(0, 1)).unwrap();
        let s2 = log.apply(&cnr, "files", &op(1, 2)).unwrap();
        assert!(s2 > s1);
    }

    #[test]
    fn list_replays_in_order() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir);
        let cnr = ContainerId::from_bytes(b"cnr");

        log.apply(&cnr, "files", &op(0, 1)).unwrap();
        log.apply(&cnr, "files", &op(1, 2)).unwrap();
        log.apply(&cnr, "files", &op(1, 3)).unwrap();

        let ops = log.list(&cnr, "files").unwrap();
        assert_eq!(ops.len(), 3);
        assert!(ops.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(ops[0].1, op(0, 1));
    }

    #[test]
    fn trees_are_independent() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir);
        let cnr = ContainerId::from_bytes(b"cnr");

        log.apply(&cnr, "files", &op(0, 1)).unwrap();
        log.apply(&cnr, "versions", &op(0, 9)).unwrap();

        assert_eq!(log.list(&cnr, "files").unwrap().len(), 1);
        assert_eq!(log.list(&cnr, "versions").unwrap().len(), 1);
        assert!(log
            .list(&ContainerId::from_bytes(b"other"), "files")
            .unwrap()
            .is_empty());
    }
}
