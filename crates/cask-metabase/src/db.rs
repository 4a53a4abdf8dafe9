//! The metabase: open/close lifecycle and shared state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::batch::{Batcher, Trees};
use crate::epoch::EpochState;
use crate::error::MetaResult;

/// Configuration for a [`Metabase`].
#[derive(Clone, Debug)]
pub struct MetabaseConfig {
    /// Database directory path.
    pub path: PathBuf,
    /// Unix permission bits applied to the database directory.
    pub permissions: u32,
    /// Number of queued submissions that triggers an immediate commit.
    pub max_batch_size: usize,
    /// How long a batch window stays open waiting for more submissions.
    pub max_batch_delay: Duration,
}

impl MetabaseConfig {
    /// Default configuration rooted at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            permissions: 0o700,
            max_batch_size: 1000,
            max_batch_delay: Duration::from_millis(10),
        }
    }

    /// Set the unix permission bits for the database directory.
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the batch size that triggers an immediate commit.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Set the batch window duration.
    pub fn with_max_batch_delay(mut self, delay: Duration) -> Self {
        self.max_batch_delay = delay;
        self
    }
}

/// Embedded metadata index of one shard.
///
/// Backed by an ordered key-value store with four keyspaces: `headers`
/// (address → header record), `graveyard` (address → removal record),
/// `attributes` (search index entries), and `splits` (parent address →
/// accumulated split linkage). Mutations are serialized through a single
/// committer thread (see [`crate::batch`]); reads run concurrently against
/// store snapshots.
pub struct Metabase {
    db: sled::Db,
    pub(crate) trees: Trees,
    pub(crate) batcher: Batcher,
    pub(crate) epoch: Arc<dyn EpochState>,
    path: PathBuf,
}

impl Metabase {
    /// Open (or create) the metabase at the configured path.
    pub fn open(config: MetabaseConfig, epoch: Arc<dyn EpochState>) -> MetaResult<Self> {
        let db = sled::open(&config.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(
                &config.path,
                std::fs::Permissions::from_mode(config.permissions),
            );
        }

        let trees = Trees {
            headers: db.open_tree("headers")?,
            graveyard: db.open_tree("graveyard")?,
            attributes: db.open_tree("attributes")?,
            splits: db.open_tree("splits")?,
        };
        let batcher = Batcher::spawn(trees.clone(), config.max_batch_size, config.max_batch_delay);

        info!(path = %config.path.display(), "opened metabase");
        Ok(Self {
            db,
            trees,
            batcher,
            epoch,
            path: config.path,
        })
    }

    /// Stop the committer, flush, and release the database.
    pub fn close(&self) -> MetaResult<()> {
        self.batcher.shutdown();
        self.db.flush()?;
        info!(path = %self.path.display(), "closed metabase");
        Ok(())
    }

    /// The database directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the current epoch is past the given expiration.
    pub(crate) fn is_expired(&self, expiration: Option<u64>) -> bool {
        match expiration {
            Some(epoch) => self.epoch.current_epoch() > epoch,
            None => false,
        }
    }
}
