//! Write coalescing for the metabase.
//!
//! All mutations funnel through a single committer thread. Concurrent
//! submissions queue up and are applied as one atomic multi-tree
//! transaction, in submission order, once the batch is full or the batch
//! delay elapses. Every submitter blocks until its batch commits and
//! observes the commit result, so the single-writer discipline is invisible
//! to callers beyond the latency of the batch window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cask_types::Address;
use sled::transaction::{abort, TransactionError};
use sled::Transactional;
use tracing::{debug, error};

use crate::error::{MetaError, MetaResult};
use crate::records::{self, GraveyardRecord, SplitRecord};

/// Target tree of a plain mutation.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TreeKind {
    Headers,
    Graveyard,
    Attributes,
    Splits,
}

/// One queued mutation.
///
/// `MergeSplit` and `Inhume` are read-modify-write operations; the read
/// happens inside the commit transaction so concurrent submissions cannot
/// lose updates.
#[derive(Clone, Debug)]
pub(crate) enum Mutation {
    Insert {
        tree: TreeKind,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        tree: TreeKind,
        key: Vec<u8>,
    },
    /// Merge split linkage into the record under the parent key; known
    /// fields of the update overwrite, unknown fields are kept.
    MergeSplit {
        key: Vec<u8>,
        update: SplitRecord,
    },
    /// Mark an address in the graveyard. Monotonic: a record carrying a
    /// tombstone is never downgraded to a direct removal.
    Inhume {
        key: Vec<u8>,
        tombstone: Option<Address>,
    },
}

/// Cloned tree handles the committer writes through.
#[derive(Clone)]
pub(crate) struct Trees {
    pub headers: sled::Tree,
    pub graveyard: sled::Tree,
    pub attributes: sled::Tree,
    pub splits: sled::Tree,
}

struct Submission {
    mutations: Vec<Mutation>,
    done: mpsc::Sender<MetaResult<()>>,
}

struct Shared {
    queue: Mutex<Vec<Submission>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// Handle to the committer thread.
pub(crate) struct Batcher {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Batcher {
    /// Spawn the committer thread.
    pub fn spawn(trees: Trees, max_batch_size: usize, max_batch_delay: Duration) -> Self {
        assert!(max_batch_size > 0, "batch size must be positive");

        let shared = Arc::new(Shared {
            queue: Mutex::new(Vec::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("metabase-committer".into())
            .spawn(move || committer_loop(thread_shared, trees, max_batch_size, max_batch_delay))
            .expect("failed to spawn committer thread");

        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue mutations and block until their batch commits.
    pub fn submit(&self, mutations: Vec<Mutation>) -> MetaResult<()> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(MetaError::Closed);
        }

        let (tx, rx) = mpsc::channel();
        self.shared
            .queue
            .lock()
            .expect("batch queue poisoned")
            .push(Submission {
                mutations,
                done: tx,
            });
        self.shared.available.notify_one();

        rx.recv().map_err(|_| MetaError::Closed)?
    }

    /// Stop the committer. Pending submissions are committed first; anything
    /// queued after the flag flips observes `Closed`.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();

        if let Some(handle) = self
            .handle
            .lock()
            .expect("batcher handle poisoned")
            .take()
        {
            let _ = handle.join();
        }

        // Fail any submission that raced past the committer's final drain.
        let leftovers =
            std::mem::take(&mut *self.shared.queue.lock().expect("batch queue poisoned"));
        for sub in leftovers {
            let _ = sub.done.send(Err(MetaError::Closed));
        }
    }
}

fn committer_loop(
    shared: Arc<Shared>,
    trees: Trees,
    max_batch_size: usize,
    max_batch_delay: Duration,
) {
    loop {
        let mut queue = shared.queue.lock().expect("batch queue poisoned");

        while queue.is_empty() {
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            queue = shared
                .available
                .wait(queue)
                .expect("batch queue poisoned");
        }

        // A submission arrived; hold the window open for more until the
        // batch fills or the delay elapses.
        let deadline = Instant::now() + max_batch_delay;
        while queue.len() < max_batch_size && !shared.shutdown.load(Ordering::Acquire) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let (q, timeout) = shared
                .available
                .wait_timeout(queue, remaining)
                .expect("batch queue poisoned");
            queue = q;
            if timeout.timed_out() {
                break;
            }
        }

        let batch = std::mem::take(&mut *queue);
        drop(queue);

        let result = commit(&trees, &batch);
        if let Err(ref e) = result {
            error!(error = %e, submissions = batch.len(), "batch commit failed");
        } else {
            debug!(submissions = batch.len(), "batch committed");
        }
        for sub in batch {
            let _ = sub.done.send(result.clone());
        }
    }
}

/// Apply every mutation of the batch in one atomic transaction, in
/// submission order.
fn commit(trees: &Trees, batch: &[Submission]) -> MetaResult<()> {
    let result = (
        &trees.headers,
        &trees.graveyard,
        &trees.attributes,
        &trees.splits,
    )
        .transaction(|(headers, graveyard, attributes, splits)| {
            for sub in batch {
                for mutation in &sub.mutations {
                    match mutation {
                        Mutation::Insert { tree, key, value } => {
                            let target = match tree {
                                TreeKind::Headers => headers,
                                TreeKind::Graveyard => graveyard,
                                TreeKind::Attributes => attributes,
                                TreeKind::Splits => splits,
                            };
                            target.insert(key.as_slice(), value.as_slice())?;
                        }
                        Mutation::Remove { tree, key } => {
                            let target = match tree {
                                TreeKind::Headers => headers,
                                TreeKind::Graveyard => graveyard,
                                TreeKind::Attributes => attributes,
                                TreeKind::Splits => splits,
                            };
                            target.remove(key.as_slice())?;
                        }
                        Mutation::MergeSplit { key, update } => {
                            let mut record = match splits.get(key.as_slice())? {
                                Some(bytes) => match records::decode::<SplitRecord>(&bytes) {
                                    Ok(record) => record,
                                    Err(e) => return abort(e),
                                },
                                None => SplitRecord::default(),
                            };
                            if update.split_id.is_some() {
                                record.split_id = update.split_id;
                            }
                            if update.last_part.is_some() {
                                record.last_part = update.last_part;
                            }
                            if update.link.is_some() {
                                record.link = update.link;
                            }
                            if update.parent_header.is_some() {
                                record.parent_header = update.parent_header.clone();
                            }
                            let bytes = match records::encode(&record) {
                                Ok(bytes) => bytes,
                                Err(e) => return abort(e),
                            };
                            splits.insert(key.as_slice(), bytes)?;
                        }
                        Mutation::Inhume { key, tombstone } => {
                            let existing = match graveyard.get(key.as_slice())? {
                                Some(bytes) => {
                                    match records::decode::<GraveyardRecord>(&bytes) {
                                        Ok(record) => Some(record),
                                        Err(e) => return abort(e),
                                    }
                                }
                                None => None,
                            };
                            // Keep an existing tombstone attribution.
                            let record = match existing {
                                Some(record) if record.tombstone.is_some() => record,
                                _ => GraveyardRecord {
                                    tombstone: *tombstone,
                                },
                            };
                            let bytes = match records::encode(&record) {
                                Ok(bytes) => bytes,
                                Err(e) => return abort(e),
                            };
                            graveyard.insert(key.as_slice(), bytes)?;
                        }
                    }
                }
            }
            Ok(())
        });

    match result {
        Ok(()) => Ok(()),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(MetaError::Db(e)),
    }
}
