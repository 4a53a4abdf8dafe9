//! Sharded storage engine for Cask.
//!
//! A [`StorageEngine`] owns a set of [`cask_shard::Shard`]s and gives outer
//! layers (object service, replication, GC) one API over all of them:
//!
//! - **Writes** are routed to a single healthy shard chosen by rendezvous
//!   (highest-random-weight) hashing of the address — deterministic,
//!   load-balanced, and coordination-free.
//! - **Reads** fan out across every shard, because routing is a hint made
//!   against a shard set and health history that keep changing.
//! - **Faults** are contained per shard: each shard has a bounded
//!   non-blocking worker pool and an atomic error counter. Counters gate
//!   routing health at one threshold and raise an operator signal at a
//!   second, higher one.
//!
//! All operations are synchronous; a saturated pool fails immediately with
//! [`EngineError::CapacityExceeded`] rather than queueing.

pub mod engine;
pub mod error;
pub mod hrw;
mod ops;
pub mod pool;

pub use engine::{EngineConfig, StorageEngine};
pub use error::{EngineError, EngineResult};
pub use pool::{PoolError, WorkerPool};
