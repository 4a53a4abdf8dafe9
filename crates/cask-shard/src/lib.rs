//! Storage shard for the Cask engine.
//!
//! A [`Shard`] unifies one tiered payload store ([`cask_blobstor::BlobStor`])
//! and one metadata index ([`cask_metabase::Metabase`]), plus an optional
//! [`TreeLog`], under a single lifecycle and API. Shards are the engine's
//! unit of isolation: each owns its stores exclusively and shares nothing
//! with its siblings.
//!
//! # Lifecycle
//!
//! `Created → Opened → Initialized → Closed`, one-directional. Data-path
//! calls outside `Initialized` fail with a lifecycle error.
//!
//! # Two-phase put
//!
//! `put` writes the payload first and indexes the header second, with no
//! atomicity across the two stores: a metabase failure leaves an orphaned
//! blob for an external reconciliation pass. Each store stays independently
//! recoverable.

pub mod error;
pub mod shard;
pub mod treelog;

pub use error::{ShardError, ShardResult};
pub use shard::{Shard, ShardConfig};
pub use treelog::{TreeLog, TreeLogConfig, TreeOp};
