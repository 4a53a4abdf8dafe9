//! Embedded metadata index for the Cask local object storage engine.
//!
//! A [`Metabase`] is the per-shard index of object metadata, independent of
//! payload bytes. It answers existence, attribute search, soft-delete, and
//! expiration questions so the payload store is touched only when bytes are
//! actually needed.
//!
//! # Design Rules
//!
//! 1. Mutations are serialized through a single committer thread and
//!    applied as atomic multi-tree batches, in submission order; reads run
//!    concurrently against store snapshots.
//! 2. Removal is a monotonic soft-delete: an inhumed address never reverts
//!    to present, and re-putting it does not clear the graveyard.
//! 3. Expiration is evaluated lazily at read time against an injected
//!    epoch provider — there is no background sweep in this layer.
//! 4. Split (multi-part) objects are represented by accumulated linkage
//!    under the parent address; unresolvable reads surface the linkage as
//!    a structured `Split` result rather than a fault.

mod batch;
pub mod db;
pub mod epoch;
pub mod error;
mod get;
mod inhume;
mod keys;
mod put;
mod records;
pub mod select;

#[cfg(test)]
pub(crate) mod testutil;

pub use db::{Metabase, MetabaseConfig};
pub use epoch::{EpochState, FixedEpoch};
pub use error::{MetaError, MetaResult};
pub use select::{Filter, MatchOp, FILTER_OWNER, FILTER_TYPE};
