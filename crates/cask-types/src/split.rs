use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::ObjectId;
use crate::object::ObjectHeader;

/// Identifier shared by all physical parts of one split object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitId(Uuid);

impl SplitId {
    /// Generate a fresh split id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Debug for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SplitId({})", self.0)
    }
}

impl fmt::Display for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split linkage carried in a part's header.
///
/// A part that carries the full `parent_header` is the last part of the
/// chain; a part with a non-empty `children` list is the link part that
/// enumerates all siblings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitHeader {
    /// Id of the logical (parent) object this part belongs to.
    pub parent: Option<ObjectId>,
    /// Full parent header, carried by the last part of the chain.
    pub parent_header: Option<Box<ObjectHeader>>,
    /// Split chain identifier.
    pub split_id: Option<SplitId>,
    /// Ids of all parts, in order. Non-empty only on the link part.
    pub children: Vec<ObjectId>,
}

/// Known linkage of a split object that could not be fully resolved.
///
/// Returned through the error channel for call-site uniformity, but it is a
/// structured partial result, not a fault: the caller uses the known parts
/// to drive reassembly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    /// The split chain identifier, if any part reported one.
    pub split_id: Option<SplitId>,
    /// The last part of the chain, if known.
    pub last_part: Option<ObjectId>,
    /// The link part enumerating all siblings, if known.
    pub link: Option<ObjectId>,
}

impl SplitInfo {
    /// Create an empty split info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge linkage learned from another source into this one.
    ///
    /// Existing knowledge wins; only unknown fields are filled in. Used when
    /// aggregating split results across shards.
    pub fn merge(&mut self, other: &SplitInfo) {
        if self.split_id.is_none() {
            self.split_id = other.split_id;
        }
        if self.last_part.is_none() {
            self.last_part = other.last_part;
        }
        if self.link.is_none() {
            self.link = other.link;
        }
    }
}
