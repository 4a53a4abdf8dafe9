//! Persisted record types, bincode-encoded into the metabase trees.

use serde::{Deserialize, Serialize};

use cask_types::{Address, ObjectHeader, ObjectId, SplitId, SplitInfo};

use crate::error::{MetaError, MetaResult};

/// Record stored in the `headers` tree for each indexed address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct HeaderRecord {
    /// The full object header.
    pub header: ObjectHeader,
    /// Expiration epoch parsed out of the attributes at put time.
    pub expiration: Option<u64>,
}

/// Record stored in the `graveyard` tree for each inhumed address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct GraveyardRecord {
    /// The tombstone attributed with the removal; `None` for a direct
    /// (administrative) removal with no back-reference.
    pub tombstone: Option<Address>,
}

/// Record stored in the `splits` tree under a parent address, accumulating
/// linkage as parts arrive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct SplitRecord {
    /// The split chain identifier.
    pub split_id: Option<SplitId>,
    /// The last part of the chain (the part carrying the parent header).
    pub last_part: Option<ObjectId>,
    /// The link part enumerating all siblings.
    pub link: Option<ObjectId>,
    /// Parent header, once some part has carried it.
    pub parent_header: Option<ObjectHeader>,
}

impl SplitRecord {
    /// The externally visible linkage of this record.
    pub fn split_info(&self) -> SplitInfo {
        SplitInfo {
            split_id: self.split_id,
            last_part: self.last_part,
            link: self.link,
        }
    }
}

pub(crate) fn encode<T: Serialize>(record: &T) -> MetaResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| MetaError::Decode(e.to_string()))
}

pub(crate) fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> MetaResult<T> {
    bincode::deserialize(bytes).map_err(|e| MetaError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graveyard_record_roundtrip() {
        let record = GraveyardRecord { tombstone: None };
        let bytes = encode(&record).unwrap();
        let back: GraveyardRecord = decode(&bytes).unwrap();
        assert!(back.tombstone.is_none());
    }

    #[test]
    fn split_record_exposes_info() {
        let record = SplitRecord {
            split_id: Some(SplitId::generate()),
            last_part: Some(ObjectId::from_bytes(b"last")),
            link: None,
            parent_header: None,
        };
        let info = record.split_info();
        assert_eq!(info.split_id, record.split_id);
        assert_eq!(info.last_part, record.last_part);
        assert!(info.link.is_none());
    }
}
