//! Header retrieval and existence checks.

use cask_types::{Address, ObjectHeader};

use crate::db::Metabase;
use crate::error::{MetaError, MetaResult};
use crate::keys;
use crate::records::{self, GraveyardRecord, HeaderRecord, SplitRecord};

impl Metabase {
    /// Return the header stored for the address.
    ///
    /// Removal and expiration are decided here, lazily, at read time:
    /// - inhumed under a tombstone → [`MetaError::AlreadyRemoved`]
    /// - inhumed directly (no tombstone) → [`MetaError::NotFound`]
    /// - expiration epoch passed → [`MetaError::Expired`]
    ///
    /// An address known only as the parent of split parts is "virtual".
    /// With `raw = true` the split linkage is always returned as
    /// [`MetaError::Split`]; with `raw = false` the parent header is
    /// returned when some part carried it, and the linkage otherwise, so
    /// the caller can reassemble the object.
    pub fn get(&self, address: &Address, raw: bool) -> MetaResult<ObjectHeader> {
        let key = keys::address_key(address);

        if let Some(bytes) = self.trees.graveyard.get(key)? {
            let record: GraveyardRecord = records::decode(&bytes)?;
            return Err(match record.tombstone {
                Some(_) => MetaError::AlreadyRemoved(*address),
                None => MetaError::NotFound(*address),
            });
        }

        if let Some(bytes) = self.trees.headers.get(key)? {
            let record: HeaderRecord = records::decode(&bytes)?;
            if self.is_expired(record.expiration) {
                return Err(MetaError::Expired(*address));
            }
            return Ok(record.header);
        }

        if let Some(bytes) = self.trees.splits.get(key)? {
            let record: SplitRecord = records::decode(&bytes)?;
            if raw {
                return Err(MetaError::Split(record.split_info()));
            }
            if let Some(header) = record.parent_header {
                if self.is_expired(header.expiration_epoch()) {
                    return Err(MetaError::Expired(*address));
                }
                return Ok(header);
            }
            return Err(MetaError::Split(record.split_info()));
        }

        Err(MetaError::NotFound(*address))
    }

    /// Check whether the address is present, under the same removal and
    /// expiration rules as [`Metabase::get`].
    ///
    /// A direct (tombstone-less) removal reads as plain absence; a
    /// tombstoned one is reported as [`MetaError::AlreadyRemoved`] so
    /// callers can distinguish "never had it" from "had it, removed".
    pub fn exists(&self, address: &Address) -> MetaResult<bool> {
        let key = keys::address_key(address);

        if let Some(bytes) = self.trees.graveyard.get(key)? {
            let record: GraveyardRecord = records::decode(&bytes)?;
            return match record.tombstone {
                Some(_) => Err(MetaError::AlreadyRemoved(*address)),
                None => Ok(false),
            };
        }

        if let Some(bytes) = self.trees.headers.get(key)? {
            let record: HeaderRecord = records::decode(&bytes)?;
            if self.is_expired(record.expiration) {
                return Err(MetaError::Expired(*address));
            }
            return Ok(true);
        }

        if let Some(bytes) = self.trees.splits.get(key)? {
            let record: SplitRecord = records::decode(&bytes)?;
            return Err(MetaError::Split(record.split_info()));
        }

        Ok(false)
    }
}
