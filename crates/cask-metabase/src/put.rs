//! Indexing objects into the metabase.

use cask_types::{Address, Object};
use tracing::debug;

use crate::batch::{Mutation, TreeKind};
use crate::db::Metabase;
use crate::error::MetaResult;
use crate::keys;
use crate::records::{self, HeaderRecord, SplitRecord};

impl Metabase {
    /// Index the object's header under its address.
    ///
    /// Re-putting an address overwrites the stored header in place — used
    /// for header-only updates such as completing a split — and never
    /// duplicates index entries. A put does not resurrect an inhumed
    /// address: the graveyard record, if any, stays authoritative.
    pub fn put(&self, object: &Object) -> MetaResult<()> {
        let address = &object.address;
        let record = HeaderRecord {
            header: object.header.clone(),
            expiration: object.header.expiration_epoch(),
        };

        let mut mutations = vec![Mutation::Insert {
            tree: TreeKind::Headers,
            key: keys::address_key(address).to_vec(),
            value: records::encode(&record)?,
        }];

        for attr in &object.header.attributes {
            mutations.push(Mutation::Insert {
                tree: TreeKind::Attributes,
                key: keys::attribute_key(
                    &address.container,
                    &attr.key,
                    &attr.value,
                    &address.object,
                ),
                value: Vec::new(),
            });
        }

        // A part referencing its parent contributes linkage to the split
        // record kept under the parent's address: the link part announces
        // the sibling list, the last part carries the parent header.
        if let Some(split) = &object.header.split {
            if let Some(parent) = split.parent {
                let parent_address = Address::new(address.container, parent);
                let is_link = !split.children.is_empty();
                let update = SplitRecord {
                    split_id: split.split_id,
                    last_part: (!is_link).then_some(address.object),
                    link: is_link.then_some(address.object),
                    parent_header: split.parent_header.as_deref().cloned(),
                };
                mutations.push(Mutation::MergeSplit {
                    key: keys::address_key(&parent_address).to_vec(),
                    update,
                });
            }
        }

        self.batcher.submit(mutations)?;
        debug!(address = %address, "indexed object");
        Ok(())
    }
}
