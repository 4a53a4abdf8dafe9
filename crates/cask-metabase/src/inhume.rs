//! Soft deletion and physical metadata removal.

use cask_types::Address;
use tracing::debug;

use crate::batch::{Mutation, TreeKind};
use crate::db::Metabase;
use crate::error::MetaResult;
use crate::keys;
use crate::records::{self, HeaderRecord};

impl Metabase {
    /// Mark the target addresses as removed.
    ///
    /// With a tombstone, the removal is attributed to it and subsequent
    /// reads fail `AlreadyRemoved`; without one the removal is direct
    /// (administrative) and the address simply reads as absent. Removal is
    /// monotonic: an inhumed address never reverts to present, and a
    /// tombstone attribution is never downgraded.
    pub fn inhume(&self, targets: &[Address], tombstone: Option<Address>) -> MetaResult<()> {
        let mutations = targets
            .iter()
            .map(|target| Mutation::Inhume {
                key: keys::address_key(target).to_vec(),
                tombstone,
            })
            .collect();
        self.batcher.submit(mutations)?;
        debug!(count = targets.len(), "inhumed addresses");
        Ok(())
    }

    /// Physically remove all metadata of the addresses: header, attribute
    /// index entries, split linkage, and graveyard record.
    ///
    /// This is the hook for an external garbage collector; the engine never
    /// calls it on its own.
    pub fn delete(&self, targets: &[Address]) -> MetaResult<()> {
        let mut mutations = Vec::new();
        for target in targets {
            let key = keys::address_key(target).to_vec();

            // The stored header tells us which attribute entries to drop.
            if let Some(bytes) = self.trees.headers.get(&key)? {
                let record: HeaderRecord = records::decode(&bytes)?;
                for attr in &record.header.attributes {
                    mutations.push(Mutation::Remove {
                        tree: TreeKind::Attributes,
                        key: keys::attribute_key(
                            &target.container,
                            &attr.key,
                            &attr.value,
                            &target.object,
                        ),
                    });
                }
            }

            for tree in [TreeKind::Headers, TreeKind::Graveyard, TreeKind::Splits] {
                mutations.push(Mutation::Remove {
                    tree,
                    key: key.clone(),
                });
            }
        }
        self.batcher.submit(mutations)?;
        debug!(count = targets.len(), "deleted metadata");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MetaError;
    use crate::select::Filter;
    use crate::testutil::{add_attribute, generate_object, generate_object_in, new_db};
    use cask_types::ContainerId;
    use tempfile::TempDir;

    #[test]
    fn inhume_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let db = new_db(&dir, 0);

        let obj = generate_object(b"monotonic");
        let ts = generate_object(b"tombstone");
        db.put(&obj).unwrap();
        db.inhume(&[obj.address], Some(ts.address)).unwrap();

        // Re-putting and re-inhuming without a tombstone changes nothing.
        db.put(&obj).unwrap();
        db.inhume(&[obj.address], None).unwrap();

        assert!(matches!(
            db.get(&obj.address, false),
            Err(MetaError::AlreadyRemoved(_))
        ));
        db.close().unwrap();
    }

    #[test]
    fn inhume_many_targets_at_once() {
        let dir = TempDir::new().unwrap();
        let db = new_db(&dir, 0);

        let a = generate_object(b"a");
        let b = generate_object(b"b");
        let ts = generate_object(b"ts");
        db.put(&a).unwrap();
        db.put(&b).unwrap();
        db.inhume(&[a.address, b.address], Some(ts.address)).unwrap();

        for addr in [a.address, b.address] {
            assert!(matches!(
                db.get(&addr, false),
                Err(MetaError::AlreadyRemoved(_))
            ));
        }
        db.close().unwrap();
    }

    #[test]
    fn inhume_unknown_address_still_marks_it() {
        let dir = TempDir::new().unwrap();
        let db = new_db(&dir, 0);

        // Inhume may land before the object does; the mark must stick.
        let obj = generate_object(b"eager-removal");
        let ts = generate_object(b"ts");
        db.inhume(&[obj.address], Some(ts.address)).unwrap();
        db.put(&obj).unwrap();

        assert!(matches!(
            db.get(&obj.address, false),
            Err(MetaError::AlreadyRemoved(_))
        ));
        db.close().unwrap();
    }

    #[test]
    fn delete_clears_every_trace() {
        let dir = TempDir::new().unwrap();
        let db = new_db(&dir, 0);
        let cnr = ContainerId::from_bytes(b"cnr");

        let mut obj = generate_object_in(&cnr, b"doomed");
        add_attribute(&mut obj, "color", "red");
        db.put(&obj).unwrap();
        db.inhume(&[obj.address], None).unwrap();

        db.delete(&[obj.address]).unwrap();

        // Gone from reads and from the attribute index; the graveyard
        // record is gone too, so a fresh put is once again visible.
        assert!(matches!(
            db.get(&obj.address, false),
            Err(MetaError::NotFound(_))
        ));
        db.put(&obj).unwrap();
        assert_eq!(db.get(&obj.address, false).unwrap(), obj.header);

        let selected = db
            .select(&cnr, &[Filter::new("color", crate::select::MatchOp::Equal, "red")])
            .unwrap();
        assert_eq!(selected, vec![obj.address]);
        db.close().unwrap();
    }
}
