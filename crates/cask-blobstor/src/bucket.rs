//! Bucketed small-object sub-storage.
//!
//! Groups many small payloads into fixed-capacity append-only bucket files
//! arranged in a shallow directory tree of configurable depth and width,
//! keeping per-object filesystem overhead low. The leaf directory for an
//! address is chosen by hashing the address key; a full bucket rotates to a
//! numbered successor in the same leaf.
//!
//! On-disk record format:
//! ```text
//! [4 bytes: record length (little-endian u32) = 1 + 64 + payload length]
//! [4 bytes: CRC32 of the record bytes (little-endian u32)]
//! [1 byte:  flags (0 = put, 1 = delete marker)]
//! [64 bytes: address key]
//! [N bytes: payload]
//! ```
//!
//! The address index is held in memory and rebuilt on `init` by replaying
//! every bucket in order; a torn tail record from a crash is skipped with a
//! warning. Deletion appends a delete marker and drops the index entry;
//! the dead bytes are reclaimed only by external compaction.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use cask_types::{Address, ContainerId, ObjectId};
use tracing::{debug, info, warn};

use crate::error::{BlobError, BlobResult};
use crate::storage::SubStorage;

/// Record header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Address key size inside a record.
const ADDRESS_SIZE: usize = 64;

const FLAG_PUT: u8 = 0;
const FLAG_DELETE: u8 = 1;

/// Configuration for a [`BucketTree`].
#[derive(Clone, Debug)]
pub struct BucketTreeConfig {
    /// Root directory of the tree.
    pub path: PathBuf,
    /// Number of directory levels between the root and the bucket files.
    pub depth: usize,
    /// Number of subdirectories per level.
    pub width: usize,
    /// Capacity of one bucket file in bytes; a bucket that would exceed it
    /// rotates to a numbered successor.
    pub bucket_capacity: u64,
    /// Unix permission bits applied to created directories.
    pub permissions: u32,
}

impl BucketTreeConfig {
    /// Default configuration rooted at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            depth: 1,
            width: 16,
            bucket_capacity: 4 * 1024 * 1024,
            permissions: 0o700,
        }
    }

    /// Set the directory fan-out depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the per-level directory width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Set the bucket file capacity in bytes.
    pub fn with_bucket_capacity(mut self, capacity: u64) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    /// Set the unix permission bits for created directories.
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Where a payload lives: leaf directory, bucket number, record offset.
#[derive(Clone, Debug)]
struct Location {
    leaf: PathBuf,
    bucket: u32,
    /// Offset of the record header within the bucket file.
    offset: u64,
    payload_len: u32,
}

/// Append handle for the active bucket of one leaf directory.
struct LeafWriter {
    file: File,
    bucket: u32,
    size: u64,
}

/// Bucketed small-object store.
pub struct BucketTree {
    config: BucketTreeConfig,
    index: RwLock<HashMap<Address, Location>>,
    writers: Mutex<HashMap<PathBuf, LeafWriter>>,
}

impl BucketTree {
    /// Create a bucket tree with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured width or bucket capacity is zero; that is a
    /// construction-time misuse, not a runtime condition.
    pub fn new(config: BucketTreeConfig) -> Self {
        assert!(config.width > 0, "bucket tree width must be positive");
        assert!(
            config.bucket_capacity > 0,
            "bucket capacity must be positive"
        );
        Self {
            config,
            index: RwLock::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of payloads currently indexed.
    pub fn len(&self) -> usize {
        self.index.read().expect("index lock poisoned").len()
    }

    /// Returns `true` if no payloads are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn leaf_dir(&self, address: &Address) -> PathBuf {
        let hash = blake3::hash(&address.to_key_bytes());
        let bytes = hash.as_bytes();
        let mut path = self.config.path.clone();
        for level in 0..self.config.depth {
            path.push(format!("{}", bytes[level] as usize % self.config.width));
        }
        path
    }

    fn bucket_path(leaf: &Path, bucket: u32) -> PathBuf {
        leaf.join(format!("bucket-{bucket:06}.dat"))
    }

    fn create_dir(&self, path: &Path) -> BlobResult<()> {
        fs::create_dir_all(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.config.permissions))?;
        }
        Ok(())
    }

    /// Append one record to the leaf's active bucket, rotating first if the
    /// record would overflow it. Returns the bucket number and record offset.
    fn append_record(
        &self,
        address: &Address,
        flags: u8,
        payload: &[u8],
    ) -> BlobResult<(PathBuf, u32, u64)> {
        let leaf = self.leaf_dir(address);
        let record_len = (1 + ADDRESS_SIZE + payload.len()) as u32;
        let total = HEADER_SIZE + record_len as u64;

        let mut writers = self.writers.lock().expect("writers lock poisoned");
        let writer = match writers.entry(leaf.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                self.create_dir(&leaf)?;
                let (bucket, size) = latest_bucket(&leaf)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(Self::bucket_path(&leaf, bucket))?;
                e.insert(LeafWriter { file, bucket, size })
            }
        };

        if writer.size > 0 && writer.size + total > self.config.bucket_capacity {
            writer.file.sync_all()?;
            writer.bucket += 1;
            writer.size = 0;
            writer.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Self::bucket_path(&leaf, writer.bucket))?;
            debug!(leaf = %leaf.display(), bucket = writer.bucket, "rotated bucket");
        }

        let mut record = Vec::with_capacity(1 + ADDRESS_SIZE + payload.len());
        record.push(flags);
        record.extend_from_slice(&address.to_key_bytes());
        record.extend_from_slice(payload);
        let crc = crc32fast::hash(&record);

        let offset = writer.size;
        writer.file.write_all(&record_len.to_le_bytes())?;
        writer.file.write_all(&crc.to_le_bytes())?;
        writer.file.write_all(&record)?;
        writer.size += total;

        Ok((leaf, writer.bucket, offset))
    }

    fn read_record(&self, location: &Location) -> BlobResult<Vec<u8>> {
        let path = Self::bucket_path(&location.leaf, location.bucket);
        let corrupt = |reason: &str| BlobError::Corrupted {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(location.offset))?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let record_len = u32::from_le_bytes(header[0..4].try_into().expect("4-byte slice"));
        let crc = u32::from_le_bytes(header[4..8].try_into().expect("4-byte slice"));

        if record_len as usize != 1 + ADDRESS_SIZE + location.payload_len as usize {
            return Err(corrupt("record length does not match index"));
        }

        let mut record = vec![0u8; record_len as usize];
        file.read_exact(&mut record)?;
        if crc32fast::hash(&record) != crc {
            return Err(corrupt("CRC mismatch"));
        }

        Ok(record[1 + ADDRESS_SIZE..].to_vec())
    }

    /// Replay every bucket under one leaf directory into the index.
    fn replay_leaf(&self, leaf: &Path, index: &mut HashMap<Address, Location>) -> BlobResult<()> {
        let mut buckets: Vec<u32> = Vec::new();
        for entry in fs::read_dir(leaf)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(num) = name
                .strip_prefix("bucket-")
                .and_then(|s| s.strip_suffix(".dat"))
                .and_then(|s| s.parse().ok())
            {
                buckets.push(num);
            }
        }
        buckets.sort_unstable();

        for bucket in buckets {
            let path = Self::bucket_path(leaf, bucket);
            let mut data = Vec::new();
            File::open(&path)?.read_to_end(&mut data)?;

            let mut offset = 0usize;
            while offset < data.len() {
                if data.len() - offset < HEADER_SIZE as usize {
                    warn!(path = %path.display(), offset, "torn record header, truncating scan");
                    break;
                }
                let record_len =
                    u32::from_le_bytes(data[offset..offset + 4].try_into().expect("4-byte slice"))
                        as usize;
                let crc = u32::from_le_bytes(
                    data[offset + 4..offset + 8].try_into().expect("4-byte slice"),
                );
                let body_start = offset + HEADER_SIZE as usize;
                if record_len < 1 + ADDRESS_SIZE || data.len() - body_start < record_len {
                    warn!(path = %path.display(), offset, "torn record body, truncating scan");
                    break;
                }
                let record = &data[body_start..body_start + record_len];
                if crc32fast::hash(record) != crc {
                    warn!(path = %path.display(), offset, "record CRC mismatch, truncating scan");
                    break;
                }

                let flags = record[0];
                let key: [u8; ADDRESS_SIZE] =
                    record[1..1 + ADDRESS_SIZE].try_into().expect("64-byte slice");
                let address = address_from_key(&key);

                match flags {
                    FLAG_DELETE => {
                        index.remove(&address);
                    }
                    _ => {
                        index.insert(
                            address,
                            Location {
                                leaf: leaf.to_path_buf(),
                                bucket,
                                offset: offset as u64,
                                payload_len: (record_len - 1 - ADDRESS_SIZE) as u32,
                            },
                        );
                    }
                }
                offset = body_start + record_len;
            }
        }
        Ok(())
    }

    fn leaf_dirs(&self) -> BlobResult<Vec<PathBuf>> {
        let mut dirs = vec![self.config.path.clone()];
        for _ in 0..self.config.depth {
            let mut next = Vec::new();
            for dir in &dirs {
                for entry in fs::read_dir(dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        next.push(entry.path());
                    }
                }
            }
            dirs = next;
        }
        Ok(dirs)
    }
}

fn address_from_key(key: &[u8; ADDRESS_SIZE]) -> Address {
    let mut cnr = [0u8; 32];
    let mut obj = [0u8; 32];
    cnr.copy_from_slice(&key[..32]);
    obj.copy_from_slice(&key[32..]);
    Address::new(ContainerId::from_hash(cnr), ObjectId::from_hash(obj))
}

/// Highest-numbered bucket in a leaf directory and its current size.
fn latest_bucket(leaf: &Path) -> BlobResult<(u32, u64)> {
    let mut latest = 0u32;
    for entry in fs::read_dir(leaf)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(num) = name
            .strip_prefix("bucket-")
            .and_then(|s| s.strip_suffix(".dat"))
            .and_then(|s| s.parse().ok())
        {
            latest = latest.max(num);
        }
    }
    let size = match fs::metadata(BucketTree::bucket_path(leaf, latest)) {
        Ok(m) => m.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };
    Ok((latest, size))
}

impl SubStorage for BucketTree {
    fn open(&self) -> BlobResult<()> {
        self.create_dir(&self.config.path)?;
        info!(path = %self.config.path.display(), "opened bucket tree");
        Ok(())
    }

    fn init(&self) -> BlobResult<()> {
        let mut index = HashMap::new();
        for leaf in self.leaf_dirs()? {
            self.replay_leaf(&leaf, &mut index)?;
        }
        info!(
            path = %self.config.path.display(),
            objects = index.len(),
            "bucket tree index rebuilt"
        );
        *self.index.write().expect("index lock poisoned") = index;
        Ok(())
    }

    fn close(&self) -> BlobResult<()> {
        let mut writers = self.writers.lock().expect("writers lock poisoned");
        for writer in writers.values_mut() {
            writer.file.sync_all()?;
        }
        writers.clear();
        Ok(())
    }

    fn put(&self, address: &Address, data: &[u8]) -> BlobResult<()> {
        let (leaf, bucket, offset) = self.append_record(address, FLAG_PUT, data)?;
        self.index.write().expect("index lock poisoned").insert(
            *address,
            Location {
                leaf,
                bucket,
                offset,
                payload_len: data.len() as u32,
            },
        );
        Ok(())
    }

    fn get(&self, address: &Address) -> BlobResult<Vec<u8>> {
        let location = self
            .index
            .read()
            .expect("index lock poisoned")
            .get(address)
            .cloned()
            .ok_or(BlobError::NotFound(*address))?;
        self.read_record(&location)
    }

    fn exists(&self, address: &Address) -> BlobResult<bool> {
        Ok(self
            .index
            .read()
            .expect("index lock poisoned")
            .contains_key(address))
    }

    fn delete(&self, address: &Address) -> BlobResult<()> {
        if !self
            .index
            .read()
            .expect("index lock poisoned")
            .contains_key(address)
        {
            return Err(BlobError::NotFound(*address));
        }
        self.append_record(address, FLAG_DELETE, &[])?;
        self.index
            .write()
            .expect("index lock poisoned")
            .remove(address);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "buckettree"
    }

    fn path(&self) -> &Path {
        &self.config.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_tree(dir: &TempDir) -> BucketTree {
        let tree = BucketTree::new(BucketTreeConfig::new(dir.path().join("buckets")));
        tree.open().unwrap();
        tree.init().unwrap();
        tree
    }

    fn test_address(seed: &[u8]) -> Address {
        Address::new(ContainerId::from_bytes(seed), ObjectId::from_bytes(seed))
    }

    // -----------------------------------------------------------------------
    // Basic operations
    // -----------------------------------------------------------------------

    #[test]
    fn put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let tree = test_tree(&dir);
        let addr = test_address(b"roundtrip");

        tree.put(&addr, b"small payload").unwrap();
        assert_eq!(tree.get(&addr).unwrap(), b"small payload");
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let tree = test_tree(&dir);
        let result = tree.get(&test_address(b"missing"));
        assert!(matches!(result, Err(BlobError::NotFound(_))));
    }

    #[test]
    fn overwrite_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let tree = test_tree(&dir);
        let addr = test_address(b"overwrite");

        tree.put(&addr, b"first").unwrap();
        tree.put(&addr, b"second").unwrap();
        assert_eq!(tree.get(&addr).unwrap(), b"second");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn delete_appends_marker_and_drops_entry() {
        let dir = TempDir::new().unwrap();
        let tree = test_tree(&dir);
        let addr = test_address(b"delete");

        tree.put(&addr, b"data").unwrap();
        tree.delete(&addr).unwrap();

        assert!(!tree.exists(&addr).unwrap());
        assert!(matches!(tree.get(&addr), Err(BlobError::NotFound(_))));
        assert!(matches!(tree.delete(&addr), Err(BlobError::NotFound(_))));
    }

    // -----------------------------------------------------------------------
    // Rotation
    // -----------------------------------------------------------------------

    #[test]
    fn full_bucket_rotates() {
        let dir = TempDir::new().unwrap();
        let tree = BucketTree::new(
            BucketTreeConfig::new(dir.path().join("buckets"))
                .with_depth(0)
                .with_bucket_capacity(256),
        );
        tree.open().unwrap();
        tree.init().unwrap();

        for i in 0..8u8 {
            let addr = test_address(&[i; 8]);
            tree.put(&addr, &[i; 100]).unwrap();
        }

        // Everything is still readable after rotation.
        for i in 0..8u8 {
            let addr = test_address(&[i; 8]);
            assert_eq!(tree.get(&addr).unwrap(), vec![i; 100]);
        }

        // More than one bucket file exists at the root (depth 0).
        let buckets = fs::read_dir(dir.path().join("buckets"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("bucket-"))
            .count();
        assert!(buckets > 1, "expected rotation, got {buckets} bucket(s)");
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    #[test]
    fn index_rebuilt_after_reopen() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("buckets");

        let addr_kept = test_address(b"kept");
        let addr_deleted = test_address(b"deleted");
        {
            let tree = BucketTree::new(BucketTreeConfig::new(&root));
            tree.open().unwrap();
            tree.init().unwrap();
            tree.put(&addr_kept, b"kept payload").unwrap();
            tree.put(&addr_deleted, b"doomed payload").unwrap();
            tree.delete(&addr_deleted).unwrap();
            tree.close().unwrap();
        }

        let tree = BucketTree::new(BucketTreeConfig::new(&root));
        tree.open().unwrap();
        tree.init().unwrap();

        assert_eq!(tree.get(&addr_kept).unwrap(), b"kept payload");
        assert!(!tree.exists(&addr_deleted).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn torn_tail_is_skipped_on_replay() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("buckets");

        let good = test_address(b"good");
        let torn = test_address(b"torn");
        {
            let tree = BucketTree::new(BucketTreeConfig::new(&root).with_depth(0));
            tree.open().unwrap();
            tree.init().unwrap();
            tree.put(&good, b"good payload").unwrap();
            tree.put(&torn, b"torn payload").unwrap();
            tree.close().unwrap();
        }

        // Chop a few bytes off the bucket tail to simulate a torn write.
        let bucket = root.join("bucket-000000.dat");
        let len = fs::metadata(&bucket).unwrap().len();
        let file = OpenOptions::new().write(true).open(&bucket).unwrap();
        file.set_len(len - 5).unwrap();

        let tree = BucketTree::new(BucketTreeConfig::new(&root).with_depth(0));
        tree.open().unwrap();
        tree.init().unwrap();

        assert_eq!(tree.get(&good).unwrap(), b"good payload");
        assert!(!tree.exists(&torn).unwrap());
    }

    // -----------------------------------------------------------------------
    // Construction misuse
    // -----------------------------------------------------------------------

    #[test]
    #[should_panic(expected = "width must be positive")]
    fn zero_width_panics() {
        BucketTree::new(BucketTreeConfig::new("x").with_width(0));
    }
}
