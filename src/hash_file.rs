//! Extendible hashing storage
//!
//! A hash file is two files on disk: a directory mapping the low bits of a
//! key's hash to a bucket slot, and a bucket file holding fixed size buckets.
//! When a bucket overflows it is split in two using one more bit of the
//! hash, doubling the directory first if the bucket was only reachable from
//! a single entry.

use crate::bits::{low_bits, set_bit, test_bit, to_binary_string, NUM_BITS};
use crate::bucket::Bucket;
use crate::config::HashFileConfig;
use crate::consts::*;
use crate::directory::Directory;
use crate::error::{Add, Error, Insert, Removal, Result};
use crate::hash::{KeyHasher, XxHasher};
use crate::record::{Key, Payload, Record};
use std::ffi::OsString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Hash storage engine
///
/// Serves one caller at a time. Every operation runs to completion against
/// the files before returning, buckets are never cached between calls.
pub struct HashFile<H = XxHasher> {
    config: HashFileConfig,
    hasher: H,
    session: Option<Session>,
}

/// The state of an open hash file
struct Session {
    name: PathBuf,

    /// The file containing the directory and its depth
    ///
    /// ## File layout
    /// - First u32 is the depth
    /// - Next is followed by `2^depth` u32 bucket addresses
    ///
    /// The directory is only written back on sync and close.
    directory_file: File,

    /// The file containing the buckets
    ///
    /// ## File layout
    /// - First u32 is the number of current buckets
    /// - Followed by slots of `BUCKET_SIZE`, with each slot being a bucket
    buckets_file: File,

    /// The current number of buckets, we need this to know where to create
    /// new buckets. Slots are only ever appended, never reused.
    bucket_count: u32,

    directory: Directory,
}

impl HashFile<XxHasher> {
    pub fn new(config: HashFileConfig) -> Self {
        Self::with_hasher(config, XxHasher::default())
    }
}

impl<H: KeyHasher> HashFile<H> {
    /// A closed hash file that will address keys with `hasher`
    ///
    /// The same hasher has to be used every time a given file is opened.
    pub fn with_hasher(config: HashFileConfig, hasher: H) -> Self {
        Self {
            config,
            hasher,
            session: None,
        }
    }

    /// Opens the existing `<name>.ehd` and `<name>.ehf` files
    ///
    /// An already open file is closed first. On failure the hash file is
    /// left closed.
    pub fn open<P: AsRef<Path>>(&mut self, name: P) -> Result<()> {
        self.close()?;
        let session = Session::open_existing(name.as_ref())?;
        debug!(
            name = %session.name.display(),
            depth = session.directory.depth(),
            buckets = session.bucket_count,
            "opened hash file"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Creates `<name>.ehd` and `<name>.ehf`, truncating any existing files
    ///
    /// The new file has a directory of depth 1 pointing at two empty buckets.
    pub fn create<P: AsRef<Path>>(&mut self, name: P) -> Result<()> {
        self.close()?;
        let session = Session::create_new(name.as_ref())?;
        debug!(name = %session.name.display(), "created hash file");
        self.session = Some(session);
        Ok(())
    }

    /// Opens `name`, creating it from scratch unless `open_existing` is set
    pub fn open_with<P: AsRef<Path>>(&mut self, name: P, open_existing: bool) -> Result<()> {
        if open_existing {
            self.open(name)
        } else {
            self.create(name)
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Writes the directory and bucket count back without closing
    pub fn sync(&mut self) -> Result<()> {
        self.session.as_mut().ok_or(Error::NotOpen)?.sync()
    }

    /// Writes the directory and bucket count back and releases both files
    ///
    /// The file is closed even when the write back fails. Closing a file
    /// that is not open does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let result = session.sync();
        debug!(name = %session.name.display(), "closed hash file");
        result
    }

    /// Inserts `payload` under `key`
    ///
    /// A full bucket is split and the insert retried, up to the configured
    /// number of attempts. Running out of attempts means the hash function
    /// is not telling the keys apart.
    pub fn insert(&mut self, key: &Key, payload: &Payload) -> Result<Insert> {
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        let record = Record::new(key, payload);
        let hash = self.hasher.hash(key);
        let attempts = self.config.max_insert_attempts;

        for attempt in 1..=attempts {
            let index = session.directory.index_of(hash);
            let mut bucket = session.bucket_for(index)?;
            match bucket.add(&record) {
                Add::Inserted => {
                    bucket.write(&mut session.buckets_file)?;
                    trace!(%key, bucket = bucket.address(), "inserted");
                    return Ok(Insert::Inserted);
                }
                Add::AlreadyPresent => return Ok(Insert::AlreadyPresent),
                Add::Full => {
                    let depth = bucket.depth();
                    debug!(%key, attempt, bucket = bucket.address(), depth, "bucket full");
                    session.accommodate(index, depth, &self.hasher, self.config.max_depth)?;
                }
            }
        }

        warn!(%key, attempts, "giving up on insert, hash function is not spreading keys");
        Err(Error::PoorHashFunction { attempts })
    }

    /// The payload stored under `key`
    pub fn retrieve(&mut self, key: &Key) -> Result<Option<Payload>> {
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        let index = session.directory.index_of(self.hasher.hash(key));
        let bucket = session.bucket_for(index)?;
        Ok(bucket.retrieve(key))
    }

    /// Removes the record stored under `key`
    ///
    /// The emptied space stays with the bucket. With coalescing enabled the
    /// bucket is merged with its buddy when they fit in one bucket.
    pub fn delete(&mut self, key: &Key) -> Result<Removal> {
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        let index = session.directory.index_of(self.hasher.hash(key));
        let mut bucket = session.bucket_for(index)?;
        let removal = bucket.delete(key);
        if removal == Removal::Deleted {
            bucket.write(&mut session.buckets_file)?;
            trace!(%key, bucket = bucket.address(), "deleted");
            if self.config.coalesce_on_delete {
                session.coalesce(index)?;
            }
        }
        Ok(removal)
    }

    /// Walks every directory entry and lists the keys of the bucket it points at
    pub fn summary(&mut self) -> Result<Summary> {
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        let mut entries = Vec::with_capacity(session.directory.address_count());
        for index in 0..session.directory.address_count() as u32 {
            let bucket = session.bucket_for(index)?;
            entries.push(SummaryEntry {
                index,
                bucket: bucket.address(),
                bucket_depth: bucket.depth(),
                keys: bucket.records().iter().map(|record| record.key()).collect(),
            });
        }
        Ok(Summary {
            depth: session.directory.depth(),
            bucket_count: session.bucket_count,
            entries,
        })
    }

    /// Current directory depth, `None` when closed
    pub fn depth(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.directory.depth())
    }

    /// Number of bucket slots in the bucket file, `None` when closed
    pub fn bucket_count(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.bucket_count)
    }

    pub fn directory(&self) -> Option<&Directory> {
        self.session.as_ref().map(|s| &s.directory)
    }

    pub fn config(&self) -> &HashFileConfig {
        &self.config
    }
}

impl<H> Drop for HashFile<H> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.sync() {
                warn!(name = %session.name.display(), %err, "failed to close hash file");
            }
        }
    }
}

impl Session {
    fn open_existing(name: &Path) -> Result<Self> {
        let (index_path, bucket_path) = resource_paths(name);
        let mut directory_file = open_file(&index_path, false)?;
        let mut buckets_file = open_file(&bucket_path, false)?;

        let directory = Directory::load(&mut directory_file)?;
        let bucket_count = read_bucket_count(&mut buckets_file)?;

        let index_len = directory_file.metadata().map_err(Error::Read)?.len();
        let expected_len = (DIRECTORY_WORD * (1 + directory.address_count())) as u64;
        if index_len != expected_len {
            return Err(Error::Corrupt(format!(
                "directory file is {} bytes, expected {}",
                index_len, expected_len
            )));
        }
        if bucket_count < INITIAL_BUCKETS {
            return Err(Error::Corrupt(format!("bucket count {}", bucket_count)));
        }
        let buckets_len = buckets_file.metadata().map_err(Error::Read)?.len();
        let needed = BUCKET_FILE_HEADER as u64 + bucket_count as u64 * BUCKET_SIZE as u64;
        if buckets_len < needed {
            return Err(Error::Corrupt(format!(
                "bucket file is {} bytes, {} buckets need {}",
                buckets_len, bucket_count, needed
            )));
        }
        if let Some(address) = directory
            .addresses()
            .iter()
            .find(|address| **address >= bucket_count)
        {
            return Err(Error::Corrupt(format!(
                "directory points at bucket {} of {}",
                address, bucket_count
            )));
        }

        Ok(Self {
            name: name.to_path_buf(),
            directory_file,
            buckets_file,
            bucket_count,
            directory,
        })
    }

    fn create_new(name: &Path) -> Result<Self> {
        let (index_path, bucket_path) = resource_paths(name);
        let directory_file = open_file(&index_path, true)?;
        let mut buckets_file = open_file(&bucket_path, true)?;

        let mut directory = Directory::new(1);
        for address in 0..INITIAL_BUCKETS {
            directory.set_address(address, address);
            Bucket::new(address, directory.depth()).write(&mut buckets_file)?;
        }

        let mut session = Self {
            name: name.to_path_buf(),
            directory_file,
            buckets_file,
            bucket_count: INITIAL_BUCKETS,
            directory,
        };
        session.sync()?;
        Ok(session)
    }

    fn sync(&mut self) -> Result<()> {
        self.directory.persist(&mut self.directory_file)?;
        // a halved directory leaves a stale tail behind
        let len = (DIRECTORY_WORD * (1 + self.directory.address_count())) as u64;
        self.directory_file.set_len(len).map_err(Error::Write)?;
        write_bucket_count(&mut self.buckets_file, self.bucket_count)?;
        self.directory_file.flush().map_err(Error::Write)?;
        self.buckets_file.flush().map_err(Error::Write)?;
        Ok(())
    }

    /// Loads the bucket the directory entry `index` points at
    fn bucket_for(&mut self, index: u32) -> Result<Bucket> {
        let address = self.directory.address(index).ok_or_else(|| {
            Error::Corrupt(format!(
                "directory index {} out of range at depth {}",
                index,
                self.directory.depth()
            ))
        })?;
        Bucket::read_at(&mut self.buckets_file, address)
    }

    /// Makes room for a record addressed to the full bucket at `index`
    ///
    /// The bucket is split on bit `bucket_depth`. Every directory entry that
    /// used to reach the bucket and has that bit set is repointed to the new
    /// half. For example with a directory depth of 10, a bucket depth of 6
    /// and an index of 200, the bucket holds the pattern 001000 and is
    /// reachable from 8, 72, 136, 200, ... 968. After the split 8, 136, ...
    /// 904 (pattern 0001000) still point at the old slot while 72, 200, ...
    /// 968 (pattern 1001000) point at the new one.
    fn accommodate<H: KeyHasher>(
        &mut self,
        index: u32,
        bucket_depth: u32,
        hasher: &H,
        max_depth: u32,
    ) -> Result<()> {
        if bucket_depth > self.directory.depth() {
            return Err(Error::Corrupt(format!(
                "bucket at index {} has depth {} past the directory depth {}",
                index,
                bucket_depth,
                self.directory.depth()
            )));
        }
        if bucket_depth >= max_depth {
            warn!(index, bucket_depth, max_depth, "bucket cannot be split further");
            return Err(Error::MaxTableDepth(max_depth));
        }
        let bucket_value = low_bits(index, bucket_depth);
        let new_bucket = self.split_bucket(index, bucket_depth, hasher)?;

        if bucket_depth == self.directory.depth() {
            // only one entry reaches the bucket, there is nothing to repoint
            // until the directory has another bit
            self.directory.increase_depth();
        }

        let unused_bits = self.directory.depth() - (bucket_depth + 1);
        for upper in 0..(1_u32 << unused_bits) {
            let entry = (upper << (bucket_depth + 1)) | (1 << bucket_depth) | bucket_value;
            self.directory.set_address(entry, new_bucket);
        }
        Ok(())
    }

    /// Splits the bucket holding `index`'s low `bucket_depth` bits in two
    ///
    /// The half whose new bit is 0 keeps the original slot, the half whose
    /// new bit is 1 is appended to the end of the bucket file. Returns the
    /// slot of the appended half. The bucket count only grows once both
    /// halves are on disk.
    fn split_bucket<H: KeyHasher>(
        &mut self,
        index: u32,
        bucket_depth: u32,
        hasher: &H,
    ) -> Result<u32> {
        let old_pattern = low_bits(index, bucket_depth);
        let existing = self.bucket_for(old_pattern)?;
        let new_slot = self.bucket_count;
        split_into(
            &mut self.buckets_file,
            &existing,
            old_pattern,
            bucket_depth,
            new_slot,
            hasher,
        )?;
        self.bucket_count += 1;
        Ok(new_slot)
    }

    /// Merges the bucket at `index` with its buddy for as long as both halves
    /// fit in one bucket, then halves the directory while it allows
    ///
    /// The merged bucket keeps the slot of the half whose top bit is 0, the
    /// other slot is left unused.
    fn coalesce(&mut self, index: u32) -> Result<()> {
        loop {
            let bucket = self.bucket_for(index)?;
            let depth = bucket.depth();
            if depth <= 1 {
                break;
            }
            let pattern = low_bits(index, depth);
            let buddy = self.bucket_for(pattern ^ (1 << (depth - 1)))?;
            if buddy.address() == bucket.address()
                || buddy.depth() != depth
                || bucket.record_count() + buddy.record_count() > BUCKET_CAPACITY
            {
                break;
            }

            let (low_half, high_half) = if test_bit(pattern, depth - 1) {
                (buddy, bucket)
            } else {
                (bucket, buddy)
            };
            let mut merged = Bucket::new(low_half.address(), depth - 1);
            for record in low_half.records().iter().chain(high_half.records()) {
                merged.add(record);
            }
            merged.write(&mut self.buckets_file)?;

            let shared = low_bits(index, depth - 1);
            let spare_bits = self.directory.depth() - (depth - 1);
            for upper in 0..(1_u32 << spare_bits) {
                self.directory
                    .set_address((upper << (depth - 1)) | shared, merged.address());
            }
            debug!(
                kept = merged.address(),
                freed = high_half.address(),
                depth = depth - 1,
                "merged buckets"
            );
        }
        while self.directory.decrease_depth() {}
        Ok(())
    }
}

/// Redistributes the records of `existing` over its own slot and `new_slot`
/// using bit `bucket_depth` of each key's hash
///
/// The appended slot is written before the original one is rewritten, so a
/// failed append leaves `existing` untouched on disk.
fn split_into<S: Write + Seek, H: KeyHasher>(
    store: &mut S,
    existing: &Bucket,
    old_pattern: u32,
    bucket_depth: u32,
    new_slot: u32,
    hasher: &H,
) -> Result<()> {
    let new_pattern = set_bit(old_pattern, bucket_depth);
    let new_depth = bucket_depth + 1;

    let mut old_half = Bucket::new(existing.address(), new_depth);
    let mut new_half = Bucket::new(new_slot, new_depth);
    for record in existing.records() {
        let pattern = low_bits(hasher.hash(&record.key()), new_depth);
        let half = if pattern == old_pattern {
            &mut old_half
        } else if pattern == new_pattern {
            &mut new_half
        } else {
            panic!(
                "record {} hashes to {} which is neither {} nor {}, the bucket was misaddressed",
                record.key(),
                to_binary_string(pattern, new_depth),
                to_binary_string(old_pattern, new_depth),
                to_binary_string(new_pattern, new_depth),
            );
        };
        trace!(key = %record.key(), bucket = half.address(), "redistributed");
        half.add(record);
    }

    new_half.write(store)?;
    old_half.write(store)?;
    debug!(
        old = old_half.address(),
        new = new_slot,
        depth = new_depth,
        old_records = old_half.record_count(),
        new_records = new_half.record_count(),
        "split bucket"
    );
    Ok(())
}

/// Appends the index and bucket extensions to `name`
fn resource_paths(name: &Path) -> (PathBuf, PathBuf) {
    let with_extension = |extension: &str| {
        let mut path = OsString::from(name.as_os_str());
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    };
    (
        with_extension(INDEX_EXTENSION),
        with_extension(BUCKET_EXTENSION),
    )
}

fn open_file(path: &Path, create: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(create)
        .open(path)
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn read_bucket_count<R: Read + Seek>(file: &mut R) -> Result<u32> {
    file.seek(SeekFrom::Start(0)).map_err(Error::Read)?;
    let mut buf = [0_u8; BUCKET_FILE_HEADER];
    file.read_exact(&mut buf).map_err(Error::Read)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_bucket_count<W: Write + Seek>(file: &mut W, bucket_count: u32) -> Result<()> {
    file.seek(SeekFrom::Start(0)).map_err(Error::Write)?;
    file.write_all(&bucket_count.to_le_bytes())
        .map_err(Error::Write)?;
    Ok(())
}

/// A directory entry and the keys of the bucket it reaches
#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub index: u32,
    pub bucket: u32,
    pub bucket_depth: u32,
    pub keys: Vec<Key>,
}

/// Diagnostic dump of a whole hash file
#[derive(Debug, Clone)]
pub struct Summary {
    pub depth: u32,
    pub bucket_count: u32,
    pub entries: Vec<SummaryEntry>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pad = " ".repeat(NUM_BITS as usize);
        writeln!(f, "depth {}, {} buckets", self.depth, self.bucket_count)?;
        writeln!(f, "{:<width$} Record", "Address", width = NUM_BITS as usize)?;
        writeln!(f, "{}", "=".repeat(NUM_BITS as usize + 8))?;
        for entry in &self.entries {
            write!(f, "{}", to_binary_string(entry.index, NUM_BITS))?;
            for (i, key) in entry.keys.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", pad)?;
                }
                writeln!(f, " {}", key)?;
            }
            if entry.keys.is_empty() {
                writeln!(f)?;
            }
            writeln!(
                f,
                "Records in bucket {} (depth {}) : {}",
                entry.bucket,
                entry.bucket_depth,
                entry.keys.len()
            )?;
            writeln!(f, "{}", "-".repeat(NUM_BITS as usize + 8))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use tempfile::tempdir;

    fn key(s: &str) -> Key {
        Key::try_from(s).unwrap()
    }

    fn payload(s: &str) -> Payload {
        Payload::try_from(s).unwrap()
    }

    /// Hasher that reads the key as a decimal number, so tests can pick
    /// exactly which bucket a key lands in
    fn numeric(key: &Key) -> u32 {
        key.to_string().parse().unwrap_or(0)
    }

    #[test]
    fn resource_names() {
        let (index, buckets) = resource_paths(Path::new("/tmp/books"));
        assert_eq!(index, PathBuf::from("/tmp/books.ehd"));
        assert_eq!(buckets, PathBuf::from("/tmp/books.ehf"));
    }

    #[test]
    fn create_lays_out_two_buckets() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("fresh");
        let mut file = HashFile::new(HashFileConfig::new());
        file.create(&name).unwrap();
        assert_eq!(file.depth(), Some(1));
        assert_eq!(file.bucket_count(), Some(2));
        assert_eq!(file.directory().unwrap().addresses(), &[0, 1]);
        file.close().unwrap();

        let index = std::fs::read(dir.path().join("fresh.ehd")).unwrap();
        assert_eq!(index, [1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
        let buckets = std::fs::read(dir.path().join("fresh.ehf")).unwrap();
        assert_eq!(buckets.len(), BUCKET_FILE_HEADER + 2 * BUCKET_SIZE);
        assert_eq!(&buckets[..4], &2_u32.to_le_bytes());
        // record count 0 and depth 1 for the first bucket
        assert_eq!(&buckets[4..12], &[0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn split_keeps_old_slot_and_appends_new() {
        let dir = tempdir().unwrap();
        let mut file = HashFile::with_hasher(HashFileConfig::new(), numeric);
        file.create(dir.path().join("split")).unwrap();

        // even keys all land in bucket 0
        for i in 0..BUCKET_CAPACITY as u32 {
            let k = key(&(i * 2).to_string());
            assert_eq!(file.insert(&k, &payload("even")).unwrap(), Insert::Inserted);
        }
        assert_eq!(file.bucket_count(), Some(2));

        let k = key(&(BUCKET_CAPACITY * 2).to_string());
        assert_eq!(file.insert(&k, &payload("even")).unwrap(), Insert::Inserted);
        assert_eq!(file.depth(), Some(2));
        assert_eq!(file.bucket_count(), Some(3));
        // 00 stays on slot 0, 10 goes to the new slot 2, 01 and 11 share slot 1
        assert_eq!(file.directory().unwrap().addresses(), &[0, 1, 2, 1]);

        let summary = file.summary().unwrap();
        assert_eq!(summary.entries[0].keys.len() + summary.entries[2].keys.len(), 17);
        assert!(summary.entries[0]
            .keys
            .iter()
            .all(|k| numeric(k) % 4 == 0));
        assert!(summary.entries[2]
            .keys
            .iter()
            .all(|k| numeric(k) % 4 == 2));
        assert_eq!(summary.entries[1].bucket_depth, 1);
        assert_eq!(summary.entries[0].bucket_depth, 2);

        for i in 0..=BUCKET_CAPACITY as u32 {
            let k = key(&(i * 2).to_string());
            assert_eq!(file.retrieve(&k).unwrap(), Some(payload("even")));
        }
    }

    #[test]
    fn split_without_doubling_repoints_every_matching_entry() {
        let dir = tempdir().unwrap();
        let mut file = HashFile::with_hasher(HashFileConfig::new(), numeric);
        file.create(dir.path().join("repoint")).unwrap();

        // multiples of 4 push the directory to depth 3 via bucket 0
        for i in 0..=BUCKET_CAPACITY as u32 {
            file.insert(&key(&(i * 4).to_string()), &payload("x")).unwrap();
        }
        assert_eq!(file.depth(), Some(3));
        let before = file.directory().unwrap().addresses().to_vec();
        // slot 1 is still depth 1 and reached by 001, 011, 101, 111
        assert_eq!(before[1], 1);
        assert_eq!(before[3], 1);
        assert_eq!(before[5], 1);
        assert_eq!(before[7], 1);

        // overflow slot 1 with odd keys, depth 1 < 3 so no doubling
        for i in 0..=BUCKET_CAPACITY as u32 {
            file.insert(&key(&(i * 4 + 1).to_string()), &payload("x")).unwrap();
        }
        // first split on bit 1 moves 011 and 111 to slot 4, the second on
        // bit 2 moves 101 to slot 5
        let after = file.directory().unwrap().addresses().to_vec();
        assert_eq!(file.depth(), Some(3));
        assert_eq!(after, vec![0, 1, 2, 4, 3, 5, 2, 4]);
        assert_eq!(before[0], after[0]);
        assert_eq!(before[4], after[4]);
    }

    #[test]
    fn constant_hash_is_reported() {
        let dir = tempdir().unwrap();
        let mut file = HashFile::with_hasher(HashFileConfig::new(), |_: &Key| 0_u32);
        file.create(dir.path().join("constant")).unwrap();
        for i in 0..BUCKET_CAPACITY {
            file.insert(&key(&i.to_string()), &payload("p")).unwrap();
        }
        let err = file
            .insert(&key(&BUCKET_CAPACITY.to_string()), &payload("p"))
            .unwrap_err();
        assert!(matches!(err, Error::PoorHashFunction { attempts: 5 }));
        // every attempt split once
        assert_eq!(file.depth(), Some(6));
        assert_eq!(file.bucket_count(), Some(7));
        for i in 0..BUCKET_CAPACITY {
            assert!(file.retrieve(&key(&i.to_string())).unwrap().is_some());
        }
    }

    #[test]
    fn depth_ceiling_is_reported() {
        let dir = tempdir().unwrap();
        let config = HashFileConfig::new().set_max_depth(3);
        let mut file = HashFile::with_hasher(config, |_: &Key| 0_u32);
        file.create(dir.path().join("ceiling")).unwrap();
        for i in 0..BUCKET_CAPACITY {
            file.insert(&key(&i.to_string()), &payload("p")).unwrap();
        }
        let err = file.insert(&key("last"), &payload("p")).unwrap_err();
        assert!(matches!(err, Error::MaxTableDepth(3)));
        assert_eq!(file.depth(), Some(3));
    }

    #[test]
    fn delete_rewrites_the_bucket() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("delete");
        let mut file = HashFile::new(HashFileConfig::new());
        file.create(&name).unwrap();
        file.insert(&key("123456"), &payload("Record for 123456")).unwrap();
        assert_eq!(file.delete(&key("123456")).unwrap(), Removal::Deleted);
        assert_eq!(file.delete(&key("123456")).unwrap(), Removal::NotPresent);
        file.close().unwrap();

        file.open(&name).unwrap();
        assert_eq!(file.retrieve(&key("123456")).unwrap(), None);
    }

    #[test]
    fn coalescing_shrinks_the_directory() {
        let dir = tempdir().unwrap();
        let config = HashFileConfig::new().coalesce_on_delete();
        let mut file = HashFile::with_hasher(config, numeric);
        file.create(dir.path().join("coalesce")).unwrap();

        let keys: Vec<Key> = (0..=BUCKET_CAPACITY as u32)
            .map(|i| key(&(i * 2).to_string()))
            .collect();
        for k in &keys {
            file.insert(k, &payload("v")).unwrap();
        }
        assert_eq!(file.depth(), Some(2));

        file.delete(&keys[0]).unwrap();
        // 16 records fit in one bucket again
        assert_eq!(file.depth(), Some(1));
        assert_eq!(file.directory().unwrap().addresses(), &[0, 1]);
        assert_eq!(file.bucket_count(), Some(3));
        for k in &keys[1..] {
            assert_eq!(file.retrieve(k).unwrap(), Some(payload("v")));
        }

        // the freed slot is not reused, splitting appends again
        file.insert(&keys[0], &payload("v")).unwrap();
        assert_eq!(file.bucket_count(), Some(4));
        assert_eq!(file.directory().unwrap().addresses(), &[0, 1, 3, 1]);
    }

    #[test]
    fn closed_file_rejects_operations() {
        let mut file = HashFile::new(HashFileConfig::new());
        assert!(!file.is_open());
        assert!(matches!(
            file.insert(&key("1"), &payload("p")),
            Err(Error::NotOpen)
        ));
        assert!(matches!(file.retrieve(&key("1")), Err(Error::NotOpen)));
        assert!(matches!(file.delete(&key("1")), Err(Error::NotOpen)));
        assert!(matches!(file.summary(), Err(Error::NotOpen)));
        assert!(matches!(file.sync(), Err(Error::NotOpen)));
        file.close().unwrap();
    }

    #[test]
    fn summary_renders_every_entry() {
        let dir = tempdir().unwrap();
        let mut file = HashFile::with_hasher(HashFileConfig::new(), numeric);
        file.create(dir.path().join("summary")).unwrap();
        file.insert(&key("2"), &payload("two")).unwrap();
        file.insert(&key("4"), &payload("four")).unwrap();
        file.insert(&key("3"), &payload("three")).unwrap();

        let summary = file.summary().unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].keys, vec![key("2"), key("4")]);
        assert_eq!(summary.entries[1].keys, vec![key("3")]);

        let text = summary.to_string();
        assert!(text.contains(&format!("{} 2\n", "0".repeat(32))));
        assert!(text.contains("Records in bucket 0 (depth 1) : 2"));
        assert!(text.contains("Records in bucket 1 (depth 1) : 1"));
    }

    /// In-memory bucket file that refuses to grow past `limit` bytes
    struct CappedStore {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Read for CappedStore {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for CappedStore {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.inner.position() + buf.len() as u64 > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "file too large"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for CappedStore {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    /// Slot 0 filled with the even keys 0..30 at depth 1, slot 1 empty
    fn two_buckets<S: Write + Seek>(store: &mut S) -> Bucket {
        write_bucket_count(store, INITIAL_BUCKETS).unwrap();
        let mut bucket = Bucket::new(0, 1);
        for i in 0..BUCKET_CAPACITY as u32 {
            let record = Record::new(&key(&(i * 2).to_string()), &payload("even"));
            assert_eq!(bucket.add(&record), Add::Inserted);
        }
        bucket.write(store).unwrap();
        Bucket::new(1, 1).write(store).unwrap();
        bucket
    }

    #[test]
    fn split_writes_both_halves() {
        let mut store = Cursor::new(Vec::new());
        let existing = two_buckets(&mut store);
        split_into(&mut store, &existing, 0, 1, 2, &numeric).unwrap();

        let old = Bucket::read_at(&mut store, 0).unwrap();
        let new = Bucket::read_at(&mut store, 2).unwrap();
        assert_eq!((old.depth(), new.depth()), (2, 2));
        assert_eq!(old.record_count() + new.record_count(), BUCKET_CAPACITY);
        assert!(old.records().iter().all(|r| numeric(&r.key()) % 4 == 0));
        assert!(new.records().iter().all(|r| numeric(&r.key()) % 4 == 2));
    }

    #[test]
    fn failed_append_keeps_the_original_bucket() {
        let limit = (BUCKET_FILE_HEADER + 2 * BUCKET_SIZE) as u64;
        let mut store = CappedStore {
            inner: Cursor::new(Vec::new()),
            limit,
        };
        let existing = two_buckets(&mut store);

        let err = split_into(&mut store, &existing, 0, 1, 2, &numeric).unwrap_err();
        assert!(matches!(err, Error::Write(_)));
        assert_eq!(store.inner.get_ref().len() as u64, limit);

        let reread = Bucket::read_at(&mut store, 0).unwrap();
        assert_eq!(reread.depth(), 1);
        assert_eq!(reread.records(), existing.records());
    }

    #[test]
    fn bucket_deeper_than_directory_is_corrupt() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("deep");
        let mut file = HashFile::with_hasher(HashFileConfig::new(), numeric);
        file.create(&name).unwrap();
        for i in 0..BUCKET_CAPACITY as u32 {
            file.insert(&key(&(i * 2).to_string()), &payload("even"))
                .unwrap();
        }
        file.close().unwrap();

        // depth field of slot 0
        let (_, bucket_path) = resource_paths(&name);
        let mut bytes = std::fs::read(&bucket_path).unwrap();
        let at = BUCKET_FILE_HEADER + 4;
        bytes[at..at + 4].copy_from_slice(&5_u32.to_le_bytes());
        std::fs::write(&bucket_path, bytes).unwrap();

        file.open(&name).unwrap();
        let err = file.insert(&key("32"), &payload("even")).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        assert_eq!(file.bucket_count(), Some(2));
        assert_eq!(file.depth(), Some(1));
        for i in 0..BUCKET_CAPACITY as u32 {
            assert!(file.retrieve(&key(&(i * 2).to_string())).unwrap().is_some());
        }
    }
}
