use crate::bytes::*;
use crate::consts::*;
use crate::error::{Add, Error, Removal, Result};
use crate::record::{Key, Payload, Record};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::trace;

const EMPTY_RECORD: Record = Record::from_raw([0; RECORD_SIZE]);

/// Rust representation of a bucket
///
/// ## Binary layout
///
/// - u32 number of records
/// - u32 depth
/// - `BUCKET_CAPACITY` record slots, densely packed from the front and
///   zero filled after the last record, then `RECORDS_PADDING` zero bytes
///
/// A bucket is loaded, changed and written back within one call of the hash
/// file, nothing here touches the disk until [Bucket::write] is called.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// The nth bucket in the bucket file, never persisted in the bucket itself
    address: u32,

    /// Number of low hash bits shared by every record in this bucket
    depth: u32,

    record_count: usize,

    records: [Record; BUCKET_CAPACITY],
}

impl Bucket {
    /// An empty bucket for slot `address`
    pub fn new(address: u32, depth: u32) -> Self {
        Self {
            address,
            depth,
            record_count: 0,
            records: [EMPTY_RECORD; BUCKET_CAPACITY],
        }
    }

    /// Loads the bucket stored in slot `address`
    pub fn read_at<S: Read + Seek>(store: &mut S, address: u32) -> Result<Self> {
        let mut bucket = Self::new(address, 1);
        bucket.read(store)?;
        Ok(bucket)
    }

    /// Replaces the in-memory state with the slot at this bucket's address
    pub fn read<S: Read + Seek>(&mut self, store: &mut S) -> Result<()> {
        store
            .seek(SeekFrom::Start(self.position()))
            .map_err(Error::Read)?;
        let mut buf = [0_u8; BUCKET_SIZE];
        store.read_exact(&mut buf).map_err(Error::Read)?;
        *self = Self::from_bytes(&buf, self.address)?;
        trace!(bucket = self.address, records = self.record_count, "read bucket");
        Ok(())
    }

    /// Overwrites this bucket's whole slot
    pub fn write<S: Write + Seek>(&self, store: &mut S) -> Result<()> {
        store
            .seek(SeekFrom::Start(self.position()))
            .map_err(Error::Write)?;
        store.write_all(&self.into_bytes()).map_err(Error::Write)?;
        trace!(bucket = self.address, records = self.record_count, "wrote bucket");
        Ok(())
    }

    /// Byte offset of this bucket's slot in the bucket file
    pub fn position(&self) -> u64 {
        BUCKET_FILE_HEADER as u64 + self.address as u64 * BUCKET_SIZE as u64
    }

    /// Index of the record with `key`
    pub fn record_position(&self, key: &Key) -> Option<usize> {
        self.records().iter().position(|record| record.has_key(key))
    }

    pub fn add(&mut self, record: &Record) -> Add {
        if self.is_full() {
            return Add::Full;
        }
        if self.record_position(&record.key()).is_some() {
            return Add::AlreadyPresent;
        }
        self.records[self.record_count] = *record;
        self.record_count += 1;
        Add::Inserted
    }

    pub fn retrieve(&self, key: &Key) -> Option<Payload> {
        self.record_position(key)
            .map(|index| self.records[index].payload())
    }

    /// Removes the record with `key`, shifting the later records down one slot
    pub fn delete(&mut self, key: &Key) -> Removal {
        let Some(index) = self.record_position(key) else {
            return Removal::NotPresent;
        };
        self.records.copy_within(index + 1..self.record_count, index);
        self.record_count -= 1;
        self.records[self.record_count] = EMPTY_RECORD;
        Removal::Deleted
    }

    /// The record in slot `index`
    ///
    /// Panics if `index` is not below [Bucket::record_count].
    pub fn record_at(&self, index: usize) -> &Record {
        &self.records()[index]
    }

    /// The occupied slots in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records[..self.record_count]
    }

    /// Moves the bucket to another slot, no IO happens until the next write
    pub fn reassign_address(&mut self, address: u32) {
        self.address = address;
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_full(&self) -> bool {
        self.record_count == BUCKET_CAPACITY
    }
}

impl ByteLength for Bucket {
    fn byte_len(&self) -> usize {
        BUCKET_SIZE
    }
}

impl IntoBytes for Bucket {
    fn into_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0_u8; BUCKET_SIZE];
        write_u32_le(&mut buf, 0, self.record_count as u32);
        write_u32_le(&mut buf, 4, self.depth);
        for (i, record) in self.records().iter().enumerate() {
            let start = BUCKET_HEADER + i * RECORD_SIZE;
            buf[start..start + RECORD_SIZE].copy_from_slice(record.as_bytes());
        }
        buf
    }
}

impl ParseFromBytes for Bucket {
    type Error = Error;
    type Metadata = u32;

    fn from_bytes(bytes: &[u8], address: u32) -> Result<Self> {
        if bytes.len() < BUCKET_SIZE {
            return Err(Error::Corrupt(format!(
                "bucket {} is {} bytes, expected {}",
                address,
                bytes.len(),
                BUCKET_SIZE
            )));
        }
        let record_count = read_u32_le(bytes, 0).unwrap_or_default() as usize;
        let depth = read_u32_le(bytes, 4).unwrap_or_default();
        if record_count > BUCKET_CAPACITY {
            return Err(Error::Corrupt(format!(
                "bucket {} holds {} records, capacity is {}",
                address, record_count, BUCKET_CAPACITY
            )));
        }
        if !(1..=MAX_SUPPORTED_DEPTH).contains(&depth) {
            return Err(Error::Corrupt(format!(
                "bucket {} has depth {}",
                address, depth
            )));
        }

        let mut bucket = Self::new(address, depth);
        for i in 0..record_count {
            let start = BUCKET_HEADER + i * RECORD_SIZE;
            let mut raw = [0_u8; RECORD_SIZE];
            raw.copy_from_slice(&bytes[start..start + RECORD_SIZE]);
            bucket.records[i] = Record::from_raw(raw);
        }
        bucket.record_count = record_count;
        Ok(bucket)
    }
}
