/// Width of the key field of a record
pub const KEY_SIZE: usize = 6;

/// Offset of the key field inside a record
pub const KEY_OFFSET: usize = 0;

/// Width of the payload field, everything after the key
pub const PAYLOAD_SIZE: usize = 57;

pub const RECORD_SIZE: usize = KEY_SIZE + PAYLOAD_SIZE;

/// Maximum number of records held by one bucket
pub const BUCKET_CAPACITY: usize = 16;

/// Padding that keeps a bucket slot at 1024 bytes
pub const RECORDS_PADDING: usize = 8;

pub const RECORDS_REGION_SIZE: usize = RECORD_SIZE * BUCKET_CAPACITY + RECORDS_PADDING;

/// Record count and depth, one u32 each
pub const BUCKET_HEADER: usize = 8;

pub const BUCKET_SIZE: usize = BUCKET_HEADER + RECORDS_REGION_SIZE;

/// The bucket file starts with the u32 bucket count
pub const BUCKET_FILE_HEADER: usize = 4;

/// Size of one directory integer (the depth and every address)
pub const DIRECTORY_WORD: usize = 4;

/// Default ceiling for both the directory depth and the bucket depth
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// Largest ceiling that can be configured, a directory of 2^24 entries
pub const MAX_SUPPORTED_DEPTH: u32 = 24;

/// Number of resolve/add attempts for one insert before giving up on the hash function
pub const DEFAULT_MAX_INSERT_ATTEMPTS: u32 = 5;

/// Buckets created along with a new file, addressed by bit 0
pub const INITIAL_BUCKETS: u32 = 2;

pub const INDEX_EXTENSION: &str = "ehd";

pub const BUCKET_EXTENSION: &str = "ehf";
