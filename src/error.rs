//! Errors and operation outcomes for an extendible hash file.
//!
//! Outcomes that are a normal answer to a question (the key was already
//! there, the key is missing) are returned as values. Only conditions the
//! caller has to react to are errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("hash file is not open")]
    NotOpen,
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("corrupt hash file: {0}")]
    Corrupt(String),
    #[error("table has reached the maximum depth of {0}")]
    MaxTableDepth(u32),
    #[error("hash function does not spread keys, gave up after {attempts} attempts")]
    PoorHashFunction { attempts: u32 },
    #[error("invalid key length {0}")]
    InvalidKey(usize),
    #[error("invalid payload length {0}")]
    InvalidPayload(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result of adding a record to a single bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Add {
    Inserted,
    AlreadyPresent,
    /// No free slot, the orchestrator has to split the bucket.
    Full,
}

/// Result of inserting a record into the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Inserted,
    AlreadyPresent,
}

/// Result of removing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    NotPresent,
}
