//! Fixed width records.
//!
//! ## Binary layout
//!
//! - `KEY_SIZE` bytes of key at `KEY_OFFSET`, zero padded on the right
//! - `PAYLOAD_SIZE` bytes of payload, zero padded on the right

use crate::consts::*;
use crate::error::{Error, Result};
use std::fmt;

/// The identifier of a record, unique across the whole file
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Builds a key from 1 to `KEY_SIZE` bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > KEY_SIZE {
            return Err(Error::InvalidKey(bytes.len()));
        }
        let mut key = [0_u8; KEY_SIZE];
        key[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl TryFrom<&str> for Key {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::from_bytes(value.as_bytes())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(trim_zeros(&self.0)))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Key({:?})", self.to_string())
    }
}

/// Everything in a record after the key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload([u8; PAYLOAD_SIZE]);

impl Payload {
    /// Builds a payload from at most `PAYLOAD_SIZE` bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PAYLOAD_SIZE {
            return Err(Error::InvalidPayload(bytes.len()));
        }
        let mut payload = [0_u8; PAYLOAD_SIZE];
        payload[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(payload))
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.0
    }

    /// The payload without its zero padding
    pub fn trimmed(&self) -> &[u8] {
        trim_zeros(&self.0)
    }
}

impl TryFrom<&str> for Payload {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::from_bytes(value.as_bytes())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.trimmed()))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Payload({:?})", self.to_string())
    }
}

/// A key and its payload packed into `RECORD_SIZE` bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    pub fn new(key: &Key, payload: &Payload) -> Self {
        let mut bytes = [0_u8; RECORD_SIZE];
        bytes[KEY_OFFSET..KEY_OFFSET + KEY_SIZE].copy_from_slice(key.as_bytes());
        bytes[KEY_OFFSET + KEY_SIZE..].copy_from_slice(payload.as_bytes());
        Self(bytes)
    }

    pub const fn from_raw(bytes: [u8; RECORD_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn key(&self) -> Key {
        let mut key = [0_u8; KEY_SIZE];
        key.copy_from_slice(self.key_bytes());
        Key(key)
    }

    pub fn payload(&self) -> Payload {
        let mut payload = [0_u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&self.0[KEY_OFFSET + KEY_SIZE..]);
        Payload(payload)
    }

    /// Compares the key field without copying it out
    pub fn has_key(&self, key: &Key) -> bool {
        self.key_bytes() == key.as_bytes()
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }

    fn key_bytes(&self) -> &[u8] {
        &self.0[KEY_OFFSET..KEY_OFFSET + KEY_SIZE]
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.key())
            .field("payload", &self.payload())
            .finish()
    }
}

fn trim_zeros(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
    &bytes[..end]
}
