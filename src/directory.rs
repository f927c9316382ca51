//! The directory of an extendible hash file.
//!
//! Together with its depth, the directory maps the low bits of a hash to a
//! bucket slot. For example with a depth of 3 the directory looks like:
//!
//! ```text
//! 000 -> element 0
//! 001 -> element 1
//! 010 -> element 2
//! 011 -> element 3
//! 100 -> element 4
//! ...
//! ```
//!
//! Several entries point at the same bucket whenever that bucket's depth is
//! smaller than the directory depth.
//!
//! ## File layout
//!
//! - u32 depth
//! - followed by `2^depth` u32 bucket addresses
//!
//! There are no pages in this file, the entire directory is loaded and saved
//! at once.

use crate::bits::{low_bits, to_binary_string};
use crate::bytes::*;
use crate::consts::*;
use crate::error::{Error, Result};
use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Number of low hash bits used to pick an entry
    depth: u32,

    /// Always `2^depth` bucket addresses
    addresses: Vec<u32>,
}

impl Directory {
    /// A directory of `depth` with every entry pointing at bucket 0
    ///
    /// Depths outside `1..=MAX_SUPPORTED_DEPTH` fall back to 1.
    pub fn new(depth: u32) -> Self {
        let depth = if (1..=MAX_SUPPORTED_DEPTH).contains(&depth) {
            depth
        } else {
            1
        };
        Self {
            depth,
            addresses: vec![0; 1 << depth],
        }
    }

    /// Reads the depth header and then the address table from the start of `source`
    pub fn load<R: Read + Seek>(source: &mut R) -> Result<Self> {
        source.seek(SeekFrom::Start(0)).map_err(Error::Read)?;
        let mut word = [0_u8; DIRECTORY_WORD];
        source.read_exact(&mut word).map_err(Error::Read)?;
        let depth = u32::from_le_bytes(word);
        check_depth(depth)?;

        let mut buf = vec![0_u8; DIRECTORY_WORD + (DIRECTORY_WORD << depth)];
        buf[..DIRECTORY_WORD].copy_from_slice(&word);
        source
            .read_exact(&mut buf[DIRECTORY_WORD..])
            .map_err(Error::Read)?;
        Self::from_bytes(&buf, ())
    }

    /// Writes the depth header and the address table to the start of `sink`
    pub fn persist<W: Write + Seek>(&self, sink: &mut W) -> Result<()> {
        sink.seek(SeekFrom::Start(0)).map_err(Error::Write)?;
        sink.write_all(&self.into_bytes()).map_err(Error::Write)?;
        Ok(())
    }

    /// The bucket address at `index`, `None` when `index` is outside the table
    pub fn address(&self, index: u32) -> Option<u32> {
        self.addresses.get(index as usize).copied()
    }

    /// Points `index` at `address`
    ///
    /// An `index` outside the table is ignored and `false` is returned.
    pub fn set_address(&mut self, index: u32, address: u32) -> bool {
        match self.addresses.get_mut(index as usize) {
            Some(entry) => {
                *entry = address;
                true
            }
            None => false,
        }
    }

    /// Directory index for a hash value
    pub fn index_of(&self, hash: u32) -> u32 {
        low_bits(hash, self.depth)
    }

    /// Adds a bit on the left, doubling the table
    ///
    /// Entry `xxx` is copied to both `0xxx` and `1xxx`, so every hash still
    /// resolves to the same bucket as before.
    pub fn increase_depth(&mut self) {
        if self.depth >= MAX_SUPPORTED_DEPTH {
            warn!(depth = self.depth, "directory is at its largest depth");
            return;
        }
        let mut addresses = Vec::with_capacity(self.addresses.len() * 2);
        addresses.extend_from_slice(&self.addresses);
        addresses.extend_from_slice(&self.addresses);
        self.addresses = addresses;
        self.depth += 1;
        debug!(depth = self.depth, "doubled directory");
    }

    /// Drops the leftmost bit, halving the table, when no entry needs it
    ///
    /// Returns false and leaves the table alone unless the depth is above 1
    /// and every buddy pair points at the same bucket.
    pub fn decrease_depth(&mut self) -> bool {
        if !self.depth_decrease_possible() {
            return false;
        }
        self.addresses.truncate(self.addresses.len() / 2);
        self.addresses.shrink_to_fit();
        self.depth -= 1;
        debug!(depth = self.depth, "halved directory");
        true
    }

    /// True when every `i` and `i | top_bit` hold the same address
    ///
    /// With 4 entries the buddies are 00 & 10 and 01 & 11, the patterns
    /// that only differ in their leftmost bit.
    pub fn depth_decrease_possible(&self) -> bool {
        if self.depth <= 1 {
            return false;
        }
        let (lower, upper) = self.addresses.split_at(self.addresses.len() / 2);
        lower == upper
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Always `2^depth`
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }
}

fn check_depth(depth: u32) -> Result<()> {
    if (1..=MAX_SUPPORTED_DEPTH).contains(&depth) {
        Ok(())
    } else {
        Err(Error::Corrupt(format!("directory depth {}", depth)))
    }
}

impl ByteLength for Directory {
    fn byte_len(&self) -> usize {
        DIRECTORY_WORD * (1 + self.addresses.len())
    }
}

impl IntoBytes for Directory {
    fn into_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0_u8; self.byte_len()];
        write_u32_le(&mut buf, 0, self.depth);
        for (i, address) in self.addresses.iter().enumerate() {
            write_u32_le(&mut buf, DIRECTORY_WORD * (i + 1), *address);
        }
        buf
    }
}

impl ParseFromBytes for Directory {
    type Error = Error;
    type Metadata = ();

    fn from_bytes(bytes: &[u8], _: ()) -> Result<Self> {
        let depth = read_u32_le(bytes, 0)
            .ok_or_else(|| Error::Corrupt("directory header is missing".to_string()))?;
        check_depth(depth)?;
        let count = 1_usize << depth;
        let addresses = (0..count)
            .map(|i| read_u32_le(bytes, DIRECTORY_WORD * (i + 1)))
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(|| {
                Error::Corrupt(format!("directory of depth {} is truncated", depth))
            })?;
        Ok(Self { depth, addresses })
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, address) in self.addresses.iter().enumerate() {
            writeln!(f, "{}->{}", to_binary_string(i as u32, self.depth), address)?;
        }
        Ok(())
    }
}
