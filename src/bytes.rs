pub trait ByteLength {
    fn byte_len(&self) -> usize;
}

pub trait IntoBytes {
    fn into_bytes(&self) -> Vec<u8>;
}

/// Parses a fixed layout structure back out of its on-disk bytes
///
/// `Metadata` carries whatever the bytes themselves do not record, such as
/// the slot a bucket was read from.
pub trait ParseFromBytes: Sized {
    type Error;
    type Metadata;
    fn from_bytes(bytes: &[u8], metadata: Self::Metadata) -> Result<Self, Self::Error>;
}

/// Reads the little endian u32 at `pos`, `None` when `bytes` is too short
pub fn read_u32_le(bytes: &[u8], pos: usize) -> Option<u32> {
    let word = bytes.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

pub fn write_u32_le(buf: &mut [u8], pos: usize, value: u32) {
    buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}
