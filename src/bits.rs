//! Bit helpers for 32 bit addresses
//!
//! Bits are zero-indexed from the least significant end, so bit 0 is the
//! rightmost bit of the binary rendering.

pub const NUM_BITS: u32 = u32::BITS;

/// Returns `value` with `bit` set to 1
pub fn set_bit(value: u32, bit: u32) -> u32 {
    debug_assert!(bit < NUM_BITS);
    value | (1 << bit)
}

/// Returns `value` with `bit` set to 0
pub fn clear_bit(value: u32, bit: u32) -> u32 {
    debug_assert!(bit < NUM_BITS);
    value & !(1 << bit)
}

pub fn test_bit(value: u32, bit: u32) -> bool {
    debug_assert!(bit < NUM_BITS);
    value & (1 << bit) != 0
}

/// The lowest `count` bits of `value`
///
/// This is how a hash is turned into a directory index: with a depth of 3
/// only the last 3 bits are considered.
pub fn low_bits(value: u32, count: u32) -> u32 {
    if count >= NUM_BITS {
        value
    } else {
        value & ((1 << count) - 1)
    }
}

/// Position of the most significant set bit, `None` for 0
pub fn highest_set_bit(value: u32) -> Option<u32> {
    if value == 0 {
        None
    } else {
        Some(NUM_BITS - 1 - value.leading_zeros())
    }
}

/// The `count` most significant bits of `value`, counted from its highest set bit
///
/// `highest_bits(0b110, 2)` is `0b11`. A value with `count` or fewer
/// significant bits is returned as is.
pub fn highest_bits(value: u32, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    match highest_set_bit(value) {
        Some(top) if top + 1 > count => value >> (top + 1 - count),
        _ => value,
    }
}

/// Reverses the lowest `count` bits of `value`, higher bits are dropped
pub fn reverse_bits(value: u32, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let count = count.min(NUM_BITS);
    low_bits(value, count).reverse_bits() >> (NUM_BITS - count)
}

/// Renders the lowest `width` bits of `value`, most significant first
pub fn to_binary_string(value: u32, width: u32) -> String {
    let width = width.min(NUM_BITS);
    (0..width)
        .rev()
        .map(|bit| if test_bit(value, bit) { '1' } else { '0' })
        .collect()
}
