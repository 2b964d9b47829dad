//! Byte-level write helpers shared by every `encode` method in this module.
//!
//! Mirrors [`crate::stream::ClassFileStream`]'s read helpers: everything in
//! the class file format is a big-endian, fixed-width integer or a raw byte
//! run, so there is no need for a dedicated writer type — plain `Vec<u8>`
//! appends are enough.

/// Append an unsigned byte.
pub fn write_u1(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

/// Append a big-endian unsigned 2-byte integer.
pub fn write_u2(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian signed 2-byte integer.
pub fn write_i2(buf: &mut Vec<u8>, v: i16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian unsigned 4-byte integer.
pub fn write_u4(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian signed 4-byte integer.
pub fn write_i4(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian 8-byte integer.
pub fn write_u8(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append raw bytes.
pub fn write_bytes(buf: &mut Vec<u8>, v: &[u8]) {
    buf.extend_from_slice(v);
}

/// Write a length-prefixed vector of encodable items, where the length is a
/// `u2` count (the overwhelmingly common case in the class file format:
/// `interfaces_count`, `fields_count`, attribute counts, ...).
pub fn write_u2_prefixed<T>(buf: &mut Vec<u8>, items: &[T], mut f: impl FnMut(&mut Vec<u8>, &T)) {
    write_u2(buf, items.len() as u16);
    for item in items {
        f(buf, item);
    }
}
