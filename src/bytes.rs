//! Utilities to decode little-endian values and records out of byte slices.
//!
//! Every multi-byte integer on an ext2 disk is little-endian, regardless of
//! the host. Records use the `zerocopy` byte order types for their fields, so
//! decoding one never depends on native layout or alignment.

use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::FromBytes;

pub(crate) type Le16 = U16<LittleEndian>;
pub(crate) type Le32 = U32<LittleEndian>;

/// Decodes a record of type `T` starting at `offset`. `None` if the slice is
/// too short.
pub(crate) fn read_record<T: FromBytes>(bytes: &[u8], offset: usize) -> Option<T> {
    T::read_from_prefix(bytes.get(offset..)?)
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    read_record::<Le16>(bytes, offset).map(Le16::get)
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    read_record::<Le32>(bytes, offset).map(Le32::get)
}
