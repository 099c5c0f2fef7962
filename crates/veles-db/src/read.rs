//! Wire-struct reading helpers.

use veles_common::ByteSource;
use zerocopy::{FromBytes, IntoBytes};

use crate::Result;

/// Read one tightly-packed structure from the source.
pub(crate) fn read_pod<T, S>(source: &mut S) -> Result<T>
where
    T: FromBytes + IntoBytes,
    S: ByteSource,
{
    let mut value = T::new_zeroed();
    source.read(value.as_mut_bytes())?;
    Ok(value)
}

/// Read `count` tightly-packed structures from the source.
pub(crate) fn read_pod_vec<T, S>(source: &mut S, count: usize) -> Result<Vec<T>>
where
    T: FromBytes + IntoBytes,
    S: ByteSource,
{
    let mut result = Vec::with_capacity(count);
    for _ in 0..count {
        result.push(read_pod(source)?);
    }
    Ok(result)
}

/// Read a `width`-byte little-endian integer out of `buffer`, widened to
/// `u64`. Returns `None` when the span falls outside the buffer.
pub(crate) fn read_le(buffer: &[u8], offset: usize, width: usize) -> Option<u64> {
    let span = buffer.get(offset..offset + width)?;
    let mut bytes = [0u8; 8];
    bytes[..width].copy_from_slice(span);
    Some(u64::from_le_bytes(bytes))
}

/// Insert a raw integer into a record at the width the schema declares.
pub(crate) fn insert_int<R: crate::record::Record>(
    record: &mut R,
    field_index: u32,
    array_index: u32,
    offset: usize,
    width: usize,
    raw: u64,
) {
    match width {
        1 => record.insert_u8(field_index, array_index, offset, raw as u8),
        2 => record.insert_u16(field_index, array_index, offset, raw as u16),
        8 => record.insert_u64(field_index, array_index, offset, raw),
        _ => record.insert_u32(field_index, array_index, offset, raw as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le() {
        let buffer = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_le(&buffer, 0, 4), Some(0x04030201));
        assert_eq!(read_le(&buffer, 2, 2), Some(0x0403));
        assert_eq!(read_le(&buffer, 3, 2), None);
    }
}
