//! Null-terminated string reading from byte sources.

use memchr::memchr;
use veles_common::ByteSource;

use crate::value::StringData;
use crate::Result;

const CHUNK_SIZE: usize = 32;

/// Read the null-terminated string at the source's current position.
///
/// The returned buffer is always terminated, even when the source ends
/// before a terminator is found. The source position is left past the
/// last chunk read; callers reposition before their next read.
pub fn read_cstring<S: ByteSource>(source: &mut S) -> Result<StringData> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let available = source.size().saturating_sub(source.pos());
        if available == 0 {
            break;
        }

        let to_read = chunk.len().min(available as usize);
        source.read(&mut chunk[..to_read])?;

        match memchr(0, &chunk[..to_read]) {
            Some(nul) => {
                buffer.extend_from_slice(&chunk[..=nul]);
                break;
            }
            None => buffer.extend_from_slice(&chunk[..to_read]),
        }
    }

    Ok(StringData::from_terminated(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use veles_common::MemorySource;

    #[test]
    fn test_reads_until_terminator() {
        let mut source = MemorySource::new(b"hello\0world\0".to_vec());
        let s = read_cstring(&mut source).unwrap();
        assert_eq!(s.as_str(), Some("hello"));

        source.set_pos(6);
        let s = read_cstring(&mut source).unwrap();
        assert_eq!(s.as_str(), Some("world"));
    }

    #[test]
    fn test_terminates_at_eof() {
        let mut source = MemorySource::new(b"unterminated".to_vec());
        let s = read_cstring(&mut source).unwrap();
        assert_eq!(s.as_str(), Some("unterminated"));
        assert_eq!(s.as_bytes_with_nul().last(), Some(&0));
    }

    #[test]
    fn test_long_string_spans_chunks() {
        let mut data = vec![b'a'; 100];
        data.push(0);
        let mut source = MemorySource::new(data);
        let s = read_cstring(&mut source).unwrap();
        assert_eq!(s.len(), 100);
    }

    #[test]
    fn test_empty_string() {
        let mut source = MemorySource::new(b"\0rest".to_vec());
        let s = read_cstring(&mut source).unwrap();
        assert!(s.is_empty());
    }
}
