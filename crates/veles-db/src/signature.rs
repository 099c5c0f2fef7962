//! File magics shared by the DBC and DB2 families.

use std::fmt;

/// A four-byte file signature.
///
/// On disk the signature is the first `u32` of the file; as text it reads
/// in byte order, so `Signature::new(*b"WDBC")` prints as `WDBC` and its
/// integer form is `0x43424457`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 4]);

impl Signature {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The signature as it appears on disk (little-endian integer).
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// The signature as text, or `"????"` if it is not ASCII.
    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.is_ascii() => s,
            _ => "????",
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.as_str())
    }
}

pub const WDBC_MAGIC: Signature = Signature::new(*b"WDBC");
pub const WDB2_MAGIC: Signature = Signature::new(*b"WDB2");
pub const WDC3_MAGIC: Signature = Signature::new(*b"WDC3");
pub const WDC4_MAGIC: Signature = Signature::new(*b"WDC4");
pub const WDC5_MAGIC: Signature = Signature::new(*b"WDC5");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        assert_eq!(WDBC_MAGIC.as_str(), "WDBC");
        assert_eq!(WDBC_MAGIC.as_u32(), 0x43424457);
        assert_eq!(Signature::from_u32(0x43424457), WDBC_MAGIC);
        assert_eq!(WDB2_MAGIC.as_str(), "WDB2");
    }

    #[test]
    fn test_non_ascii_display() {
        let sig = Signature::new([0xFF, 0x00, 0x12, 0x99]);
        assert_eq!(sig.as_str(), "????");
    }
}
