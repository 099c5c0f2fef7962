//! On-disk structures of the section-oriented DB2 family.
//!
//! WDC3 and WDC4 share the whole layout; WDC5 prepends a version number
//! and a 128-byte schema string to the header. Everything else (section
//! headers, field info, sidecar tables) is identical across the three,
//! so the decoder normalises them behind [`Db2Header`] plus a
//! [`Db2Version`] tag.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::signature::{Signature, WDC3_MAGIC, WDC4_MAGIC, WDC5_MAGIC};
use crate::{Error, Result};

/// Known DB2 header flags.
pub mod header_flags {
    /// Records are variable-size and located through the offset map.
    pub const HAS_OFFSET_MAP: u16 = 0x01;
    /// The relationship index doubles as the record id.
    pub const HAS_RELATIONSHIP_DATA: u16 = 0x02;
    /// Record ids live in the external id list.
    pub const HAS_NON_INLINE_IDS: u16 = 0x04;
    /// Record data is bit-packed.
    pub const IS_BITPACKED: u16 = 0x10;
}

/// The DB2 sub-formats this decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Db2Version {
    Wdc3,
    Wdc4,
    Wdc5,
}

impl Db2Version {
    pub const fn signature(self) -> Signature {
        match self {
            Db2Version::Wdc3 => WDC3_MAGIC,
            Db2Version::Wdc4 => WDC4_MAGIC,
            Db2Version::Wdc5 => WDC5_MAGIC,
        }
    }

    pub fn from_signature(signature: Signature) -> Option<Self> {
        if signature == WDC3_MAGIC {
            Some(Db2Version::Wdc3)
        } else if signature == WDC4_MAGIC {
            Some(Db2Version::Wdc4)
        } else if signature == WDC5_MAGIC {
            Some(Db2Version::Wdc5)
        } else {
            None
        }
    }
}

/// WDC5-only header preamble, read between the signature and the common
/// header fields.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Wdc5Preamble {
    pub version_num: u32,
    pub schema_string: [u8; 128],
}

impl std::fmt::Debug for Wdc5Preamble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schema_string = self.schema_string;
        let end = schema_string.iter().position(|&b| b == 0).unwrap_or(128);
        f.debug_struct("Wdc5Preamble")
            .field("version_num", &{ self.version_num })
            .field("schema_string", &String::from_utf8_lossy(&schema_string[..end]))
            .finish()
    }
}

/// The header fields common to WDC3/WDC4/WDC5, after the signature (and
/// the WDC5 preamble).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Db2Header {
    /// Total records across all sections.
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    /// Total string table bytes across all sections.
    pub string_table_size: u32,
    pub table_hash: u32,
    pub layout_hash: u32,
    pub min_id: u32,
    pub max_id: u32,
    pub locale: u32,
    pub flags: u16,
    /// Index of the field containing record ids; ignored when ids are
    /// non-inline.
    pub id_index: u16,
    pub total_field_count: u32,
    /// Byte offset within a record where bit-packed data begins.
    pub bitpacked_data_offset: u32,
    pub lookup_column_count: u32,
    pub field_storage_info_size: u32,
    pub common_data_size: u32,
    pub pallet_data_size: u32,
    pub section_count: u32,
}

impl Db2Header {
    #[inline]
    pub fn has_offset_map(&self) -> bool {
        self.flags & header_flags::HAS_OFFSET_MAP != 0
    }

    #[inline]
    pub fn has_relationship_data(&self) -> bool {
        self.flags & header_flags::HAS_RELATIONSHIP_DATA != 0
    }
}

/// A per-section header (40 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SectionHeader {
    /// TACT key lookup hash; non-zero means the section is encrypted.
    pub tact_key_hash: u64,
    /// Absolute position of the section's record block.
    pub file_offset: u32,
    pub record_count: u32,
    pub string_table_size: u32,
    /// End of the record block in offset-map files.
    pub offset_records_end: u32,
    pub id_list_size: u32,
    pub relationship_data_size: u32,
    pub offset_map_id_count: u32,
    pub copy_table_count: u32,
}

/// A per-field structure entry (4 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FieldStructure {
    /// Encoded size in bits; the byte width is `(32 - size) / 8` and can
    /// be negative for fields wider than 32 bits.
    pub size: i16,
    /// Position of the field within the record.
    pub position: u16,
}

impl FieldStructure {
    pub fn byte_width(&self) -> i32 {
        (32 - self.size as i32) / 8
    }
}

/// The per-field compression forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCompression {
    /// Plain little-endian value(s) in the record data.
    None,
    /// `bit_width` bits at `bit_offset` within the bit-packed region.
    Bitpacked {
        bit_offset: u32,
        bit_width: u32,
        is_signed: bool,
    },
    /// A default value with per-record exceptions in the common block.
    CommonData { default_value: u32 },
    /// A bit-packed index into the field's pallet.
    BitpackedIndexed { bit_offset: u32, bit_width: u32 },
    /// A bit-packed index into the field's pallet, `array_size` values
    /// per index.
    BitpackedIndexedArray {
        bit_offset: u32,
        bit_width: u32,
        array_size: u32,
    },
    /// Bit-packed with sign extension at `bit_width`.
    BitpackedSigned { bit_offset: u32, bit_width: u32 },
}

/// A raw field-storage-info entry (24 bytes); the trailing 12 bytes are
/// a discriminated block interpreted per compression type.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FieldStorageInfoRaw {
    pub field_offset_bits: u16,
    /// Total size of the field in bits, summed over array elements.
    pub field_size_bits: u16,
    /// Size in bytes of the field's slab in the common or pallet block.
    pub additional_data_size: u32,
    pub compression_type: u32,
    pub compression_data: [u32; 3],
}

/// A decoded field-storage-info entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStorageInfo {
    pub field_offset_bits: u16,
    pub field_size_bits: u16,
    pub additional_data_size: u32,
    pub compression: FieldCompression,
}

impl TryFrom<FieldStorageInfoRaw> for FieldStorageInfo {
    type Error = Error;

    fn try_from(raw: FieldStorageInfoRaw) -> Result<Self> {
        let [val1, val2, val3] = raw.compression_data;
        let compression = match raw.compression_type {
            0 => FieldCompression::None,
            1 => FieldCompression::Bitpacked {
                bit_offset: val1,
                bit_width: val2,
                is_signed: val3 != 0,
            },
            2 => FieldCompression::CommonData { default_value: val1 },
            3 => FieldCompression::BitpackedIndexed {
                bit_offset: val1,
                bit_width: val2,
            },
            4 => FieldCompression::BitpackedIndexedArray {
                bit_offset: val1,
                bit_width: val2,
                array_size: val3,
            },
            5 => FieldCompression::BitpackedSigned {
                bit_offset: val1,
                bit_width: val2,
            },
            _ => return Err(Error::UnsupportedCompression("unknown compression type")),
        };

        Ok(Self {
            field_offset_bits: raw.field_offset_bits,
            field_size_bits: raw.field_size_bits,
            additional_data_size: raw.additional_data_size,
            compression,
        })
    }
}

/// A copy-table entry: clone the record with `id_of_copied_row` under
/// `id_of_new_row`.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CopyTableEntry {
    pub id_of_new_row: u32,
    pub id_of_copied_row: u32,
}

/// An offset-map entry locating one variable-size record (6 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct OffsetMapEntry {
    pub offset: u32,
    pub size: u16,
}

/// Header preceding a section's relationship entries.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RelationshipHeader {
    pub count: u32,
    pub min_id: u32,
    pub max_id: u32,
}

/// A relationship entry mapping a record index to its foreign key.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RelationshipEntry {
    pub foreign_id: u32,
    pub record_index: u32,
}

/// A common-data exception: `record_id` takes `value` instead of the
/// field default.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CommonEntry {
    pub record_id: u32,
    pub value: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_sizes() {
        assert_eq!(std::mem::size_of::<Db2Header>(), 68);
        assert_eq!(std::mem::size_of::<Wdc5Preamble>(), 132);
        assert_eq!(std::mem::size_of::<SectionHeader>(), 40);
        assert_eq!(std::mem::size_of::<FieldStructure>(), 4);
        assert_eq!(std::mem::size_of::<FieldStorageInfoRaw>(), 24);
        assert_eq!(std::mem::size_of::<CopyTableEntry>(), 8);
        assert_eq!(std::mem::size_of::<OffsetMapEntry>(), 6);
        assert_eq!(std::mem::size_of::<RelationshipEntry>(), 8);
        assert_eq!(std::mem::size_of::<RelationshipHeader>(), 12);
        assert_eq!(std::mem::size_of::<CommonEntry>(), 8);
    }

    #[test]
    fn test_field_structure_byte_width() {
        assert_eq!(FieldStructure { size: 0, position: 0 }.byte_width(), 4);
        assert_eq!(FieldStructure { size: 24, position: 0 }.byte_width(), 1);
        assert_eq!(FieldStructure { size: -32, position: 0 }.byte_width(), 8);
    }

    #[test]
    fn test_storage_info_decoding() {
        let raw = FieldStorageInfoRaw {
            field_offset_bits: 32,
            field_size_bits: 20,
            additional_data_size: 0,
            compression_type: 1,
            compression_data: [32, 20, 1],
        };
        let info = FieldStorageInfo::try_from(raw).unwrap();
        assert_eq!(
            info.compression,
            FieldCompression::Bitpacked {
                bit_offset: 32,
                bit_width: 20,
                is_signed: true
            }
        );

        let raw = FieldStorageInfoRaw {
            compression_type: 9,
            ..raw
        };
        assert!(FieldStorageInfo::try_from(raw).is_err());
    }

    #[test]
    fn test_version_signatures() {
        assert_eq!(Db2Version::from_signature(WDC3_MAGIC), Some(Db2Version::Wdc3));
        assert_eq!(Db2Version::from_signature(WDC5_MAGIC), Some(Db2Version::Wdc5));
        assert_eq!(Db2Version::from_signature(crate::signature::WDBC_MAGIC), None);
        assert_eq!(Db2Version::Wdc4.signature(), WDC4_MAGIC);
    }
}
