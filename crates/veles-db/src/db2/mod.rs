//! The section-oriented DB2 format (WDC3, WDC4, WDC5).
//!
//! A DB2 file is a header, a list of section headers, per-field metadata,
//! pallet and common-data blocks, then one or more sections of records
//! with their sidecar tables (id list, copy table, offset map,
//! relationships). Records are fixed-size and densely packed unless the
//! header carries the offset-map flag, in which case each record is
//! located through a sparse `(offset, size)` directory.

pub mod format;
mod file;
mod structure;

pub use file::Db2File;
pub use format::{
    header_flags, CommonEntry, CopyTableEntry, Db2Header, Db2Version, FieldCompression,
    FieldStorageInfo, FieldStorageInfoRaw, FieldStructure, OffsetMapEntry, RelationshipEntry,
    RelationshipHeader, SectionHeader, Wdc5Preamble,
};
pub use structure::{Db2LoadInfo, Db2Structure};

use crate::schema::{FieldType, Schema, STRING_SLOT_BYTES};

fn record_size<S: Schema>(schema: &S, string_bytes: usize) -> usize {
    schema
        .fields()
        .iter()
        .map(|field| match field.field_type {
            FieldType::String | FieldType::LangString => string_bytes * field.size as usize,
            _ => field.total_bytes() as usize,
        })
        .sum()
}

/// On-disk record size for a schema: strings are `u32` references.
pub fn record_size_src<S: Schema>(schema: &S) -> usize {
    record_size(schema, std::mem::size_of::<u32>())
}

/// In-memory record size for a schema: strings are owned slots.
pub fn record_size_dest<S: Schema>(schema: &S) -> usize {
    record_size(schema, STRING_SLOT_BYTES as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotation, Field, FixedSchema};

    #[test]
    fn test_record_sizes() {
        const FIELDS: &[Field] = &[
            Field::value::<u32>(Annotation::new().id().non_inline()),
            Field::lang_string(1, Annotation::new()),
            Field::value::<u16>(Annotation::new()),
            Field::value::<u8>(Annotation::new()),
        ];
        let schema = FixedSchema::new(FIELDS);
        assert_eq!(record_size_src(&schema), 4 + 4 + 2 + 1);
        assert_eq!(
            record_size_dest(&schema),
            4 + STRING_SLOT_BYTES as usize + 2 + 1
        );
    }
}
