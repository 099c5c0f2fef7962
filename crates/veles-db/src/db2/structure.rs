//! In-memory mirror of a DB2 file's metadata and sidecar tables.

use rustc_hash::FxHashMap;

use crate::db2::format::{
    CopyTableEntry, Db2Header, FieldStorageInfo, FieldStructure, OffsetMapEntry, SectionHeader,
};
use crate::schema::Schema;

/// Schema-derived switches for the load phase.
#[derive(Debug, Clone, Copy)]
pub struct Db2LoadInfo {
    /// Record ids come from the external id list: the schema's first
    /// field is an id and not inline.
    pub use_id_list: bool,
}

impl Db2LoadInfo {
    pub fn from_schema<S: Schema>(schema: &S) -> Self {
        let use_id_list = schema
            .fields()
            .first()
            .map(|field| field.annotation.is_id && !field.annotation.is_inline)
            .unwrap_or(false);

        Self { use_id_list }
    }
}

/// Everything read from a DB2 file besides the records themselves.
///
/// Populated monotonically by the open and load phases, read-only
/// afterwards. The per-field vectors are indexed by header field; fields
/// without pallet or common data keep empty slots.
#[derive(Debug, Default)]
pub struct Db2Structure {
    pub section_headers: Vec<SectionHeader>,
    pub field_structures: Vec<FieldStructure>,
    pub field_storage: Vec<FieldStorageInfo>,

    /// Pallet values per field, for the bitpacked-indexed compressions.
    pub pallet_data: Vec<Vec<u32>>,
    /// Common-data exceptions per field, keyed by record id.
    pub common_data: Vec<FxHashMap<u32, u32>>,

    pub id_list: Vec<u32>,
    pub copy_table: Vec<CopyTableEntry>,
    pub offset_map: Vec<OffsetMapEntry>,
    pub offset_map_ids: Vec<u32>,
    /// Record index to foreign id, distilled from the per-section
    /// relationship blocks at the end of the load phase.
    pub relationship_map: FxHashMap<u32, u32>,
}

impl Db2Structure {
    pub fn new(header: &Db2Header) -> Self {
        let total_fields = header.total_field_count as usize;
        Self {
            pallet_data: vec![Vec::new(); total_fields],
            common_data: vec![FxHashMap::default(); total_fields],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotation, Field, FixedSchema};

    #[test]
    fn test_load_info_from_schema() {
        const NON_INLINE_ID: &[Field] = &[
            Field::value::<u32>(Annotation::new().id().non_inline()),
            Field::value::<u32>(Annotation::new()),
        ];
        assert!(Db2LoadInfo::from_schema(&FixedSchema::new(NON_INLINE_ID)).use_id_list);

        const INLINE_ID: &[Field] = &[
            Field::value::<u32>(Annotation::new().id()),
            Field::value::<u32>(Annotation::new()),
        ];
        assert!(!Db2LoadInfo::from_schema(&FixedSchema::new(INLINE_ID)).use_id_list);

        const EMPTY: &[Field] = &[];
        assert!(!Db2LoadInfo::from_schema(&FixedSchema::new(EMPTY)).use_id_list);
    }
}
