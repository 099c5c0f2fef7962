//! The legacy record-oriented DBC format.
//!
//! DBC files are a flat header, a block of fixed-size records, and a
//! string block. The format survived three client eras that differ only
//! in how localized strings are laid out: Vanilla stores 8 per-locale
//! references plus a flags word, BC/WotLK stores 16 plus flags, Cataclysm
//! onwards collapses the block to a single reference.

mod file;

pub use file::{DbcFile, LangPolicy};

use veles_common::GameVersion;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::schema::{FieldType, Schema, STRING_SLOT_BYTES};
use crate::value::StringData;

/// The three historical DBC layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbcVersion {
    Vanilla,
    BcWotlk,
    CataPlus,
}

/// Derive the DBC layout for a client build.
pub fn dbc_version(version: GameVersion) -> DbcVersion {
    const V1_CUTOFF: GameVersion = GameVersion::new(2, 1, 0, 6692);
    const V2_CUTOFF: GameVersion = GameVersion::new(4, 0, 0, 0);

    if version < V2_CUTOFF {
        if version < V1_CUTOFF {
            DbcVersion::Vanilla
        } else {
            DbcVersion::BcWotlk
        }
    } else {
        DbcVersion::CataPlus
    }
}

/// String slots in a Vanilla localized-string block.
pub const VANILLA_STRING_COUNT: usize = 8;
/// String slots in a BC/WotLK localized-string block.
pub const BC_WOTLK_STRING_COUNT: usize = 16;

/// A client locale, used to pick one slot out of a localized-string block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DbcLocale {
    EnUs = 0,
    KoKr,
    FrFr,
    DeDe,
    ZhCn,
    ZhTw,
    EsEs,
    EsMx,
    RuRu,
    JaJp,
    PtPt,
    ItIt,
}

impl DbcLocale {
    /// Placeholder for when locale options are not relevant.
    pub const ANY: DbcLocale = DbcLocale::EnUs;

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "enUS" => Some(Self::EnUs),
            "koKR" => Some(Self::KoKr),
            "frFR" => Some(Self::FrFr),
            "deDE" => Some(Self::DeDe),
            "zhCN" => Some(Self::ZhCn),
            "zhTW" => Some(Self::ZhTw),
            "esES" => Some(Self::EsEs),
            "esMX" => Some(Self::EsMx),
            "ruRU" => Some(Self::RuRu),
            "jaJP" => Some(Self::JaJp),
            "ptPT" => Some(Self::PtPt),
            "itIT" => Some(Self::ItIt),
            _ => None,
        }
    }
}

/// String slots in the localized-string block of a legacy version.
///
/// Only meaningful for [`DbcVersion::Vanilla`] and
/// [`DbcVersion::BcWotlk`]; Cata+ has no block.
pub(crate) fn legacy_string_count(version: DbcVersion) -> usize {
    match version {
        DbcVersion::Vanilla => VANILLA_STRING_COUNT,
        DbcVersion::BcWotlk => BC_WOTLK_STRING_COUNT,
        DbcVersion::CataPlus => 1,
    }
}

/// The destination layout of a legacy localized-string block inside a
/// fixed record: `N` string slots followed by the locale flags word.
#[repr(C, packed)]
pub struct LangStringBlock<const N: usize> {
    pub strings: [StringData; N],
    pub flags: u32,
}

impl<const N: usize> Default for LangStringBlock<N> {
    fn default() -> Self {
        Self {
            strings: std::array::from_fn(|_| StringData::default()),
            flags: 0,
        }
    }
}

pub type VanillaLangString = LangStringBlock<VANILLA_STRING_COUNT>;
pub type BcWotlkLangString = LangStringBlock<BC_WOTLK_STRING_COUNT>;

/// The 20-byte DBC file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DbcHeader {
    pub signature: u32,
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
}

pub const DBC_HEADER_SIZE: usize = std::mem::size_of::<DbcHeader>();

fn lang_string_bytes(version: DbcVersion, string_bytes: usize) -> usize {
    match version {
        // N per-locale references plus the flags word.
        DbcVersion::Vanilla => VANILLA_STRING_COUNT * string_bytes + 4,
        DbcVersion::BcWotlk => BC_WOTLK_STRING_COUNT * string_bytes + 4,
        DbcVersion::CataPlus => string_bytes,
    }
}

fn record_size<S: Schema>(schema: &S, version: DbcVersion, string_bytes: usize) -> usize {
    schema
        .fields()
        .iter()
        .map(|field| match field.field_type {
            FieldType::LangString => lang_string_bytes(version, string_bytes) * field.size as usize,
            FieldType::String => string_bytes * field.size as usize,
            _ => field.total_bytes() as usize,
        })
        .sum()
}

/// On-disk record size for a schema under a DBC version.
pub fn record_size_src<S: Schema>(schema: &S, version: DbcVersion) -> usize {
    record_size(schema, version, std::mem::size_of::<u32>())
}

/// In-memory record size for a schema under a DBC version, with strings
/// as owned slots.
pub fn record_size_dest<S: Schema>(schema: &S, version: DbcVersion) -> usize {
    record_size(schema, version, STRING_SLOT_BYTES as usize)
}

/// On-disk element count for a schema under a DBC version.
///
/// Each localized string expands to its per-locale references plus the
/// flags word; the header's `field_count` counts these expanded elements.
pub fn element_count_src<S: Schema>(schema: &S, version: DbcVersion) -> usize {
    schema
        .fields()
        .iter()
        .map(|field| {
            let expanded = match (field.field_type, version) {
                (FieldType::LangString, DbcVersion::Vanilla) => VANILLA_STRING_COUNT + 1,
                (FieldType::LangString, DbcVersion::BcWotlk) => BC_WOTLK_STRING_COUNT + 1,
                _ => 1,
            };
            expanded * field.size as usize
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotation, Field, FixedSchema};

    const CHR_SCHEMA: &[Field] = &[
        Field::value::<u32>(Annotation::new().id()),
        Field::lang_string(1, Annotation::new()),
        Field::value::<u32>(Annotation::new()),
    ];

    #[test]
    fn test_version_detection() {
        assert_eq!(dbc_version(GameVersion::new(1, 12, 1, 5875)), DbcVersion::Vanilla);
        assert_eq!(dbc_version(GameVersion::new(2, 0, 0, 5991)), DbcVersion::Vanilla);
        assert_eq!(dbc_version(GameVersion::new(2, 4, 3, 8606)), DbcVersion::BcWotlk);
        assert_eq!(dbc_version(GameVersion::new(3, 3, 5, 12340)), DbcVersion::BcWotlk);
        assert_eq!(dbc_version(GameVersion::new(4, 3, 4, 15595)), DbcVersion::CataPlus);
    }

    #[test]
    fn test_element_count_expansion() {
        let schema = FixedSchema::new(CHR_SCHEMA);
        assert_eq!(element_count_src(&schema, DbcVersion::Vanilla), 1 + 9 + 1);
        assert_eq!(element_count_src(&schema, DbcVersion::BcWotlk), 1 + 17 + 1);
        assert_eq!(element_count_src(&schema, DbcVersion::CataPlus), 3);
    }

    #[test]
    fn test_record_sizes() {
        let schema = FixedSchema::new(CHR_SCHEMA);
        assert_eq!(record_size_src(&schema, DbcVersion::Vanilla), 4 + 36 + 4);
        assert_eq!(record_size_src(&schema, DbcVersion::BcWotlk), 4 + 68 + 4);
        assert_eq!(record_size_src(&schema, DbcVersion::CataPlus), 4 + 4 + 4);

        let slot = STRING_SLOT_BYTES as usize;
        assert_eq!(
            record_size_dest(&schema, DbcVersion::Vanilla),
            4 + (8 * slot + 4) + 4
        );
    }

    #[test]
    fn test_lang_string_block_layout() {
        assert_eq!(
            std::mem::size_of::<VanillaLangString>(),
            8 * STRING_SLOT_BYTES as usize + 4
        );
        assert_eq!(
            std::mem::size_of::<BcWotlkLangString>(),
            16 * STRING_SLOT_BYTES as usize + 4
        );
    }

    #[test]
    fn test_locale_names() {
        assert_eq!(DbcLocale::from_name("enUS"), Some(DbcLocale::EnUs));
        assert_eq!(DbcLocale::from_name("itIT"), Some(DbcLocale::ItIt));
        assert_eq!(DbcLocale::from_name("xxXX"), None);
    }
}
