//! The parsed shape of a WoWDBDefs `.dbd` document.

use rustc_hash::FxHashMap;
use veles_common::GameVersion;

/// The column types a definition document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    /// Historical spelling; like [`ColumnType::Int`] but definitions
    /// referencing the column are always unsigned.
    Uint,
    Float,
    String,
    LocString,
}

impl ColumnType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "uint" => Some(Self::Uint),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            "locstring" => Some(Self::LocString),
            _ => None,
        }
    }
}

/// A column declared in the COLUMNS block.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub column_type: ColumnType,
    /// Foreign key target as `(table, column)`.
    pub foreign_key: Option<(String, String)>,
    pub verified: bool,
    pub comment: Option<String>,
}

/// One row of a version group: a column reference with per-version
/// width, array length, and annotations.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    /// Width in bits; 0 means the column's declared type decides.
    pub size: u32,
    pub arr_length: u32,
    pub name: String,
    pub is_id: bool,
    pub is_relation: bool,
    pub is_non_inline: bool,
    pub is_signed: bool,
}

/// An inclusive build range, e.g. `1.12.0.5595-1.12.1.5875`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildRange {
    pub min_build: GameVersion,
    pub max_build: GameVersion,
}

impl BuildRange {
    pub const fn new(min_build: GameVersion, max_build: GameVersion) -> Self {
        Self {
            min_build,
            max_build,
        }
    }

    pub fn contains(&self, build: GameVersion) -> bool {
        self.min_build <= build && build <= self.max_build
    }
}

/// One blank-line-delimited group of the version phase.
#[derive(Debug, Clone, Default)]
pub struct VersionDefinitions {
    pub builds: Vec<GameVersion>,
    pub build_ranges: Vec<BuildRange>,
    pub layout_hashes: Vec<String>,
    pub comment: Option<String>,
    pub definitions: Vec<Definition>,
}

/// A fully parsed definition document.
#[derive(Debug, Clone, Default)]
pub struct DbdDocument {
    pub columns: FxHashMap<String, ColumnDefinition>,
    pub version_definitions: Vec<VersionDefinitions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_range_contains() {
        let range = BuildRange::new(
            GameVersion::new(3, 0, 2, 8905),
            GameVersion::new(3, 3, 5, 12340),
        );
        assert!(range.contains(GameVersion::new(3, 2, 0, 10192)));
        assert!(range.contains(GameVersion::new(3, 0, 2, 8905)));
        assert!(range.contains(GameVersion::new(3, 3, 5, 12340)));
        assert!(!range.contains(GameVersion::new(2, 4, 3, 8606)));
        assert!(!range.contains(GameVersion::new(4, 0, 1, 13164)));
    }

    #[test]
    fn test_column_type_names() {
        assert_eq!(ColumnType::from_name("int"), Some(ColumnType::Int));
        assert_eq!(ColumnType::from_name("locstring"), Some(ColumnType::LocString));
        assert_eq!(ColumnType::from_name("double"), None);
    }
}
