//! Building runtime schemas from parsed definition documents.

use veles_common::GameVersion;
use veles_db::{Annotation, Field, RuntimeSchema};

use crate::document::{ColumnType, DbdDocument, Definition};
use crate::{Error, Result};

impl DbdDocument {
    /// Build the schema for a target build.
    ///
    /// Version groups are searched in document order; a group matches
    /// when it lists the build exactly or covers it with a range. The
    /// first match wins.
    pub fn schema_for_build(&self, target: GameVersion) -> Result<RuntimeSchema> {
        for version_def in &self.version_definitions {
            let mut matched = version_def.builds.contains(&target);
            if !matched {
                matched = version_def
                    .build_ranges
                    .iter()
                    .any(|range| range.contains(target));
            }

            if matched {
                return self.project(&version_def.definitions);
            }
        }

        Err(Error::NoSchemaForBuild(target))
    }

    fn project(&self, definitions: &[Definition]) -> Result<RuntimeSchema> {
        let mut fields = Vec::with_capacity(definitions.len());
        let mut names = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let column = self
                .columns
                .get(&definition.name)
                .ok_or_else(|| Error::UnknownColumn(definition.name.clone()))?;

            let annotation = Annotation {
                is_id: definition.is_id,
                is_relation: definition.is_relation,
                is_inline: !definition.is_non_inline,
                is_signed: definition.is_signed,
            };

            let array_size = definition.arr_length.max(1);
            if array_size > u8::MAX as u32 {
                return Err(Error::InvalidArrayLength(definition.name.clone()));
            }
            let array_size = array_size as u8;

            let field = match column.column_type {
                ColumnType::Int | ColumnType::Uint => {
                    // Pre-WDB5 definitions omit the width; those columns
                    // are 32-bit on disk.
                    let bits = if definition.size == 0 { 32 } else { definition.size };
                    Field::integer_array((bits / 8 * array_size as u32) as u16, array_size, annotation)
                }
                ColumnType::Float => Field::float32_array(array_size, annotation),
                ColumnType::String => Field::string(array_size, annotation),
                ColumnType::LocString => Field::lang_string(array_size, annotation),
            };

            fields.push(field);
            names.push(definition.name.clone());
        }

        Ok(RuntimeSchema::new(fields, names)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veles_db::{FieldType, Schema};

    const DOCUMENT: &str = "\
COLUMNS
int ID
int Flags
uint Mask
float Scale
locstring Name_lang

LAYOUT AA00BB11
BUILD 3.3.5.12340
BUILD 3.0.2.8905-3.2.0.10192
$id$ID<32>
Flags<u16>[2]
Mask<32>
Scale
Name_lang

BUILD 4.3.4.15595
$id,noninline$ID<32>
Name_lang
";

    #[test]
    fn test_schema_for_exact_build() {
        let document = DbdDocument::parse(DOCUMENT).unwrap();
        let schema = document
            .schema_for_build(GameVersion::new(3, 3, 5, 12340))
            .unwrap();

        assert_eq!(schema.names(), ["ID", "Flags", "Mask", "Scale", "Name_lang"]);
        let fields = schema.fields();

        assert!(fields[0].annotation.is_id);
        assert!(fields[0].annotation.is_inline);
        assert!(fields[0].annotation.is_signed);
        assert_eq!(fields[0].bytes, 4);

        assert_eq!(fields[1].field_type, FieldType::Int);
        assert_eq!(fields[1].bytes, 2);
        assert_eq!(fields[1].size, 2);
        assert!(!fields[1].annotation.is_signed);

        // 'uint' columns are forced unsigned even with a plain size.
        assert!(!fields[2].annotation.is_signed);

        assert_eq!(fields[3].field_type, FieldType::Float);
        assert_eq!(fields[3].bytes, 4);

        assert_eq!(fields[4].field_type, FieldType::LangString);
    }

    #[test]
    fn test_schema_for_build_in_range() {
        let document = DbdDocument::parse(DOCUMENT).unwrap();
        let schema = document
            .schema_for_build(GameVersion::new(3, 1, 3, 9947))
            .unwrap();
        assert_eq!(schema.fields().len(), 5);
    }

    #[test]
    fn test_first_matching_group_wins() {
        let document = DbdDocument::parse(DOCUMENT).unwrap();
        let schema = document
            .schema_for_build(GameVersion::new(4, 3, 4, 15595))
            .unwrap();
        assert_eq!(schema.names(), ["ID", "Name_lang"]);
        assert!(!schema.fields()[0].annotation.is_inline);
    }

    #[test]
    fn test_no_schema_for_unknown_build() {
        let document = DbdDocument::parse(DOCUMENT).unwrap();
        assert!(matches!(
            document.schema_for_build(GameVersion::new(1, 12, 1, 5875)),
            Err(Error::NoSchemaForBuild(_))
        ));
    }
}
