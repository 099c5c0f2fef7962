//! Line-oriented parser for `.dbd` definition documents.
//!
//! A document is two phases separated by a blank line: a `COLUMNS` block
//! declaring every column once, then blank-line-delimited version groups
//! of `LAYOUT`/`BUILD`/`COMMENT` lines followed by definition rows like
//! `$id$ID<32>` or `Flags<u16>[2]`.

use std::path::Path;

use veles_common::GameVersion;

use crate::document::{
    BuildRange, ColumnDefinition, ColumnType, DbdDocument, Definition, VersionDefinitions,
};
use crate::{Error, Result};

const KEYWORD_LAYOUT: &str = "LAYOUT";
const KEYWORD_BUILD: &str = "BUILD";
const KEYWORD_COMMENT: &str = "COMMENT";
const COMMENT_SEPARATOR: &str = "//";
const KEY_SEPARATOR: &str = "::";

impl DbdDocument {
    /// Parse a document from text.
    pub fn parse(text: &str) -> Result<Self> {
        Parser::new(text).run()
    }

    /// Read and parse a document from a file.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Working state for the version group currently being collected.
#[derive(Default)]
struct Group {
    builds: Vec<GameVersion>,
    build_ranges: Vec<BuildRange>,
    layout_hashes: Vec<String>,
    comment: String,
    definitions: Vec<Definition>,
}

struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    document: DbdDocument,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            document: DbdDocument::default(),
        }
    }

    fn run(mut self) -> Result<DbdDocument> {
        match self.lines.next() {
            Some((_, "COLUMNS")) => {}
            _ => return Err(parse_error(1, "document does not start with COLUMNS")),
        }

        self.parse_columns()?;
        self.parse_versions()?;

        Ok(self.document)
    }

    /// Column phase: one column per line until a blank line.
    fn parse_columns(&mut self) -> Result<()> {
        while let Some((index, line)) = self.lines.next() {
            let line_number = index + 1;

            if line.trim().is_empty() {
                break;
            }

            let first_space = line.find(' ').ok_or_else(|| {
                parse_error(line_number, "no space between type and column name")
            })?;

            let type_end = line
                .find(|c| c == ' ' || c == '<')
                .unwrap_or(line.len());
            let type_name = &line[..type_end];
            let column_type = ColumnType::from_name(type_name)
                .ok_or_else(|| parse_error(line_number, format!("invalid type: {type_name}")))?;

            let foreign_key = if line[type_end..].starts_with('<') {
                let key_end = line[type_end..]
                    .find('>')
                    .map(|pos| pos + type_end)
                    .ok_or_else(|| parse_error(line_number, "missing foreign key end token"))?;
                let key = &line[type_end + 1..key_end];
                let separator = key.find(KEY_SEPARATOR).ok_or_else(|| {
                    parse_error(line_number, "missing foreign key separator token")
                })?;
                Some((
                    key[..separator].to_string(),
                    key[separator + KEY_SEPARATOR.len()..].to_string(),
                ))
            } else {
                None
            };

            let mut name = match line[first_space + 1..].find(' ') {
                Some(next_space) => &line[first_space + 1..first_space + 1 + next_space],
                None => &line[first_space + 1..],
            };

            let verified = if let Some(stripped) = name.strip_suffix('?') {
                name = stripped;
                false
            } else {
                true
            };

            let comment = line
                .find(COMMENT_SEPARATOR)
                .map(|pos| line[pos + COMMENT_SEPARATOR.len()..].trim().to_string());

            if self.document.columns.contains_key(name) {
                return Err(parse_error(
                    line_number,
                    format!("column name '{name}' already exists"),
                ));
            }

            self.document.columns.insert(
                name.to_string(),
                ColumnDefinition {
                    column_type,
                    foreign_key,
                    verified,
                    comment,
                },
            );
        }

        Ok(())
    }

    /// Version phase: blank-line-delimited groups.
    fn parse_versions(&mut self) -> Result<()> {
        let mut group = Group::default();
        let mut last_line = 1;

        while let Some((index, line)) = self.lines.next() {
            let line_number = index + 1;
            last_line = line_number;
            let is_blank = line.trim().is_empty();

            if is_blank {
                self.flush_group(&mut group, line_number)?;
                continue;
            }

            if let Some(rest) = line.strip_prefix(KEYWORD_LAYOUT) {
                group
                    .layout_hashes
                    .extend(rest.trim_start().split(", ").map(str::to_string));
            } else if let Some(rest) = line.strip_prefix(KEYWORD_BUILD) {
                for build in rest.trim_start().split(", ") {
                    match build.split_once('-') {
                        Some((min, max)) => {
                            let min = parse_build(min, line_number)?;
                            let max = parse_build(max, line_number)?;
                            group.build_ranges.push(BuildRange::new(min, max));
                        }
                        None => group.builds.push(parse_build(build, line_number)?),
                    }
                }
            } else if let Some(rest) = line.strip_prefix(KEYWORD_COMMENT) {
                group.comment = rest.trim().to_string();
            } else {
                let definition = self.parse_definition(line, line_number)?;
                group.definitions.push(definition);
            }
        }

        self.flush_group(&mut group, last_line)?;
        Ok(())
    }

    /// Finish the current group: push it if it names builds or layouts,
    /// reject stray definitions, reset.
    fn flush_group(&mut self, group: &mut Group, line_number: usize) -> Result<()> {
        let taken = std::mem::take(group);

        if !taken.builds.is_empty()
            || !taken.build_ranges.is_empty()
            || !taken.layout_hashes.is_empty()
        {
            self.document.version_definitions.push(VersionDefinitions {
                builds: taken.builds,
                build_ranges: taken.build_ranges,
                layout_hashes: taken.layout_hashes,
                comment: (!taken.comment.is_empty()).then_some(taken.comment),
                definitions: taken.definitions,
            });
        } else if !taken.definitions.is_empty() || !taken.comment.trim().is_empty() {
            return Err(parse_error(
                line_number,
                "definitions without BUILD or LAYOUT",
            ));
        }

        Ok(())
    }

    /// A definition row: `[$annot,annot$][<[u]bits>][[len]]Name`.
    fn parse_definition(&self, line: &str, line_number: usize) -> Result<Definition> {
        let mut rest = line.to_string();
        let mut definition = Definition::default();

        if let Some(annotations) = extract_between(&mut rest, '$', '$', line_number)? {
            for annotation in annotations.split(',') {
                match annotation {
                    "id" => definition.is_id = true,
                    "noninline" => definition.is_non_inline = true,
                    "relation" => definition.is_relation = true,
                    _ => {}
                }
            }
        }

        if let Some(size) = extract_between(&mut rest, '<', '>', line_number)? {
            let digits = match size.strip_prefix('u') {
                Some(digits) => {
                    definition.is_signed = false;
                    digits
                }
                None => {
                    definition.is_signed = true;
                    &size
                }
            };
            definition.size = digits
                .parse()
                .map_err(|_| parse_error(line_number, format!("invalid field size: {size}")))?;
        }

        if let Some(length) = extract_between(&mut rest, '[', ']', line_number)? {
            definition.arr_length = length
                .parse()
                .map_err(|_| parse_error(line_number, format!("invalid array length: {length}")))?;
        }

        definition.name = rest;

        match self.document.columns.get(&definition.name) {
            None => {
                return Err(parse_error(
                    line_number,
                    format!("unable to find '{}' in column definitions", definition.name),
                ));
            }
            Some(column) => {
                if column.column_type == ColumnType::Uint {
                    definition.is_signed = false;
                }
            }
        }

        Ok(definition)
    }
}

fn parse_build(text: &str, line_number: usize) -> Result<GameVersion> {
    GameVersion::from_string(text)
        .ok_or_else(|| parse_error(line_number, format!("invalid build: {text}")))
}

/// Cut the first `start`..`end` token span out of `text`, returning its
/// contents.
fn extract_between(
    text: &mut String,
    start: char,
    end: char,
    line_number: usize,
) -> Result<Option<String>> {
    let Some(start_pos) = text.find(start) else {
        return Ok(None);
    };

    let end_pos = text[start_pos + 1..]
        .find(end)
        .map(|pos| pos + start_pos + 1)
        .ok_or_else(|| parse_error(line_number, "end token is missing"))?;

    let inner = text[start_pos + 1..end_pos].to_string();
    text.replace_range(start_pos..=end_pos, "");

    Ok(Some(inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_between() {
        let mut text = "$id,noninline$ID<32>".to_string();
        let annotations = extract_between(&mut text, '$', '$', 1).unwrap();
        assert_eq!(annotations.as_deref(), Some("id,noninline"));
        assert_eq!(text, "ID<32>");

        let size = extract_between(&mut text, '<', '>', 1).unwrap();
        assert_eq!(size.as_deref(), Some("32"));
        assert_eq!(text, "ID");

        assert_eq!(extract_between(&mut text, '[', ']', 1).unwrap(), None);

        let mut broken = "Flags<16".to_string();
        assert!(extract_between(&mut broken, '<', '>', 3).is_err());
    }

    #[test]
    fn test_rejects_missing_columns_header() {
        assert!(DbdDocument::parse("BUILD 1.0.0.1\nID<32>\n").is_err());
    }

    #[test]
    fn test_rejects_duplicate_column() {
        let text = "COLUMNS\nint ID\nint ID\n";
        assert!(matches!(
            DbdDocument::parse(text),
            Err(Error::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_type() {
        let text = "COLUMNS\ndouble Scale\n";
        assert!(matches!(
            DbdDocument::parse(text),
            Err(Error::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_definitions_without_build() {
        let text = "COLUMNS\nint ID\n\nID<32>\n";
        assert!(matches!(
            DbdDocument::parse(text),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_parses_columns_and_groups() {
        let text = "\
COLUMNS
int ID
int<Spell::ID> SpellID
string Name_lang?
float Scale // world scale

LAYOUT ABCD1234, FFEE0011
BUILD 3.3.5.12340
BUILD 3.0.2.8905-3.2.0.10192
COMMENT wrath era
$id$ID<32>
SpellID<u32>
Name_lang
Scale
";
        let document = DbdDocument::parse(text).unwrap();
        assert_eq!(document.columns.len(), 4);

        let spell = &document.columns["SpellID"];
        assert_eq!(
            spell.foreign_key,
            Some(("Spell".to_string(), "ID".to_string()))
        );
        assert!(spell.verified);
        assert!(!document.columns["Name_lang"].verified);
        assert_eq!(
            document.columns["Scale"].comment.as_deref(),
            Some("world scale")
        );

        assert_eq!(document.version_definitions.len(), 1);
        let group = &document.version_definitions[0];
        assert_eq!(group.layout_hashes, ["ABCD1234", "FFEE0011"]);
        assert_eq!(group.builds, [GameVersion::new(3, 3, 5, 12340)]);
        assert_eq!(group.build_ranges.len(), 1);
        assert_eq!(group.comment.as_deref(), Some("wrath era"));
        assert_eq!(group.definitions.len(), 4);

        let id = &group.definitions[0];
        assert!(id.is_id);
        assert_eq!(id.size, 32);
        assert!(id.is_signed);

        let spell_id = &group.definitions[1];
        assert!(!spell_id.is_signed);
        assert_eq!(spell_id.size, 32);
    }
}
