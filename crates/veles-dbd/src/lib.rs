//! WoWDBDefs definition parsing.
//!
//! The community-maintained WoWDBDefs project describes every client
//! database table as a text document: a `COLUMNS` block naming and
//! typing each column, followed by per-version groups that pin down
//! widths, array lengths, and annotations for concrete build ranges.
//! This crate parses those documents and projects the group matching a
//! target build into a [`RuntimeSchema`](veles_db::RuntimeSchema).
//!
//! # Example
//!
//! ```no_run
//! use veles_common::GameVersion;
//! use veles_dbd::DbdDocument;
//!
//! let document = DbdDocument::read_file("definitions/SpellItemEnchantment.dbd")?;
//! let schema = document.schema_for_build(GameVersion::new(3, 3, 5, 12340))?;
//! # Ok::<(), veles_dbd::Error>(())
//! ```

mod document;
mod error;
mod parser;
mod schema;

pub use document::{
    BuildRange, ColumnDefinition, ColumnType, DbdDocument, Definition, VersionDefinitions,
};
pub use error::{Error, Result};
