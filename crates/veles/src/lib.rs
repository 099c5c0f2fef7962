//! Veles - World of Warcraft client database reading library.
//!
//! This crate provides a unified interface to the Veles library
//! ecosystem for working with the client's database files.
//!
//! # Crates
//!
//! - [`veles_common`] - Byte sources and client build versions
//! - [`veles_db`] - Schema model and the DBC / DB2 (WDC3/WDC4/WDC5) decoders
//! - [`veles_dbd`] - WoWDBDefs definition documents and schema building
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! // Describe the table for the target build.
//! let document = DbdDocument::read_file("definitions/CharTitles.dbd")?;
//! let schema = document.schema_for_build(GameVersion::new(9, 2, 7, 45745))?;
//!
//! // Open and read the table.
//! let source = MmapSource::open("dbfilesclient/chartitles.db2")?;
//! let mut db2 = Db2File::<_, RuntimeRecord, _>::open(&schema, source)?;
//! db2.load()?;
//!
//! for record in db2.records() {
//!     let record = record?;
//!     if record.encryption_state == RecordEncryption::Encrypted {
//!         continue;
//!     }
//!     let accessor = schema.accessor(&record);
//!     println!("{}", accessor.get::<u32>("ID")?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_common as common;
pub use veles_db as db;
pub use veles_dbd as dbd;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_common::{ByteSource, GameVersion, MemorySource, MmapSource};
    pub use veles_db::db2::Db2File;
    pub use veles_db::dbc::{dbc_version, DbcFile, DbcLocale, DbcVersion};
    pub use veles_db::{
        Annotation, DataSource, Field, FixedRecord, FixedSchema, Record, RecordEncryption,
        RuntimeRecord, RuntimeSchema, Schema, StringData,
    };
    pub use veles_dbd::DbdDocument;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
