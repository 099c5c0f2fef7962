//! WoW client database decoding.
//!
//! The client ships its tables in two binary families: the legacy flat
//! `DBC` layout and the modern section-oriented `DB2` layout (WDC3, WDC4
//! and WDC5). Both are tables of fixed-shape records whose column layout
//! is supplied externally by a schema; this crate turns the bytes into
//! typed records.
//!
//! # Architecture
//!
//! - **Schemas** ([`FixedSchema`], [`RuntimeSchema`]): ordered [`Field`]
//!   lists with identity/relation/inline/sign annotations.
//! - **Records** ([`FixedRecord`], [`RuntimeRecord`]): two shapes behind
//!   one insertion protocol ([`Record`]) - a byte-exact struct for
//!   compile-time layouts, a tagged-value vector for runtime layouts.
//! - **Decoders** ([`dbc::DbcFile`], [`db2::Db2File`]): open a
//!   [`ByteSource`](veles_common::ByteSource), validate the header
//!   against the schema, digest sidecar tables, then materialise records
//!   on demand through [`DataSource`].
//!
//! # Example
//!
//! ```no_run
//! use veles_common::MmapSource;
//! use veles_db::db2::Db2File;
//! use veles_db::{Annotation, DataSource, Field, RuntimeRecord, RuntimeSchema};
//!
//! let schema = RuntimeSchema::new(
//!     vec![
//!         Field::value::<u32>(Annotation::new().id().non_inline()),
//!         Field::lang_string(1, Annotation::new()),
//!         Field::value::<u16>(Annotation::new()),
//!     ],
//!     vec!["id".into(), "name".into(), "mask".into()],
//! )?;
//!
//! let source = MmapSource::open("dbfilesclient/chartitles.db2")?;
//! let mut db2 = Db2File::<_, RuntimeRecord, _>::open(&schema, source)?;
//! db2.load()?;
//!
//! for record in db2.records() {
//!     let record = record?;
//!     let accessor = schema.accessor(&record);
//!     println!("{}: {}", accessor.get::<u32>("id")?, accessor.get_str("name")?);
//! }
//! # Ok::<(), veles_db::Error>(())
//! ```

mod data_source;
mod error;
mod read;
mod record;
mod schema;
mod signature;
mod strings;
mod value;

pub mod db2;
pub mod dbc;

pub use data_source::{DataSource, Records};
pub use error::{Error, Result};
pub use record::{FixedRecord, Record, RecordEncryption, RecordLayout, RuntimeRecord};
pub use schema::{
    Annotation, Field, FieldType, FieldValues, FixedSchema, RecordAccessor, RuntimeSchema, Schema,
    ValueType, STRING_SLOT_BYTES,
};
pub use signature::{Signature, WDB2_MAGIC, WDBC_MAGIC, WDC3_MAGIC, WDC4_MAGIC, WDC5_MAGIC};
pub use strings::read_cstring;
pub use value::{FromValue, RuntimeValue, StringData};
