//! The DBC decoder.

use std::marker::PhantomData;

use veles_common::ByteSource;

use crate::data_source::DataSource;
use crate::dbc::{
    element_count_src, legacy_string_count, record_size_src, DbcHeader, DbcLocale, DbcVersion,
    BC_WOTLK_STRING_COUNT, DBC_HEADER_SIZE, VANILLA_STRING_COUNT,
};
use crate::read::{insert_int, read_le, read_pod};
use crate::record::Record;
use crate::schema::{FieldType, Schema, STRING_SLOT_BYTES};
use crate::signature::{Signature, WDBC_MAGIC};
use crate::strings::read_cstring;
use crate::{Error, Result};

/// How legacy localized-string blocks are materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangPolicy {
    /// Emit every per-locale string plus the flags word, matching the
    /// size-preserving layout of a fixed record.
    Expand,
    /// Emit only the string of one locale and skip the rest of the block.
    Locale(DbcLocale),
}

/// A DBC file opened over a byte source.
///
/// ```no_run
/// use veles_common::{MmapSource, GameVersion};
/// use veles_db::{DataSource, RuntimeRecord, RuntimeSchema};
/// use veles_db::dbc::{dbc_version, DbcFile, DbcLocale};
///
/// # fn schema() -> RuntimeSchema { unimplemented!() }
/// let source = MmapSource::open("DBFilesClient/ChrRaces.dbc")?;
/// let version = dbc_version(GameVersion::new(3, 3, 5, 12340));
/// let mut dbc = DbcFile::<_, RuntimeRecord, _>::with_locale(
///     schema(), version, DbcLocale::EnUs, source,
/// )?;
/// dbc.load()?;
/// for record in dbc.records() {
///     let record = record?;
///     // ...
/// }
/// # Ok::<(), veles_db::Error>(())
/// ```
pub struct DbcFile<S, R, FS> {
    schema: S,
    version: DbcVersion,
    policy: LangPolicy,
    header: DbcHeader,
    record_size_src: usize,
    element_count: usize,
    source: FS,
    buffer: Vec<u8>,
    _record: PhantomData<fn() -> R>,
}

impl<S, R, FS> DbcFile<S, R, FS>
where
    S: Schema,
    R: Record,
    FS: ByteSource,
{
    /// Open with the legacy expansion policy, for fixed records whose
    /// layout carries the full per-locale block.
    pub fn legacy(schema: S, version: DbcVersion, source: FS) -> Result<Self> {
        Self::open(schema, version, LangPolicy::Expand, source)
    }

    /// Open with a single-locale projection.
    pub fn with_locale(
        schema: S,
        version: DbcVersion,
        locale: DbcLocale,
        source: FS,
    ) -> Result<Self> {
        Self::open(schema, version, LangPolicy::Locale(locale), source)
    }

    /// Open the file: read and validate the header against the schema.
    pub fn open(schema: S, version: DbcVersion, policy: LangPolicy, mut source: FS) -> Result<Self> {
        if let LangPolicy::Locale(locale) = policy {
            let slots = match version {
                DbcVersion::Vanilla => VANILLA_STRING_COUNT,
                DbcVersion::BcWotlk => BC_WOTLK_STRING_COUNT,
                DbcVersion::CataPlus => usize::MAX,
            };
            if locale as usize >= slots {
                return Err(Error::SchemaMismatch("locale not present in this version"));
            }
        }

        let header: DbcHeader = read_pod(&mut source)?;

        if header.signature != WDBC_MAGIC.as_u32() {
            return Err(Error::SignatureMismatch {
                expected: "WDBC",
                actual: Signature::from_u32(header.signature),
            });
        }

        if header.field_count as usize != element_count_src(&schema, version) {
            return Err(Error::SchemaMismatch("field count does not match schema"));
        }

        let record_size = record_size_src(&schema, version);
        if header.record_size as usize != record_size {
            return Err(Error::SchemaMismatch("record size does not match schema"));
        }

        let element_count = schema.element_count();
        let buffer = vec![0u8; record_size];

        Ok(Self {
            schema,
            version,
            policy,
            header,
            record_size_src: record_size,
            element_count,
            source,
            buffer,
            _record: PhantomData,
        })
    }

    /// DBC files have no sidecar tables; provided for API parity with the
    /// DB2 decoder.
    pub fn load(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn header(&self) -> &DbcHeader {
        &self.header
    }

    /// Absolute offset of the string block.
    fn string_block_base(&self) -> u64 {
        DBC_HEADER_SIZE as u64
            + self.header.record_size as u64 * self.header.record_count as u64
    }

    fn read_string_at(&mut self, string_ref: u32) -> Result<crate::StringData> {
        let base = self.string_block_base();
        self.source.set_pos(base + string_ref as u64);
        read_cstring(&mut self.source)
    }

    fn field_le(&self, offset: usize, width: usize) -> Result<u64> {
        read_le(&self.buffer, offset, width).ok_or(Error::CorruptIndex("field outside record"))
    }

    fn fetch(&mut self, index: u32) -> Result<R> {
        if index >= self.header.record_count {
            return Err(Error::CorruptIndex("record index out of range"));
        }

        let offset = DBC_HEADER_SIZE as u64 + self.header.record_size as u64 * index as u64;
        self.source.set_pos(offset);
        self.buffer.fill(0);
        self.source.read(&mut self.buffer)?;

        let mut record = R::new(index);
        record.prepare(self.element_count, self.record_size_src);

        let policy = self.policy;
        let mut src_offset = 0usize;
        let mut view_offset = 0usize;

        let field_count = self.schema.fields().len();
        for field_index in 0..field_count {
            let field = self.schema.fields()[field_index];
            record.insert_field(field_index as u32, field.size as u32, view_offset);

            for z in 0..field.size as u32 {
                match field.field_type {
                    FieldType::Int => {
                        let width = field.bytes as usize;
                        let raw = self.field_le(src_offset, width)?;
                        insert_int(&mut record, field_index as u32, z, view_offset, width, raw);
                        src_offset += width;
                        view_offset += width;
                    }
                    FieldType::Float => {
                        let raw = self.field_le(src_offset, 4)? as u32;
                        record.insert_f32(field_index as u32, z, view_offset, f32::from_bits(raw));
                        src_offset += 4;
                        view_offset += 4;
                    }
                    FieldType::String => {
                        let string_ref = self.field_le(src_offset, 4)? as u32;
                        let value = self.read_string_at(string_ref)?;
                        record.insert_string(field_index as u32, z, view_offset, value);
                        src_offset += 4;
                        view_offset += STRING_SLOT_BYTES as usize;
                    }
                    FieldType::LangString if self.version == DbcVersion::CataPlus => {
                        let string_ref = self.field_le(src_offset, 4)? as u32;
                        let value = self.read_string_at(string_ref)?;
                        record.insert_string(field_index as u32, z, view_offset, value);
                        src_offset += 4;
                        view_offset += STRING_SLOT_BYTES as usize;
                    }
                    FieldType::LangString => {
                        let count = legacy_string_count(self.version);
                        match policy {
                            LangPolicy::Expand => {
                                // One destination block per array element:
                                // `count` strings plus the flags word.
                                let array_block = (count as u32 + 1) * z;
                                for slot in 0..count {
                                    let string_ref =
                                        self.field_le(src_offset + 4 * slot, 4)? as u32;
                                    let value = self.read_string_at(string_ref)?;
                                    record.insert_string(
                                        field_index as u32,
                                        array_block + slot as u32,
                                        view_offset,
                                        value,
                                    );
                                    view_offset += STRING_SLOT_BYTES as usize;
                                }
                                src_offset += 4 * count;

                                let flags = self.field_le(src_offset, 4)? as u32;
                                record.insert_u32(
                                    field_index as u32,
                                    array_block + count as u32,
                                    view_offset,
                                    flags,
                                );
                                src_offset += 4;
                                view_offset += 4;
                            }
                            LangPolicy::Locale(locale) => {
                                let string_ref =
                                    self.field_le(src_offset + 4 * locale as usize, 4)? as u32;
                                let value = self.read_string_at(string_ref)?;
                                record.insert_string(field_index as u32, z, view_offset, value);
                                src_offset += 4 * count + 4;
                                view_offset += STRING_SLOT_BYTES as usize;
                            }
                        }
                    }
                }
            }
        }

        Ok(record)
    }
}

impl<S, R, FS> DataSource<R> for DbcFile<S, R, FS>
where
    S: Schema,
    R: Record,
    FS: ByteSource,
{
    fn size(&self) -> u32 {
        self.header.record_count
    }

    fn record(&mut self, index: u32) -> Result<R> {
        self.fetch(index)
    }

    fn signature(&self) -> Signature {
        WDBC_MAGIC
    }
}

