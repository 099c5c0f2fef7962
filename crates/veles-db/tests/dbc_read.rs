//! End-to-end DBC decoding against synthetic images.

use veles_common::MemorySource;
use veles_db::dbc::{
    record_size_dest, DbcFile, DbcLocale, DbcVersion, LangPolicy, VanillaLangString,
};
use veles_db::{
    Annotation, DataSource, Error, Field, FixedRecord, FixedSchema, RecordLayout, RuntimeRecord,
    RuntimeSchema, RuntimeValue, Schema,
};

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// One-record Vanilla file: `{u32 id, localized name, u32 flags}` with
/// id 42, enUS name "Test", flags 7.
fn vanilla_title_file() -> MemorySource {
    let string_block = b"\0Test\0";

    let mut record = Vec::new();
    push_u32(&mut record, 42);
    push_u32(&mut record, 1); // enUS -> "Test"
    for _ in 1..8 {
        push_u32(&mut record, 0); // other locales -> ""
    }
    push_u32(&mut record, 0xFF); // locale flags word
    push_u32(&mut record, 7); // flags column

    let mut out = Vec::new();
    out.extend_from_slice(b"WDBC");
    push_u32(&mut out, 1); // record count
    push_u32(&mut out, 11); // field count: 1 + (8 + 1) + 1
    push_u32(&mut out, record.len() as u32);
    push_u32(&mut out, string_block.len() as u32);
    out.extend_from_slice(&record);
    out.extend_from_slice(string_block);

    MemorySource::new(out)
}

fn title_schema() -> RuntimeSchema {
    RuntimeSchema::new(
        vec![
            Field::value::<u32>(Annotation::new().id()),
            Field::lang_string(1, Annotation::new()),
            Field::value::<u32>(Annotation::new()),
        ],
        vec!["id".to_string(), "name".to_string(), "flags".to_string()],
    )
    .unwrap()
}

#[test]
fn legacy_expansion_emits_every_locale() {
    let mut dbc = DbcFile::<_, RuntimeRecord, _>::legacy(
        title_schema(),
        DbcVersion::Vanilla,
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();

    assert_eq!(dbc.size(), 1);

    let record = dbc.record(0).unwrap();
    // 1 id + 8 strings + flags word + 1 flags column.
    assert_eq!(record.data.len(), 11);
    assert_eq!(record.data[0], RuntimeValue::U32(42));
    assert_eq!(record.data[1].as_str(), Some("Test"));
    for slot in 2..9 {
        assert_eq!(record.data[slot].as_str(), Some(""));
    }
    assert_eq!(record.data[9], RuntimeValue::U32(0xFF));
    assert_eq!(record.data[10], RuntimeValue::U32(7));
}

#[test]
fn locale_projection_emits_one_string() {
    let schema = title_schema();
    let mut dbc = DbcFile::<_, RuntimeRecord, _>::with_locale(
        &schema,
        DbcVersion::Vanilla,
        DbcLocale::EnUs,
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();

    let record = dbc.record(0).unwrap();
    assert_eq!(record.data.len(), schema.element_count());
    assert_eq!(record.data[0], RuntimeValue::U32(42));
    assert_eq!(record.data[1].as_str(), Some("Test"));
    assert_eq!(record.data[2], RuntimeValue::U32(7));

    let accessor = schema.accessor(&record);
    assert_eq!(accessor.get::<u32>("id").unwrap(), 42);
    assert_eq!(accessor.get_str("name").unwrap(), "Test");

    // A locale with a zero reference resolves to the empty string.
    let mut dbc = DbcFile::<_, RuntimeRecord, _>::with_locale(
        &schema,
        DbcVersion::Vanilla,
        DbcLocale::FrFr,
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();
    assert_eq!(dbc.record(0).unwrap().data[1].as_str(), Some(""));
}

// Fixed-layout mirror of the same table.
#[derive(Default)]
#[repr(C, packed)]
struct TitleData {
    id: u32,
    name: VanillaLangString,
    flags: u32,
}

// SAFETY: packed struct matching TITLE_FIELDS under the Vanilla legacy
// expansion.
unsafe impl RecordLayout for TitleData {}

const TITLE_FIELDS: &[Field] = &[
    Field::value::<u32>(Annotation::new().id()),
    Field::lang_string(1, Annotation::new()),
    Field::value::<u32>(Annotation::new()),
];

#[test]
fn fixed_records_carry_the_full_block() {
    let schema = FixedSchema::new(TITLE_FIELDS);
    assert_eq!(
        record_size_dest(&schema, DbcVersion::Vanilla),
        std::mem::size_of::<TitleData>()
    );

    let mut dbc = DbcFile::<_, FixedRecord<TitleData>, _>::legacy(
        schema,
        DbcVersion::Vanilla,
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();

    let record = dbc.record(0).unwrap();
    let data = record.data;
    assert_eq!({ data.id }, 42);
    assert_eq!({ data.flags }, 7);

    let name = data.name;
    assert_eq!({ name.flags }, 0xFF);
    let strings = name.strings;
    assert_eq!(strings[0].as_str(), Some("Test"));
    assert_eq!(strings[3].as_str(), Some(""));
}

#[test]
fn open_validates_the_header() {
    // Bad signature.
    let mut raw = vanilla_title_file().as_bytes().to_vec();
    raw[..4].copy_from_slice(b"XDBC");
    assert!(matches!(
        DbcFile::<_, RuntimeRecord, _>::legacy(
            title_schema(),
            DbcVersion::Vanilla,
            MemorySource::new(raw),
        ),
        Err(Error::SignatureMismatch { .. })
    ));

    // Wrong version: BC/WotLK expects 17 lang-string elements, not 9.
    assert!(matches!(
        DbcFile::<_, RuntimeRecord, _>::legacy(
            title_schema(),
            DbcVersion::BcWotlk,
            vanilla_title_file(),
        ),
        Err(Error::SchemaMismatch(_))
    ));

    // A locale outside the Vanilla block.
    assert!(matches!(
        DbcFile::<_, RuntimeRecord, _>::with_locale(
            title_schema(),
            DbcVersion::Vanilla,
            DbcLocale::RuRu,
            vanilla_title_file(),
        ),
        Err(Error::SchemaMismatch(_))
    ));

    // Open with an explicit policy works like the shorthand.
    let mut dbc = DbcFile::<_, RuntimeRecord, _>::open(
        title_schema(),
        DbcVersion::Vanilla,
        LangPolicy::Locale(DbcLocale::EsMx),
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();
    assert_eq!(dbc.record(0).unwrap().data.len(), 3);
}

#[test]
fn cata_plus_lang_strings_are_plain_references() {
    let schema = RuntimeSchema::new(
        vec![
            Field::value::<u32>(Annotation::new().id()),
            Field::lang_string(1, Annotation::new()),
        ],
        vec!["id".to_string(), "name".to_string()],
    )
    .unwrap();

    let string_block = b"\0Axe\0";
    let mut out = Vec::new();
    out.extend_from_slice(b"WDBC");
    push_u32(&mut out, 1);
    push_u32(&mut out, 2);
    push_u32(&mut out, 8);
    push_u32(&mut out, string_block.len() as u32);
    push_u32(&mut out, 19);
    push_u32(&mut out, 1);
    out.extend_from_slice(string_block);

    let mut dbc = DbcFile::<_, RuntimeRecord, _>::with_locale(
        &schema,
        DbcVersion::CataPlus,
        DbcLocale::ANY,
        MemorySource::new(out),
    )
    .unwrap();
    dbc.load().unwrap();

    let record = dbc.record(0).unwrap();
    assert_eq!(record.data[0], RuntimeValue::U32(19));
    assert_eq!(record.data[1].as_str(), Some("Axe"));
}

#[test]
fn out_of_range_index_fails() {
    let mut dbc = DbcFile::<_, RuntimeRecord, _>::legacy(
        title_schema(),
        DbcVersion::Vanilla,
        vanilla_title_file(),
    )
    .unwrap();
    dbc.load().unwrap();
    assert!(matches!(dbc.record(1), Err(Error::CorruptIndex(_))));
}
