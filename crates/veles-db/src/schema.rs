//! Column schemas describing record shapes.
//!
//! A schema is an ordered list of [`Field`]s. Two flavors exist:
//! [`FixedSchema`] is const-constructible and backs compile-time record
//! layouts, [`RuntimeSchema`] carries field names and backs records whose
//! shape is only known at runtime (e.g. built from a definition document).

use crate::record::RuntimeRecord;
use crate::value::{FromValue, RuntimeValue, StringData};
use crate::{Error, Result};

/// Width in bytes of an owned string slot inside a materialised record.
pub const STRING_SLOT_BYTES: u8 = std::mem::size_of::<StringData>() as u8;

/// The column type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    String,
    /// A localized string: one string per client locale in legacy DBC
    /// files, a plain string reference in modern files.
    LangString,
}

/// Semantic markers attached to a field.
///
/// Equality covers all four flags, including `is_signed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation {
    /// The field is the record's primary key.
    pub is_id: bool,
    /// The field holds a foreign index served by the relationship table.
    pub is_relation: bool,
    /// The field is stored inside the record body (as opposed to a
    /// sidecar table such as the id list).
    pub is_inline: bool,
    /// Integer contents are interpreted as signed when projected.
    pub is_signed: bool,
}

impl Annotation {
    pub const fn new() -> Self {
        Self {
            is_id: false,
            is_relation: false,
            is_inline: true,
            is_signed: false,
        }
    }

    pub const fn id(mut self) -> Self {
        self.is_id = true;
        self
    }

    pub const fn relation(mut self) -> Self {
        self.is_relation = true;
        self
    }

    pub const fn non_inline(mut self) -> Self {
        self.is_inline = false;
        self
    }

    pub const fn signed(mut self, value: bool) -> Self {
        self.is_signed = value;
        self
    }
}

impl Default for Annotation {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps native scalar types onto field descriptors.
pub trait ValueType {
    const TYPE: FieldType;
    const BYTES: u8;
    const SIGNED: bool;
}

macro_rules! impl_value_type_int {
    ($($t:ty),* $(,)?) => {$(
        impl ValueType for $t {
            const TYPE: FieldType = FieldType::Int;
            const BYTES: u8 = std::mem::size_of::<$t>() as u8;
            const SIGNED: bool = <$t>::MIN != 0;
        }
    )*};
}

impl_value_type_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl ValueType for f32 {
    const TYPE: FieldType = FieldType::Float;
    const BYTES: u8 = 4;
    const SIGNED: bool = false;
}

/// A column descriptor: type, element width, element count, annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub field_type: FieldType,
    /// Element size in bytes.
    pub bytes: u8,
    /// Number of elements (arrays have size > 1).
    pub size: u8,
    pub annotation: Annotation,
}

impl Field {
    pub const fn integer(bytes: u8, annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::Int,
            bytes,
            size: 1,
            annotation,
        }
    }

    pub const fn integer_array(total_bytes: u16, count: u8, annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::Int,
            bytes: (total_bytes / count as u16) as u8,
            size: count,
            annotation,
        }
    }

    pub const fn float32(annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::Float,
            bytes: 4,
            size: 1,
            annotation,
        }
    }

    pub const fn float32_array(count: u8, annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::Float,
            bytes: 4,
            size: count,
            annotation,
        }
    }

    pub const fn string(count: u8, annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::String,
            bytes: STRING_SLOT_BYTES,
            size: count,
            annotation,
        }
    }

    pub const fn lang_string(count: u8, annotation: Annotation) -> Self {
        Self {
            field_type: FieldType::LangString,
            bytes: STRING_SLOT_BYTES,
            size: count,
            annotation,
        }
    }

    /// A scalar field described by a native type, e.g.
    /// `Field::value::<u32>(Annotation::new().id())`.
    ///
    /// Integer types force the `is_signed` flag from the native type.
    pub const fn value<T: ValueType>(annotation: Annotation) -> Self {
        let annotation = match T::TYPE {
            FieldType::Int => annotation.signed(T::SIGNED),
            _ => annotation,
        };
        Self {
            field_type: T::TYPE,
            bytes: T::BYTES,
            size: 1,
            annotation,
        }
    }

    /// An array field described by a native element type and count.
    pub const fn value_array<T: ValueType, const N: usize>(annotation: Annotation) -> Self {
        let annotation = match T::TYPE {
            FieldType::Int => annotation.signed(T::SIGNED),
            _ => annotation,
        };
        Self {
            field_type: T::TYPE,
            bytes: T::BYTES,
            size: N as u8,
            annotation,
        }
    }

    pub const fn is_array(&self) -> bool {
        self.size > 1
    }

    /// Total bytes the field occupies inline (element width times count).
    pub const fn total_bytes(&self) -> u16 {
        self.bytes as u16 * self.size as u16
    }
}

/// An ordered sequence of fields describing a record shape.
pub trait Schema {
    fn fields(&self) -> &[Field];

    /// Total number of elements across all fields.
    fn element_count(&self) -> usize {
        self.fields().iter().map(|f| f.size as usize).sum()
    }
}

impl<S: Schema + ?Sized> Schema for &S {
    fn fields(&self) -> &[Field] {
        (**self).fields()
    }

    fn element_count(&self) -> usize {
        (**self).element_count()
    }
}

/// A const-constructible schema backed by a static field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSchema {
    fields: &'static [Field],
}

impl FixedSchema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }
}

impl Schema for FixedSchema {
    fn fields(&self) -> &[Field] {
        self.fields
    }
}

/// A schema built at runtime, with one name per field.
///
/// Per-field offsets into a record's value vector are precomputed as the
/// prefix sum of element counts.
#[derive(Debug, Clone)]
pub struct RuntimeSchema {
    fields: Vec<Field>,
    names: Vec<String>,
    field_offsets: Vec<u32>,
    element_count: usize,
}

impl RuntimeSchema {
    pub fn new(fields: Vec<Field>, names: Vec<String>) -> Result<Self> {
        if fields.len() != names.len() {
            return Err(Error::SchemaMismatch("field and name counts differ"));
        }

        let mut field_offsets = Vec::with_capacity(fields.len());
        let mut element_count = 0usize;
        for field in &fields {
            field_offsets.push(element_count as u32);
            element_count += field.size as usize;
        }

        Ok(Self {
            fields,
            names,
            field_offsets,
            element_count,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Offset of a field's first element within a record's value vector.
    pub fn field_offset(&self, field_index: usize) -> usize {
        self.field_offsets[field_index] as usize
    }

    /// View a runtime record through this schema.
    pub fn accessor<'a>(&'a self, record: &'a RuntimeRecord) -> RecordAccessor<'a> {
        RecordAccessor {
            schema: self,
            record,
        }
    }
}

impl Schema for RuntimeSchema {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn element_count(&self) -> usize {
        self.element_count
    }
}

impl PartialEq for RuntimeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.names == other.names
    }
}

impl Eq for RuntimeSchema {}

impl PartialEq<FixedSchema> for RuntimeSchema {
    fn eq(&self, other: &FixedSchema) -> bool {
        self.fields == other.fields()
    }
}

impl PartialEq<RuntimeSchema> for FixedSchema {
    fn eq(&self, other: &RuntimeSchema) -> bool {
        self.fields() == other.fields.as_slice()
    }
}

/// A named view over one field of a record.
pub struct FieldValues<'a> {
    pub name: &'a str,
    pub field: &'a Field,
    pub values: &'a [RuntimeValue],
}

/// Name-based access to a runtime record's values.
pub struct RecordAccessor<'a> {
    schema: &'a RuntimeSchema,
    record: &'a RuntimeRecord,
}

impl<'a> RecordAccessor<'a> {
    fn name_index(&self, name: &str) -> Result<usize> {
        self.schema
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    fn values_at(&self, index: usize) -> Result<&'a [RuntimeValue]> {
        let field = &self.schema.fields[index];
        let offset = self.schema.field_offsets[index] as usize;
        self.record
            .data
            .get(offset..offset + field.size as usize)
            .ok_or(Error::CorruptIndex("record data is shorter than the schema"))
    }

    /// All elements of the named field.
    pub fn values(&self, name: &str) -> Result<&'a [RuntimeValue]> {
        self.values_at(self.name_index(name)?)
    }

    /// Project the named scalar field into `T`, range-checked.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self.name_index(name)?;
        let field = &self.schema.fields[index];
        let values = self.values_at(index)?;
        T::from_value(&values[0], field.annotation.is_signed, name)
    }

    /// Project the named array field into `[T; N]`.
    ///
    /// Reads at most `N` elements; excess destination slots are
    /// default-initialised.
    pub fn get_array<T: FromValue + Default + Copy, const N: usize>(
        &self,
        name: &str,
    ) -> Result<[T; N]> {
        let index = self.name_index(name)?;
        let field = &self.schema.fields[index];
        let values = self.values_at(index)?;

        let mut result = [T::default(); N];
        for (slot, value) in result.iter_mut().zip(values.iter()) {
            *slot = T::from_value(value, field.annotation.is_signed, name)?;
        }
        Ok(result)
    }

    /// Borrow the named string field's first element.
    pub fn get_str(&self, name: &str) -> Result<&'a str> {
        let index = self.name_index(name)?;
        let values = self.values_at(index)?;
        values[0]
            .as_str()
            .ok_or_else(|| Error::FieldTypeMismatch(name.to_string()))
    }

    /// Iterate all fields with their names and value slices.
    pub fn iter(&self) -> impl Iterator<Item = FieldValues<'a>> + '_ {
        (0..self.schema.fields.len()).filter_map(move |i| {
            Some(FieldValues {
                name: &self.schema.names[i],
                field: &self.schema.fields[i],
                values: self.values_at(i).ok()?,
            })
        })
    }
}
