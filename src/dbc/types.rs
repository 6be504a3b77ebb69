//! Field types, values and schemas for WDBC records

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::dbc::cursor::{ByteReader, ByteWriter};
use crate::dbc::registry::TypeRegistry;
use crate::dbc::strings::{StringPool, StringResolver};
use crate::error::{Error, Result};

/// Storage type of a single record column
///
/// The set is closed by the file format; decoding and scoring dispatch on
/// the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    UInt8,
    UInt16,
    UInt32,
    Int8,
    Int16,
    Int32,
    Float32,
    Bool,
    /// `u32` offset into the string block
    String,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::UInt32,
        FieldType::Int32,
        FieldType::Float32,
        FieldType::String,
        FieldType::UInt16,
        FieldType::Int16,
        FieldType::UInt8,
        FieldType::Int8,
        FieldType::Bool,
    ];

    /// Encoded width in bytes
    pub fn size(&self) -> usize {
        match self {
            FieldType::UInt8 | FieldType::Int8 | FieldType::Bool => 1,
            FieldType::UInt16 | FieldType::Int16 => 2,
            FieldType::UInt32 | FieldType::Int32 | FieldType::Float32 | FieldType::String => 4,
        }
    }

    /// Tag used in textual schemas
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Float32 => "float32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
        }
    }

    /// Whether `value` is a legal runtime value for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::UInt8, Value::UInt(v)) => *v <= u8::MAX as u32,
            (FieldType::UInt16, Value::UInt(v)) => *v <= u16::MAX as u32,
            (FieldType::UInt32, Value::UInt(_)) => true,
            (FieldType::Int8, Value::Int(v)) => i8::try_from(*v).is_ok(),
            (FieldType::Int16, Value::Int(v)) => i16::try_from(*v).is_ok(),
            (FieldType::Int32, Value::Int(_)) => true,
            (FieldType::Float32, Value::Float(_)) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::String, Value::Str(_)) => true,
            _ => false,
        }
    }

    /// Zero value of this type
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 => Value::UInt(0),
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 => Value::Int(0),
            FieldType::Float32 => Value::Float(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::String => Value::Str(String::new()),
        }
    }

    /// Decode a value at `offset`
    pub fn decode(
        &self,
        cursor: &ByteReader<'_>,
        offset: usize,
        strings: Option<&dyn StringResolver>,
    ) -> Result<Value> {
        Ok(match self {
            FieldType::UInt8 => Value::UInt(cursor.read_u8_at(offset)? as u32),
            FieldType::UInt16 => Value::UInt(cursor.read_u16_at(offset)? as u32),
            FieldType::UInt32 => Value::UInt(cursor.read_u32_at(offset)?),
            FieldType::Int8 => Value::Int(cursor.read_i8_at(offset)? as i32),
            FieldType::Int16 => Value::Int(cursor.read_i16_at(offset)? as i32),
            FieldType::Int32 => Value::Int(cursor.read_i32_at(offset)?),
            FieldType::Float32 => Value::Float(cursor.read_f32_at(offset)?),
            FieldType::Bool => Value::Bool(cursor.read_u8_at(offset)? != 0),
            FieldType::String => {
                let raw = cursor.read_u32_at(offset)?;
                match strings {
                    Some(resolver) => Value::Str(resolver.resolve(raw)?),
                    None if raw == 0 => Value::Str(String::new()),
                    None => {
                        return Err(Error::OutOfBounds(format!(
                            "string offset {} with no string block",
                            raw
                        )))
                    }
                }
            }
        })
    }

    /// Write `value` at `offset`; strings go through the pool
    pub fn encode(
        &self,
        writer: &mut ByteWriter,
        offset: usize,
        name: &str,
        value: &Value,
        pool: &mut StringPool,
    ) -> Result<()> {
        if !self.accepts(value) {
            return Err(Error::TypeMismatch(name.to_string()));
        }
        match (self, value) {
            (FieldType::UInt8, Value::UInt(v)) => writer.write_u8_at(offset, *v as u8),
            (FieldType::UInt16, Value::UInt(v)) => writer.write_u16_at(offset, *v as u16),
            (FieldType::UInt32, Value::UInt(v)) => writer.write_u32_at(offset, *v),
            (FieldType::Int8, Value::Int(v)) => writer.write_u8_at(offset, *v as i8 as u8),
            (FieldType::Int16, Value::Int(v)) => writer.write_u16_at(offset, *v as i16 as u16),
            (FieldType::Int32, Value::Int(v)) => writer.write_i32_at(offset, *v),
            (FieldType::Float32, Value::Float(v)) => writer.write_f32_at(offset, *v),
            (FieldType::Bool, Value::Bool(v)) => writer.write_u8_at(offset, *v as u8),
            (FieldType::String, Value::Str(s)) => writer.write_u32_at(offset, pool.intern(s)),
            _ => Err(Error::TypeMismatch(name.to_string())),
        }
    }

    /// How plausible it is that the bytes at `offset` hold this type, in `[0, 1]`
    pub fn confidence(
        &self,
        cursor: &ByteReader<'_>,
        offset: usize,
        strings: Option<&dyn StringResolver>,
    ) -> Result<f64> {
        Ok(match self {
            FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 => {
                let v = match self.decode(cursor, offset, None)? {
                    Value::UInt(v) => v,
                    _ => return Ok(0.0),
                };
                if v < 0x8000_0000 {
                    0.8
                } else {
                    0.4
                }
            }
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 => {
                let v = match self.decode(cursor, offset, None)? {
                    Value::Int(v) => v,
                    _ => return Ok(0.0),
                };
                if v < 0 {
                    0.9
                } else if v < 65536 {
                    0.6
                } else {
                    0.3
                }
            }
            FieldType::Float32 => {
                let raw = cursor.read_u32_at(offset)?;
                let v = cursor.read_f32_at(offset)?;
                if v.is_nan() {
                    0.1
                } else if v.abs() > 1e-7 && v.abs() < 1e6 && raw > 1000 {
                    0.7
                } else if v == 0.0 {
                    0.5
                } else {
                    0.2
                }
            }
            FieldType::Bool => {
                if cursor.read_u8_at(offset)? <= 1 {
                    0.9
                } else {
                    0.1
                }
            }
            FieldType::String => {
                let Some(resolver) = strings else {
                    return Ok(0.1);
                };
                let raw = cursor.read_u32_at(offset)?;
                if raw == 0 {
                    return Ok(0.6);
                }
                match resolver.resolve(raw) {
                    Ok(s) if s.is_empty() => 0.2,
                    Ok(s) if s.chars().all(is_plain_text) => 0.8,
                    Ok(_) => 0.3,
                    Err(_) => 0.2,
                }
            }
        })
    }
}

fn is_plain_text(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation()
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => Ok(FieldType::UInt8),
            "uint16" | "u16" => Ok(FieldType::UInt16),
            "uint32" | "u32" | "uint" => Ok(FieldType::UInt32),
            "int8" | "i8" => Ok(FieldType::Int8),
            "int16" | "i16" => Ok(FieldType::Int16),
            "int32" | "i32" | "int" => Ok(FieldType::Int32),
            "float32" | "f32" | "float" => Ok(FieldType::Float32),
            "bool" | "boolean" => Ok(FieldType::Bool),
            "string" | "str" => Ok(FieldType::String),
            _ => Err(Error::UnknownFieldType(s.to_string())),
        }
    }
}

/// Runtime value of a record field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u32),
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Parse text as a value of `field_type`
    pub fn parse(field_type: FieldType, text: &str) -> Result<Self> {
        let invalid = || Error::InvalidValue {
            field_type: field_type.to_string(),
            value: text.to_string(),
        };
        let value = match field_type {
            FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 => {
                Value::UInt(text.trim().parse().map_err(|_| invalid())?)
            }
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 => {
                Value::Int(text.trim().parse().map_err(|_| invalid())?)
            }
            FieldType::Float32 => Value::Float(text.trim().parse().map_err(|_| invalid())?),
            FieldType::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Value::Bool(true),
                "0" | "false" | "no" => Value::Bool(false),
                _ => return Err(invalid()),
            },
            FieldType::String => Value::Str(text.to_string()),
        };
        if !field_type.accepts(&value) {
            return Err(invalid());
        }
        Ok(value)
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Layout of one column within a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    /// Byte offset within the record
    pub offset: usize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType, offset: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            offset,
        }
    }

    pub fn size(&self) -> usize {
        self.field_type.size()
    }

    /// First byte past this field
    pub fn end(&self) -> usize {
        self.offset + self.size()
    }
}

/// Ordered column layout of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Pack `(name, type)` pairs back to back from offset 0
    pub fn sequential<S: AsRef<str>>(columns: &[(S, FieldType)]) -> Self {
        let mut offset = 0;
        let fields = columns
            .iter()
            .map(|(name, field_type)| {
                let spec = FieldSpec::new(name.as_ref(), *field_type, offset);
                offset += field_type.size();
                spec
            })
            .collect();
        Self { fields }
    }

    /// Parse `name:type,name:type,...`; tags are looked up in `registry`
    pub fn parse(text: &str, registry: &TypeRegistry) -> Result<Self> {
        let mut columns = Vec::new();
        for (i, part) in text.split(',').map(str::trim).enumerate() {
            if part.is_empty() {
                continue;
            }
            let (name, tag) = match part.split_once(':') {
                Some((name, tag)) => (name.trim().to_string(), tag.trim()),
                None => (format!("field_{}", i), part),
            };
            columns.push((name, registry.create(tag)?));
        }
        Ok(Self::sequential(&columns))
    }

    /// Uniform-width unsigned columns covering a record
    pub fn uniform(field_count: usize, record_size: usize) -> Self {
        let field_count = field_count.max(1);
        let width = (record_size / field_count).max(1);
        let field_type = match width {
            1 => FieldType::UInt8,
            2 | 3 => FieldType::UInt16,
            _ => FieldType::UInt32,
        };
        let last = record_size.saturating_sub(field_type.size());
        let fields = (0..field_count)
            .map(|i| FieldSpec::new(format!("field_{}", i), field_type, (i * width).min(last)))
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Bytes spanned by the encoded fields
    pub fn encoded_width(&self) -> usize {
        self.fields.iter().map(FieldSpec::end).max().unwrap_or(0)
    }

    /// Check that every field lies inside a record of `record_size` bytes
    pub fn check_fits(&self, record_size: usize) -> Result<()> {
        match self.fields.iter().find(|f| f.end() > record_size) {
            Some(field) => Err(Error::OutOfBounds(format!(
                "field '{}' spans bytes {}..{} beyond record size {}",
                field.name,
                field.offset,
                field.end(),
                record_size
            ))),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldSpec;
    type IntoIter = std::slice::Iter<'a, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::header::TableHeader;
    use crate::dbc::strings::StringTable;

    #[test]
    fn test_sizes_and_names() {
        assert_eq!(FieldType::Bool.size(), 1);
        assert_eq!(FieldType::Int16.size(), 2);
        assert_eq!(FieldType::String.size(), 4);
        for ty in FieldType::ALL {
            assert_eq!(ty.name().parse::<FieldType>().unwrap(), ty);
        }
        assert!(matches!(
            "double".parse::<FieldType>(),
            Err(Error::UnknownFieldType(_))
        ));
    }

    #[test]
    fn test_decode_each_type() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00];
        let cursor = ByteReader::new(&data);
        assert_eq!(FieldType::UInt8.decode(&cursor, 0, None).unwrap(), Value::UInt(255));
        assert_eq!(FieldType::UInt16.decode(&cursor, 0, None).unwrap(), Value::UInt(65535));
        assert_eq!(FieldType::Int8.decode(&cursor, 0, None).unwrap(), Value::Int(-1));
        assert_eq!(FieldType::Int32.decode(&cursor, 0, None).unwrap(), Value::Int(-1));
        assert_eq!(FieldType::Bool.decode(&cursor, 4, None).unwrap(), Value::Bool(true));
        assert_eq!(FieldType::UInt32.decode(&cursor, 4, None).unwrap(), Value::UInt(1));
        assert!(matches!(
            FieldType::UInt32.decode(&cursor, 6, None),
            Err(Error::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_accepts_checks_width() {
        assert!(FieldType::UInt8.accepts(&Value::UInt(255)));
        assert!(!FieldType::UInt8.accepts(&Value::UInt(256)));
        assert!(FieldType::Int16.accepts(&Value::Int(-32768)));
        assert!(!FieldType::Int16.accepts(&Value::Int(40000)));
        assert!(!FieldType::UInt32.accepts(&Value::Int(1)));
        assert!(!FieldType::String.accepts(&Value::UInt(0)));
    }

    #[test]
    fn test_encode_rejects_mismatch() {
        let mut writer = ByteWriter::new();
        let mut pool = StringPool::new();
        let err = FieldType::Float32
            .encode(&mut writer, 0, "speed", &Value::UInt(3), &mut pool)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(name) if name == "speed"));
    }

    #[test]
    fn test_int_confidence() {
        let mut writer = ByteWriter::new();
        writer.write_i32(-5).unwrap();
        writer.write_u32(100).unwrap();
        writer.write_u32(70000).unwrap();
        let data = writer.into_inner();
        let cursor = ByteReader::new(&data);
        assert_eq!(FieldType::Int32.confidence(&cursor, 0, None).unwrap(), 0.9);
        assert_eq!(FieldType::Int32.confidence(&cursor, 4, None).unwrap(), 0.6);
        assert_eq!(FieldType::Int32.confidence(&cursor, 8, None).unwrap(), 0.3);
        assert_eq!(FieldType::UInt32.confidence(&cursor, 0, None).unwrap(), 0.4);
        assert_eq!(FieldType::UInt32.confidence(&cursor, 4, None).unwrap(), 0.8);
    }

    #[test]
    fn test_float_confidence() {
        let mut writer = ByteWriter::new();
        writer.write_f32(12.5).unwrap();
        writer.write_u32(0).unwrap();
        writer.write_u32(0x7FC0_0000).unwrap();
        writer.write_u32(7).unwrap();
        let data = writer.into_inner();
        let cursor = ByteReader::new(&data);
        assert_eq!(FieldType::Float32.confidence(&cursor, 0, None).unwrap(), 0.7);
        assert_eq!(FieldType::Float32.confidence(&cursor, 4, None).unwrap(), 0.5);
        assert_eq!(FieldType::Float32.confidence(&cursor, 8, None).unwrap(), 0.1);
        assert_eq!(FieldType::Float32.confidence(&cursor, 12, None).unwrap(), 0.2);
    }

    #[test]
    fn test_string_confidence_without_resolver() {
        let data = [5u8, 0, 0, 0];
        let cursor = ByteReader::new(&data);
        assert_eq!(FieldType::String.confidence(&cursor, 0, None).unwrap(), 0.1);
    }

    #[test]
    fn test_bool_confidence() {
        let data = [0u8, 1, 2, 255];
        let cursor = ByteReader::new(&data);
        assert_eq!(FieldType::Bool.confidence(&cursor, 0, None).unwrap(), 0.9);
        assert_eq!(FieldType::Bool.confidence(&cursor, 1, None).unwrap(), 0.9);
        assert_eq!(FieldType::Bool.confidence(&cursor, 2, None).unwrap(), 0.1);
        assert_eq!(FieldType::Bool.confidence(&cursor, 3, None).unwrap(), 0.1);
    }

    #[test]
    fn test_string_confidence_with_resolver() {
        let block = b"\0Sword\0\x01\x02\0";
        let header = TableHeader {
            record_count: 4,
            field_count: 1,
            record_size: 4,
            string_block_size: block.len() as u32,
        };
        let mut writer = ByteWriter::new();
        header.write(&mut writer).unwrap();
        // no string, plain text, control bytes, past the block
        for offset in [0u32, 1, 7, 99] {
            writer.write_u32(offset).unwrap();
        }
        writer.write_bytes(block).unwrap();
        let data = writer.into_inner();

        let cursor = ByteReader::new(&data);
        let table = StringTable::new(&header, &data);
        let score = |record: usize| {
            FieldType::String
                .confidence(&cursor, 20 + record * 4, Some(&table))
                .unwrap()
        };
        assert_eq!(score(0), 0.6);
        assert_eq!(score(1), 0.8);
        assert_eq!(score(2), 0.3);
        assert_eq!(score(3), 0.2);
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse(FieldType::UInt16, "42").unwrap(), Value::UInt(42));
        assert_eq!(Value::parse(FieldType::Int8, "-3").unwrap(), Value::Int(-3));
        assert_eq!(Value::parse(FieldType::Bool, "true").unwrap(), Value::Bool(true));
        assert_eq!(Value::parse(FieldType::String, " a ").unwrap(), Value::from(" a "));
        assert!(matches!(
            Value::parse(FieldType::UInt8, "300"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(Value::parse(FieldType::Float32, "abc").is_err());
    }

    #[test]
    fn test_schema_layouts() {
        let schema = Schema::sequential(&[
            ("id", FieldType::UInt32),
            ("flag", FieldType::Bool),
            ("level", FieldType::Int16),
        ]);
        let offsets: Vec<_> = schema.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 5]);
        assert_eq!(schema.encoded_width(), 7);
        assert_eq!(schema.index_of("level"), Some(2));
        assert!(schema.check_fits(8).is_ok());
        assert!(matches!(schema.check_fits(4), Err(Error::OutOfBounds(_))));

        let uniform = Schema::uniform(3, 12);
        assert_eq!(uniform.len(), 3);
        assert!(uniform.iter().all(|f| f.field_type == FieldType::UInt32));
        assert_eq!(uniform.field(2).unwrap().offset, 8);

        let crowded = Schema::uniform(8, 4);
        assert_eq!(crowded.len(), 8);
        assert!(crowded.check_fits(4).is_ok());
    }

    #[test]
    fn test_schema_parse() {
        let registry = TypeRegistry::default();
        let schema = Schema::parse("id:uint32, name:string,flags:u8", &registry).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.field(1).unwrap().field_type, FieldType::String);
        assert_eq!(schema.field(2).unwrap().offset, 8);
        assert!(matches!(
            Schema::parse("id:double", &registry),
            Err(Error::UnknownFieldType(_))
        ));
    }
}
