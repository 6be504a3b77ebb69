//! Record model
//!
//! A [`RecordBuilder`] collects typed columns and is the only place fields
//! can change. [`RecordBuilder::freeze`] turns it into an immutable
//! [`Record`]; editing a record means going back through
//! [`Record::to_builder`] and freezing a new one.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

use crate::dbc::types::{FieldType, Schema, Value};
use crate::error::{Error, Result};

/// One named, typed column value
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub value: Value,
}

/// Mutable record under construction
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    index: usize,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
}

impl RecordBuilder {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Builder with every schema column set to its zero value
    pub fn from_schema(index: usize, schema: &Schema) -> Self {
        let mut builder = Self::new(index);
        for spec in schema {
            builder.add_field(&spec.name, spec.field_type, spec.field_type.default_value());
        }
        builder
    }

    /// Append a column; a repeated name stays bound to its first slot
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        value: impl Into<Value>,
    ) -> &mut Self {
        let name = name.into();
        self.by_name
            .entry(name.clone())
            .or_insert(self.fields.len());
        self.fields.push(Field {
            name,
            field_type,
            value: value.into(),
        });
        self
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let slot = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        self.fields[slot].value = value.into();
        Ok(self)
    }

    pub fn set_field_by_index(
        &mut self,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        let len = self.fields.len();
        let field = self
            .fields
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        field.value = value.into();
        Ok(self)
    }

    pub fn set_index(&mut self, index: usize) -> &mut Self {
        self.index = index;
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finish construction; the result can no longer be mutated
    pub fn freeze(self) -> Record {
        Record {
            index: self.index,
            fields: self.fields,
            by_name: self.by_name,
        }
    }
}

/// Immutable row of typed field values
#[derive(Debug, Clone)]
pub struct Record {
    index: usize,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.fields == other.fields
    }
}

impl Record {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.by_name.get(name).map(|&slot| &self.fields[slot].value)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|f| &f.value)
    }

    /// Like [`Record::get`] but failing with `UnknownField`
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|f| &f.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Check every value against its declared type
    pub fn validate(&self) -> Result<()> {
        match self
            .fields
            .iter()
            .find(|f| !f.field_type.accepts(&f.value))
        {
            Some(field) => Err(Error::TypeMismatch(field.name.clone())),
            None => Ok(()),
        }
    }

    /// Copy back into a builder for editing
    pub fn to_builder(&self) -> RecordBuilder {
        RecordBuilder {
            index: self.index,
            fields: self.fields.clone(),
            by_name: self.by_name.clone(),
        }
    }

    /// Same fields under a different record index
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("_index", &self.index)?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut builder = RecordBuilder::new(3);
        builder
            .add_field("id", FieldType::UInt32, 7u32)
            .add_field("name", FieldType::String, "Sword")
            .add_field("scale", FieldType::Float32, 1.5f32);
        builder.freeze()
    }

    #[test]
    fn test_access_by_name_and_index() {
        let record = sample();
        assert_eq!(record.index(), 3);
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("name"), record.get_by_index(1));
        assert_eq!(record.get("id").and_then(Value::as_u32), Some(7));
        assert!(record.get("missing").is_none());
        assert!(matches!(record.value("missing"), Err(Error::UnknownField(_))));
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["id", "name", "scale"]);
    }

    #[test]
    fn test_builder_setters() {
        let mut builder = sample().to_builder();
        builder.set_field("name", "Shield").unwrap();
        builder.set_field_by_index(0, 8u32).unwrap();
        assert!(matches!(
            builder.set_field("nope", 1u32),
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(
            builder.set_field_by_index(9, 1u32),
            Err(Error::IndexOutOfRange { index: 9, len: 3 })
        ));
        let record = builder.freeze();
        assert_eq!(record.get("name"), Some(&Value::from("Shield")));
        assert_eq!(record.get_by_index(0), Some(&Value::UInt(8)));
    }

    #[test]
    fn test_edit_leaves_original_untouched() {
        let original = sample();
        let mut builder = original.to_builder();
        builder.set_field("id", 99u32).unwrap();
        let edited = builder.freeze();
        assert_eq!(original.get("id"), Some(&Value::UInt(7)));
        assert_eq!(edited.get("id"), Some(&Value::UInt(99)));
    }

    #[test]
    fn test_validate_reports_first_mismatch() {
        assert!(sample().validate().is_ok());

        let mut builder = sample().to_builder();
        builder.set_field("scale", "fast").unwrap();
        builder.set_field("id", -1i32).unwrap();
        let err = builder.freeze().validate().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(name) if name == "id"));
    }

    #[test]
    fn test_from_schema_defaults() {
        let schema = Schema::sequential(&[("a", FieldType::Int8), ("b", FieldType::Bool)]);
        let record = RecordBuilder::from_schema(0, &schema).freeze();
        assert_eq!(record.get("a"), Some(&Value::Int(0)));
        assert_eq!(record.get("b"), Some(&Value::Bool(false)));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_serialize_as_map() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"_index":3,"id":7,"name":"Sword","scale":1.5}"#);
    }
}
