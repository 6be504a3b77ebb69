//! WDBC table editing and serialization
//!
//! A [`TableWriter`] holds every record of a table in memory, keyed by
//! index. Saving rebuilds the whole file: the string pool is repopulated
//! from live records, then header, records and string block are assembled
//! into one buffer and written in a single call.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::dbc::cursor::ByteWriter;
use crate::dbc::header::{TableHeader, HEADER_SIZE};
use crate::dbc::reader::{OpenOptions, TableReader};
use crate::dbc::record::Record;
use crate::dbc::strings::StringPool;
use crate::dbc::types::{FieldType, Schema, Value};
use crate::error::{Error, Result};

/// Summary of a writer session
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub record_count: usize,
    pub field_count: u32,
    pub record_size: u32,
    /// Lowest and highest live index
    pub index_range: Option<(usize, usize)>,
    /// Unused indices below the highest live one
    pub gaps: usize,
    pub string_field_count: usize,
    pub distinct_strings: usize,
    pub dirty: bool,
}

/// Mutable session over a table's records
pub struct TableWriter {
    header: TableHeader,
    schema: Schema,
    records: BTreeMap<usize, Record>,
    pool: StringPool,
    path: Option<PathBuf>,
    dirty: bool,
}

impl TableWriter {
    /// Load every record of `reader`
    pub fn from_reader(reader: &TableReader) -> Result<Self> {
        let mut records = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            records.insert(record.index(), record);
        }
        debug!(records = records.len(), "loaded records for editing");

        Ok(Self {
            header: *reader.header(),
            schema: reader.schema().clone(),
            records,
            pool: StringPool::new(),
            path: reader.path().map(Path::to_path_buf),
            dirty: false,
        })
    }

    /// Open a file for editing
    pub fn open<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let reader = TableReader::open(path, options)?;
        let writer = Self::from_reader(&reader)?;
        reader.close();
        Ok(writer)
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Live indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.keys().copied()
    }

    pub fn record(&self, index: usize) -> Result<&Record> {
        self.records.get(&index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    /// Store `record` at `index`, replacing any existing one
    pub fn set_record(&mut self, index: usize, record: Record) {
        self.records.insert(index, record.with_index(index));
        self.dirty = true;
    }

    /// Append after the highest live index and return the new index
    pub fn add_record(&mut self, record: Record) -> Result<usize> {
        let index = match self.records.keys().next_back() {
            Some(&last) => last.checked_add(1).ok_or(Error::IndexOutOfRange {
                index: last,
                len: self.records.len(),
            })?,
            None => 0,
        };
        self.set_record(index, record);
        Ok(index)
    }

    /// Delete the record at `index`, leaving a gap
    pub fn remove_record(&mut self, index: usize) -> Result<Record> {
        let len = self.records.len();
        let record = self
            .records
            .remove(&index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        self.dirty = true;
        Ok(record)
    }

    /// Replace one field with a rebuilt record
    pub fn update_field(
        &mut self,
        index: usize,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let mut builder = self.record(index)?.to_builder();
        builder.set_field(name, value)?;
        let record = builder.freeze();
        record.validate()?;
        self.set_record(index, record);
        Ok(())
    }

    /// Replace every record matching `predicate` with `updater`'s result
    pub fn update_records<P, U>(&mut self, mut predicate: P, mut updater: U) -> Result<usize>
    where
        P: FnMut(&Record) -> bool,
        U: FnMut(&Record) -> Result<Record>,
    {
        let mut updated = Vec::new();
        for (&index, record) in &self.records {
            if predicate(record) {
                updated.push((index, updater(record)?));
            }
        }

        let count = updated.len();
        for (index, record) in updated {
            self.set_record(index, record);
        }
        Ok(count)
    }

    /// Assemble the full file image
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        // Strings first so the block size is known for the header; columns
        // are typed by the schema, same as the encoding pass below
        self.pool.clear();
        for record in self.records.values() {
            for (spec, value) in self.schema.iter().zip(record.values()) {
                if let (FieldType::String, Value::Str(s)) = (spec.field_type, value) {
                    self.pool.intern(s);
                }
            }
        }

        let header = TableHeader {
            record_count: self.records.len() as u32,
            field_count: self.header.field_count,
            record_size: self.header.record_size,
            string_block_size: self.pool.size() as u32,
        };
        let record_size = header.record_size as usize;
        self.schema.check_fits(record_size)?;

        let mut writer = ByteWriter::with_capacity(header.total_size() as usize);
        header.write(&mut writer)?;

        for (slot, (&index, record)) in self.records.iter().enumerate() {
            if record.len() != self.schema.len() {
                return Err(Error::FieldCountMismatch {
                    index,
                    expected: self.schema.len(),
                    actual: record.len(),
                });
            }
            let base = HEADER_SIZE + slot * record_size;
            for (spec, value) in self.schema.iter().zip(record.values()) {
                spec.field_type
                    .encode(&mut writer, base + spec.offset, &spec.name, value, &mut self.pool)?;
            }
            writer.pad_to(base + record_size);
        }

        writer.write_bytes(self.pool.block())?;
        Ok(writer.into_inner())
    }

    /// Write the table to `path`, or back to the file it was opened from
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path.or(self.path.as_deref()) {
            Some(target) => target.to_path_buf(),
            None => return Err(Error::NotFound("no output path for in-memory table".into())),
        };

        let bytes = self.to_bytes()?;
        fs::write(&target, &bytes)?;
        info!(
            path = %target.display(),
            records = self.records.len(),
            bytes = bytes.len(),
            "saved WDBC table"
        );

        self.header.record_count = self.records.len() as u32;
        self.header.string_block_size = self.pool.size() as u32;
        self.dirty = false;
        Ok(target)
    }

    pub fn statistics(&self) -> Statistics {
        let index_range = match (self.records.keys().next(), self.records.keys().next_back()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        };
        let gaps = index_range.map_or(0, |(_, last)| last + 1 - self.records.len());

        let mut strings = HashSet::new();
        for record in self.records.values() {
            for field in record.fields() {
                if let Value::Str(s) = &field.value {
                    if !s.is_empty() {
                        strings.insert(s.as_str());
                    }
                }
            }
        }

        Statistics {
            record_count: self.records.len(),
            field_count: self.header.field_count,
            record_size: self.header.record_size,
            index_range,
            gaps,
            string_field_count: self
                .schema
                .iter()
                .filter(|f| f.field_type == FieldType::String)
                .count(),
            distinct_strings: strings.len(),
            dirty: self.dirty,
        }
    }

    /// Check every record's field count against the schema
    pub fn validate(&self) -> Vec<(usize, Error)> {
        let expected = self.schema.len();
        let mut failures = Vec::new();
        for (&index, record) in &self.records {
            if record.len() != expected {
                warn!(index, expected, actual = record.len(), "field count mismatch");
                failures.push((
                    index,
                    Error::FieldCountMismatch {
                        index,
                        expected,
                        actual: record.len(),
                    },
                ));
            }
        }
        failures
    }

    /// End the session, discarding unsaved changes
    pub fn close(self) {
        if self.dirty {
            warn!(path = ?self.path, "closing writer with unsaved changes");
        }
    }
}

/// Open a file for editing
pub fn open_for_edit<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<TableWriter> {
    TableWriter::open(path, options)
}
