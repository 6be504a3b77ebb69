//! WDBC table reader

use serde::Serialize;
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::dbc::cursor::ByteReader;
use crate::dbc::header::{TableHeader, HEADER_SIZE, MAGIC};
use crate::dbc::record::{Record, RecordBuilder};
use crate::dbc::registry::{TypeRegistry, MAX_SAMPLES};
use crate::dbc::strings::{PreloadedStrings, StringResolver, StringTable};
use crate::dbc::types::{FieldSpec, Schema};
use crate::error::{Error, Result};

/// Options for opening a table
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Explicit column layout; overrides detection
    pub schema: Option<Schema>,
    /// Decode the whole string block up front
    pub preload_strings: bool,
    /// Guess column types instead of assuming unsigned ints
    pub detect_types: bool,
    /// Records sampled per column when detecting (1-10)
    pub sample_records: usize,
    /// Types available to detection and schema parsing
    pub registry: TypeRegistry,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            schema: None,
            preload_strings: false,
            detect_types: false,
            sample_records: MAX_SAMPLES,
            registry: TypeRegistry::default(),
        }
    }
}

impl OpenOptions {
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_preload_strings(mut self, preload: bool) -> Self {
        self.preload_strings = preload;
        self
    }

    pub fn with_detect_types(mut self, detect: bool) -> Self {
        self.detect_types = detect;
        self
    }

    pub fn with_sample_records(mut self, samples: usize) -> Self {
        self.sample_records = samples;
        self
    }

    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Summary of an open table
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: Option<PathBuf>,
    pub file_size: usize,
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
    /// Bytes past the declared end of the string block
    pub trailing_bytes: usize,
    pub fields: Vec<FieldSpec>,
}

/// Read session over one WDBC file
pub struct TableReader {
    data: Vec<u8>,
    header: TableHeader,
    schema: Schema,
    registry: TypeRegistry,
    strings: Option<PreloadedStrings>,
    path: Option<PathBuf>,
}

impl TableReader {
    /// Check if data starts like a WDBC file
    pub fn is_wdbc(data: &[u8]) -> bool {
        data.len() >= HEADER_SIZE && data.starts_with(MAGIC)
    }

    /// Open a table from disk
    pub fn open<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let data = fs::read(path)?;
        let mut reader = Self::from_bytes(data, options)?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Open a table held in memory
    pub fn from_bytes(data: Vec<u8>, options: OpenOptions) -> Result<Self> {
        let header = TableHeader::parse(&data)?;
        debug!(
            records = header.record_count,
            fields = header.field_count,
            record_size = header.record_size,
            string_block = header.string_block_size,
            "parsed WDBC header"
        );

        let strings = if options.preload_strings {
            let preloaded = PreloadedStrings::load(&header, &data)?;
            debug!(count = preloaded.len(), "preloaded string block");
            Some(preloaded)
        } else {
            None
        };

        let schema = match options.schema {
            Some(schema) => {
                schema.check_fits(header.record_size as usize)?;
                schema
            }
            None if options.detect_types => detect_schema(
                &header,
                &data,
                &options.registry,
                options.sample_records,
                strings.as_ref(),
            ),
            None => Schema::uniform(header.field_count as usize, header.record_size as usize),
        };

        Ok(Self {
            data,
            header,
            schema,
            registry: options.registry,
            strings,
            path: None,
        })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn record_count(&self) -> usize {
        self.header.record_count as usize
    }

    pub fn field_count(&self) -> usize {
        self.header.field_count as usize
    }

    /// Replace the column layout used for decoding
    pub fn set_schema(&mut self, schema: Schema) -> Result<()> {
        schema.check_fits(self.header.record_size as usize)?;
        self.schema = schema;
        Ok(())
    }

    /// Decode, freeze and validate record `index`
    pub fn record(&self, index: usize) -> Result<Record> {
        let base = self.header.record_offset(index)?;
        let cursor = ByteReader::new(&self.data);
        let table = StringTable::new(&self.header, &self.data);
        let strings: &dyn StringResolver = match &self.strings {
            Some(preloaded) => preloaded,
            None => &table,
        };

        let mut builder = RecordBuilder::new(index);
        for spec in &self.schema {
            let value = spec
                .field_type
                .decode(&cursor, base + spec.offset, Some(strings))?;
            builder.add_field(&spec.name, spec.field_type, value);
        }

        let record = builder.freeze();
        record.validate()?;
        Ok(record)
    }

    /// Lazy pass over every record; call again to restart
    pub fn records(&self) -> Records<'_> {
        Records {
            reader: self,
            next: 0,
            end: self.record_count(),
        }
    }

    fn batch_range(&self, start: usize, count: usize) -> std::ops::Range<usize> {
        let start = start.min(self.record_count());
        let end = start.saturating_add(count).min(self.record_count());
        start..end
    }

    /// Decode up to `count` records starting at `start`
    pub fn records_batch(&self, start: usize, count: usize) -> Result<Vec<Record>> {
        self.batch_range(start, count)
            .map(|index| self.record(index))
            .collect()
    }

    /// Handles that decode on first access
    pub fn records_batch_lazy(&self, start: usize, count: usize) -> Vec<LazyRecord<'_>> {
        self.batch_range(start, count)
            .map(|index| LazyRecord {
                reader: self,
                index,
                cell: OnceCell::new(),
            })
            .collect()
    }

    /// First record matching `predicate`
    pub fn find<F>(&self, mut predicate: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record) -> bool,
    {
        for record in self.records() {
            let record = record?;
            if predicate(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Every record matching `predicate`
    pub fn find_all<F>(&self, mut predicate: F) -> Result<Vec<Record>>
    where
        F: FnMut(&Record) -> bool,
    {
        let mut matches = Vec::new();
        for record in self.records() {
            let record = record?;
            if predicate(&record) {
                matches.push(record);
            }
        }
        Ok(matches)
    }

    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            path: self.path.clone(),
            file_size: self.data.len(),
            record_count: self.header.record_count,
            field_count: self.header.field_count,
            record_size: self.header.record_size,
            string_block_size: self.header.string_block_size,
            trailing_bytes: self.data.len() - self.header.total_size() as usize,
            fields: self.schema.fields().to_vec(),
        }
    }

    /// Try every record and collect all failures
    pub fn validate_all(&self) -> Vec<(usize, Error)> {
        let mut failures = Vec::new();
        for index in 0..self.record_count() {
            if let Err(e) = self.record(index) {
                warn!(index, error = %e, "record failed validation");
                failures.push((index, e));
            }
        }
        failures
    }

    /// End the session and release the buffer
    pub fn close(self) {
        debug!(path = ?self.path, "closing table reader");
    }
}

/// Guess each column's type from the first few records
fn detect_schema(
    header: &TableHeader,
    data: &[u8],
    registry: &TypeRegistry,
    sample_records: usize,
    preloaded: Option<&PreloadedStrings>,
) -> Schema {
    let base = Schema::uniform(header.field_count as usize, header.record_size as usize);
    let samples = sample_records
        .clamp(1, MAX_SAMPLES)
        .min(header.record_count as usize);
    if samples == 0 {
        return base;
    }

    let cursor = ByteReader::new(data);
    let table = StringTable::new(header, data);
    let strings: &dyn StringResolver = match preloaded {
        Some(preloaded) => preloaded,
        None => &table,
    };

    let fields = base
        .iter()
        .map(|spec| {
            let offsets: Vec<usize> = (0..samples)
                .map(|r| HEADER_SIZE + r * header.record_size as usize + spec.offset)
                .collect();
            let field_type = registry
                .guess_column(&cursor, &offsets, spec.size(), Some(strings))
                .unwrap_or(spec.field_type);
            debug!(field = %spec.name, guessed = %field_type, "detected column type");
            FieldSpec::new(spec.name.clone(), field_type, spec.offset)
        })
        .collect();
    Schema::new(fields)
}

/// Iterator decoding one record per step
pub struct Records<'a> {
    reader: &'a TableReader,
    next: usize,
    end: usize,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.reader.record(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Records<'_> {}

/// A record decoded on first access and cached afterwards
pub struct LazyRecord<'a> {
    reader: &'a TableReader,
    index: usize,
    cell: OnceCell<Record>,
}

impl LazyRecord<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<&Record> {
        if let Some(record) = self.cell.get() {
            return Ok(record);
        }
        let record = self.reader.record(self.index)?;
        Ok(self.cell.get_or_init(|| record))
    }
}

/// Open a table from disk
pub fn open<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<TableReader> {
    TableReader::open(path, options)
}

/// Structural check of a file's header without building a session
pub fn validate<P: AsRef<Path>>(path: P) -> bool {
    match fs::read(path.as_ref()) {
        Ok(data) => TableHeader::parse(&data).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::cursor::ByteWriter;
    use crate::dbc::types::{FieldType, Value};

    /// Scenario table: two records of two u32 fields
    fn two_by_two() -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(b"WDBC").unwrap();
        for v in [2u32, 2, 8, 0, 1, 10, 2, 20] {
            writer.write_u32(v).unwrap();
        }
        writer.into_inner()
    }

    fn items_table() -> Vec<u8> {
        let mut writer = ByteWriter::new();
        let strings = b"\0Sword\0Shield\0";
        TableHeader {
            record_count: 3,
            field_count: 3,
            record_size: 12,
            string_block_size: strings.len() as u32,
        }
        .write(&mut writer)
        .unwrap();
        for (id, name, weight) in [(1u32, 1u32, 2.5f32), (2, 7, -1.0), (3, 1, 0.25)] {
            writer.write_u32(id).unwrap();
            writer.write_u32(name).unwrap();
            writer.write_f32(weight).unwrap();
        }
        writer.write_bytes(strings).unwrap();
        writer.into_inner()
    }

    fn items_schema() -> Schema {
        Schema::sequential(&[
            ("id", FieldType::UInt32),
            ("name", FieldType::String),
            ("weight", FieldType::Float32),
        ])
    }

    #[test]
    fn test_is_wdbc() {
        assert!(TableReader::is_wdbc(&two_by_two()));
        assert!(!TableReader::is_wdbc(b"WDBC"));
        assert!(!TableReader::is_wdbc(&[0u8; 32]));
    }

    #[test]
    fn test_default_schema_reads_uints() {
        let reader = TableReader::from_bytes(two_by_two(), OpenOptions::default()).unwrap();
        assert_eq!(reader.record_count(), 2);
        assert_eq!(reader.field_count(), 2);
        let values: Vec<_> = reader.record(1).unwrap().values().cloned().collect();
        assert_eq!(values, vec![Value::UInt(2), Value::UInt(20)]);
        assert!(matches!(
            reader.record(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_explicit_schema_with_strings() {
        let options = OpenOptions::default().with_schema(items_schema());
        let reader = TableReader::from_bytes(items_table(), options).unwrap();
        let second = reader.record(1).unwrap();
        assert_eq!(second.get("name"), Some(&Value::from("Shield")));
        assert_eq!(second.get("weight"), Some(&Value::Float(-1.0)));
    }

    #[test]
    fn test_preloaded_strings_match() {
        let plain = TableReader::from_bytes(
            items_table(),
            OpenOptions::default().with_schema(items_schema()),
        )
        .unwrap();
        let preloaded = TableReader::from_bytes(
            items_table(),
            OpenOptions::default()
                .with_schema(items_schema())
                .with_preload_strings(true),
        )
        .unwrap();
        for index in 0..3 {
            assert_eq!(plain.record(index).unwrap(), preloaded.record(index).unwrap());
        }
    }

    #[test]
    fn test_schema_must_fit_record() {
        let wide = Schema::sequential(&[
            ("a", FieldType::UInt32),
            ("b", FieldType::UInt32),
            ("c", FieldType::UInt32),
        ]);
        let options = OpenOptions::default().with_schema(wide.clone());
        let err = TableReader::from_bytes(two_by_two(), options);
        assert!(matches!(err, Err(Error::OutOfBounds(_))));

        let mut reader = TableReader::from_bytes(two_by_two(), OpenOptions::default()).unwrap();
        assert!(reader.set_schema(wide).is_err());
        assert_eq!(reader.schema().len(), 2);
    }

    #[test]
    fn test_detect_types() {
        let reader = TableReader::from_bytes(
            items_table(),
            OpenOptions::default().with_detect_types(true),
        )
        .unwrap();
        let types: Vec<_> = reader.schema().iter().map(|f| f.field_type).collect();
        // Ids and string offsets both look like small unsigned ints
        assert_eq!(types[0], FieldType::UInt32);
        assert_eq!(types.len(), 3);
        assert!(reader.validate_all().is_empty());
    }

    #[test]
    fn test_records_iterator_restarts() {
        let reader = TableReader::from_bytes(two_by_two(), OpenOptions::default()).unwrap();
        let first: Vec<_> = reader.records().map(|r| r.unwrap().index()).collect();
        let second: Vec<_> = reader.records().map(|r| r.unwrap().index()).collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(first, second);
        assert_eq!(reader.records().len(), 2);
    }

    #[test]
    fn test_batches() {
        let reader = TableReader::from_bytes(
            items_table(),
            OpenOptions::default().with_schema(items_schema()),
        )
        .unwrap();
        assert_eq!(reader.records_batch(1, 10).unwrap().len(), 2);
        assert!(reader.records_batch(5, 2).unwrap().is_empty());

        let lazy = reader.records_batch_lazy(0, 2);
        assert_eq!(lazy.len(), 2);
        assert!(!lazy[1].is_loaded());
        assert_eq!(lazy[1].get().unwrap().get("id"), Some(&Value::UInt(2)));
        assert!(lazy[1].is_loaded());
        assert!(!lazy[0].is_loaded());
    }

    #[test]
    fn test_find() {
        let reader = TableReader::from_bytes(
            items_table(),
            OpenOptions::default().with_schema(items_schema()),
        )
        .unwrap();
        let swords = reader
            .find_all(|r| r.get("name") == Some(&Value::from("Sword")))
            .unwrap();
        assert_eq!(swords.iter().map(Record::index).collect::<Vec<_>>(), vec![0, 2]);
        let heavy = reader
            .find(|r| r.get("weight").and_then(Value::as_f32).unwrap_or(0.0) > 1.0)
            .unwrap();
        assert_eq!(heavy.map(|r| r.index()), Some(0));
        assert!(reader.find(|_| false).unwrap().is_none());
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let mut data = items_table();
        // Point both remaining names at the unterminated tail
        let last = data.len() - 1;
        data[last] = b'!';
        for record in [0usize, 2] {
            let at = 20 + record * 12 + 4;
            data[at..at + 4].copy_from_slice(&7u32.to_le_bytes());
        }
        let reader =
            TableReader::from_bytes(data, OpenOptions::default().with_schema(items_schema()))
                .unwrap();
        let failures = reader.validate_all();
        assert_eq!(failures.len(), 3);
        assert!(failures
            .iter()
            .all(|(_, e)| matches!(e, Error::UnterminatedString(_))));
    }

    #[test]
    fn test_file_info() {
        let reader = TableReader::from_bytes(two_by_two(), OpenOptions::default()).unwrap();
        let info = reader.file_info();
        assert_eq!(info.file_size, 36);
        assert_eq!(info.trailing_bytes, 0);
        assert_eq!(info.fields.len(), 2);
        assert!(info.path.is_none());
    }
}
