//! # wdbc
//!
//! A Rust library for reading and rewriting WDBC client database tables.
//!
//! ## Overview
//!
//! WDBC files are fixed-layout binary tables: a small header, an array of
//! fixed-size records and a deduplicated string block. This library provides:
//!
//! - Bounds-checked little-endian cursors with exact float32 encoding
//! - Header parsing and validation
//! - Typed record decoding with explicit, uniform or detected schemas
//! - Heuristic column type detection over sampled records
//! - In-memory editing and byte-exact rebuilding with string interning
//!
//! ## Example - Reading
//!
//! ```rust,no_run
//! use wdbc::{FieldType, OpenOptions, Schema, TableReader};
//!
//! fn main() -> anyhow::Result<()> {
//!     let schema = Schema::sequential(&[
//!         ("id", FieldType::UInt32),
//!         ("name", FieldType::String),
//!     ]);
//!     let reader = TableReader::open("Spell.dbc", OpenOptions::default().with_schema(schema))?;
//!
//!     if let Some(record) = reader.find(|r| r.get("id").and_then(|v| v.as_u32()) == Some(133))? {
//!         println!("{:?}", record.get("name"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Example - Modifying
//!
//! ```rust,no_run
//! use wdbc::{OpenOptions, TableWriter};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut writer = TableWriter::open("Spell.dbc", OpenOptions::default())?;
//!     writer.update_field(0, "field_2", 7u32)?;
//!     let removed = writer.remove_record(1)?;
//!     writer.add_record(removed)?;
//!     writer.save(Some("Spell_modified.dbc".as_ref()))?;
//!     Ok(())
//! }
//! ```

pub mod dbc;
pub mod error;

pub use dbc::{
    FieldSpec, FieldType, OpenOptions, Record, RecordBuilder, Schema, StringPool, TableHeader,
    TableReader, TableWriter, TypeRegistry, Value,
};
pub use error::{Error, Result};
