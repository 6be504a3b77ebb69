//! WDBC binary table format
//!
//! WDBC is the fixed-layout table format used by game client databases.
//! Files with `.dbc` extension hold one table each.
//!
//! ## Format Overview
//!
//! A WDBC file consists of:
//! - 20-byte header: magic `WDBC`, record count, field count, record size,
//!   string block size (all little-endian `u32`)
//! - Records region: `record_count * record_size` bytes of fixed-size rows
//! - String block: NUL-terminated strings referenced by byte offset from
//!   string fields; offset 0 is the leading NUL and means "no string"
//!
//! Column layouts are often undocumented, so a table can be read with an
//! explicit [`Schema`], with uniform unsigned columns, or with column types
//! guessed from the data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wdbc::dbc::{open, open_for_edit, OpenOptions};
//!
//! let reader = open("Item.dbc", OpenOptions::default().with_detect_types(true))?;
//! for record in reader.records() {
//!     let record = record?;
//!     println!("{}: {:?}", record.index(), record.get_by_index(0));
//! }
//! reader.close();
//!
//! let mut writer = open_for_edit("Item.dbc", OpenOptions::default())?;
//! writer.update_field(0, "field_1", 42u32)?;
//! writer.save(None)?;
//! # Ok::<(), wdbc::Error>(())
//! ```

pub mod cursor;
pub mod float;
mod header;
mod reader;
mod record;
mod registry;
mod strings;
mod types;
pub mod utils;
mod writer;

pub use header::{
    TableHeader, HEADER_SIZE, MAGIC, MAX_FIELD_COUNT, MAX_RECORD_SIZE, MIN_RECORD_SIZE,
};
pub use reader::{open, validate, FileInfo, LazyRecord, OpenOptions, Records, TableReader};
pub use record::{Field, Record, RecordBuilder};
pub use registry::{TypeRegistry, MAX_SAMPLES, SAMPLE_STRIDE};
pub use strings::{PreloadedStrings, StringPool, StringResolver, StringTable};
pub use types::{FieldSpec, FieldType, Schema, Value};
pub use writer::{open_for_edit, Statistics, TableWriter};
