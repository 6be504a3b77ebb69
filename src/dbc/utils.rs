//! WDBC reporting and export helpers
//!
//! This module contains the functions behind the command line tool.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{FieldType, OpenOptions, Schema, TableReader, TableWriter, Value};

/// Build open options from command line flags
pub fn build_options(schema: Option<&str>, detect: bool, preload: bool) -> Result<OpenOptions> {
    let mut options = OpenOptions::default()
        .with_detect_types(detect)
        .with_preload_strings(preload);
    if let Some(text) = schema {
        let schema = Schema::parse(text, &options.registry)
            .with_context(|| format!("Invalid schema: {}", text))?;
        options = options.with_schema(schema);
    }
    Ok(options)
}

/// Display table information
pub fn show_table_info(reader: &TableReader) {
    let info = reader.file_info();
    println!("\nWDBC Info:");
    if let Some(path) = &info.path {
        println!("  File: {}", path.display());
    }
    println!("  Size: {} bytes", info.file_size);
    println!("  Records: {}", info.record_count);
    println!("  Fields: {}", info.field_count);
    println!("  Record size: {} bytes", info.record_size);
    println!("  String block: {} bytes", info.string_block_size);
    if info.trailing_bytes > 0 {
        println!("  Trailing data: {} bytes", info.trailing_bytes);
    }
    println!("\nSchema:");
    for (i, field) in info.fields.iter().enumerate() {
        println!(
            "  {:>3}. {:<16} {:<8} @ {}",
            i, field.name, field.field_type, field.offset
        );
    }
}

/// Print a range of records, one line each
pub fn print_records(reader: &TableReader, start: usize, count: usize) -> Result<()> {
    for lazy in reader.records_batch_lazy(start, count) {
        let record = lazy
            .get()
            .with_context(|| format!("Failed to decode record {}", lazy.index()))?;
        let fields: Vec<String> = record
            .fields()
            .iter()
            .map(|f| format!("{}={}", f.name, f.value))
            .collect();
        println!("[{}] {}", record.index(), fields.join(" "));
    }
    Ok(())
}

/// Run the diagnostic sweep and report every failing record
///
/// Returns the number of failures.
pub fn validate_table(reader: &TableReader) -> usize {
    let failures = reader.validate_all();
    if failures.is_empty() {
        println!("All {} records OK", reader.record_count());
    } else {
        for (index, error) in &failures {
            eprintln!("Record {}: {}", index, error);
        }
        println!(
            "{} of {} records failed",
            failures.len(),
            reader.record_count()
        );
    }
    failures.len()
}

/// Print records whose `field` equals `text`
pub fn search_records(reader: &TableReader, field: &str, text: &str) -> Result<usize> {
    let Some(spec) = reader.schema().iter().find(|f| f.name == field) else {
        bail!("Unknown field: {}", field);
    };
    let needle = Value::parse(spec.field_type, text)?;

    let matches = reader.find_all(|r| r.get(field) == Some(&needle))?;
    for record in &matches {
        println!("{}", serde_json::to_string(record)?);
    }
    println!("{} match(es)", matches.len());
    Ok(matches.len())
}

/// Set one field and save the table
pub fn set_field(
    path: &Path,
    options: OpenOptions,
    index: usize,
    field: &str,
    text: &str,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let mut writer = TableWriter::open(path, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let field_type: FieldType = match writer.schema().iter().find(|f| f.name == field) {
        Some(spec) => spec.field_type,
        None => bail!("Unknown field: {}", field),
    };
    let value = Value::parse(field_type, text)?;
    writer.update_field(index, field, value)?;

    let saved = writer.save(output)?;
    println!("Saved {}", saved.display());
    Ok(saved)
}

/// Export every record to a JSON array
///
/// Without `output`, the file is written next to the source with a `.json`
/// extension.
pub fn export_json(reader: &TableReader, source: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let output_path = output.map(PathBuf::from).unwrap_or_else(|| {
        let mut p = source.to_path_buf();
        p.set_extension("json");
        p
    });

    let file = File::create(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut out = BufWriter::new(file);

    let pb = ProgressBar::new(reader.record_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    writeln!(out, "[")?;
    let mut written = 0u64;
    let mut failed = 0u64;
    for (i, record) in reader.records().enumerate() {
        pb.inc(1);
        match record {
            Ok(record) => {
                if written > 0 {
                    writeln!(out, ",")?;
                }
                write!(out, "  {}", serde_json::to_string(&record)?)?;
                written += 1;
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("Warning: Failed to convert record {}: {}", i, e));
            }
        }
    }
    writeln!(out, "\n]")?;
    out.flush()?;

    pb.finish_with_message("Done");
    println!(
        "Exported {} records to {}",
        written,
        output_path.display()
    );
    if failed > 0 {
        println!("  Failed: {}", failed);
    }

    Ok(output_path)
}
