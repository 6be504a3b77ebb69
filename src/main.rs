//! wdbc - A tool for inspecting and editing WDBC client database tables
//!
//! Usage:
//!   wdbc info <file>                         - Show header and schema
//!   wdbc dump <file> [--start N] [--count N] - Print records
//!   wdbc validate <file>                     - Decode every record and report failures
//!   wdbc find <file> <field> <value>         - Print records where a field equals a value
//!   wdbc set <file> <index> <field> <value>  - Change one field and save
//!   wdbc export <file> [-o out.json]         - Export all records as JSON

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use wdbc::dbc::utils::{
    build_options, export_json, print_records, search_records, set_field, show_table_info,
    validate_table,
};
use wdbc::TableReader;

#[derive(Parser)]
#[command(name = "wdbc")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and edit WDBC client database tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// How to lay out record columns
#[derive(Args, Clone)]
struct SchemaArgs {
    /// Explicit schema, e.g. "id:uint32,name:string,scale:float32"
    #[arg(short, long)]
    schema: Option<String>,
    /// Guess column types from the data
    #[arg(short, long)]
    detect: bool,
    /// Decode the whole string block up front
    #[arg(long)]
    preload_strings: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header and schema information
    Info {
        /// Path to the .dbc file
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Print records
    Dump {
        /// Path to the .dbc file
        file: PathBuf,
        /// First record index
        #[arg(long, default_value = "0")]
        start: usize,
        /// Number of records to print
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Decode every record and report failures
    Validate {
        /// Path to the .dbc file
        file: PathBuf,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Print records where a field equals a value
    Find {
        /// Path to the .dbc file
        file: PathBuf,
        /// Field name
        field: String,
        /// Value to match
        value: String,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Change one field of one record and save
    Set {
        /// Path to the .dbc file
        file: PathBuf,
        /// Record index
        index: usize,
        /// Field name
        field: String,
        /// New value
        value: String,
        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Export all records as JSON
    Export {
        /// Path to the .dbc file
        file: PathBuf,
        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        schema: SchemaArgs,
    },
}

fn open_reader(file: &Path, args: &SchemaArgs) -> Result<TableReader> {
    let options = build_options(args.schema.as_deref(), args.detect, args.preload_strings)?;
    TableReader::open(file, options).with_context(|| format!("Failed to open {}", file.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { file, json, schema } => {
            let reader = open_reader(&file, &schema)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reader.file_info())?);
            } else {
                show_table_info(&reader);
            }
            reader.close();
        }
        Commands::Dump {
            file,
            start,
            count,
            schema,
        } => {
            let reader = open_reader(&file, &schema)?;
            print_records(&reader, start, count)?;
            reader.close();
        }
        Commands::Validate { file, schema } => {
            let reader = open_reader(&file, &schema)?;
            let failures = validate_table(&reader);
            reader.close();
            if failures > 0 {
                std::process::exit(1);
            }
        }
        Commands::Find {
            file,
            field,
            value,
            schema,
        } => {
            let reader = open_reader(&file, &schema)?;
            search_records(&reader, &field, &value)?;
            reader.close();
        }
        Commands::Set {
            file,
            index,
            field,
            value,
            output,
            schema,
        } => {
            let options =
                build_options(schema.schema.as_deref(), schema.detect, schema.preload_strings)?;
            set_field(&file, options, index, &field, &value, output.as_deref())?;
        }
        Commands::Export {
            file,
            output,
            schema,
        } => {
            let reader = open_reader(&file, &schema)?;
            export_json(&reader, &file, output.as_deref())?;
            reader.close();
        }
    }

    Ok(())
}
