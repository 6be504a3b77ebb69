//! String block access and interning
//!
//! Records reference text by `u32` byte offset into the trailing string
//! block. Offset 0 always points at the leading NUL and means "no string".

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::dbc::cursor::ByteReader;
use crate::dbc::header::TableHeader;
use crate::error::{Error, Result};

/// Anything that can turn a string block offset back into text
pub trait StringResolver {
    fn resolve(&self, offset: u32) -> Result<String>;
}

/// Borrowed view over the string block of a loaded file
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    header: &'a TableHeader,
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    pub fn new(header: &'a TableHeader, data: &'a [u8]) -> Self {
        Self { header, data }
    }
}

impl StringResolver for StringTable<'_> {
    fn resolve(&self, offset: u32) -> Result<String> {
        self.header.string_at(self.data, offset)
    }
}

/// Every string in a block, split once up front
///
/// Strings are kept as raw bytes and only converted to text on lookup, so
/// an offset into the middle of a string decodes exactly as a direct read
/// would.
#[derive(Debug, Clone, Default)]
pub struct PreloadedStrings {
    strings: BTreeMap<u32, Vec<u8>>,
    /// Start of a trailing run with no terminating NUL
    unterminated: Option<u32>,
    block_start: usize,
    block_size: u32,
}

impl PreloadedStrings {
    /// Walk the whole string block, keyed by each string's starting offset
    pub fn load(header: &TableHeader, data: &[u8]) -> Result<Self> {
        let block_start = header.string_block_start() as usize;
        let block_size = header.string_block_size as usize;
        let block = ByteReader::new(data).slice_at(block_start, block_size)?;
        let mut strings = BTreeMap::new();
        let mut unterminated = None;

        // Skip the leading NUL
        let mut pos = 1;
        while pos < block.len() {
            match block[pos..].iter().position(|&b| b == 0) {
                Some(len) => {
                    if len > 0 {
                        strings.insert(pos as u32, block[pos..pos + len].to_vec());
                    }
                    pos += len + 1;
                }
                None => {
                    warn!(offset = pos, "string block ends inside a string");
                    unterminated = Some(pos as u32);
                    break;
                }
            }
        }

        Ok(Self {
            strings,
            unterminated,
            block_start,
            block_size: header.string_block_size,
        })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl StringResolver for PreloadedStrings {
    fn resolve(&self, offset: u32) -> Result<String> {
        if offset == 0 || offset >= self.block_size {
            return Ok(String::new());
        }
        if self.unterminated.is_some_and(|tail| offset >= tail) {
            return Err(Error::UnterminatedString(self.block_start + offset as usize));
        }
        // Offsets may point into the tail of a longer string
        let Some((start, bytes)) = self.strings.range(..=offset).next_back() else {
            return Ok(String::new());
        };
        let tail = bytes.get((offset - start) as usize..).unwrap_or_default();
        Ok(String::from_utf8_lossy(tail).into_owned())
    }
}

/// Write-side string block builder with deduplication
#[derive(Debug, Clone)]
pub struct StringPool {
    offsets: HashMap<String, u32>,
    block: Vec<u8>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            offsets: HashMap::new(),
            block: vec![0],
        }
    }

    /// Return the offset of `value`, appending it on first sight
    ///
    /// The empty string always maps to offset 0 and never grows the block.
    pub fn intern(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(&offset) = self.offsets.get(value) {
            return offset;
        }

        let offset = self.block.len() as u32;
        self.block.extend_from_slice(value.as_bytes());
        self.block.push(0);
        self.offsets.insert(value.to_string(), offset);
        offset
    }

    /// Offset of an already-interned string
    pub fn offset_of(&self, value: &str) -> Option<u32> {
        if value.is_empty() {
            return Some(0);
        }
        self.offsets.get(value).copied()
    }

    /// Accumulated block bytes, leading NUL included
    pub fn block(&self) -> &[u8] {
        &self.block
    }

    /// Block size in bytes
    pub fn size(&self) -> usize {
        self.block.len()
    }

    /// Number of distinct non-empty strings
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Reset to a block holding only the leading NUL
    pub fn clear(&mut self) {
        self.offsets.clear();
        self.block.clear();
        self.block.push(0);
    }
}
