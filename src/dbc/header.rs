//! WDBC file header parsing

use crate::dbc::cursor::{ByteReader, ByteWriter};
use crate::error::{Error, Result};

/// File magic
pub const MAGIC: &[u8; 4] = b"WDBC";
/// Header size in bytes; records start right after it
pub const HEADER_SIZE: usize = 20;

pub const MAX_FIELD_COUNT: u32 = 256;
pub const MIN_RECORD_SIZE: u32 = 4;
pub const MAX_RECORD_SIZE: u32 = 2048;

/// WDBC file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub record_count: u32,
    pub field_count: u32,
    /// Size of one record in bytes (multiple of 4)
    pub record_size: u32,
    pub string_block_size: u32,
}

impl TableHeader {
    /// Parse and validate a header against the full file contents
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TooSmall {
                actual: data.len(),
                required: HEADER_SIZE,
            });
        }

        let mut cursor = ByteReader::new(data);
        let magic = cursor.read_bytes(4)?;
        if magic != MAGIC {
            return Err(Error::MalformedHeader(format!(
                "bad magic {:?}, expected \"WDBC\"",
                String::from_utf8_lossy(&magic)
            )));
        }

        let header = TableHeader {
            record_count: cursor.read_u32()?,
            field_count: cursor.read_u32()?,
            record_size: cursor.read_u32()?,
            string_block_size: cursor.read_u32()?,
        };
        header.validate(data)?;
        Ok(header)
    }

    fn validate(&self, data: &[u8]) -> Result<()> {
        if self.field_count == 0 || self.field_count > MAX_FIELD_COUNT {
            return Err(Error::MalformedHeader(format!(
                "field count {} outside 1..={}",
                self.field_count, MAX_FIELD_COUNT
            )));
        }
        if self.record_size < MIN_RECORD_SIZE || self.record_size > MAX_RECORD_SIZE {
            return Err(Error::MalformedHeader(format!(
                "record size {} outside {}..={}",
                self.record_size, MIN_RECORD_SIZE, MAX_RECORD_SIZE
            )));
        }
        if self.record_size % 4 != 0 {
            return Err(Error::MalformedHeader(format!(
                "record size {} is not a multiple of 4",
                self.record_size
            )));
        }
        if self.total_size() > data.len() as u64 {
            return Err(Error::MalformedHeader(format!(
                "declared size {} exceeds data length {}",
                self.total_size(),
                data.len()
            )));
        }
        if self.string_block_size > 0 && data[self.string_block_start() as usize] != 0 {
            return Err(Error::MalformedHeader(
                "string block does not start with a NUL byte".into(),
            ));
        }
        Ok(())
    }

    pub fn records_start(&self) -> u64 {
        HEADER_SIZE as u64
    }

    pub fn records_size(&self) -> u64 {
        self.record_count as u64 * self.record_size as u64
    }

    pub fn string_block_start(&self) -> u64 {
        self.records_start() + self.records_size()
    }

    pub fn total_size(&self) -> u64 {
        self.string_block_start() + self.string_block_size as u64
    }

    /// Byte offset of record `index` within the file
    pub fn record_offset(&self, index: usize) -> Result<usize> {
        if index >= self.record_count as usize {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.record_count as usize,
            });
        }
        Ok(HEADER_SIZE + index * self.record_size as usize)
    }

    /// Resolve a string block offset; 0 and out-of-block offsets mean "no string"
    pub fn string_at(&self, data: &[u8], offset: u32) -> Result<String> {
        if offset == 0 || offset >= self.string_block_size {
            return Ok(String::new());
        }
        let end = self.total_size() as usize;
        let block = data.get(..end).ok_or_else(|| {
            Error::OutOfBounds(format!("string block ends at {} past data end", end))
        })?;
        ByteReader::new(block).read_cstring_at(self.string_block_start() as usize + offset as usize)
    }

    /// Write the 20-byte header
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_bytes(MAGIC)?;
        writer.write_u32(self.record_count)?;
        writer.write_u32(self.field_count)?;
        writer.write_u32(self.record_size)?;
        writer.write_u32(self.string_block_size)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(record_count: u32, field_count: u32, record_size: u32, strings: &[u8]) -> Vec<u8> {
        let header = TableHeader {
            record_count,
            field_count,
            record_size,
            string_block_size: strings.len() as u32,
        };
        let mut writer = ByteWriter::new();
        header.write(&mut writer).unwrap();
        writer
            .write_bytes(&vec![0u8; (record_count * record_size) as usize])
            .unwrap();
        writer.write_bytes(strings).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_parse_and_offsets() {
        let data = build(3, 2, 8, b"\0abc\0");
        let header = TableHeader::parse(&data).unwrap();
        assert_eq!(header.records_start(), 20);
        assert_eq!(header.records_size(), 24);
        assert_eq!(header.string_block_start(), 44);
        assert_eq!(header.total_size(), 49);
        assert_eq!(header.record_offset(0).unwrap(), 20);
        assert_eq!(header.record_offset(2).unwrap(), 36);
        assert!(matches!(
            header.record_offset(3),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_string_at() {
        let data = build(1, 1, 4, b"\0abc\0");
        let header = TableHeader::parse(&data).unwrap();
        assert_eq!(header.string_at(&data, 0).unwrap(), "");
        assert_eq!(header.string_at(&data, 1).unwrap(), "abc");
        assert_eq!(header.string_at(&data, 2).unwrap(), "bc");
        assert_eq!(header.string_at(&data, 5).unwrap(), "");
        assert_eq!(header.string_at(&data, 999).unwrap(), "");
    }

    #[test]
    fn test_string_at_unterminated() {
        let mut data = build(1, 1, 4, b"\0abc\0");
        let last = data.len() - 1;
        data[last] = b'd';
        let header = TableHeader::parse(&data).unwrap();
        assert!(matches!(
            header.string_at(&data, 1),
            Err(Error::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = build(1, 1, 4, b"");
        data[0] = b'X';
        assert!(matches!(
            TableHeader::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_rejects_short_data() {
        assert!(matches!(
            TableHeader::parse(b"WDBC"),
            Err(Error::TooSmall {
                actual: 4,
                required: 20
            })
        ));
    }

    #[test]
    fn test_rejects_missing_leading_nul() {
        let data = build(1, 1, 4, b"abc\0");
        assert!(matches!(
            TableHeader::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }
}
