//! Field type registry and column type detection

use crate::dbc::cursor::ByteReader;
use crate::dbc::strings::StringResolver;
use crate::dbc::types::FieldType;
use crate::error::{Error, Result};

/// Upper bound on positions sampled per guess
pub const MAX_SAMPLES: usize = 10;
/// Distance between positions sampled by [`TypeRegistry::guess`]
pub const SAMPLE_STRIDE: usize = 4;

/// Ordered set of field types available for lookup and detection
///
/// Registration order breaks ties: on equal scores the earlier type wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    types: Vec<FieldType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self {
            types: FieldType::ALL.to_vec(),
        }
    }
}

impl TypeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    pub fn register(&mut self, field_type: FieldType) -> &mut Self {
        if !self.types.contains(&field_type) {
            self.types.push(field_type);
        }
        self
    }

    pub fn types(&self) -> &[FieldType] {
        &self.types
    }

    /// Look up a registered type by tag
    pub fn create(&self, tag: &str) -> Result<FieldType> {
        let field_type: FieldType = tag.parse()?;
        if self.types.contains(&field_type) {
            Ok(field_type)
        } else {
            Err(Error::UnknownFieldType(tag.to_string()))
        }
    }

    /// Best type for the bytes at `start`, sampled every 4 bytes
    ///
    /// Falls back to `UInt32` when the registry is empty.
    pub fn guess(
        &self,
        cursor: &ByteReader<'_>,
        start: usize,
        strings: Option<&dyn StringResolver>,
        samples: usize,
    ) -> FieldType {
        let samples = samples.clamp(1, MAX_SAMPLES);
        let offsets: Vec<usize> = (0..samples).map(|i| start + i * SAMPLE_STRIDE).collect();
        self.best_of(self.types.iter().copied(), cursor, &offsets, strings)
            .unwrap_or(FieldType::UInt32)
    }

    /// Best type for one column, sampled at the given per-record offsets
    ///
    /// Only types exactly `width` bytes wide compete, so a guess never
    /// changes the record layout.
    pub fn guess_column(
        &self,
        cursor: &ByteReader<'_>,
        offsets: &[usize],
        width: usize,
        strings: Option<&dyn StringResolver>,
    ) -> Option<FieldType> {
        if offsets.is_empty() {
            return None;
        }
        let offsets = &offsets[..offsets.len().min(MAX_SAMPLES)];
        let candidates = self.types.iter().copied().filter(|t| t.size() == width);
        self.best_of(candidates, cursor, offsets, strings)
    }

    fn best_of(
        &self,
        candidates: impl Iterator<Item = FieldType>,
        cursor: &ByteReader<'_>,
        offsets: &[usize],
        strings: Option<&dyn StringResolver>,
    ) -> Option<FieldType> {
        let mut best: Option<(FieldType, f64)> = None;
        for field_type in candidates {
            let score = average_confidence(field_type, cursor, offsets, strings);
            // Strictly greater keeps the earlier type on ties
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((field_type, score));
            }
        }
        best.map(|(field_type, _)| field_type)
    }
}

/// Mean confidence over `offsets`; unreadable positions score zero
fn average_confidence(
    field_type: FieldType,
    cursor: &ByteReader<'_>,
    offsets: &[usize],
    strings: Option<&dyn StringResolver>,
) -> f64 {
    let total: f64 = offsets
        .iter()
        .map(|&offset| field_type.confidence(cursor, offset, strings).unwrap_or(0.0))
        .sum();
    total / offsets.len() as f64
}
