//! Field packing for fixed-width and delimited lines
//!
//! Payer layouts are static tables of [`FieldSpec`] grouped into [`Segment`]s
//! (header, detail, trailer, response). This module turns a set of named
//! [`FieldValues`] into one line of a segment and slices inbound lines back into
//! fields.
//!
//! # Rules
//!
//! - A value wider than its field is an error, never truncated
//! - Fixed-width values must be ASCII (offsets are byte offsets)
//! - A fixed-width segment's fields must tile its line exactly
//! - Optional fields with no value are blank-filled, whatever their pad character
//! - Required fields must be present and non-empty

use crate::types::AccumulationError;
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::collections::HashMap;

/// Justification of a value within its fixed-width slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// Static descriptor of one field in a payer layout
///
/// For fixed-width segments `start` is the byte offset of the field; for
/// delimited segments it is the column index and `width` is the maximum length
/// of the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub start: usize,
    pub width: usize,
    pub justify: Justify,
    pub pad: char,
    pub required: bool,
}

impl FieldSpec {
    /// Left-justified, space-padded, optional
    pub const fn text(name: &'static str, start: usize, width: usize) -> Self {
        Self {
            name,
            start,
            width,
            justify: Justify::Left,
            pad: ' ',
            required: false,
        }
    }

    /// Right-justified, zero-padded, optional
    pub const fn numeric(name: &'static str, start: usize, width: usize) -> Self {
        Self {
            name,
            start,
            width,
            justify: Justify::Right,
            pad: '0',
            required: false,
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    /// Exclusive end offset
    pub const fn end(&self) -> usize {
        self.start + self.width
    }
}

/// How a payer's lines are delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    FixedWidth,
    Delimited(u8),
}

/// An ordered field table for one kind of line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub name: &'static str,
    /// Fixed line length; None for delimited segments
    pub line_length: Option<usize>,
    pub fields: &'static [FieldSpec],
}

impl Segment {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Check that offsets are contiguous from zero and, for fixed-width
    /// segments, that widths sum to the line length
    pub fn validate_layout(&self) -> Result<(), AccumulationError> {
        match self.line_length {
            Some(expected) => {
                let mut offset = 0;
                for spec in self.fields {
                    if spec.start != offset {
                        return Err(AccumulationError::segment_length(self.name, expected, offset));
                    }
                    offset = spec.end();
                }
                if offset != expected {
                    return Err(AccumulationError::segment_length(self.name, expected, offset));
                }
            }
            None => {
                for (column, spec) in self.fields.iter().enumerate() {
                    if spec.start != column {
                        return Err(AccumulationError::segment_length(
                            self.name,
                            self.fields.len(),
                            column,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Named values for one line, produced by a payer adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(HashMap<&'static str, String>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Pack one value into its fixed-width slot
///
/// # Errors
///
/// - `NonAsciiField` if the value contains non-ASCII characters
/// - `FieldOverflow` if the value is wider than the field
pub fn pack(value: &str, spec: &FieldSpec) -> Result<String, AccumulationError> {
    if !value.is_ascii() {
        return Err(AccumulationError::non_ascii(spec.name, value));
    }
    if value.len() > spec.width {
        return Err(AccumulationError::field_overflow(spec.name, spec.width, value));
    }

    let padding: String = std::iter::repeat(spec.pad)
        .take(spec.width - value.len())
        .collect();
    Ok(match spec.justify {
        Justify::Left => format!("{}{}", value, padding),
        Justify::Right => format!("{}{}", padding, value),
    })
}

/// Blank fill for an optional field with no value
pub fn blank(spec: &FieldSpec) -> String {
    " ".repeat(spec.width)
}

/// Slice one field out of a fixed-width line
///
/// Inbound lines whose trailing blanks were stripped in transit are tolerated:
/// the missing tail reads as empty.
pub fn unpack<'a>(line: &'a str, spec: &FieldSpec) -> Result<&'a str, AccumulationError> {
    let start = spec.start.min(line.len());
    let end = spec.end().min(line.len());
    line.get(start..end).ok_or_else(|| {
        AccumulationError::parse_error(format!(
            "field {} at {}..{} does not fall on character boundaries",
            spec.name,
            spec.start,
            spec.end()
        ))
    })
}

/// Pack a CSV cell, enforcing the field's maximum width
pub fn pack_csv_cell(value: &str, spec: &FieldSpec) -> Result<String, AccumulationError> {
    if value.chars().count() > spec.width {
        return Err(AccumulationError::field_overflow(spec.name, spec.width, value));
    }
    Ok(value.to_string())
}

/// Join cells into one delimited line (no terminator), quoting where necessary
pub fn pack_csv_line(cells: &[String], delimiter: u8) -> Result<String, AccumulationError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| AccumulationError::IoError {
            message: e.to_string(),
        })?;
    let mut line = String::from_utf8(bytes)
        .map_err(|e| AccumulationError::parse_error(e.to_string()))?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}

/// Split one delimited line into cells, honoring quotes
pub fn unpack_csv_line(line: &str, delimiter: u8) -> Result<Vec<String>, AccumulationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(String::from).collect()),
        None => Ok(Vec::new()),
    }
}

/// Encode one line of a segment from named values
///
/// # Errors
///
/// - `SegmentLength` if the segment's field table is inconsistent
/// - `MissingField` if a required field is absent or empty
/// - any packing error of an individual field
pub fn encode_segment(
    format: LineFormat,
    segment: &Segment,
    values: &FieldValues,
) -> Result<String, AccumulationError> {
    segment.validate_layout()?;

    let mut cells = Vec::with_capacity(segment.fields.len());
    for spec in segment.fields {
        let value = match values.get(spec.name) {
            Some(v) if !(spec.required && v.is_empty()) => Some(v),
            _ if spec.required => {
                return Err(AccumulationError::missing_field(segment.name, spec.name))
            }
            _ => None,
        };

        let cell = match (format, value) {
            (LineFormat::FixedWidth, Some(v)) => pack(v, spec)?,
            (LineFormat::FixedWidth, None) => blank(spec),
            (LineFormat::Delimited(_), Some(v)) => pack_csv_cell(v, spec)?,
            (LineFormat::Delimited(_), None) => String::new(),
        };
        cells.push(cell);
    }

    match format {
        LineFormat::FixedWidth => Ok(cells.concat()),
        LineFormat::Delimited(delimiter) => pack_csv_line(&cells, delimiter),
    }
}
