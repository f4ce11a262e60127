//! Bit-field cell identifier encoding.
//!
//! Format strings follow the LCIO convention: a comma separated list of
//! `name:width` or `name:offset:width` fields. A negative width declares a
//! signed field. Fields without an explicit offset start right after the
//! previous field.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::error::{Error, Result};

/// One named field of a cell identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIdField {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub signed: bool,
}

impl CellIdField {
    #[inline]
    fn mask(&self) -> u64 {
        if self.width == 64 {
            u64::MAX
        } else {
            ((1u64 << self.width) - 1) << self.offset
        }
    }

    fn range(&self) -> (i64, i64) {
        if self.signed && self.width == 64 {
            (i64::MIN, i64::MAX)
        } else if self.signed {
            let half = 1i64 << (self.width - 1);
            (-half, half - 1)
        } else if self.width == 64 {
            (0, i64::MAX)
        } else {
            (0, (1i64 << self.width) - 1)
        }
    }
}

/// Encoder/decoder for a cell-id layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIdEncoder {
    format: String,
    fields: Vec<CellIdField>,
    value: u64,
}

impl CellIdEncoder {
    /// Parses a format string.
    ///
    /// # Errors
    /// Returns [`Error::CellId`] for malformed entries, duplicated names,
    /// overlapping fields or a layout wider than 64 bits.
    pub fn parse(format: &str) -> Result<Self> {
        let mut fields: Vec<CellIdField> = Vec::new();
        let mut next_offset = 0u32;

        for entry in format.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let (name, offset, width) = match parts.as_slice() {
                [name, width] => (*name, next_offset, parse_width(entry, width)?),
                [name, offset, width] => {
                    let offset = offset.parse::<u32>().map_err(|_| {
                        Error::CellId(format!("invalid offset in field '{entry}'"))
                    })?;
                    (*name, offset, parse_width(entry, width)?)
                }
                _ => return Err(Error::CellId(format!("malformed field '{entry}'"))),
            };
            if name.is_empty() {
                return Err(Error::CellId(format!("unnamed field '{entry}'")));
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(Error::CellId(format!("duplicated field '{name}'")));
            }

            let signed = width < 0;
            let width = width.unsigned_abs();
            if width == 0 || offset.checked_add(width).is_none_or(|end| end > 64) {
                return Err(Error::CellId(format!(
                    "field '{name}' does not fit in 64 bits"
                )));
            }
            let field = CellIdField {
                name: name.to_string(),
                offset,
                width,
                signed,
            };
            if let Some(other) = fields.iter().find(|f| f.mask() & field.mask() != 0) {
                return Err(Error::CellId(format!(
                    "field '{name}' overlaps field '{}'",
                    other.name
                )));
            }
            next_offset = offset + width;
            fields.push(field);
        }

        if fields.is_empty() {
            return Err(Error::CellId(format!("no fields in '{format}'")));
        }

        Ok(Self {
            format: format.to_string(),
            fields,
            value: 0,
        })
    }

    /// The format string this encoder was built from.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parsed fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[CellIdField] {
        &self.fields
    }

    /// Whether the layout declares a field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    fn field(&self, name: &str) -> Option<&CellIdField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Clears the current value.
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Sets one field of the current value.
    ///
    /// # Errors
    /// Returns [`Error::CellId`] for an unknown field or a value outside the
    /// field range.
    pub fn set(&mut self, name: &str, value: i64) -> Result<()> {
        let field = self
            .field(name)
            .ok_or_else(|| Error::CellId(format!("unknown field '{name}'")))?;
        let (min, max) = field.range();
        if value < min || value > max {
            return Err(Error::CellId(format!(
                "value {value} out of range [{min}, {max}] for field '{name}'"
            )));
        }
        let mask = field.mask();
        let bits = ((value as u64) << field.offset) & mask;
        self.value = (self.value & !mask) | bits;
        Ok(())
    }

    /// The current encoded value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Lower 32 bits of the current value (`cellID0`).
    #[must_use]
    pub fn low_word(&self) -> u32 {
        (self.value & 0xFFFF_FFFF) as u32
    }

    /// Encodes a set of field values in one call. Fields not listed are zero.
    ///
    /// # Errors
    /// Same as [`CellIdEncoder::set`].
    pub fn encode(&mut self, values: &[(&str, i64)]) -> Result<u64> {
        self.reset();
        for &(name, value) in values {
            self.set(name, value)?;
        }
        Ok(self.value)
    }

    /// Extracts one field from an encoded identifier.
    #[must_use]
    pub fn decode(&self, cell_id: u64, name: &str) -> Option<i64> {
        let field = self.field(name)?;
        let raw = (cell_id & field.mask()) >> field.offset;
        if field.signed && field.width < 64 && raw & (1 << (field.width - 1)) != 0 {
            Some((raw | (u64::MAX << field.width)) as i64)
        } else {
            Some(raw as i64)
        }
    }
}

fn parse_width(entry: &str, width: &str) -> Result<i32> {
    width
        .parse::<i32>()
        .map_err(|_| Error::CellId(format!("invalid width in field '{entry}'")))
}
