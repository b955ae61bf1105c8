//! Typed values and their little-endian wire encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bcd::{decode_float, encode_float, FLOAT_LEN};
use crate::error::CodecError;

/// Maximum number of data bytes in a length-prefixed string.
pub const MAX_STRING_LEN: usize = 255;

/// Semantic type of a target variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    /// Unsigned 8-bit value.
    Byte,
    /// Unsigned 16-bit value, low byte first.
    Word,
    /// 6-byte packed BCD float.
    Float,
    /// Length-prefixed string in a 256-byte buffer.
    String,
}

impl VarType {
    /// Number of bytes one value of this type occupies in target memory.
    pub fn width(self) -> usize {
        match self {
            VarType::Byte => 1,
            VarType::Word => 2,
            VarType::Float => FLOAT_LEN,
            VarType::String => MAX_STRING_LEN + 1,
        }
    }

    /// Parse the type name the compiler writes into its listing.
    pub fn from_listing_name(name: &str) -> Option<Self> {
        match name {
            "Byte" => Some(VarType::Byte),
            "Word" => Some(VarType::Word),
            "Float" => Some(VarType::Float),
            "String" => Some(VarType::String),
            _ => None,
        }
    }

    /// Suffix the source language puts on names of this type.
    pub fn name_suffix(self) -> &'static str {
        match self {
            VarType::String => "$",
            VarType::Float => "%",
            VarType::Byte | VarType::Word => "",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VarType::Byte => "Byte",
            VarType::Word => "Word",
            VarType::Float => "Float",
            VarType::String => "String",
        };
        f.write_str(name)
    }
}

/// A decoded target value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Byte(u8),
    Word(u16),
    Float(f64),
    Str(String),
}

impl Value {
    /// The value a freshly declared variable of `ty` holds.
    pub fn default_for(ty: VarType) -> Self {
        match ty {
            VarType::Byte => Value::Byte(0),
            VarType::Word => Value::Word(0),
            VarType::Float => Value::Float(0.0),
            VarType::String => Value::Str(String::new()),
        }
    }

    /// The type this value encodes as.
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Byte(_) => VarType::Byte,
            Value::Word(_) => VarType::Word,
            Value::Float(_) => VarType::Float,
            Value::Str(_) => VarType::String,
        }
    }

    /// Parse user-entered text as a value of type `ty`.
    ///
    /// Numbers may be decimal, floating point or `$`-prefixed hex.
    /// Integers that do not fit are truncated to the slot width rather
    /// than rejected. Strings may be wrapped in single or double quotes.
    pub fn parse(ty: VarType, text: &str) -> Result<Self, CodecError> {
        let text = text.trim();
        let value = match ty {
            VarType::String => Value::Str(unquote(text).to_string()),
            VarType::Byte => Value::Byte(truncate_integer(parse_number(text)?, 0xFF) as u8),
            VarType::Word => Value::Word(truncate_integer(parse_number(text)?, 0xFFFF) as u16),
            VarType::Float => Value::Float(parse_number(text)?),
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Word(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

fn unquote(text: &str) -> &str {
    let quoted = text.len() >= 2
        && (text.starts_with('"') && text.ends_with('"')
            || text.starts_with('\'') && text.ends_with('\''));
    if quoted {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn parse_number(text: &str) -> Result<f64, CodecError> {
    let parsed = match text.strip_prefix('$') {
        Some(hex) => i64::from_str_radix(hex, 16).ok().map(|v| v as f64),
        None => text.parse::<f64>().ok().filter(|v| v.is_finite()),
    };
    parsed.ok_or_else(|| CodecError::InvalidNumber(text.to_string()))
}

/// Keep the low bits of an integer that overflows its slot.
fn truncate_integer(number: f64, mask: i64) -> i64 {
    let whole = number.trunc() as i64;
    if whole & !mask != 0 {
        tracing::debug!(number, "integer does not fit its slot, truncating");
    }
    whole & mask
}

/// Append a little-endian word.
pub fn put_word(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read one byte at `offset`.
pub fn read_byte(bytes: &[u8], offset: usize) -> Result<u8, CodecError> {
    bytes
        .get(offset)
        .copied()
        .ok_or_else(|| truncated(bytes, offset, 1))
}

/// Read a little-endian word at `offset`.
pub fn read_word(bytes: &[u8], offset: usize) -> Result<u16, CodecError> {
    let slice = take(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

/// Append a length-prefixed string and return the bytes written.
///
/// Text longer than [`MAX_STRING_LEN`] bytes is cut off.
pub fn encode_string(text: &str, out: &mut Vec<u8>) -> usize {
    let mut data = text.as_bytes();
    if data.len() > MAX_STRING_LEN {
        tracing::debug!(len = data.len(), "string longer than 255 bytes, truncating");
        data = &data[..MAX_STRING_LEN];
    }
    out.push(data.len() as u8);
    out.extend_from_slice(data);
    data.len() + 1
}

/// Decode a length-prefixed string starting at `offset`.
pub fn decode_string(bytes: &[u8], offset: usize) -> Result<String, CodecError> {
    let len = usize::from(read_byte(bytes, offset)?);
    let data = take(bytes, offset + 1, len)?;
    Ok(String::from_utf8_lossy(data).into_owned())
}

/// Append the wire form of `value` and return the bytes written.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) -> usize {
    match value {
        Value::Byte(v) => {
            out.push(*v);
            1
        }
        Value::Word(v) => {
            put_word(out, *v);
            2
        }
        Value::Float(v) => {
            out.extend_from_slice(&encode_float(*v));
            FLOAT_LEN
        }
        Value::Str(s) => encode_string(s, out),
    }
}

/// Decode a value of type `ty` starting at `offset`.
pub fn decode_value(ty: VarType, bytes: &[u8], offset: usize) -> Result<Value, CodecError> {
    let value = match ty {
        VarType::Byte => Value::Byte(read_byte(bytes, offset)?),
        VarType::Word => Value::Word(read_word(bytes, offset)?),
        VarType::Float => {
            let slice = take(bytes, offset, FLOAT_LEN)?;
            let mut raw = [0u8; FLOAT_LEN];
            raw.copy_from_slice(slice);
            Value::Float(decode_float(&raw))
        }
        VarType::String => Value::Str(decode_string(bytes, offset)?),
    };
    Ok(value)
}

/// Borrow `len` raw bytes at `offset`.
pub fn read_bytes(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    take(bytes, offset, len)
}

fn take(bytes: &[u8], offset: usize, needed: usize) -> Result<&[u8], CodecError> {
    bytes
        .get(offset..offset + needed)
        .ok_or_else(|| truncated(bytes, offset, needed))
}

fn truncated(bytes: &[u8], offset: usize, needed: usize) -> CodecError {
    CodecError::Truncated {
        offset,
        needed,
        len: bytes.len(),
    }
}
