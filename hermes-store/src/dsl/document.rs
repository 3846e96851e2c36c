//! Stored documents and their binary encoding
//!
//! Binary document format (the field count lives in the chunk header):
//!   per field: vlong((field_number << 3) | type_tag), value
//!     0=Text:  vint len + utf8
//!     1=Bytes: vint len + raw
//!     2=U64:   u64 LE
//!     3=I64:   i64 LE
//!     4=F64:   f64 LE

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::Field;
use crate::directories::io::len_u32;
use crate::directories::{DataInput, DataOutput};
use crate::error::{Error, Result};

const TYPE_BITS: u32 = 3;
const TYPE_MASK: u64 = (1 << TYPE_BITS) - 1;

const TAG_TEXT: u64 = 0;
const TAG_BYTES: u64 = 1;
const TAG_U64: u64 = 2;
const TAG_I64: u64 = 3;
const TAG_F64: u64 = 4;

/// A stored field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "bytes")]
    Bytes(Vec<u8>),
    #[serde(rename = "u64")]
    U64(u64),
    #[serde(rename = "i64")]
    I64(i64),
    #[serde(rename = "f64")]
    F64(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// A document as stored: an ordered list of field values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    field_values: Vec<(Field, FieldValue)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field, value: FieldValue) {
        self.field_values.push((field, value));
    }

    pub fn add_text(&mut self, field: Field, value: impl Into<String>) {
        self.add(field, FieldValue::Text(value.into()));
    }

    pub fn add_bytes(&mut self, field: Field, value: Vec<u8>) {
        self.add(field, FieldValue::Bytes(value));
    }

    pub fn add_u64(&mut self, field: Field, value: u64) {
        self.add(field, FieldValue::U64(value));
    }

    pub fn add_i64(&mut self, field: Field, value: i64) {
        self.add(field, FieldValue::I64(value));
    }

    pub fn add_f64(&mut self, field: Field, value: f64) {
        self.add(field, FieldValue::F64(value));
    }

    pub fn get_first(&self, field: Field) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn get_all(&self, field: Field) -> impl Iterator<Item = &FieldValue> {
        self.field_values
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn field_values(&self) -> &[(Field, FieldValue)] {
        &self.field_values
    }

    pub fn num_fields(&self) -> usize {
        self.field_values.len()
    }
}

/// Append the binary form of `doc` to `buf`, returning the field count.
pub fn serialize_document(doc: &Document, buf: &mut Vec<u8>) -> io::Result<u32> {
    for (field, value) in doc.field_values() {
        let number = (field.0 as u64) << TYPE_BITS;
        match value {
            FieldValue::Text(s) => {
                buf.write_vlong(number | TAG_TEXT)?;
                buf.write_string(s)?;
            }
            FieldValue::Bytes(b) => {
                buf.write_vlong(number | TAG_BYTES)?;
                buf.write_vint(len_u32(b.len())?)?;
                buf.extend_from_slice(b);
            }
            FieldValue::U64(v) => {
                buf.write_vlong(number | TAG_U64)?;
                buf.write_u64::<LittleEndian>(*v)?;
            }
            FieldValue::I64(v) => {
                buf.write_vlong(number | TAG_I64)?;
                buf.write_i64::<LittleEndian>(*v)?;
            }
            FieldValue::F64(v) => {
                buf.write_vlong(number | TAG_F64)?;
                buf.write_f64::<LittleEndian>(*v)?;
            }
        }
    }
    len_u32(doc.num_fields())
}

/// Decode `num_fields` field values from `data`.
///
/// Trailing bytes or an unknown type tag mean the chunk is corrupt.
pub fn deserialize_document(data: &[u8], num_fields: u32) -> Result<Document> {
    let mut reader = data;
    let mut doc = Document::new();

    for _ in 0..num_fields {
        let info = reader.read_vlong()?;
        let number = info >> TYPE_BITS;
        let field = Field(
            u32::try_from(number)
                .map_err(|_| Error::corruption(format!("field number {} overflows", number)))?,
        );
        match info & TYPE_MASK {
            TAG_TEXT => doc.add_text(field, reader.read_string()?),
            TAG_BYTES => {
                let len = reader.read_vint()? as usize;
                doc.add_bytes(field, reader.read_vec(len)?);
            }
            TAG_U64 => doc.add_u64(field, reader.read_u64_le()?),
            TAG_I64 => doc.add_i64(field, reader.read_u64_le()? as i64),
            TAG_F64 => doc.add_f64(field, f64::from_bits(reader.read_u64_le()?)),
            tag => {
                return Err(Error::corruption(format!(
                    "unknown field type tag: {}",
                    tag
                )));
            }
        }
    }

    if !reader.is_empty() {
        return Err(Error::corruption(format!(
            "{} trailing bytes after document",
            reader.len()
        )));
    }
    Ok(doc)
}
