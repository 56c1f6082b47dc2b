//! Tag-Length-Value encoding for EMV merchant-presented QR payloads
//!
//! Every field is laid out as `tag (2 digits) + length (2 digits) + value`.
//! Template fields (merchant account information, additional data) reuse the
//! same layout inside their own value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest value length representable in the two-digit length prefix.
pub const MAX_VALUE_LEN: usize = 99;

/// TLV encoding/decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("Tag must be exactly 2 ASCII digits, got {0:?}")]
    InvalidTag(String),

    #[error("Value for tag {tag} is {len} bytes, limit is {MAX_VALUE_LEN}")]
    LengthOverflow { tag: String, len: usize },

    #[error("Malformed TLV data")]
    Malformed,
}

/// A single decoded field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlvField {
    pub tag: String,
    pub value: String,
}

fn check_tag(tag: &str) -> Result<(), TlvError> {
    if tag.len() == 2 && tag.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(TlvError::InvalidTag(tag.to_string()))
    }
}

/// Encode one field as `tag + zero-padded byte length + value`.
///
/// Length counts bytes, so a multi-byte UTF-8 merchant name consumes more of
/// the 99-byte limit than its character count suggests.
pub fn encode(tag: &str, value: &str) -> Result<String, TlvError> {
    check_tag(tag)?;
    let len = value.len();
    if len > MAX_VALUE_LEN {
        return Err(TlvError::LengthOverflow {
            tag: tag.to_string(),
            len,
        });
    }
    Ok(format!("{tag}{len:02}{value}"))
}

/// Encode a template field whose value is the concatenation of its encoded
/// subfields. Used for fields 26 and 62.
pub fn encode_nested(tag: &str, subfields: &[(&str, &str)]) -> Result<String, TlvError> {
    let mut value = String::new();
    for (sub_tag, sub_value) in subfields {
        value.push_str(&encode(sub_tag, sub_value)?);
    }
    encode(tag, &value)
}

/// Decode the leading field of `input`, returning it plus the unconsumed rest.
///
/// Inverse of [`encode`]; fails on truncated input, a non-numeric header, or
/// a length that does not land on a UTF-8 boundary.
pub fn decode(input: &str) -> Result<(TlvField, &str), TlvError> {
    let header = input.get(0..4).ok_or(TlvError::Malformed)?;
    if !header.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TlvError::Malformed);
    }
    let len: usize = header[2..4].parse().map_err(|_| TlvError::Malformed)?;
    let value = input.get(4..4 + len).ok_or(TlvError::Malformed)?;
    Ok((
        TlvField {
            tag: header[0..2].to_string(),
            value: value.to_string(),
        },
        &input[4 + len..],
    ))
}

/// Decode a whole string into consecutive fields.
pub fn decode_all(input: &str) -> Result<Vec<TlvField>, TlvError> {
    let mut fields = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (field, remaining) = decode(rest)?;
        fields.push(field);
        rest = remaining;
    }
    Ok(fields)
}
