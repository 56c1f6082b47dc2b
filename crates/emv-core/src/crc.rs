//! CRC16-CCITT (CCITT-FALSE) checksum engine
//!
//! Polynomial 0x1021, initial register 0xFFFF, MSB-first, no reflection, no
//! final XOR. The checksum field protects the whole payload up to and
//! including its own "6304" opener; the four hex digits of the value itself
//! are excluded from the sum.

use thiserror::Error;

/// Tag + length opener of the checksum field (tag 63, fixed length 04).
pub const CRC_FIELD_OPENER: &str = "6304";

const POLYNOMIAL: u16 = 0x1021;

/// Checksum verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrcError {
    #[error("Invalid CRC: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("Missing checksum (tag 63)")]
    MissingChecksum,

    #[error("Payload too short to carry a checksum field")]
    Truncated,
}

/// Compute the CRC16-CCITT checksum of `data`.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Checksum of `data` formatted as 4 uppercase hex digits.
pub fn checksum_hex(data: &str) -> String {
    format!("{:04X}", crc16_ccitt(data.as_bytes()))
}

/// Verify the trailing checksum of a complete payload.
///
/// The payload must end with `6304` followed by 4 hex digits; the sum is
/// recomputed over everything before those digits. Lowercase hex in the
/// scanned payload is accepted.
pub fn verify_payload(raw: &str) -> Result<(), CrcError> {
    if raw.len() < 8 {
        return Err(CrcError::Truncated);
    }
    let body = raw.get(..raw.len() - 4).ok_or(CrcError::MissingChecksum)?;
    if !body.ends_with(CRC_FIELD_OPENER) {
        return Err(CrcError::MissingChecksum);
    }
    let provided = &raw[raw.len() - 4..];
    let expected = checksum_hex(body);
    if !provided.eq_ignore_ascii_case(&expected) {
        return Err(CrcError::Mismatch {
            expected,
            actual: provided.to_string(),
        });
    }
    Ok(())
}

/// Recompute the checksum of an existing payload and replace a stale value.
///
/// Returns the payload unchanged when the trailing checksum already matches.
pub fn repair_payload(raw: &str) -> Result<String, CrcError> {
    if raw.len() < 8 {
        return Err(CrcError::Truncated);
    }
    let body = raw.get(..raw.len() - 4).ok_or(CrcError::MissingChecksum)?;
    if !body.ends_with(CRC_FIELD_OPENER) {
        return Err(CrcError::MissingChecksum);
    }
    let expected = checksum_hex(body);
    if raw[raw.len() - 4..].eq_ignore_ascii_case(&expected) {
        return Ok(raw.to_string());
    }
    log::warn!(
        "Replacing stale payload checksum {} with {}",
        &raw[raw.len() - 4..],
        expected
    );
    Ok(format!("{body}{expected}"))
}
