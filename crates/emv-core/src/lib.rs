//! EMV Core - Merchant-presented QR payload encoding
//!
//! Building blocks for Argentina's interoperable QR scheme:
//! - TLV field encoding and decoding (`tlv`)
//! - CRC16-CCITT (CCITT-FALSE) checksums (`crc`)
//! - Payload assembly in EMV field order (`payload`)
//!
//! Everything is stateless and synchronous; a [`PayloadBuilder`] can be
//! shared freely across threads and every call is a pure function of its
//! inputs.

pub mod crc;
pub mod payload;
pub mod tlv;

pub use crc::{checksum_hex, crc16_ccitt, repair_payload, verify_payload, CrcError};
pub use payload::{
    AmountFormat, MerchantProfile, PayloadBuilder, PayloadError, SchemeConfig, Transaction,
    ACCOUNT_ID_LEN,
};
pub use tlv::{TlvError, TlvField, MAX_VALUE_LEN};
