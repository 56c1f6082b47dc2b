//! Assembly of merchant-presented QR payloads
//!
//! Produces the ordered EMV top-level fields for Argentina's interoperable-QR
//! profile and terminates the payload with the CRC16 checksum field. The
//! terminal identifier lives in the merchant profile, so field 26 cannot pick
//! up per-transaction data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crc;
use crate::tlv::{self, TlvError};

// Top-level EMV field tags, in mandated order
const TAG_PAYLOAD_FORMAT: &str = "00";
const TAG_POI_METHOD: &str = "01";
const TAG_MERCHANT_ACCOUNT: &str = "26";
const TAG_MCC: &str = "52";
const TAG_CURRENCY: &str = "53";
const TAG_AMOUNT: &str = "54";
const TAG_COUNTRY: &str = "58";
const TAG_MERCHANT_NAME: &str = "59";
const TAG_MERCHANT_CITY: &str = "60";
const TAG_ADDITIONAL_DATA: &str = "62";

// Subfields of the Merchant Account Information template (26)
const SUB_NETWORK_ID: &str = "00";
const SUB_ACCOUNT: &str = "01";
const SUB_TERMINAL: &str = "02";

// Subfield of the Additional Data Field Template (62)
const SUB_REFERENCE: &str = "05";

/// Required length of a CBU/CVU settlement account identifier.
pub const ACCOUNT_ID_LEN: usize = 22;

/// Payload assembly errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("CBU/CVU must be {ACCOUNT_ID_LEN} numeric digits, got {0:?}")]
    InvalidAccount(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Transaction amount {0} is not encodable")]
    InvalidAmount(f64),

    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// Amount encoding policy for field 54.
///
/// The scheme's reference material encodes amounts as integer cents, while
/// EMV examples use a plain decimal string with two fraction digits. Both are
/// supported; pick whichever the acquirer profile expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountFormat {
    /// Amount times 100 rendered as an integer string ("15000" for 150.00).
    CentsInteger,
    /// Two-fraction-digit decimal string ("150.00").
    Decimal,
}

impl AmountFormat {
    pub fn render(&self, amount: f64) -> String {
        match self {
            AmountFormat::CentsInteger => ((amount * 100.0).round() as u64).to_string(),
            AmountFormat::Decimal => format!("{amount:.2}"),
        }
    }
}

/// Fixed scheme literals, configuration rather than hard-coded constants.
///
/// The default profile is the Argentina interoperable scheme: dynamic QR,
/// ARS currency, country AR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// Payload format indicator (field 00)
    pub payload_format: String,
    /// Point-of-initiation method (field 01); "12" marks a dynamic QR
    pub poi_method: String,
    /// Network/application identifier, subfield 00 of field 26
    pub network_id: String,
    /// Merchant category code (field 52)
    pub merchant_category_code: String,
    /// ISO 4217 numeric currency (field 53); "032" is ARS
    pub currency_code: String,
    /// ISO 3166 country code (field 58)
    pub country_code: String,
    /// Amount encoding policy for field 54
    pub amount_format: AmountFormat,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            payload_format: "01".to_string(),
            poi_method: "12".to_string(),
            network_id: "AR".to_string(),
            merchant_category_code: "5492".to_string(),
            currency_code: "032".to_string(),
            country_code: "AR".to_string(),
            amount_format: AmountFormat::CentsInteger,
        }
    }
}

/// Stable merchant and terminal identity.
///
/// `terminal_id` identifies the physical or logical point of sale and must be
/// the same for every transaction on that terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantProfile {
    /// CBU/CVU settlement account, exactly 22 digits
    pub account_id: String,
    /// Stable per-POS terminal identifier
    pub terminal_id: String,
    /// Merchant display name (field 59)
    pub merchant_name: String,
    /// Merchant city (field 60)
    pub merchant_city: String,
}

/// Per-transaction data supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction amount in currency units
    pub amount: f64,
    /// Per-transaction payment reference, carried only in field 62
    pub reference: String,
}

/// Assembles interoperable QR payloads for one merchant/terminal.
pub struct PayloadBuilder {
    scheme: SchemeConfig,
    profile: MerchantProfile,
}

impl PayloadBuilder {
    /// Builder with the default Argentina scheme literals.
    pub fn new(profile: MerchantProfile) -> Self {
        Self {
            scheme: SchemeConfig::default(),
            profile,
        }
    }

    /// Builder with custom scheme literals.
    pub fn with_scheme(profile: MerchantProfile, scheme: SchemeConfig) -> Self {
        Self { scheme, profile }
    }

    pub fn scheme(&self) -> &SchemeConfig {
        &self.scheme
    }

    pub fn profile(&self) -> &MerchantProfile {
        &self.profile
    }

    /// Assemble the complete payload for one transaction.
    ///
    /// Fields are emitted strictly in EMV order and the result is terminated
    /// by the checksum field. Validation failures abort before any payload is
    /// produced.
    pub fn assemble(&self, tx: &Transaction) -> Result<String, PayloadError> {
        self.validate(tx)?;

        let mut payload = String::new();
        payload.push_str(&tlv::encode(TAG_PAYLOAD_FORMAT, &self.scheme.payload_format)?);
        payload.push_str(&tlv::encode(TAG_POI_METHOD, &self.scheme.poi_method)?);
        payload.push_str(&self.merchant_account_field()?);
        payload.push_str(&tlv::encode(TAG_MCC, &self.scheme.merchant_category_code)?);
        payload.push_str(&tlv::encode(TAG_CURRENCY, &self.scheme.currency_code)?);
        payload.push_str(&tlv::encode(
            TAG_AMOUNT,
            &self.scheme.amount_format.render(tx.amount),
        )?);
        payload.push_str(&tlv::encode(TAG_COUNTRY, &self.scheme.country_code)?);
        payload.push_str(&tlv::encode(TAG_MERCHANT_NAME, &self.profile.merchant_name)?);
        payload.push_str(&tlv::encode(TAG_MERCHANT_CITY, &self.profile.merchant_city)?);
        payload.push_str(&tlv::encode_nested(
            TAG_ADDITIONAL_DATA,
            &[(SUB_REFERENCE, tx.reference.as_str())],
        )?);

        // The checksum covers everything up to and including its own opener
        payload.push_str(crc::CRC_FIELD_OPENER);
        let checksum = crc::checksum_hex(&payload);
        payload.push_str(&checksum);

        log::debug!(
            "Assembled payload for reference {:?}: {} chars, crc {}",
            tx.reference,
            payload.len(),
            checksum
        );
        Ok(payload)
    }

    /// Encode the Merchant Account Information template (field 26).
    ///
    /// Depends only on scheme and profile data, so a given terminal always
    /// produces the same bytes regardless of the transaction.
    pub fn merchant_account_field(&self) -> Result<String, PayloadError> {
        Ok(tlv::encode_nested(
            TAG_MERCHANT_ACCOUNT,
            &[
                (SUB_NETWORK_ID, self.scheme.network_id.as_str()),
                (SUB_ACCOUNT, self.profile.account_id.as_str()),
                (SUB_TERMINAL, self.profile.terminal_id.as_str()),
            ],
        )?)
    }

    fn validate(&self, tx: &Transaction) -> Result<(), PayloadError> {
        let account = &self.profile.account_id;
        if account.len() != ACCOUNT_ID_LEN || !account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PayloadError::InvalidAccount(account.clone()));
        }
        if self.profile.terminal_id.is_empty() {
            return Err(PayloadError::MissingField("terminal_id"));
        }
        if self.profile.merchant_name.is_empty() {
            return Err(PayloadError::MissingField("merchant_name"));
        }
        if self.profile.merchant_city.is_empty() {
            return Err(PayloadError::MissingField("merchant_city"));
        }
        if tx.reference.is_empty() {
            return Err(PayloadError::MissingField("reference"));
        }
        if !tx.amount.is_finite() || tx.amount < 0.0 {
            return Err(PayloadError::InvalidAmount(tx.amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::verify_payload;

    fn sample_profile() -> MerchantProfile {
        MerchantProfile {
            account_id: "0110343230034317537929".to_string(),
            terminal_id: "TERMINAL01".to_string(),
            merchant_name: "Toludev shop".to_string(),
            merchant_city: "Argentina".to_string(),
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            amount: 150.0,
            reference: "SALE-EC08FEBC".to_string(),
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let builder = PayloadBuilder::new(sample_profile());
        let payload = builder.assemble(&sample_tx()).unwrap();

        let field_26 = builder.merchant_account_field().unwrap();
        assert!(field_26.contains("TERMINAL01"));
        assert!(payload.contains(&field_26));

        // Reference must surface inside field 62, as subfield 05
        assert!(payload.contains("62170513SALE-EC08FEBC"));

        // Trailing checksum is consistent with the engine
        assert_eq!(verify_payload(&payload), Ok(()));
    }

    #[test]
    fn test_field_order() {
        let builder = PayloadBuilder::new(sample_profile());
        let payload = builder.assemble(&sample_tx()).unwrap();

        let fields = crate::tlv::decode_all(&payload).unwrap();
        let tags: Vec<&str> = fields.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(
            tags,
            ["00", "01", "26", "52", "53", "54", "58", "59", "60", "62", "63"]
        );
        assert_eq!(fields.last().unwrap().value.len(), 4);
    }

    #[test]
    fn test_terminal_stability() {
        let builder = PayloadBuilder::new(sample_profile());
        let a = builder
            .assemble(&Transaction {
                amount: 150.0,
                reference: "SALE-A".to_string(),
            })
            .unwrap();
        let b = builder
            .assemble(&Transaction {
                amount: 150.0,
                reference: "SALE-B-LONGER".to_string(),
            })
            .unwrap();

        let field_26 = builder.merchant_account_field().unwrap();
        assert!(a.contains(&field_26));
        assert!(b.contains(&field_26));
    }

    #[test]
    fn test_reference_isolation() {
        let builder = PayloadBuilder::new(sample_profile());
        let tx_a = Transaction {
            amount: 150.0,
            reference: "SALE-AAAA".to_string(),
        };
        let tx_b = Transaction {
            amount: 150.0,
            reference: "SALE-BBBB".to_string(),
        };
        let a = crate::tlv::decode_all(&builder.assemble(&tx_a).unwrap()).unwrap();
        let b = crate::tlv::decode_all(&builder.assemble(&tx_b).unwrap()).unwrap();

        assert_eq!(a.len(), b.len());
        for (fa, fb) in a.iter().zip(&b) {
            assert_eq!(fa.tag, fb.tag);
            if fa.tag == "62" || fa.tag == "63" {
                assert_ne!(fa.value, fb.value);
            } else {
                assert_eq!(fa.value, fb.value);
            }
        }
    }

    #[test]
    fn test_amount_policies() {
        assert_eq!(AmountFormat::CentsInteger.render(150.0), "15000");
        assert_eq!(AmountFormat::CentsInteger.render(4800.0), "480000");
        assert_eq!(AmountFormat::CentsInteger.render(0.1), "10");
        assert_eq!(AmountFormat::Decimal.render(150.0), "150.00");
        assert_eq!(AmountFormat::Decimal.render(0.1), "0.10");
    }

    #[test]
    fn test_decimal_amount_scheme() {
        let scheme = SchemeConfig {
            amount_format: AmountFormat::Decimal,
            ..SchemeConfig::default()
        };
        let builder = PayloadBuilder::with_scheme(sample_profile(), scheme);
        let payload = builder.assemble(&sample_tx()).unwrap();
        assert!(payload.contains("5406150.00"));
        assert_eq!(verify_payload(&payload), Ok(()));
    }

    #[test]
    fn test_rejects_bad_account() {
        let mut profile = sample_profile();
        profile.account_id = "12345".to_string();
        let err = PayloadBuilder::new(profile).assemble(&sample_tx());
        assert!(matches!(err, Err(PayloadError::InvalidAccount(_))));

        let mut profile = sample_profile();
        profile.account_id = "01103432300343175379XX".to_string();
        let err = PayloadBuilder::new(profile).assemble(&sample_tx());
        assert!(matches!(err, Err(PayloadError::InvalidAccount(_))));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let mut profile = sample_profile();
        profile.terminal_id = String::new();
        assert_eq!(
            PayloadBuilder::new(profile).assemble(&sample_tx()),
            Err(PayloadError::MissingField("terminal_id"))
        );

        let builder = PayloadBuilder::new(sample_profile());
        assert_eq!(
            builder.assemble(&Transaction {
                amount: 150.0,
                reference: String::new(),
            }),
            Err(PayloadError::MissingField("reference"))
        );
    }

    #[test]
    fn test_rejects_bad_amount() {
        let builder = PayloadBuilder::new(sample_profile());
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let result = builder.assemble(&Transaction {
                amount: bad,
                reference: "SALE-X".to_string(),
            });
            assert!(matches!(result, Err(PayloadError::InvalidAmount(_))));
        }
    }

    #[test]
    fn test_config_json_round_trip() {
        let scheme = SchemeConfig::default();
        let json = serde_json::to_string(&scheme).unwrap();
        assert_eq!(serde_json::from_str::<SchemeConfig>(&json).unwrap(), scheme);

        let tx: Transaction = serde_json::from_str(
            r#"{"amount": 150.0, "reference": "SALE-EC08FEBC"}"#,
        )
        .unwrap();
        assert_eq!(tx.reference, "SALE-EC08FEBC");
    }

    #[test]
    fn test_oversized_reference_overflows() {
        let builder = PayloadBuilder::new(sample_profile());
        let result = builder.assemble(&Transaction {
            amount: 150.0,
            reference: "R".repeat(100),
        });
        assert!(matches!(
            result,
            Err(PayloadError::Tlv(TlvError::LengthOverflow { .. }))
        ));
    }
}
