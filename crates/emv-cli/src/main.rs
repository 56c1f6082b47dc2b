use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use emv_core::{
    tlv, verify_payload, AmountFormat, CrcError, MerchantProfile, PayloadBuilder, SchemeConfig,
    Transaction,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "emv-qr")]
#[command(about = "Interoperable QR payload generator and checksum tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a payment payload for one transaction
    Generate {
        /// CBU/CVU settlement account (22 digits)
        #[arg(long)]
        account: String,

        /// Stable terminal/POS identifier
        #[arg(long, default_value = "TERMINAL01")]
        terminal: String,

        /// Merchant display name
        #[arg(long)]
        name: String,

        /// Merchant city
        #[arg(long)]
        city: String,

        /// Transaction amount in currency units
        #[arg(long)]
        amount: f64,

        /// Per-transaction payment reference
        #[arg(long)]
        reference: String,

        /// Encode the amount as a decimal string instead of integer cents
        #[arg(long)]
        decimal_amount: bool,

        /// Emit a JSON envelope instead of the bare payload
        #[arg(long)]
        json: bool,

        /// Render the QR code in the terminal
        #[arg(long)]
        qr: bool,
    },

    /// Recompute and check the trailing CRC of a payload
    Verify {
        /// Complete payload string, ending in 6304XXXX
        payload: String,
    },

    /// Replace a stale CRC with the correct value
    Repair {
        /// Complete payload string, ending in 6304XXXX
        payload: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug to see per-field assembly logs from emv-core
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Generate {
            account,
            terminal,
            name,
            city,
            amount,
            reference,
            decimal_amount,
            json,
            qr,
        } => generate(
            account,
            terminal,
            name,
            city,
            amount,
            reference,
            decimal_amount,
            json,
            qr,
        ),
        Command::Verify { payload } => verify(&payload),
        Command::Repair { payload } => repair(&payload),
    }
}

#[allow(clippy::too_many_arguments)]
fn generate(
    account: String,
    terminal: String,
    name: String,
    city: String,
    amount: f64,
    reference: String,
    decimal_amount: bool,
    json: bool,
    qr: bool,
) -> anyhow::Result<()> {
    let profile = MerchantProfile {
        account_id: account,
        terminal_id: terminal,
        merchant_name: name,
        merchant_city: city,
    };
    let mut scheme = SchemeConfig::default();
    if decimal_amount {
        scheme.amount_format = AmountFormat::Decimal;
    }

    let builder = PayloadBuilder::with_scheme(profile, scheme);
    let payload = builder
        .assemble(&Transaction { amount, reference })
        .context("Failed to assemble payload")?;

    if json {
        let envelope = serde_json::json!({
            "payload": payload,
            "crc": &payload[payload.len() - 4..],
            "length": payload.len(),
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{payload}");
    }

    if qr {
        let code = qrcode::QrCode::new(payload.as_bytes())
            .context("Payload does not fit in a QR code")?;
        let rendered = code
            .render::<char>()
            .quiet_zone(true)
            .module_dimensions(2, 1)
            .build();
        println!("{rendered}");
    }
    Ok(())
}

fn verify(payload: &str) -> anyhow::Result<()> {
    display_fields(payload);

    match verify_payload(payload) {
        Ok(()) => {
            println!("\nChecksum OK");
            Ok(())
        }
        Err(CrcError::Mismatch { expected, actual }) => {
            bail!("Checksum mismatch: payload carries {actual}, recomputed {expected}")
        }
        Err(err) => bail!("Invalid payload: {err}"),
    }
}

fn repair(payload: &str) -> anyhow::Result<()> {
    let repaired = emv_core::repair_payload(payload).context("Cannot repair payload")?;
    if repaired == payload {
        eprintln!("Checksum already valid");
    }
    println!("{repaired}");
    Ok(())
}

fn display_fields(payload: &str) {
    let fields = match tlv::decode_all(payload) {
        Ok(fields) => fields,
        Err(err) => {
            eprintln!("Warning: payload is not a clean TLV sequence ({err})");
            return;
        }
    };

    for field in &fields {
        println!("  [{}] {}: {}", field.tag, tag_name(&field.tag), field.value);
    }
}

fn tag_name(tag: &str) -> &'static str {
    match tag {
        "00" => "Payload Format Indicator",
        "01" => "Point of Initiation Method",
        "26" => "Merchant Account Information",
        "52" => "Merchant Category Code",
        "53" => "Transaction Currency",
        "54" => "Transaction Amount",
        "58" => "Country Code",
        "59" => "Merchant Name",
        "60" => "Merchant City",
        "62" => "Additional Data Field Template",
        "63" => "CRC",
        _ => "Unknown",
    }
}
