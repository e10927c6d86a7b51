//! Payment QR payloads
//!
//! Format: `<tag>###transfer###<destination>###<amount>[###<memo>]`, where
//! `<tag>` is `qastra` or the older `starcade`.

use crate::error::{Error, Result};
use crate::wallet::PaymentIntent;

const SEPARATOR: &str = "###";
const ACTION: &str = "transfer";
const ACCEPTED_TAGS: [&str; 2] = ["qastra", "starcade"];

/// Fields read from a payment QR code, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPayment {
    pub destination: String,
    pub amount: String,
    pub memo: Option<String>,
}

impl From<ScannedPayment> for PaymentIntent {
    fn from(scanned: ScannedPayment) -> Self {
        PaymentIntent {
            destination: scanned.destination,
            amount: scanned.amount,
            memo: scanned.memo,
            ..Default::default()
        }
    }
}

/// Decode a scanned payload
pub fn decode(text: &str) -> Result<ScannedPayment> {
    let segments: Vec<&str> = text.trim().split(SEPARATOR).collect();

    if segments.len() < 4 {
        return Err(Error::UnrecognizedFormat(format!(
            "expected at least 4 segments, found {}",
            segments.len()
        )));
    }

    if !ACCEPTED_TAGS.contains(&segments[0]) {
        return Err(Error::UnrecognizedFormat(format!(
            "unknown tag {:?}",
            segments[0]
        )));
    }

    if segments[1] != ACTION {
        return Err(Error::UnrecognizedFormat(format!(
            "unknown action {:?}",
            segments[1]
        )));
    }

    let memo = segments
        .get(4)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string());

    Ok(ScannedPayment {
        destination: segments[2].to_string(),
        amount: segments[3].to_string(),
        memo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEST: &str = "GABCDEFGHIJKLMNOPQRSTUVWXYZABCDEFGHIJKLMNOPQRSTUVWXYZ234";

    #[test]
    fn test_decode_current_tag() {
        let scanned = decode(&format!("qastra###transfer###{}###10.5", DEST)).unwrap();
        assert_eq!(
            scanned,
            ScannedPayment {
                destination: DEST.to_string(),
                amount: "10.5".to_string(),
                memo: None,
            }
        );
    }

    #[test]
    fn test_decode_legacy_tag_with_memo() {
        let scanned = decode(&format!("starcade###transfer###{}###10.5###coffee", DEST)).unwrap();
        assert_eq!(scanned.memo.as_deref(), Some("coffee"));

        let scanned = decode(&format!("starcade###transfer###{}###10.5###", DEST)).unwrap();
        assert_eq!(scanned.memo, None);
    }

    #[test]
    fn test_decode_rejects_unknown_payloads() {
        for payload in [
            "other###transfer###x###1",
            "qastra###transfer###x",
            "qastra###receive###x###1",
            "",
            "https://example.com",
        ] {
            assert!(
                matches!(decode(payload), Err(Error::UnrecognizedFormat(_))),
                "{} should be rejected",
                payload
            );
        }
    }

    #[test]
    fn test_decoder_leaves_validation_downstream() {
        let scanned = decode("qastra###transfer###short###-3").unwrap();
        let intent: PaymentIntent = scanned.into();
        assert_eq!(intent.destination, "short");
        assert!(crate::wallet::validator::validate(&intent).is_err());
    }
}
