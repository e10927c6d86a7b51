//! Payment intent validation
//!
//! Runs before any storage or network call.

use crate::error::{Error, Result};

use super::amount::{is_positive_decimal, to_stroops};
use super::types::PaymentIntent;

/// Length of a ledger account identifier
pub const ADDRESS_LENGTH: usize = 56;

/// Validate the shape of a payment intent
pub fn validate(intent: &PaymentIntent) -> Result<()> {
    if intent.destination.chars().count() != ADDRESS_LENGTH {
        return Err(Error::InvalidDestination(format!(
            "expected {} characters, got {}",
            ADDRESS_LENGTH,
            intent.destination.chars().count()
        )));
    }

    if !is_positive_decimal(&intent.amount) {
        return Err(Error::InvalidAmount(intent.amount.clone()));
    }
    to_stroops(&intent.amount)?;

    if intent.asset_code.is_some() != intent.asset_issuer.is_some() {
        return Err(Error::AssetPairingError);
    }

    Ok(())
}
