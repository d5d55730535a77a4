//! Monetary amounts.
//!
//! Prices are decimals. They are stored as an integer count of minor units
//! (cents for two-decimal currencies) so that sums are exact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decimal amount in a given currency.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount_minor: i64,
    currency_code: String,
}

impl Money {
    /// Create an amount from minor units, e.g. `Money::from_minor(1250, "USD")`
    /// is 12.50 USD.
    pub fn from_minor(amount_minor: i64, currency_code: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency_code: currency_code.into(),
        }
    }

    /// Zero in the given currency.
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::from_minor(0, currency_code)
    }

    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    /// Add two amounts. Returns `None` on currency mismatch or overflow.
    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        if self.currency_code != other.currency_code {
            return None;
        }
        let amount_minor = self.amount_minor.checked_add(other.amount_minor)?;
        Some(Money::from_minor(amount_minor, self.currency_code.clone()))
    }

    /// Multiply by a quantity. Returns `None` on overflow.
    pub fn checked_mul(&self, quantity: u64) -> Option<Money> {
        let quantity = i64::try_from(quantity).ok()?;
        let amount_minor = self.amount_minor.checked_mul(quantity)?;
        Some(Money::from_minor(amount_minor, self.currency_code.clone()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(
            f,
            "{}{}.{:02} {}",
            sign,
            abs / 100,
            abs % 100,
            self.currency_code
        )
    }
}
