//! Prices in minor currency units.
//!
//! Every price in the system is an integer number of cents. Negative prices
//! are unrepresentable; fractional cents never exist. Conversion to the
//! two-decimal display form happens only at the edges (templates and the
//! payment payload is already in cents).

use core::fmt;
use core::iter::Sum;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a price.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a number.
    #[error("price is not a valid number: {0}")]
    Invalid(String),
    /// The price is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// More than two decimal places were given.
    #[error("price cannot have more than two decimal places")]
    TooPrecise,
    /// The price does not fit in the supported range.
    #[error("price is too large")]
    Overflow,
    /// A listing price above [`Cents::MAX_LISTING`].
    #[error("price cannot exceed $999999.99")]
    AboveMaximum,
}

/// A non-negative amount in minor currency units (cents).
///
/// # Examples
///
/// ```
/// use campus_cart_core::Cents;
///
/// let price = Cents::new(1999);
/// assert_eq!(price.display(), "$19.99");
/// assert_eq!(price.decimal(), "19.99");
///
/// assert_eq!(Cents::from_decimal_str("12.5").unwrap(), Cents::new(1250));
/// assert_eq!(Cents::parse_attr("450").unwrap(), Cents::new(450));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(u64);

impl Cents {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Highest price a listing may carry ($999,999.99), the largest single
    /// card charge the payment provider accepts in USD.
    pub const MAX_LISTING: Self = Self(99_999_999);

    /// Create an amount from a number of cents.
    #[must_use]
    pub const fn new(cents: u64) -> Self {
        Self(cents)
    }

    /// The raw number of cents.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is a zero amount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add two amounts, clamping at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Two-decimal string without a currency symbol, e.g. `"19.99"`.
    #[must_use]
    pub fn decimal(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }

    /// Two-decimal string with the dollar sign, e.g. `"$19.99"`.
    #[must_use]
    pub fn display(self) -> String {
        format!("${}", self.decimal())
    }

    /// Parse an integer-cents attribute value such as a `data-price`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, contains anything but
    /// ASCII digits, or overflows.
    pub fn parse_attr(s: &str) -> Result<Self, PriceError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceError::Empty);
        }
        if s.starts_with('-') {
            return Err(PriceError::Negative);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PriceError::Invalid(s.to_owned()));
        }
        s.parse::<u64>().map(Self).map_err(|_| PriceError::Overflow)
    }

    /// Parse a dollar amount entered by a person, e.g. `"12.50"` or `"3"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not a number, negative, has
    /// more than two decimal places, or is above [`Cents::MAX_LISTING`].
    pub fn from_decimal_str(s: &str) -> Result<Self, PriceError> {
        let s = s.trim().trim_start_matches('$');
        if s.is_empty() {
            return Err(PriceError::Empty);
        }

        let amount = Decimal::from_str(s).map_err(|_| PriceError::Invalid(s.to_owned()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }

        let cents = amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.trunc().to_u64())
            .map(Self)
            .ok_or(PriceError::AboveMaximum)?;
        if cents > Self::MAX_LISTING {
            return Err(PriceError::AboveMaximum);
        }
        Ok(cents)
    }

    /// The amount as a signed integer for database storage.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the amount exceeds `i64::MAX`.
    pub fn as_i64(self) -> Result<i64, PriceError> {
        i64::try_from(self.0).map_err(|_| PriceError::Overflow)
    }
}

impl TryFrom<i64> for Cents {
    type Error = PriceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| PriceError::Negative)
    }
}

impl From<Cents> for u64 {
    fn from(value: Cents) -> Self {
        value.0
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Self> for Cents {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
