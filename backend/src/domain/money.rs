//! Monetary primitives: minor-unit amounts and currency codes.
//!
//! Amounts are stored as signed 64-bit integers of the currency's minor unit
//! (cents for USD). Floating point never touches a balance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors for [`Currency`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyValidationError {
    /// The code was empty after trimming.
    #[error("currency code must not be empty")]
    Empty,
    /// The code was not three ASCII letters.
    #[error("currency code must be three ASCII letters, got {code:?}")]
    Malformed {
        /// The rejected input.
        code: String,
    },
}

/// Three-letter currency code such as `USD`.
///
/// Input is trimmed and upper-cased before validation, so `" usd "` parses to
/// `USD`.
///
/// # Examples
/// ```
/// use banksystem::domain::Currency;
///
/// let usd = Currency::new("usd").expect("valid currency");
/// assert_eq!(usd.as_ref(), "USD");
/// assert!(Currency::new("dollars").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validate and normalise a currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, CurrencyValidationError> {
        let trimmed = code.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CurrencyValidationError::Empty);
        }
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyValidationError::Malformed {
                code: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Signed amount of minor currency units.
///
/// Arithmetic is checked; overflow yields `None` rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero minor units.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw minor-unit value.
    pub const fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Raw minor-unit value.
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// True when strictly greater than zero.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// True when strictly less than zero.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    ///
    /// # Examples
    /// ```
    /// use banksystem::domain::Amount;
    ///
    /// assert_eq!(Amount::new(2).checked_add(Amount::new(3)), Some(Amount::new(5)));
    /// assert_eq!(Amount::new(i64::MAX).checked_add(Amount::new(1)), None);
    /// ```
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Checked negation.
    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("USD", "USD")]
    #[case("eur", "EUR")]
    #[case("  gbp ", "GBP")]
    fn currency_normalises_valid_codes(#[case] input: &str, #[case] expected: &str) {
        let currency = Currency::new(input).expect("valid currency");
        assert_eq!(currency.as_ref(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn currency_rejects_empty(#[case] input: &str) {
        assert_eq!(Currency::new(input), Err(CurrencyValidationError::Empty));
    }

    #[rstest]
    #[case("US")]
    #[case("USDT")]
    #[case("U5D")]
    #[case("€UR")]
    fn currency_rejects_malformed(#[case] input: &str) {
        assert!(matches!(
            Currency::new(input),
            Err(CurrencyValidationError::Malformed { .. })
        ));
    }

    #[rstest]
    fn currency_deserialises_through_validation() {
        let parsed: Currency = serde_json::from_str("\"jpy\"").expect("valid json");
        assert_eq!(parsed.as_ref(), "JPY");
        let err = serde_json::from_str::<Currency>("\"yen!\"");
        assert!(err.is_err());
    }

    #[rstest]
    fn amount_checked_sub_detects_overflow() {
        assert_eq!(Amount::new(i64::MIN).checked_sub(Amount::new(1)), None);
        assert_eq!(
            Amount::new(1_000).checked_sub(Amount::new(300)),
            Some(Amount::new(700))
        );
    }

    #[rstest]
    #[case(0, false, false)]
    #[case(5, true, false)]
    #[case(-5, false, true)]
    fn amount_sign_predicates(#[case] raw: i64, #[case] positive: bool, #[case] negative: bool) {
        let amount = Amount::new(raw);
        assert_eq!(amount.is_positive(), positive);
        assert_eq!(amount.is_negative(), negative);
    }

    #[rstest]
    fn amount_serialises_as_plain_integer() {
        let json = serde_json::to_string(&Amount::new(300)).expect("serialise amount");
        assert_eq!(json, "300");
    }
}
