use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

use crate::error::ValidationError;

/// Decimal places kept for a payment amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Syntactic check applied to the amount field on every change: non-empty
/// (after trimming) and parseable as a finite number. Sign is not checked
/// here; see [`AmountPolicy`].
pub fn is_valid_amount(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// A payment amount in fixed point, rounded to [`AMOUNT_SCALE`] places with
/// midpoint-away-from-zero rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        if !is_valid_amount(text) {
            return Err(ValidationError::InvalidAmount);
        }
        let trimmed = text.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| ValidationError::InvalidAmount)?;
        Ok(Self(value.round_dp_with_strategy(
            AMOUNT_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Bounds applied before a payment may be confirmed: strictly positive and
/// no larger than `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountPolicy {
    pub max: Decimal,
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self {
            max: Decimal::new(100_000, 0),
        }
    }
}

impl AmountPolicy {
    pub fn check(&self, amount: &Amount) -> Result<(), ValidationError> {
        if amount.value() <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if amount.value() > self.max {
            return Err(ValidationError::AmountTooLarge(self.max));
        }
        Ok(())
    }

    /// Parse and check in one step.
    pub fn accept(&self, text: &str) -> Result<Amount, ValidationError> {
        let amount = Amount::parse(text)?;
        self.check(&amount)?;
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntactic_validity() {
        assert!(is_valid_amount("12.50"));
        assert!(is_valid_amount(" 9000 "));
        assert!(is_valid_amount("-5"));
        assert!(is_valid_amount("1e3"));
        assert!(!is_valid_amount(""));
        assert!(!is_valid_amount("   "));
        assert!(!is_valid_amount("abc"));
        assert!(!is_valid_amount("12.5.0"));
        assert!(!is_valid_amount("inf"));
        assert!(!is_valid_amount("NaN"));
    }

    #[test]
    fn parse_rounds_to_two_places() {
        assert_eq!(Amount::parse("12.345").unwrap().to_string(), "12.35");
        assert_eq!(Amount::parse("12.344").unwrap().to_string(), "12.34");
        assert_eq!(Amount::parse("-0.005").unwrap().to_string(), "-0.01");
        assert_eq!(Amount::parse("9000").unwrap().to_string(), "9000.00");
    }

    #[test]
    fn parse_accepts_exponent_form() {
        assert_eq!(Amount::parse("1e3").unwrap().value(), Decimal::new(1000, 0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Amount::parse("abc"), Err(ValidationError::InvalidAmount));
        assert_eq!(Amount::parse(""), Err(ValidationError::InvalidAmount));
    }

    #[test]
    fn policy_bounds() {
        let policy = AmountPolicy::default();
        assert!(policy.accept("9000").is_ok());
        assert!(policy.accept("100000").is_ok());
        assert_eq!(policy.accept("-5"), Err(ValidationError::NonPositiveAmount));
        assert_eq!(policy.accept("0"), Err(ValidationError::NonPositiveAmount));
        assert_eq!(policy.accept("0.001"), Err(ValidationError::NonPositiveAmount));
        assert_eq!(
            policy.accept("100000.01"),
            Err(ValidationError::AmountTooLarge(Decimal::new(100_000, 0)))
        );
    }

    #[test]
    fn amount_serializes_as_string() {
        let amount = Amount::parse("12.5").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"12.50\"");
    }
}
