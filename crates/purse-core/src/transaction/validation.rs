//! Transaction input validation.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::model::NewTransaction;

/// Amounts must stay below this many whole units.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Validation error for transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount is empty or not a number.
    InvalidAmount,
    /// Amount is zero or negative.
    NonPositiveAmount,
    /// Amount is at or above [`MAX_AMOUNT`].
    AmountTooLarge,
    /// Category is empty.
    EmptyCategory,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "Amount must be a number",
            Self::NonPositiveAmount => "Amount must be greater than zero",
            Self::AmountTooLarge => "Amount must be less than 1,000,000,000,000",
            Self::EmptyCategory => "Category is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidAmount | Self::NonPositiveAmount | Self::AmountTooLarge => "amount",
            Self::EmptyCategory => "category",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a transaction.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Parses a user-entered amount.
///
/// Surrounding whitespace is ignored. A single comma is accepted as the
/// decimal separator when no dot is present (`12,50`). A comma followed by
/// exactly three digits after a non-zero whole part (`1,000`) reads as a
/// thousands separator just as well, so it is refused.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAmount`] for anything that is not a
/// plain decimal number.
pub fn parse_amount(text: &str) -> Result<Decimal, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::InvalidAmount);
    }

    let normalized = if !text.contains('.') && text.matches(',').count() == 1 {
        if let Some((whole, fraction)) = text.split_once(',')
            && is_thousands_group(whole, fraction)
        {
            return Err(ValidationError::InvalidAmount);
        }
        text.replace(',', ".")
    } else {
        text.to_string()
    };

    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return Err(ValidationError::InvalidAmount);
    }

    Decimal::from_str(&normalized).map_err(|_| ValidationError::InvalidAmount)
}

fn is_thousands_group(whole: &str, fraction: &str) -> bool {
    let digits = whole.trim_start_matches(['-', '+']);
    fraction.len() == 3
        && fraction.bytes().all(|b| b.is_ascii_digit())
        && !digits.trim_start_matches('0').is_empty()
}

/// Validate a transaction before it is stored.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_transaction(tx: &NewTransaction) -> ValidationResult {
    let mut errors = Vec::new();

    match parse_amount(&tx.amount) {
        Ok(amount) if amount <= Decimal::ZERO => errors.push(ValidationError::NonPositiveAmount),
        Ok(amount) if amount >= Decimal::from(MAX_AMOUNT) => {
            errors.push(ValidationError::AmountTooLarge);
        }
        Ok(_) => {}
        Err(e) => errors.push(e),
    }

    if tx.category.trim().is_empty() {
        errors.push(ValidationError::EmptyCategory);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::transaction::TransactionType;
    use proptest::prelude::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.50 ").unwrap(), Decimal::new(1250, 2));
        assert_eq!(parse_amount("12,50").unwrap(), Decimal::new(1250, 2));
        assert_eq!(parse_amount("7").unwrap(), Decimal::new(7, 0));
        assert_eq!(parse_amount("-3.2").unwrap(), Decimal::new(-32, 1));
        assert_eq!(parse_amount("0,125").unwrap(), Decimal::new(125, 3));
        assert_eq!(parse_amount("1,5").unwrap(), Decimal::new(15, 1));
        assert_eq!(parse_amount("1000").unwrap(), Decimal::new(1000, 0));
    }

    #[test]
    fn test_parse_amount_refuses_thousands_separator() {
        for input in ["1,000", "12,345", "-1,000", "999,999"] {
            assert_eq!(
                parse_amount(input),
                Err(ValidationError::InvalidAmount),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_validate_amount_too_large() {
        for amount in ["79228162514264337593543950335", "1000000000000", "1000000000000.00"] {
            let tx = NewTransaction::manual(amount, "", "misc", TransactionType::Income);
            assert_eq!(
                tx.validate().unwrap_err(),
                vec![ValidationError::AmountTooLarge],
                "{amount}"
            );
        }

        let tx = NewTransaction::manual("999999999999.99", "", "misc", TransactionType::Income);
        assert!(tx.validate().is_ok());
        assert_eq!(ValidationError::AmountTooLarge.field(), "amount");
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for input in ["", "   ", "abc", "12.5.1", "1,000,000", "1e5", "NaN", "$12", "1_000"] {
            assert_eq!(
                parse_amount(input),
                Err(ValidationError::InvalidAmount),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let tx = NewTransaction::manual("lunch", "", " ", TransactionType::Expense);
        let errors = tx.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidAmount, ValidationError::EmptyCategory]
        );
        assert_eq!(errors[0].field(), "amount");
    }

    #[test]
    fn test_validate_non_positive() {
        let tx = NewTransaction::manual("0", "", "food", TransactionType::Expense);
        assert_eq!(
            tx.validate().unwrap_err(),
            vec![ValidationError::NonPositiveAmount]
        );

        let tx = NewTransaction::manual("19.99", "books", "education", TransactionType::Expense);
        assert!(tx.validate().is_ok());
    }

    proptest! {
        #[test]
        fn parse_amount_never_panics(input in ".*") {
            let _ = parse_amount(&input);
        }

        #[test]
        fn parse_amount_accepts_plain_decimals(whole in 0u32..1_000_000, cents in 0u32..100) {
            let text = format!("{whole}.{cents:02}");
            let amount = parse_amount(&text).unwrap();
            prop_assert_eq!(amount, Decimal::new(i64::from(whole) * 100 + i64::from(cents), 2));
        }
    }
}
