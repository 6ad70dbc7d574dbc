//! Transaction model types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::validation::{self, ValidationError, ValidationResult};

/// Unique identifier for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl TransactionId {
    /// Create a new transaction ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of money flow. Amounts are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money received.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// Stored and displayed form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" | "IN" => Ok(Self::Income),
            "EXPENSE" | "OUT" => Ok(Self::Expense),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    /// Entered by the user.
    #[default]
    Manual,
    /// Extracted from an email.
    Email,
    /// Imported from a bank API.
    BankApi,
}

impl TransactionSource {
    /// Stored and displayed form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Email => "EMAIL",
            Self::BankApi => "BANK_API",
        }
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(Self::Manual),
            "EMAIL" => Ok(Self::Email),
            "BANK_API" => Ok(Self::BankApi),
            other => Err(format!("unknown transaction source: {other}")),
        }
    }
}

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Positive amount; the sign comes from `kind`.
    pub amount: Decimal,
    /// Free-form description.
    pub description: String,
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Budget category.
    pub category: String,
    /// Income or expense.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Origin of the record.
    pub source: TransactionSource,
}

impl Transaction {
    /// Amount with the sign applied: negative for expenses.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

/// User input for a transaction that has not been stored yet.
///
/// The amount is kept as entered so that bad input is reported instead of
/// failing at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Amount as typed by the user.
    pub amount: String,
    /// Free-form description.
    pub description: String,
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Budget category.
    pub category: String,
    /// Income or expense.
    pub kind: TransactionType,
    /// Origin of the record.
    pub source: TransactionSource,
}

impl NewTransaction {
    /// Creates a manual transaction dated now.
    #[must_use]
    pub fn manual(
        amount: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        kind: TransactionType,
    ) -> Self {
        Self {
            amount: amount.into(),
            description: description.into(),
            date: Utc::now(),
            category: category.into(),
            kind,
            source: TransactionSource::Manual,
        }
    }

    /// Sets the date.
    #[must_use]
    pub const fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Sets the source.
    #[must_use]
    pub const fn with_source(mut self, source: TransactionSource) -> Self {
        self.source = source;
        self
    }

    /// Checks every field and reports all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the list of validation errors.
    pub fn validate(&self) -> ValidationResult {
        validation::validate_transaction(self)
    }

    /// Validates and returns the parsed amount.
    pub(crate) fn checked_amount(&self) -> Result<Decimal, Vec<ValidationError>> {
        self.validate()?;
        validation::parse_amount(&self.amount).map_err(|e| vec![e])
    }

    /// Builds the stored form under `id`.
    pub(crate) fn into_transaction(self, id: TransactionId, amount: Decimal) -> Transaction {
        Transaction {
            id,
            amount,
            description: self.description.trim().to_string(),
            date: self.date,
            category: self.category.trim().to_string(),
            kind: self.kind,
            source: self.source,
        }
    }
}

/// Totals over a set of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    /// Sum of income amounts.
    pub income: Decimal,
    /// Sum of expense amounts.
    pub expense: Decimal,
    /// Number of transactions.
    pub count: usize,
}

impl Summary {
    /// Adds up `transactions`, or `None` when a total leaves the range a
    /// [`Decimal`] can hold.
    #[must_use]
    pub fn from_transactions<'a>(
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Option<Self> {
        transactions
            .into_iter()
            .try_fold(Self::default(), |mut acc, tx| {
                match tx.kind {
                    TransactionType::Income => acc.income = acc.income.checked_add(tx.amount)?,
                    TransactionType::Expense => acc.expense = acc.expense.checked_add(tx.amount)?,
                }
                acc.count += 1;
                Some(acc)
            })
    }

    /// Income minus expense, clamped to the [`Decimal`] range.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.income.saturating_sub(self.expense)
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

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn tx(id: i64, amount: Decimal, kind: TransactionType) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            amount,
            description: String::new(),
            date: Utc::now(),
            category: "misc".into(),
            kind,
            source: TransactionSource::Manual,
        }
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("income".parse::<TransactionType>(), Ok(TransactionType::Income));
        assert_eq!(" EXPENSE ".parse::<TransactionType>(), Ok(TransactionType::Expense));
        assert!("refund".parse::<TransactionType>().is_err());
        assert_eq!("bank_api".parse::<TransactionSource>(), Ok(TransactionSource::BankApi));
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&TransactionSource::BankApi).unwrap();
        assert_eq!(json, "\"BANK_API\"");
        let value = serde_json::to_value(tx(1, dec("2.50"), TransactionType::Expense)).unwrap();
        assert_eq!(value["type"], "EXPENSE");
    }

    #[test]
    fn test_summary() {
        let list = vec![
            tx(1, dec("1500.00"), TransactionType::Income),
            tx(2, dec("42.10"), TransactionType::Expense),
            tx(3, dec("7.90"), TransactionType::Expense),
        ];
        let summary = Summary::from_transactions(&list).unwrap();
        assert_eq!(summary.income, dec("1500.00"));
        assert_eq!(summary.expense, dec("50.00"));
        assert_eq!(summary.net(), dec("1450.00"));
        assert_eq!(summary.count, 3);
        assert_eq!(list[1].signed_amount(), dec("-42.10"));
    }

    #[test]
    fn test_summary_overflow_is_reported() {
        let list = vec![
            tx(1, Decimal::MAX, TransactionType::Income),
            tx(2, Decimal::MAX, TransactionType::Income),
        ];
        assert_eq!(Summary::from_transactions(&list), None);

        let lopsided = Summary {
            income: Decimal::MIN,
            expense: Decimal::MAX,
            count: 2,
        };
        assert_eq!(lopsided.net(), Decimal::MIN);
    }
}
