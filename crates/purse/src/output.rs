//! Plain-text rendering for terminal output.

use chrono::{DateTime, Local, Utc};
use purse_core::{Summary, Transaction, TransactionType};
use rust_decimal::Decimal;

/// Formats an amount with two decimals.
pub fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Formats a timestamp as a local calendar date.
pub fn date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// One line per transaction, aligned.
pub fn transaction_row(tx: &Transaction) -> String {
    let sign = match tx.kind {
        TransactionType::Income => '+',
        TransactionType::Expense => '-',
    };
    let mut line = format!(
        "{:>5}  {}  {sign}{:>11}  {:<16}",
        tx.id,
        date(tx.date),
        money(tx.amount),
        tx.category
    );
    if !tx.description.is_empty() {
        line.push_str("  ");
        line.push_str(&tx.description);
    }
    line.trim_end().to_string()
}

/// Multi-line detail view.
pub fn transaction_detail(tx: &Transaction) -> String {
    format!(
        "Transaction {}\n  Amount:      {}\n  Type:        {}\n  Category:    {}\n  Description: {}\n  Date:        {}\n  Source:      {}",
        tx.id,
        money(tx.amount),
        tx.kind.as_str(),
        tx.category,
        tx.description,
        date(tx.date),
        tx.source.as_str(),
    )
}

pub fn summary(summary: &Summary) -> String {
    format!(
        "Income:   {:>12}\nExpenses: {:>12}\nNet:      {:>12}\n({} transactions)",
        money(summary.income),
        money(summary.expense),
        money(summary.net()),
        summary.count
    )
}

/// Renders an error and its causes on one line.
pub fn error_line(error: &anyhow::Error) -> String {
    format!("Error: {error:#}")
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
    use anyhow::Context;
    use purse_core::{TransactionId, TransactionSource};
    use std::str::FromStr;

    fn sample() -> Transaction {
        Transaction {
            id: TransactionId::new(7),
            amount: Decimal::from_str("12.5").unwrap(),
            description: "lunch".into(),
            date: Utc::now(),
            category: "Food".into(),
            kind: TransactionType::Expense,
            source: TransactionSource::Manual,
        }
    }

    #[test]
    fn test_money_two_decimals() {
        assert_eq!(money(Decimal::from_str("12.5").unwrap()), "12.50");
        assert_eq!(money(Decimal::from_str("3.14159").unwrap()), "3.14");
        assert_eq!(money(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_row_shows_sign_and_description() {
        let row = transaction_row(&sample());
        assert!(row.contains("-"));
        assert!(row.contains("12.50"));
        assert!(row.ends_with("lunch"));
    }

    #[test]
    fn test_summary_net() {
        let mut income = sample();
        income.kind = TransactionType::Income;
        income.amount = Decimal::from(100);
        let text = summary(&Summary::from_transactions([&income, &sample()]).unwrap());
        assert!(text.contains("87.50"));
        assert!(text.contains("(2 transactions)"));
    }

    #[test]
    fn test_error_line_includes_causes() {
        let err: anyhow::Result<()> = Err(std::io::Error::other("disk full")).context("saving");
        assert_eq!(error_line(&err.unwrap_err()), "Error: saving: disk full");
    }
}
