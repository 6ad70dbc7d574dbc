//! Transaction storage repository.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::model::{NewTransaction, Summary, Transaction, TransactionId};
use crate::{Error, Result};

const SELECT_COLUMNS: &str = "SELECT id, amount, description, date, category, type, source FROM transactions";

/// Repository for transaction storage and retrieval.
///
/// Amounts are stored as decimal text so no precision is lost, dates as
/// milliseconds since the Unix epoch.
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date INTEGER NOT NULL,
                category TEXT NOT NULL,
                type TEXT NOT NULL,
                source TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Validates and stores a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for bad input, or a database error.
    pub async fn insert(&self, new: NewTransaction) -> Result<Transaction> {
        let amount = new.checked_amount().map_err(Error::Validation)?;

        let result = sqlx::query(
            r"
            INSERT INTO transactions (amount, description, date, category, type, source)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(amount.to_string())
        .bind(new.description.trim())
        .bind(new.date.timestamp_millis())
        .bind(new.category.trim())
        .bind(new.kind.as_str())
        .bind(new.source.as_str())
        .execute(&self.pool)
        .await?;

        let id = TransactionId::new(result.last_insert_rowid());
        debug!(%id, kind = %new.kind, "stored transaction");
        Ok(new.into_transaction(id, amount))
    }

    /// Replaces every field of an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionNotFound`] if `id` does not exist,
    /// [`Error::Validation`] for bad input, or a database error.
    pub async fn replace(&self, id: TransactionId, new: NewTransaction) -> Result<Transaction> {
        let amount = new.checked_amount().map_err(Error::Validation)?;

        let result = sqlx::query(
            r"
            UPDATE transactions SET
                amount = ?, description = ?, date = ?,
                category = ?, type = ?, source = ?
            WHERE id = ?
            ",
        )
        .bind(amount.to_string())
        .bind(new.description.trim())
        .bind(new.date.timestamp_millis())
        .bind(new.category.trim())
        .bind(new.kind.as_str())
        .bind(new.source.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TransactionNotFound(id));
        }

        debug!(%id, "replaced transaction");
        Ok(new.into_transaction(id, amount))
    }

    /// Deletes a transaction. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: TransactionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    /// Get all transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY date DESC, id DESC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Get transactions dated within `start..=end`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE date >= ? AND date <= ? ORDER BY date DESC, id DESC"
        ))
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Totals for transactions dated within `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails, or
    /// [`Error::CorruptRecord`] when stored amounts add up past the range a
    /// decimal can hold.
    pub async fn summarize(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Summary> {
        let transactions = self.list_between(start, end).await?;
        Summary::from_transactions(&transactions).ok_or_else(|| {
            Error::CorruptRecord(format!(
                "totals for {} transactions are out of range",
                transactions.len()
            ))
        })
    }
}

/// Convert a database row to a Transaction.
fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let id = TransactionId::new(row.try_get("id")?);
    let corrupt = |what: &str| Error::CorruptRecord(format!("transaction {id}: {what}"));

    let amount: String = row.try_get("amount")?;
    let millis: i64 = row.try_get("date")?;
    let kind: String = row.try_get("type")?;
    let source: String = row.try_get("source")?;

    Ok(Transaction {
        id,
        amount: Decimal::from_str(&amount).map_err(|_| corrupt("amount"))?,
        description: row.try_get("description")?,
        date: DateTime::from_timestamp_millis(millis).ok_or_else(|| corrupt("date"))?,
        category: row.try_get("category")?,
        kind: kind.parse().map_err(|_| corrupt("type"))?,
        source: source.parse().map_err(|_| corrupt("source"))?,
    })
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
    use crate::transaction::{TransactionSource, TransactionType, ValidationError};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        let new = NewTransaction::manual("0.10", " coffee ", "food", TransactionType::Expense)
            .with_date(at(1));

        let stored = repo.insert(new).await.unwrap();
        assert_eq!(stored.description, "coffee");

        let fetched = repo.get(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.amount.to_string(), "0.10");
        assert_eq!(fetched.source, TransactionSource::Manual);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_amount() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        let new = NewTransaction::manual("ten", "", "food", TransactionType::Expense);

        let err = repo.insert(new).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e == &[ValidationError::InvalidAmount]));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_huge_amount() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        for _ in 0..2 {
            let new = NewTransaction::manual(
                "79228162514264337593543950335",
                "",
                "windfall",
                TransactionType::Income,
            );
            let err = repo.insert(new).await.unwrap_err();
            assert!(matches!(err, Error::Validation(ref e) if e == &[ValidationError::AmountTooLarge]));
        }

        let summary = repo.summarize(at(1), at(28)).await.unwrap();
        assert_eq!(summary.count, 0);
    }

    #[tokio::test]
    async fn test_replace() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        let stored = repo
            .insert(NewTransaction::manual("5", "bus", "transport", TransactionType::Expense))
            .await
            .unwrap();

        let edited = NewTransaction::manual("6.40", "bus + tip", "transport", TransactionType::Expense)
            .with_date(stored.date);
        let replaced = repo.replace(stored.id, edited).await.unwrap();
        assert_eq!(replaced.id, stored.id);
        assert_eq!(repo.get(stored.id).await.unwrap().unwrap().description, "bus + tip");

        let missing = repo
            .replace(
                TransactionId::new(999),
                NewTransaction::manual("1", "", "x", TransactionType::Income),
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::TransactionNotFound(TransactionId(999))));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        let stored = repo
            .insert(NewTransaction::manual("1", "", "misc", TransactionType::Income))
            .await
            .unwrap();

        assert!(repo.delete(stored.id).await.unwrap());
        assert!(!repo.delete(stored.id).await.unwrap());
        assert!(repo.get(stored.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_range() {
        let repo = TransactionRepository::in_memory().await.unwrap();
        for (day, amount, kind) in [
            (1, "2000", TransactionType::Income),
            (5, "30.25", TransactionType::Expense),
            (9, "12.75", TransactionType::Expense),
            (20, "100", TransactionType::Income),
        ] {
            repo.insert(NewTransaction::manual(amount, "", "misc", kind).with_date(at(day)))
                .await
                .unwrap();
        }

        let all = repo.list().await.unwrap();
        let days: Vec<_> = all.iter().map(|t| t.date).collect();
        assert_eq!(days, vec![at(20), at(9), at(5), at(1)]);

        // Both ends inclusive.
        let range = repo.list_between(at(5), at(9)).await.unwrap();
        assert_eq!(range.len(), 2);

        let summary = repo.summarize(at(1), at(9)).await.unwrap();
        assert_eq!(summary.income, Decimal::new(2000, 0));
        assert_eq!(summary.expense, Decimal::new(43, 0));
        assert_eq!(summary.net(), Decimal::new(1957, 0));
        assert_eq!(summary.count, 3);
    }
}
