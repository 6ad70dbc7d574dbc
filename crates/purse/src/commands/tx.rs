//! Transaction commands.

use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use purse_core::{NewTransaction, Summary, TransactionId, TransactionType};

use super::{Context, parse_date};
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Income,
    Expense,
}

impl From<Kind> for TransactionType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Income => Self::Income,
            Kind::Expense => Self::Expense,
        }
    }
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a transaction
    Add {
        /// Amount, positive; a comma works as the decimal separator (12,50) but not as a thousands separator
        amount: String,
        /// Category, e.g. Food or Salary
        #[arg(long, short)]
        category: String,
        /// Free-text description
        #[arg(long, short, default_value = "")]
        description: String,
        /// Income or expense
        #[arg(long = "type", short = 't', value_enum, default_value_t = Kind::Expense)]
        kind: Kind,
        /// Date (YYYY-MM-DD), defaults to now
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List transactions, newest first
    List {
        /// First day to include (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one transaction
    Show {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a transaction
    Edit {
        id: i64,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long, short)]
        category: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long = "type", short = 't', value_enum)]
        kind: Option<Kind>,
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
    },
    /// Delete a transaction
    Delete { id: i64 },
    /// Total income, expenses and net for a period
    Summary {
        /// First day (YYYY-MM-DD), defaults to the start of this month
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,
        /// Last day (YYYY-MM-DD), defaults to the end of this month
        #[arg(long, value_parser = parse_date)]
        to: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ctx: &Context, command: TxCommands) -> Result<()> {
    let repo = ctx.repository().await?;

    match command {
        TxCommands::Add {
            amount,
            category,
            description,
            kind,
            date,
            json,
        } => {
            let mut new = NewTransaction::manual(amount, description, category, kind.into());
            if let Some(date) = date {
                new = new.with_date(date);
            }
            let tx = repo.insert(new).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tx)?);
            } else {
                println!("Added transaction {}", tx.id);
                println!("{}", output::transaction_row(&tx));
            }
        }
        TxCommands::List { from, to, json } => {
            let transactions = match (from, to) {
                (None, None) => repo.list().await?,
                (from, to) => {
                    let start = from.unwrap_or(DateTime::<Utc>::MIN_UTC);
                    let end = to.map_or(DateTime::<Utc>::MAX_UTC, end_of_day);
                    repo.list_between(start, end).await?
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
            } else if transactions.is_empty() {
                println!("No transactions");
            } else {
                for tx in &transactions {
                    println!("{}", output::transaction_row(tx));
                }
            }
        }
        TxCommands::Show { id, json } => {
            let Some(tx) = repo.get(TransactionId::new(id)).await? else {
                bail!("transaction {id} not found");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&tx)?);
            } else {
                println!("{}", output::transaction_detail(&tx));
            }
        }
        TxCommands::Edit {
            id,
            amount,
            category,
            description,
            kind,
            date,
        } => {
            let id = TransactionId::new(id);
            let Some(current) = repo.get(id).await? else {
                bail!("transaction {id} not found");
            };
            let new = NewTransaction {
                amount: amount.unwrap_or_else(|| current.amount.to_string()),
                description: description.unwrap_or(current.description),
                date: date.unwrap_or(current.date),
                category: category.unwrap_or(current.category),
                kind: kind.map_or(current.kind, Into::into),
                source: current.source,
            };
            let tx = repo.replace(id, new).await?;
            println!("Updated transaction {}", tx.id);
            println!("{}", output::transaction_row(&tx));
        }
        TxCommands::Delete { id } => {
            if repo.delete(TransactionId::new(id)).await? {
                println!("Deleted transaction {id}");
            } else {
                bail!("transaction {id} not found");
            }
        }
        TxCommands::Summary { from, to, json } => {
            let (month_start, month_end) = month_bounds(Utc::now().date_naive());
            let start = from.unwrap_or(month_start);
            let end = to.map_or(month_end, end_of_day);
            let summary: Summary = repo.summarize(start, end).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "from": start,
                        "to": end,
                        "income": summary.income,
                        "expense": summary.expense,
                        "net": summary.net(),
                        "count": summary.count,
                    })
                );
            } else {
                println!("{} to {}", output::date(start), output::date(end));
                println!("{}", output::summary(&summary));
            }
        }
    }

    Ok(())
}

/// Last millisecond of the day starting at `day`.
fn end_of_day(day: DateTime<Utc>) -> DateTime<Utc> {
    day + chrono::Duration::days(1) - chrono::Duration::milliseconds(1)
}

/// First and last instant of the month containing `today`.
fn month_bounds(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = today.with_day(1).unwrap_or(today);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    let start = first.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = next.and_time(chrono::NaiveTime::MIN).and_utc() - chrono::Duration::milliseconds(1);
    (start, end)
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
    use chrono::Timelike;

    #[test]
    fn test_month_bounds_december() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 12, 17).unwrap());
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(end.hour(), 23);
    }

    #[test]
    fn test_end_of_day_is_inclusive() {
        let day = parse_date("2024-02-29").unwrap();
        let end = end_of_day(day);
        assert_eq!(end.date_naive(), day.date_naive());
        assert_eq!(end.timestamp_millis() - day.timestamp_millis(), 86_399_999);
    }

    #[test]
    fn test_kind_maps_to_transaction_type() {
        assert_eq!(TransactionType::from(Kind::Income), TransactionType::Income);
        assert_eq!(TransactionType::from(Kind::Expense), TransactionType::Expense);
    }
}
