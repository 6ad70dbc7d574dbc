//! Income and expense records.
//!
//! Provides the transaction model, validation of user input and `SQLite`
//! storage.

mod model;
mod repository;
mod validation;

pub use model::{NewTransaction, Summary, Transaction, TransactionId, TransactionSource, TransactionType};
pub use repository::TransactionRepository;
pub use validation::{ValidationError, ValidationResult, parse_amount, validate_transaction};
