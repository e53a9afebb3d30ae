//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    ConstraintViolation, Error,
    database_id::{CompanyId, DatabaseId, TransactionId},
    error::{require, require_text},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money received, e.g. a paid invoice.
    Income,
    /// Money spent, e.g. a supplier bill.
    Expense,
}

impl TransactionType {
    /// The name used to store the type in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            _ => Err(Error::InvalidVariant {
                kind: "transaction type",
                value: s.to_owned(),
            }),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A ledger entry recording money that was earned or spent by a company.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// When the transaction took effect.
    ///
    /// This is supplied by the user and is unrelated to when the record was stored.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// The amount of money earned or spent.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// How the transaction was paid, e.g. "PIX" or "TRANSFER".
    pub payment_method: Option<String>,
    /// The ID of the bank account the money moved through.
    pub bank_id: Option<String>,
    /// A free text category, e.g. "Rent".
    pub category: Option<String>,
    /// Whether the transaction has been settled.
    pub paid: bool,
    /// The company the transaction belongs to.
    ///
    /// The ID is not checked against the company table.
    pub company_id: Option<CompanyId>,
    /// When the transaction was first stored.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] with the required fields set.
    pub fn build(
        date: OffsetDateTime,
        amount: Decimal,
        description: &str,
        transaction_type: TransactionType,
    ) -> TransactionBuilder {
        TransactionBuilder {
            date: Some(date),
            amount: Some(amount),
            description: Some(description.to_owned()),
            transaction_type: Some(transaction_type),
            ..Default::default()
        }
    }

    /// Check that the required fields are still present after an edit.
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        if self.description.trim().is_empty() {
            return Err(ConstraintViolation::missing("description"));
        }

        Ok(())
    }
}

/// A builder for creating [Transaction] instances.
///
/// The required fields are optional here so that a partially filled in
/// transaction can be represented, [TransactionBuilder::prepare_for_insert]
/// rejects builders that are missing any of them.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use time::macros::datetime;
///
/// use gestao_rs::transaction::{Transaction, TransactionType};
///
/// let builder = Transaction::build(
///         datetime!(2025-01-15 10:00 UTC),
///         Decimal::new(10050, 2),
///         "Invoice #1",
///         TransactionType::Income,
///     )
///     .payment_method(Some("PIX"))
///     .paid(true);
///
/// assert!(builder.paid);
/// assert_eq!(builder.payment_method.as_deref(), Some("PIX"));
/// ```
#[derive(Debug, Default, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// When the transaction took effect. Required.
    pub date: Option<OffsetDateTime>,

    /// The monetary amount of the transaction. Required.
    ///
    /// Amounts are kept as entered, whether money came in or went out is
    /// given by `transaction_type`.
    pub amount: Option<Decimal>,

    /// A human-readable description of the transaction. Required.
    ///
    /// # Examples
    /// - `"Invoice #1"`
    /// - `"Aluguel - Janeiro"`
    pub description: Option<String>,

    /// Whether the transaction is income or an expense. Required.
    pub transaction_type: Option<TransactionType>,

    /// How the transaction was paid.
    pub payment_method: Option<String>,

    /// The ID of the bank account the money moved through.
    pub bank_id: Option<String>,

    /// A free text category.
    pub category: Option<String>,

    /// Whether the transaction has been settled, defaults to `false`.
    pub paid: bool,

    /// The company the transaction belongs to.
    pub company_id: Option<CompanyId>,
}

impl TransactionBuilder {
    /// Set the payment method for the transaction.
    pub fn payment_method(mut self, payment_method: Option<&str>) -> Self {
        self.payment_method = payment_method.map(str::to_owned);
        self
    }

    /// Set the bank ID for the transaction.
    pub fn bank_id(mut self, bank_id: Option<&str>) -> Self {
        self.bank_id = bank_id.map(str::to_owned);
        self
    }

    /// Set the category for the transaction.
    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(str::to_owned);
        self
    }

    /// Set whether the transaction has been paid.
    pub fn paid(mut self, paid: bool) -> Self {
        self.paid = paid;
        self
    }

    /// Set the company the transaction belongs to.
    pub fn company_id(mut self, company_id: Option<CompanyId>) -> Self {
        self.company_id = company_id;
        self
    }

    /// Turn the builder into a complete [Transaction] ready to be written to
    /// the database.
    ///
    /// This is the creation hook and must be called exactly once, right before
    /// the insert. It generates the ID and stamps `created_at` with `now`.
    /// The effective `date` is converted to UTC but otherwise left alone.
    ///
    /// # Errors
    /// Returns a [ConstraintViolation::MissingField] if `date`, `amount`,
    /// `description` or `transaction_type` is absent, or the description is blank.
    pub fn prepare_for_insert(
        self,
        now: OffsetDateTime,
    ) -> Result<Transaction, ConstraintViolation> {
        let date = require(self.date, "date")?;
        let amount = require(self.amount, "amount")?;
        let description = require_text(self.description, "description")?;
        let transaction_type = require(self.transaction_type, "type")?;

        Ok(Transaction {
            id: DatabaseId::generate(),
            date: date.to_offset(UtcOffset::UTC),
            amount,
            description,
            transaction_type,
            payment_method: self.payment_method,
            bank_id: self.bank_id,
            category: self.category,
            paid: self.paid,
            company_id: self.company_id,
            created_at: now.to_offset(UtcOffset::UTC),
        })
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) const TRANSACTION_COLUMNS: &str = "id, date, amount, description, type, \
    payment_method, bank_id, category, paid, company_id, created_at";

/// Store a new transaction.
///
/// The builder goes through [TransactionBuilder::prepare_for_insert] with the
/// current time immediately before the insert.
///
/// # Errors
/// This function will return a:
/// - [Error::ConstraintViolation] if a required field is missing,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = builder.prepare_for_insert(OffsetDateTime::now_utc())?;

    connection.execute(
        &format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        (
            transaction.id,
            transaction.date,
            transaction.amount.to_string(),
            &transaction.description,
            transaction.transaction_type,
            &transaction.payment_method,
            &transaction.bank_id,
            &transaction.category,
            transaction.paid,
            transaction.company_id,
            transaction.created_at,
        ),
    )?;

    tracing::debug!(
        "created {} transaction {} for {}",
        transaction.transaction_type,
        transaction.id,
        transaction.amount
    );

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Overwrite the stored transaction with `transaction`.
///
/// Every field except `id` and `created_at` is written.
///
/// # Errors
/// This function will return a:
/// - [Error::ConstraintViolation] if the description is blank,
/// - [Error::UpdateMissingTransaction] if the transaction is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(transaction: &Transaction, connection: &Connection) -> Result<(), Error> {
    transaction.validate()?;

    let rows_affected = connection.execute(
        "UPDATE transactions SET
            date = ?1,
            amount = ?2,
            description = ?3,
            type = ?4,
            payment_method = ?5,
            bank_id = ?6,
            category = ?7,
            paid = ?8,
            company_id = ?9
        WHERE id = ?10",
        (
            transaction.date.to_offset(UtcOffset::UTC),
            transaction.amount.to_string(),
            transaction.description.trim(),
            transaction.transaction_type,
            &transaction.payment_method,
            &transaction.bank_id,
            &transaction.category,
            transaction.paid,
            transaction.company_id,
            transaction.id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Mark a transaction as paid or unpaid.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if the transaction is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_transaction_paid(
    id: TransactionId,
    paid: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE transactions SET paid = ?1 WHERE id = ?2",
        (paid, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM transactions;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// `company_id` is not a foreign key and may refer to a company that does not exist.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY NOT NULL,
                date TEXT NOT NULL,
                amount TEXT NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL,
                payment_method TEXT,
                bank_id TEXT,
                category TEXT,
                paid INTEGER NOT NULL DEFAULT 0,
                company_id TEXT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_company_date ON transactions(company_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let date = row.get(1)?;
    let raw_amount: String = row.get(2)?;
    let amount = raw_amount.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
    })?;
    let description = row.get(3)?;
    let transaction_type = row.get(4)?;
    let payment_method = row.get(5)?;
    let bank_id = row.get(6)?;
    let category = row.get(7)?;
    let paid = row.get(8)?;
    let company_id = row.get(9)?;
    let created_at = row.get(10)?;

    Ok(Transaction {
        id,
        date,
        amount,
        description,
        transaction_type,
        payment_method,
        bank_id,
        category,
        paid,
        company_id,
        created_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prepare_for_insert_tests {
    use rust_decimal::Decimal;
    use time::macros::datetime;

    use crate::ConstraintViolation;

    use super::{Transaction, TransactionBuilder, TransactionType};

    fn invoice() -> TransactionBuilder {
        Transaction::build(
            datetime!(2025-01-15 10:00 UTC),
            Decimal::new(10050, 2),
            "Invoice #1",
            TransactionType::Income,
        )
    }

    #[test]
    fn stamps_created_at_and_keeps_date() {
        let now = datetime!(2025-02-01 08:00 UTC);

        let transaction = invoice().prepare_for_insert(now).unwrap();

        assert_eq!(transaction.date, datetime!(2025-01-15 10:00 UTC));
        assert_eq!(transaction.created_at, now);
        assert_eq!(transaction.amount, Decimal::new(10050, 2));
        assert_eq!(transaction.description, "Invoice #1");
        assert_eq!(transaction.transaction_type, TransactionType::Income);
        assert!(!transaction.paid);
        assert_eq!(transaction.company_id, None);
    }

    #[test]
    fn fails_on_each_missing_required_field() {
        let now = datetime!(2025-02-01 08:00 UTC);
        let cases = [
            (
                TransactionBuilder {
                    date: None,
                    ..invoice()
                },
                "date",
            ),
            (
                TransactionBuilder {
                    amount: None,
                    ..invoice()
                },
                "amount",
            ),
            (
                TransactionBuilder {
                    description: None,
                    ..invoice()
                },
                "description",
            ),
            (
                TransactionBuilder {
                    description: Some("  ".to_owned()),
                    ..invoice()
                },
                "description",
            ),
            (
                TransactionBuilder {
                    transaction_type: None,
                    ..invoice()
                },
                "type",
            ),
        ];

        for (builder, field) in cases {
            assert_eq!(
                builder.prepare_for_insert(now),
                Err(ConstraintViolation::missing(field)),
                "want missing field {field}"
            );
        }
    }

    #[test]
    fn empty_builder_reports_date_first() {
        let result = TransactionBuilder::default().prepare_for_insert(datetime!(2025-02-01 08:00 UTC));

        assert_eq!(result, Err(ConstraintViolation::missing("date")));
    }
}
