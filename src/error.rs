//! Defines the crate level error type and the mapping from SQLite failures.

use std::fmt::Display;

/// The errors that may occur when creating, reading or updating records.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A record broke one of the schema constraints and was not persisted.
    #[error("constraint violation: {0}")]
    ConstraintViolation(ConstraintViolation),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A string could not be parsed as a record ID.
    #[error("\"{0}\" is not a valid ID")]
    InvalidId(String),

    /// A string did not name one of the values of an enumeration such as a
    /// company status or transaction type.
    #[error("\"{value}\" is not a valid {kind}")]
    InvalidVariant {
        /// The name of the enumeration.
        kind: &'static str,
        /// The string that failed to parse.
        value: String,
    },

    /// Tried to update a company that does not exist
    #[error("tried to update a company that is not in the database")]
    UpdateMissingCompany,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// The export files could not be written.
    #[error("could not export company data: {0}")]
    ExportError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

/// The schema constraint that a record failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// A required field was absent or blank.
    MissingField(String),

    /// A field that must be unique has the same value as an existing record.
    Duplicate(String),

    /// A foreign key referred to a record that does not exist.
    InvalidReference,
}

impl ConstraintViolation {
    /// Shortcut for a missing required `field`.
    pub fn missing(field: &str) -> Self {
        Self::MissingField(field.to_owned())
    }

    /// Shortcut for a duplicate value in the unique column `field`.
    pub fn duplicate(field: &str) -> Self {
        Self::Duplicate(field.to_owned())
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "the required field \"{field}\" is missing"),
            Self::Duplicate(field) => {
                write!(f, "the value for \"{field}\" already exists in the database")
            }
            Self::InvalidReference => write!(f, "a referenced record does not exist"),
        }
    }
}

/// Check that a required text field is present and not blank.
///
/// Returns the trimmed text.
pub(crate) fn require_text(
    value: Option<String>,
    field: &str,
) -> Result<String, ConstraintViolation> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
        _ => Err(ConstraintViolation::missing(field)),
    }
}

/// Check that a required non-text field is present.
pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T, ConstraintViolation> {
    value.ok_or_else(|| ConstraintViolation::missing(field))
}

impl From<ConstraintViolation> for Error {
    fn from(value: ConstraintViolation) -> Self {
        Error::ConstraintViolation(value)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) => ConstraintViolation::Duplicate(constrained_column(desc)).into(),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL,
                },
                Some(ref desc),
            ) => ConstraintViolation::MissingField(constrained_column(desc)).into(),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => ConstraintViolation::InvalidReference.into(),
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// Extract the column name from a SQLite constraint message such as
/// "UNIQUE constraint failed: companies.cnpj".
fn constrained_column(description: &str) -> String {
    let qualified_name = description
        .rsplit_once(": ")
        .map_or(description, |(_, columns)| columns);

    // Composite constraints list every column, the first one is enough to identify it.
    let first_column = qualified_name
        .split(", ")
        .next()
        .unwrap_or(qualified_name);

    first_column
        .rsplit_once('.')
        .map_or(first_column, |(_, column)| column)
        .to_owned()
}
