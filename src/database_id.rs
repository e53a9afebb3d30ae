//! Database ID type definition.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// An opaque, randomly generated identifier for a database record.
///
/// IDs are stored as hyphenated UUID strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseId(Uuid);

impl DatabaseId {
    /// Generate a new random ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for DatabaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DatabaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_owned()))
    }
}

impl ToSql for DatabaseId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for DatabaseId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Uuid::parse_str(text)
            .map(Self)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Database identifier for a company.
pub type CompanyId = DatabaseId;
/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;
/// Database identifier for a user.
pub type UserId = DatabaseId;

#[cfg(test)]
mod database_id_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::DatabaseId;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(DatabaseId::generate(), DatabaseId::generate());
    }

    #[test]
    fn parses_from_display_string() {
        let id = DatabaseId::generate();

        let parsed = id.to_string().parse::<DatabaseId>();

        assert_eq!(parsed, Ok(id));
    }

    #[test]
    fn parse_fails_on_garbage() {
        let parsed = "not-an-id".parse::<DatabaseId>();

        assert_eq!(parsed, Err(Error::InvalidId("not-an-id".to_owned())));
    }

    #[test]
    fn round_trips_through_sqlite() {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute("CREATE TABLE thing (id TEXT PRIMARY KEY NOT NULL)", ())
            .unwrap();
        let id = DatabaseId::generate();

        connection
            .execute("INSERT INTO thing (id) VALUES (?1)", (id,))
            .unwrap();
        let got: DatabaseId = connection
            .query_row("SELECT id FROM thing", [], |row| row.get(0))
            .unwrap();

        assert_eq!(got, id);
    }
}
