//! Code for creating the user table and fetching users from the database.
//!
//! Users are stored so that a company's members can be looked up. Passwords and
//! sessions are handled by whichever service sits in front of the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    ConstraintViolation, Error,
    database_id::{CompanyId, DatabaseId, UserId},
    error::require_text,
};

/// What a user is allowed to do in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Manages every company.
    Admin,
    /// The owner account of a company.
    Company,
    /// An accountant serving one or more companies.
    Accountant,
    /// An employee of a company.
    CompanyUser,
}

impl UserRole {
    /// The name used to store the role in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Company => "COMPANY",
            UserRole::Accountant => "ACCOUNTANT",
            UserRole::CompanyUser => "COMPANY_USER",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "COMPANY" => Ok(UserRole::Company),
            "ACCOUNTANT" => Ok(UserRole::Accountant),
            "COMPANY_USER" => Ok(UserRole::CompanyUser),
            _ => Err(Error::InvalidVariant {
                kind: "user role",
                value: s.to_owned(),
            }),
        }
    }
}

impl ToSql for UserRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The user's display name.
    pub name: String,
    /// The user's email address, unique across all users.
    pub email: String,
    /// What the user is allowed to do.
    pub role: UserRole,
    /// The company the user belongs to, if any.
    pub company_id: Option<CompanyId>,
    /// When the user was first stored.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to create a [User].
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// What the user is allowed to do.
    pub role: UserRole,
    /// The company the user belongs to, if any.
    pub company_id: Option<CompanyId>,
}

impl NewUser {
    /// Turn the new user into a complete [User], generating the ID and
    /// setting `created_at` to `now`.
    ///
    /// # Errors
    /// Returns a [ConstraintViolation::MissingField] if the name or email is blank.
    pub fn prepare_for_insert(self, now: OffsetDateTime) -> Result<User, ConstraintViolation> {
        Ok(User {
            id: DatabaseId::generate(),
            name: require_text(Some(self.name), "name")?,
            email: require_text(Some(self.email), "email")?,
            role: self.role,
            company_id: self.company_id,
            created_at: now.to_offset(UtcOffset::UTC),
        })
    }
}

/// Create the user table.
///
/// Must be created after the company table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                company_id TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(company_id) REFERENCES companies(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_company ON users(company_id);",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// This function will return a:
/// - [Error::ConstraintViolation] if the name or email is blank, the email is
///   already taken, or `company_id` does not refer to a stored company,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let user = new_user.prepare_for_insert(OffsetDateTime::now_utc())?;

    connection.execute(
        "INSERT INTO users (id, name, email, role, company_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            user.id,
            &user.name,
            &user.email,
            user.role,
            user.company_id,
            user.created_at,
        ),
    )?;

    tracing::debug!("created {} user {}", user.role, user.id);

    Ok(user)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, role, company_id, created_at FROM users WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the users that belong to the company `company_id`, oldest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_company_users(company_id: CompanyId, connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, name, email, role, company_id, created_at FROM users
            WHERE company_id = :company_id
            ORDER BY created_at ASC, id ASC",
        )?
        .query_map(&[(":company_id", &company_id)], map_user_row)?
        .map(|user_result| user_result.map_err(Error::from))
        .collect()
}

/// Get the number of users that belong to the company `company_id`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_company_users(company_id: CompanyId, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM users WHERE company_id = ?1;",
            [company_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        company_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}
