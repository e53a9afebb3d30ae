//! Core company domain types and the creation hook.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    ConstraintViolation, Error,
    database_id::{CompanyId, DatabaseId},
    error::require_text,
};

/// The permission labels understood by the application.
///
/// Companies may hold labels outside of this list, it is used by tooling that
/// needs to grant "everything".
pub const AVAILABLE_PERMISSIONS: [&str; 11] = [
    "dashboard",
    "transactions",
    "banks",
    "customers",
    "products",
    "services",
    "quotes",
    "reports",
    "payables",
    "receivables",
    "chart-accounts",
];

/// Where a company is in the registration process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    /// Registered and waiting for an administrator to review it.
    #[default]
    Pending,
    /// Reviewed and accepted by an administrator.
    Approved,
    /// Reviewed and turned down by an administrator.
    Rejected,
    /// In use.
    Active,
}

impl CompanyStatus {
    /// The name used to store the status in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Pending => "PENDING",
            CompanyStatus::Approved => "APPROVED",
            CompanyStatus::Rejected => "REJECTED",
            CompanyStatus::Active => "ACTIVE",
        }
    }
}

impl Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CompanyStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CompanyStatus::Pending),
            "APPROVED" => Ok(CompanyStatus::Approved),
            "REJECTED" => Ok(CompanyStatus::Rejected),
            "ACTIVE" => Ok(CompanyStatus::Active),
            _ => Err(Error::InvalidVariant {
                kind: "company status",
                value: s.to_owned(),
            }),
        }
    }
}

impl ToSql for CompanyStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CompanyStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// An organisation that uses the application, e.g. a small business and its
/// accounting details.
///
/// To create a new `Company`, use [Company::build] and pass the builder to
/// [create_company](crate::company::create_company).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// The ID of the company.
    pub id: CompanyId,
    /// The registered name of the company.
    pub name: String,
    /// The national registry number (CNPJ), unique across all companies.
    pub cnpj: String,
    /// The postal address of the company.
    pub address: Option<String>,
    /// The email address used to contact the company.
    pub main_email: String,
    /// An email address for sales enquiries.
    pub commercial_email: Option<String>,
    /// A contact phone number.
    pub phone: Option<String>,
    /// The ID of the accounting firm that manages the company.
    pub accounting_id: Option<String>,
    /// Whether the company may use the application.
    pub active: bool,
    /// When the company was first stored.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Where the company is in the registration process.
    pub status: CompanyStatus,
    /// The features the company has been granted access to.
    pub permissions: BTreeSet<String>,
}

impl Company {
    /// Create a new company.
    ///
    /// Shortcut for [CompanyBuilder] with the required fields set.
    pub fn build(name: &str, cnpj: &str, main_email: &str) -> CompanyBuilder {
        CompanyBuilder {
            name: Some(name.to_owned()),
            cnpj: Some(cnpj.to_owned()),
            main_email: Some(main_email.to_owned()),
            ..Default::default()
        }
    }

    /// Check that the required fields are still present after an edit.
    pub(crate) fn validate(&self) -> Result<(), ConstraintViolation> {
        let required_fields = [
            (&self.name, "name"),
            (&self.cnpj, "cnpj"),
            (&self.main_email, "main_email"),
        ];

        for (value, field) in required_fields {
            if value.trim().is_empty() {
                return Err(ConstraintViolation::missing(field));
            }
        }

        validate_permissions(&self.permissions)
    }
}

/// A company that has not been stored yet.
///
/// The required fields are optional here so that a partially filled in
/// company can be represented, [CompanyBuilder::prepare_for_insert] rejects
/// builders that are missing any of them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompanyBuilder {
    /// The registered name of the company. Required.
    pub name: Option<String>,
    /// The national registry number. Required and unique.
    pub cnpj: Option<String>,
    /// The postal address of the company.
    pub address: Option<String>,
    /// The email address used to contact the company. Required.
    pub main_email: Option<String>,
    /// An email address for sales enquiries.
    pub commercial_email: Option<String>,
    /// A contact phone number.
    pub phone: Option<String>,
    /// The ID of the accounting firm that manages the company.
    pub accounting_id: Option<String>,
    /// Whether the company may use the application, defaults to `false`.
    pub active: bool,
    /// Defaults to [CompanyStatus::Pending] when the company is stored.
    pub status: Option<CompanyStatus>,
    /// The features the company has been granted access to.
    pub permissions: BTreeSet<String>,
}

impl CompanyBuilder {
    /// Set the postal address.
    pub fn address(mut self, address: Option<&str>) -> Self {
        self.address = address.map(str::to_owned);
        self
    }

    /// Set the commercial email address.
    pub fn commercial_email(mut self, commercial_email: Option<&str>) -> Self {
        self.commercial_email = commercial_email.map(str::to_owned);
        self
    }

    /// Set the phone number.
    pub fn phone(mut self, phone: Option<&str>) -> Self {
        self.phone = phone.map(str::to_owned);
        self
    }

    /// Set the ID of the accounting firm.
    pub fn accounting_id(mut self, accounting_id: Option<&str>) -> Self {
        self.accounting_id = accounting_id.map(str::to_owned);
        self
    }

    /// Set whether the company is active.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set the registration status.
    pub fn status(mut self, status: CompanyStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the granted permissions.
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Turn the builder into a complete [Company] ready to be written to the
    /// database.
    ///
    /// This is the creation hook and must be called exactly once, right before
    /// the insert. It generates the ID, stamps `created_at` with `now` and
    /// defaults the status to [CompanyStatus::Pending].
    ///
    /// # Errors
    /// Returns a [ConstraintViolation::MissingField] if `name`, `cnpj` or
    /// `main_email` is absent or blank, or if a permission label is blank.
    pub fn prepare_for_insert(self, now: OffsetDateTime) -> Result<Company, ConstraintViolation> {
        let name = require_text(self.name, "name")?;
        let cnpj = require_text(self.cnpj, "cnpj")?;
        let main_email = require_text(self.main_email, "main_email")?;
        validate_permissions(&self.permissions)?;

        Ok(Company {
            id: DatabaseId::generate(),
            name,
            cnpj,
            address: self.address,
            main_email,
            commercial_email: self.commercial_email,
            phone: self.phone,
            accounting_id: self.accounting_id,
            active: self.active,
            created_at: now.to_offset(UtcOffset::UTC),
            status: self.status.unwrap_or_default(),
            permissions: self.permissions,
        })
    }
}

fn validate_permissions(permissions: &BTreeSet<String>) -> Result<(), ConstraintViolation> {
    if permissions.iter().any(|label| label.trim().is_empty()) {
        return Err(ConstraintViolation::missing("permission"));
    }

    Ok(())
}

#[cfg(test)]
mod company_status_tests {
    use crate::Error;

    use super::CompanyStatus;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("pending".parse(), Ok(CompanyStatus::Pending));
        assert_eq!("APPROVED".parse(), Ok(CompanyStatus::Approved));
        assert_eq!(" Rejected ".parse(), Ok(CompanyStatus::Rejected));
        assert_eq!("active".parse(), Ok(CompanyStatus::Active));
    }

    #[test]
    fn parse_fails_on_unknown_status() {
        let status = "archived".parse::<CompanyStatus>();

        assert_eq!(
            status,
            Err(Error::InvalidVariant {
                kind: "company status",
                value: "archived".to_owned()
            })
        );
    }

    #[test]
    fn defaults_to_pending() {
        assert_eq!(CompanyStatus::default(), CompanyStatus::Pending);
    }
}
