//! Database operations for companies and their permissions.

use std::collections::BTreeSet;

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    company::{Company, CompanyBuilder, CompanyStatus},
    database_id::CompanyId,
};

const COMPANY_COLUMNS: &str = "id, name, cnpj, address, main_email, commercial_email, phone, \
    accounting_id, active, created_at, status";

/// Create the company table and the table holding each company's permissions.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn create_company_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            cnpj TEXT NOT NULL UNIQUE,
            address TEXT,
            main_email TEXT NOT NULL,
            commercial_email TEXT,
            phone TEXT,
            accounting_id TEXT,
            active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS company_permissions (
            company_id TEXT NOT NULL,
            permission TEXT NOT NULL,
            PRIMARY KEY (company_id, permission),
            FOREIGN KEY(company_id) REFERENCES companies(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_companies_status ON companies(status);",
    )?;

    Ok(())
}

/// Store a new company.
///
/// The builder goes through [CompanyBuilder::prepare_for_insert] with the
/// current time immediately before the insert, so the returned company has
/// its ID, `created_at` and status filled in.
///
/// # Errors
/// This function will return a:
/// - [Error::ConstraintViolation] if a required field is missing or the CNPJ
///   is already used by another company,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_company(builder: CompanyBuilder, connection: &Connection) -> Result<Company, Error> {
    let company = builder.prepare_for_insert(OffsetDateTime::now_utc())?;

    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        &format!(
            "INSERT INTO companies ({COMPANY_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        (
            company.id,
            &company.name,
            &company.cnpj,
            &company.address,
            &company.main_email,
            &company.commercial_email,
            &company.phone,
            &company.accounting_id,
            company.active,
            company.created_at,
            company.status,
        ),
    )?;
    insert_permissions(company.id, &company.permissions, &transaction)?;

    transaction.commit()?;

    tracing::debug!(
        "created company {} with CNPJ {} and status {}",
        company.id,
        company.cnpj,
        company.status
    );

    Ok(company)
}

/// Retrieve a company by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid company,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_company(id: CompanyId, connection: &Connection) -> Result<Company, Error> {
    let mut company = connection
        .prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_company_row)?;

    company.permissions = get_company_permissions(company.id, connection)?;

    Ok(company)
}

/// Retrieve a company by its CNPJ.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if no company has the CNPJ `cnpj`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_company_by_cnpj(cnpj: &str, connection: &Connection) -> Result<Company, Error> {
    let mut company = connection
        .prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE cnpj = :cnpj"
        ))?
        .query_row(&[(":cnpj", cnpj.trim())], map_company_row)?;

    company.permissions = get_company_permissions(company.id, connection)?;

    Ok(company)
}

/// Retrieve companies in the order they were created, optionally only those
/// with the given `status`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_companies(
    status: Option<CompanyStatus>,
    connection: &Connection,
) -> Result<Vec<Company>, Error> {
    let companies: Vec<Company> = match status {
        Some(status) => connection
            .prepare(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE status = ?1 \
                ORDER BY created_at ASC, id ASC"
            ))?
            .query_map([status], map_company_row)?
            .collect::<Result<_, _>>()?,
        None => connection
            .prepare(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY created_at ASC, id ASC"
            ))?
            .query_map([], map_company_row)?
            .collect::<Result<_, _>>()?,
    };

    companies
        .into_iter()
        .map(|mut company| {
            company.permissions = get_company_permissions(company.id, connection)?;
            Ok(company)
        })
        .collect()
}

/// Overwrite the stored company with `company`.
///
/// Every field except `id` and `created_at` is written, including the
/// permission set.
///
/// # Errors
/// This function will return a:
/// - [Error::ConstraintViolation] if a required field is blank or the CNPJ
///   is already used by another company,
/// - [Error::UpdateMissingCompany] if the company is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_company(company: &Company, connection: &Connection) -> Result<(), Error> {
    company.validate()?;

    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction.execute(
        "UPDATE companies SET
            name = ?1,
            cnpj = ?2,
            address = ?3,
            main_email = ?4,
            commercial_email = ?5,
            phone = ?6,
            accounting_id = ?7,
            active = ?8,
            status = ?9
        WHERE id = ?10",
        (
            company.name.trim(),
            company.cnpj.trim(),
            &company.address,
            company.main_email.trim(),
            &company.commercial_email,
            &company.phone,
            &company.accounting_id,
            company.active,
            company.status,
            company.id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCompany);
    }

    replace_permissions(company.id, &company.permissions, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// Mark a company as approved and activate it.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingCompany] if the company is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn approve_company(id: CompanyId, connection: &Connection) -> Result<Company, Error> {
    set_status(id, CompanyStatus::Approved, true, connection)
}

/// Mark a company as rejected and deactivate it.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingCompany] if the company is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn reject_company(id: CompanyId, connection: &Connection) -> Result<Company, Error> {
    set_status(id, CompanyStatus::Rejected, false, connection)
}

fn set_status(
    id: CompanyId,
    status: CompanyStatus,
    active: bool,
    connection: &Connection,
) -> Result<Company, Error> {
    let rows_affected = connection.execute(
        "UPDATE companies SET status = ?1, active = ?2 WHERE id = ?3",
        (status, active, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCompany);
    }

    tracing::debug!("set status of company {id} to {status}");

    get_company(id, connection)
}

/// Replace the permissions granted to a company.
///
/// # Errors
/// This function will return a:
/// - [Error::ConstraintViolation] if a permission label is blank,
/// - [Error::UpdateMissingCompany] if the company is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_company_permissions(
    id: CompanyId,
    permissions: &BTreeSet<String>,
    connection: &Connection,
) -> Result<(), Error> {
    let mut company = get_company(id, connection).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingCompany,
        error => error,
    })?;
    company.permissions = permissions.clone();
    company.validate()?;

    let transaction = connection.unchecked_transaction()?;
    replace_permissions(id, permissions, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// Retrieve the permissions granted to a company.
///
/// An empty set is returned for unknown companies.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_company_permissions(
    id: CompanyId,
    connection: &Connection,
) -> Result<BTreeSet<String>, Error> {
    connection
        .prepare("SELECT permission FROM company_permissions WHERE company_id = :company_id")?
        .query_map(&[(":company_id", &id)], |row| row.get(0))?
        .map(|maybe_permission| maybe_permission.map_err(|error| error.into()))
        .collect()
}

/// Get the total number of companies in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_companies(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM companies;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn insert_permissions(
    id: CompanyId,
    permissions: &BTreeSet<String>,
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO company_permissions (company_id, permission) VALUES (?1, ?2)",
    )?;

    for permission in permissions {
        statement.execute((id, permission.trim()))?;
    }

    Ok(())
}

fn replace_permissions(
    id: CompanyId,
    permissions: &BTreeSet<String>,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM company_permissions WHERE company_id = ?1",
        (id,),
    )?;

    insert_permissions(id, permissions, connection)
}

/// Map a database row to a [Company].
///
/// The permissions are stored in a separate table and are left empty.
pub fn map_company_row(row: &Row) -> Result<Company, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let cnpj = row.get(2)?;
    let address = row.get(3)?;
    let main_email = row.get(4)?;
    let commercial_email = row.get(5)?;
    let phone = row.get(6)?;
    let accounting_id = row.get(7)?;
    let active = row.get(8)?;
    let created_at = row.get(9)?;
    let status = row.get(10)?;

    Ok(Company {
        id,
        name,
        cnpj,
        address,
        main_email,
        commercial_email,
        phone,
        accounting_id,
        active,
        created_at,
        status,
        permissions: BTreeSet::new(),
    })
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_company_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_company_table(&connection));
    }

    #[test]
    fn can_be_called_twice() {
        let connection = Connection::open_in_memory().unwrap();
        create_company_table(&connection).unwrap();

        assert_eq!(Ok(()), create_company_table(&connection));
    }
}

#[cfg(test)]
mod company_query_tests {
    use std::collections::BTreeSet;

    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        ConstraintViolation, Error,
        company::{Company, CompanyBuilder, CompanyStatus},
        database_id::DatabaseId,
        db::initialize,
    };

    use super::{
        approve_company, count_companies, create_company, get_companies, get_company,
        get_company_by_cnpj, get_company_permissions, reject_company, set_company_permissions,
        update_company,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn acme() -> CompanyBuilder {
        Company::build("Acme", "12345678900199", "a@acme.com")
    }

    #[test]
    fn create_company_fills_in_defaults() {
        let connection = get_test_connection();
        let before = OffsetDateTime::now_utc();

        let company = create_company(acme(), &connection).expect("Could not create company");

        let after = OffsetDateTime::now_utc();
        assert_eq!(company.name, "Acme");
        assert_eq!(company.cnpj, "12345678900199");
        assert_eq!(company.main_email, "a@acme.com");
        assert_eq!(company.status, CompanyStatus::Pending);
        assert!(!company.active);
        assert!(
            before <= company.created_at && company.created_at <= after,
            "created_at {} should be between {before} and {after}",
            company.created_at
        );
    }

    #[test]
    fn create_company_keeps_optional_fields() {
        let connection = get_test_connection();
        let builder = acme()
            .address(Some("Rua das Flores, 123"))
            .commercial_email(Some("vendas@acme.com"))
            .phone(Some("+55 11 5555-0000"))
            .accounting_id(Some("contabil-42"))
            .active(true)
            .status(CompanyStatus::Active)
            .permissions(["dashboard", "reports"]);

        let company = create_company(builder, &connection).unwrap();

        let got = get_company(company.id, &connection).unwrap();
        assert_eq!(got, company);
        assert_eq!(got.address.as_deref(), Some("Rua das Flores, 123"));
        assert_eq!(got.commercial_email.as_deref(), Some("vendas@acme.com"));
        assert_eq!(got.phone.as_deref(), Some("+55 11 5555-0000"));
        assert_eq!(got.accounting_id.as_deref(), Some("contabil-42"));
        assert!(got.active);
        assert_eq!(got.status, CompanyStatus::Active);
        assert_eq!(
            got.permissions,
            BTreeSet::from(["dashboard".to_owned(), "reports".to_owned()])
        );
    }

    #[test]
    fn create_company_fails_on_duplicate_cnpj() {
        let connection = get_test_connection();
        create_company(acme(), &connection).expect("Could not create company");

        let duplicate = create_company(
            Company::build("Acme Two", "12345678900199", "b@acme.com"),
            &connection,
        );

        assert_eq!(
            duplicate,
            Err(Error::ConstraintViolation(ConstraintViolation::duplicate(
                "cnpj"
            )))
        );
        assert_eq!(count_companies(&connection), Ok(1));
    }

    #[test]
    fn create_company_fails_on_missing_required_fields() {
        let connection = get_test_connection();
        let cases = [
            (
                CompanyBuilder {
                    name: None,
                    ..acme()
                },
                "name",
            ),
            (
                CompanyBuilder {
                    cnpj: None,
                    ..acme()
                },
                "cnpj",
            ),
            (
                CompanyBuilder {
                    main_email: Some(String::new()),
                    ..acme()
                },
                "main_email",
            ),
        ];

        for (builder, field) in cases {
            let result = create_company(builder, &connection);

            assert_eq!(
                result,
                Err(Error::ConstraintViolation(ConstraintViolation::missing(
                    field
                )))
            );
        }

        assert_eq!(count_companies(&connection), Ok(0));
    }

    #[test]
    fn get_company_fails_on_unknown_id() {
        let connection = get_test_connection();
        create_company(acme(), &connection).unwrap();

        let result = get_company(DatabaseId::generate(), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_company_by_cnpj_succeeds() {
        let connection = get_test_connection();
        let company = create_company(acme(), &connection).unwrap();

        let got = get_company_by_cnpj("12345678900199", &connection);

        assert_eq!(got, Ok(company));
    }

    #[test]
    fn get_companies_filters_by_status() {
        let connection = get_test_connection();
        let pending = create_company(acme(), &connection).unwrap();
        let approved = create_company(
            Company::build("Beta", "98765432100155", "b@beta.com").status(CompanyStatus::Approved),
            &connection,
        )
        .unwrap();

        let all = get_companies(None, &connection).unwrap();
        let only_pending = get_companies(Some(CompanyStatus::Pending), &connection).unwrap();
        let only_approved = get_companies(Some(CompanyStatus::Approved), &connection).unwrap();

        assert_eq!(all.len(), 2, "got {} companies, want 2", all.len());
        assert!(all.contains(&pending));
        assert!(all.contains(&approved));
        assert_eq!(only_pending, vec![pending]);
        assert_eq!(only_approved, vec![approved]);
    }

    #[test]
    fn update_company_keeps_id_and_created_at() {
        let connection = get_test_connection();
        let company = create_company(acme(), &connection).unwrap();
        let mut edited = company.clone();
        edited.name = "Acme Ltda".to_owned();
        edited.phone = Some("+55 11 5555-1111".to_owned());
        edited.permissions = BTreeSet::from(["quotes".to_owned()]);
        edited.created_at = OffsetDateTime::UNIX_EPOCH;

        update_company(&edited, &connection).expect("Could not update company");

        let got = get_company(company.id, &connection).unwrap();
        assert_eq!(got.name, "Acme Ltda");
        assert_eq!(got.phone.as_deref(), Some("+55 11 5555-1111"));
        assert_eq!(got.permissions, edited.permissions);
        assert_eq!(got.created_at, company.created_at);
    }

    #[test]
    fn update_company_fails_on_blank_name() {
        let connection = get_test_connection();
        let mut company = create_company(acme(), &connection).unwrap();
        company.name = " ".to_owned();

        let result = update_company(&company, &connection);

        assert_eq!(
            result,
            Err(Error::ConstraintViolation(ConstraintViolation::missing(
                "name"
            )))
        );
    }

    #[test]
    fn update_company_fails_on_duplicate_cnpj() {
        let connection = get_test_connection();
        create_company(acme(), &connection).unwrap();
        let mut other =
            create_company(Company::build("Beta", "98765432100155", "b@beta.com"), &connection)
                .unwrap();
        other.cnpj = "12345678900199".to_owned();

        let result = update_company(&other, &connection);

        assert_eq!(
            result,
            Err(Error::ConstraintViolation(ConstraintViolation::duplicate(
                "cnpj"
            )))
        );
    }

    #[test]
    fn update_company_fails_on_missing_company() {
        let connection = get_test_connection();
        let company = acme()
            .prepare_for_insert(OffsetDateTime::now_utc())
            .unwrap();

        let result = update_company(&company, &connection);

        assert_eq!(result, Err(Error::UpdateMissingCompany));
    }

    #[test]
    fn approve_company_activates_it() {
        let connection = get_test_connection();
        let company = create_company(acme(), &connection).unwrap();

        let approved = approve_company(company.id, &connection).unwrap();

        assert_eq!(approved.status, CompanyStatus::Approved);
        assert!(approved.active);
        assert_eq!(approved.created_at, company.created_at);
    }

    #[test]
    fn reject_company_deactivates_it() {
        let connection = get_test_connection();
        let company = create_company(acme().active(true), &connection).unwrap();

        let rejected = reject_company(company.id, &connection).unwrap();

        assert_eq!(rejected.status, CompanyStatus::Rejected);
        assert!(!rejected.active);
    }

    #[test]
    fn approve_fails_on_missing_company() {
        let connection = get_test_connection();

        let result = approve_company(DatabaseId::generate(), &connection);

        assert_eq!(result, Err(Error::UpdateMissingCompany));
    }

    #[test]
    fn set_company_permissions_replaces_existing() {
        let connection = get_test_connection();
        let company =
            create_company(acme().permissions(["dashboard", "banks"]), &connection).unwrap();
        let want = BTreeSet::from(["reports".to_owned(), "quotes".to_owned()]);

        set_company_permissions(company.id, &want, &connection).unwrap();

        assert_eq!(get_company_permissions(company.id, &connection), Ok(want));
    }

    #[test]
    fn set_company_permissions_fails_on_missing_company() {
        let connection = get_test_connection();

        let result = set_company_permissions(
            DatabaseId::generate(),
            &BTreeSet::from(["reports".to_owned()]),
            &connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingCompany));
    }

    #[test]
    fn get_count() {
        let connection = get_test_connection();
        let want_count = 5;
        for i in 0..want_count {
            create_company(
                Company::build(&format!("Company #{i}"), &format!("cnpj-{i}"), "x@y.com"),
                &connection,
            )
            .expect("Could not create company");
        }

        let got_count = count_companies(&connection).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }
}
