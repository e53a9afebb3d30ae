//! Filtered and sorted transaction queries.

use std::ops::RangeInclusive;

use rusqlite::{Connection, ToSql};
use time::{Date, Duration, OffsetDateTime};

use crate::{Error, database_id::CompanyId};

use super::core::{TRANSACTION_COLUMNS, Transaction, map_transaction_row};

/// Defines how transactions should be fetched from [get_transactions].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Only include transactions that belong to this company.
    pub company_id: Option<CompanyId>,
    /// Include transactions within `date_range` (inclusive), compared against
    /// the UTC date of the transaction.
    pub date_range: Option<RangeInclusive<Date>>,
    /// Only include paid (`true`) or unpaid (`false`) transactions.
    pub paid: Option<bool>,
    /// Selects up to the first N (`limit`) transactions.
    pub limit: Option<u64>,
    /// Orders transactions by date in the order `sort_date`. None returns transactions in the
    /// order they were created.
    pub sort_date: Option<SortOrder>,
}

/// The order to sort transactions in a [TransactionQuery].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort in order of increasing value.
    Ascending,
    /// Sort in order of decreasing value.
    Descending,
}

/// Retrieve transactions in the way defined by `query`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_transactions(
    query: TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut conditions = Vec::new();
    let mut parameters: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(company_id) = query.company_id {
        parameters.push(Box::new(company_id));
        conditions.push(format!("company_id = ?{}", parameters.len()));
    }

    if let Some(date_range) = query.date_range {
        let start = date_range.start().midnight().assume_utc();
        let end = end_of_day(*date_range.end());

        parameters.push(Box::new(start));
        conditions.push(format!("date >= ?{}", parameters.len()));
        parameters.push(Box::new(end));
        conditions.push(format!("date < ?{}", parameters.len()));
    }

    if let Some(paid) = query.paid {
        parameters.push(Box::new(paid));
        conditions.push(format!("paid = ?{}", parameters.len()));
    }

    let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions");

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    // Break ties on creation time and then ID to keep the order stable after updates.
    match query.sort_date {
        Some(SortOrder::Ascending) => sql.push_str(" ORDER BY date ASC, created_at ASC, id ASC"),
        Some(SortOrder::Descending) => {
            sql.push_str(" ORDER BY date DESC, created_at ASC, id ASC")
        }
        None => sql.push_str(" ORDER BY created_at ASC, id ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    connection
        .prepare(&sql)?
        .query_map(
            rusqlite::params_from_iter(parameters.iter()),
            map_transaction_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

/// Retrieve every transaction of a company, most recent date first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_company_transactions(
    company_id: CompanyId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    get_transactions(
        TransactionQuery {
            company_id: Some(company_id),
            sort_date: Some(SortOrder::Descending),
            ..Default::default()
        },
        connection,
    )
}

/// The first instant after `date` in UTC.
fn end_of_day(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc() + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::{OffsetDateTime, macros::{date, datetime}};

    use crate::{
        database_id::{CompanyId, DatabaseId},
        db::initialize,
        transaction::{Transaction, TransactionType, create_transaction},
    };

    use super::{SortOrder, TransactionQuery, get_company_transactions, get_transactions};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn insert(
        date: OffsetDateTime,
        description: &str,
        paid: bool,
        company_id: Option<CompanyId>,
        conn: &Connection,
    ) -> Transaction {
        create_transaction(
            Transaction::build(date, Decimal::ONE, description, TransactionType::Expense)
                .paid(paid)
                .company_id(company_id),
            conn,
        )
        .expect("Could not create transaction")
    }

    #[test]
    fn date_range_is_inclusive_of_both_ends() {
        let conn = get_test_connection();
        insert(datetime!(2024-12-31 23:59 UTC), "before", false, None, &conn);
        let first = insert(datetime!(2025-01-01 00:00 UTC), "first", false, None, &conn);
        let last = insert(datetime!(2025-01-31 23:59 UTC), "last", false, None, &conn);
        insert(datetime!(2025-02-01 00:00 UTC), "after", false, None, &conn);

        let got = get_transactions(
            TransactionQuery {
                date_range: Some(date!(2025 - 01 - 01)..=date!(2025 - 01 - 31)),
                sort_date: Some(SortOrder::Ascending),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(got, vec![first, last]);
    }

    #[test]
    fn sort_by_date_descending() {
        let conn = get_test_connection();
        let oldest = insert(datetime!(2025-01-01 12:00 UTC), "oldest", false, None, &conn);
        let newest = insert(datetime!(2025-03-01 12:00 UTC), "newest", false, None, &conn);
        let middle = insert(datetime!(2025-02-01 12:00 UTC), "middle", false, None, &conn);

        let got = get_transactions(
            TransactionQuery {
                sort_date: Some(SortOrder::Descending),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(got, vec![newest, middle, oldest]);
    }

    #[test]
    fn limit_caps_number_of_results() {
        let conn = get_test_connection();
        for day in 1..=5 {
            insert(
                datetime!(2025-01-01 12:00 UTC) + time::Duration::days(day),
                "expense",
                false,
                None,
                &conn,
            );
        }

        let got = get_transactions(
            TransactionQuery {
                limit: Some(3),
                sort_date: Some(SortOrder::Ascending),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(got.len(), 3);
        assert_eq!(got[0].date, datetime!(2025-01-02 12:00 UTC));
    }

    #[test]
    fn filters_by_paid_and_company() {
        let conn = get_test_connection();
        let company_id = DatabaseId::generate();
        let want = insert(datetime!(2025-01-01 12:00 UTC), "paid", true, Some(company_id), &conn);
        insert(datetime!(2025-01-02 12:00 UTC), "unpaid", false, Some(company_id), &conn);
        insert(datetime!(2025-01-03 12:00 UTC), "other", true, Some(DatabaseId::generate()), &conn);
        insert(datetime!(2025-01-04 12:00 UTC), "none", true, None, &conn);

        let got = get_transactions(
            TransactionQuery {
                company_id: Some(company_id),
                paid: Some(true),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(got, vec![want]);
    }

    #[test]
    fn company_transactions_are_newest_first() {
        let conn = get_test_connection();
        let company_id = DatabaseId::generate();
        let older = insert(datetime!(2025-01-01 12:00 UTC), "older", false, Some(company_id), &conn);
        let newer = insert(datetime!(2025-01-05 12:00 UTC), "newer", true, Some(company_id), &conn);
        insert(datetime!(2025-01-03 12:00 UTC), "unrelated", false, None, &conn);

        let got = get_company_transactions(company_id, &conn).unwrap();

        assert_eq!(got, vec![newer, older]);
    }

    #[test]
    fn returns_empty_vec_when_nothing_matches() {
        let conn = get_test_connection();

        let got = get_company_transactions(DatabaseId::generate(), &conn).unwrap();

        assert!(got.is_empty());
    }
}
