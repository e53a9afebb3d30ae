//! Sets up the application's SQLite schema.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, company::create_company_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// Create all the tables for the application and enable foreign key checks.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
/// Returns an [Error::SqlError] if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_company_table(&transaction)?;
    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
