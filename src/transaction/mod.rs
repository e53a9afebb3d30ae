//! Transaction management.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and updating transactions

mod core;
mod query;

pub use core::{
    Transaction, TransactionBuilder, TransactionType, count_transactions, create_transaction,
    create_transaction_table, get_transaction, map_transaction_row, set_transaction_paid,
    update_transaction,
};
pub use query::{SortOrder, TransactionQuery, get_company_transactions, get_transactions};
