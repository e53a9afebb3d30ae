//! Exports a company's transactions and a summary of its data to files.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    company::get_company,
    database_id::CompanyId,
    transaction::{Transaction, TransactionType, get_company_transactions},
    user::count_company_users,
};

/// The overview written alongside the exported transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// The name of the exported company.
    pub company_name: String,
    /// The CNPJ of the exported company.
    pub cnpj: String,
    /// When the export was made.
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    /// How many transactions were exported.
    pub transaction_count: usize,
    /// How many users belong to the company.
    pub user_count: u32,
    /// The sum of all income transactions.
    pub total_income: Decimal,
    /// The sum of all expense transactions.
    pub total_expenses: Decimal,
}

/// The files written by [export_company_data].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFiles {
    /// The CSV file with one row per transaction.
    pub transactions_path: PathBuf,
    /// The JSON file holding the [ExportSummary].
    pub summary_path: PathBuf,
    /// The summary that was written.
    pub summary: ExportSummary,
}

/// A row of the transactions CSV file.
#[derive(Debug, Serialize)]
struct TransactionRecord<'a> {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Type")]
    transaction_type: &'static str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Status")]
    status: &'static str,
}

impl<'a> TransactionRecord<'a> {
    fn new(transaction: &'a Transaction, exported_at: OffsetDateTime) -> Self {
        Self {
            id: transaction.id.to_string(),
            date: transaction
                .date
                .to_offset(exported_at.offset())
                .date()
                .to_string(),
            description: &transaction.description,
            amount: transaction.amount.to_string(),
            transaction_type: transaction.transaction_type.as_str(),
            category: transaction.category.as_deref().unwrap_or_default(),
            status: if transaction.paid { "Paid" } else { "Pending" },
        }
    }
}

/// Write the transactions and a summary of the company `company_id` to `output_dir`.
///
/// Two files are created, named after the company's CNPJ and the date of
/// `exported_at`:
/// - `<cnpj>_transactions_<YYYY-MM-DD>.csv`
/// - `<cnpj>_export_summary_<YYYY-MM-DD>.json`
///
/// Only the ASCII letters and digits of the CNPJ are used in the file names,
/// so a formatted CNPJ such as `12.345.678/0001-90` becomes `12345678000190`.
/// Transaction dates in the CSV are given in the offset of `exported_at`.
/// `output_dir` is created if it does not exist and existing files are overwritten.
///
/// The summary is built before anything is written. If the summary file cannot
/// be written, the transactions CSV is removed again so no half export is left behind.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `company_id` does not refer to a stored company,
/// - [Error::ExportError] if the CNPJ has no letters or digits, or the files
///   could not be written,
/// - [Error::JSONSerializationError] if the summary could not be serialized,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn export_company_data(
    company_id: CompanyId,
    output_dir: &Path,
    exported_at: OffsetDateTime,
    connection: &Connection,
) -> Result<ExportFiles, Error> {
    let company = get_company(company_id, connection)?;
    let transactions = get_company_transactions(company_id, connection)?;
    let user_count = count_company_users(company_id, connection)?;

    let file_stem = file_name_cnpj(&company.cnpj)?;
    let summary = summarize(
        company.name,
        company.cnpj,
        exported_at,
        &transactions,
        user_count,
    );

    fs::create_dir_all(output_dir).map_err(|error| {
        Error::ExportError(format!(
            "could not create {}: {error}",
            output_dir.display()
        ))
    })?;

    let export_date = exported_at.date();
    let transactions_path =
        output_dir.join(format!("{file_stem}_transactions_{export_date}.csv"));
    let summary_path =
        output_dir.join(format!("{file_stem}_export_summary_{export_date}.json"));

    write_transactions(&transactions, exported_at, &transactions_path)?;

    if let Err(error) = write_summary(&summary, &summary_path) {
        if let Err(remove_error) = fs::remove_file(&transactions_path) {
            tracing::warn!(
                "could not remove {} after a failed export: {remove_error}",
                transactions_path.display()
            );
        }

        return Err(error);
    }

    tracing::info!(
        "exported {} transactions for company {} to {}",
        summary.transaction_count,
        company_id,
        output_dir.display()
    );

    Ok(ExportFiles {
        transactions_path,
        summary_path,
        summary,
    })
}

fn write_transactions(
    transactions: &[Transaction],
    exported_at: OffsetDateTime,
    path: &Path,
) -> Result<(), Error> {
    let to_export_error = |error: csv::Error| {
        Error::ExportError(format!("could not write {}: {error}", path.display()))
    };

    let mut writer = csv::Writer::from_path(path).map_err(to_export_error)?;

    if transactions.is_empty() {
        // Serializing writes the header with the first record, so write it by hand.
        writer
            .write_record([
                "ID",
                "Date",
                "Description",
                "Amount",
                "Type",
                "Category",
                "Status",
            ])
            .map_err(to_export_error)?;
    }

    for transaction in transactions {
        writer
            .serialize(TransactionRecord::new(transaction, exported_at))
            .map_err(to_export_error)?;
    }

    writer.flush().map_err(|error| {
        Error::ExportError(format!("could not write {}: {error}", path.display()))
    })
}

fn summarize(
    company_name: String,
    cnpj: String,
    exported_at: OffsetDateTime,
    transactions: &[Transaction],
    user_count: u32,
) -> ExportSummary {
    let total_for = |transaction_type: TransactionType| -> Decimal {
        transactions
            .iter()
            .filter(|transaction| transaction.transaction_type == transaction_type)
            .map(|transaction| transaction.amount)
            .sum()
    };

    ExportSummary {
        company_name,
        cnpj,
        exported_at,
        transaction_count: transactions.len(),
        user_count,
        total_income: total_for(TransactionType::Income),
        total_expenses: total_for(TransactionType::Expense),
    }
}

fn write_summary(summary: &ExportSummary, path: &Path) -> Result<(), Error> {
    let to_export_error = |error: std::io::Error| {
        Error::ExportError(format!("could not write {}: {error}", path.display()))
    };

    let file = File::create(path).map_err(to_export_error)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, summary).map_err(|error| {
        if error.is_io() {
            Error::ExportError(format!("could not write {}: {error}", path.display()))
        } else {
            Error::JSONSerializationError(error.to_string())
        }
    })?;

    writer.flush().map_err(to_export_error)
}

/// The CNPJ reduced to ASCII letters and digits, safe to use in a file name.
fn file_name_cnpj(cnpj: &str) -> Result<String, Error> {
    let file_stem: String = cnpj
        .chars()
        .filter(|character| character.is_ascii_alphanumeric())
        .collect();

    if file_stem.is_empty() {
        return Err(Error::ExportError(format!(
            "the CNPJ \"{cnpj}\" cannot be used in a file name"
        )));
    }

    Ok(file_stem)
}
