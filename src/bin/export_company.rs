use std::{error::Error, path::PathBuf, process::exit};

use clap::Parser;
use rusqlite::Connection;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gestao_rs::{company::get_company_by_cnpj, export::export_company_data, timezone};

/// Export a company's transactions and a data summary from a gestao_rs database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: PathBuf,

    /// The CNPJ of the company to export.
    #[arg(long)]
    cnpj: String,

    /// The directory to write the export files to.
    #[arg(long, short, default_value = ".")]
    output_dir: PathBuf,

    /// The canonical timezone used to date the export, e.g. "America/Sao_Paulo".
    #[arg(long, default_value = "America/Sao_Paulo")]
    timezone: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    if !args.db_path.is_file() {
        eprintln!("No database found at {:#?}!", args.db_path);
        exit(1);
    }

    let exported_at = timezone::now_in_timezone(&args.timezone)?;
    let conn = Connection::open(&args.db_path)?;

    let company = match get_company_by_cnpj(&args.cnpj, &conn) {
        Ok(company) => company,
        Err(gestao_rs::Error::NotFound) => {
            eprintln!("No company with the CNPJ {} exists.", args.cnpj);
            exit(1);
        }
        Err(error) => return Err(error.into()),
    };

    let files = export_company_data(company.id, &args.output_dir, exported_at, &conn)?;

    println!(
        "Exported {} transactions to {:#?}",
        files.summary.transaction_count, files.transactions_path
    );
    println!("Wrote summary to {:#?}", files.summary_path);

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty())
        .init();
}
