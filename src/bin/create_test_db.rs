use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};

use gestao_rs::{
    company::{AVAILABLE_PERMISSIONS, Company, approve_company, create_company},
    initialize_db,
    transaction::{Transaction, TransactionType, create_transaction},
    user::{NewUser, UserRole, create_user},
};

/// A utility for creating a test database for gestao_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test company...");

    let company = create_company(
        Company::build("Empresa Teste Ltda", "12345678000199", "contato@teste.com.br")
            .phone(Some("+55 11 4002-8922"))
            .address(Some("Av. Paulista, 1000, São Paulo - SP"))
            .permissions(AVAILABLE_PERMISSIONS),
        &conn,
    )?;
    let company = approve_company(company.id, &conn)?;

    println!("Creating test user...");

    create_user(
        NewUser {
            name: "Usuário Teste".to_owned(),
            email: "usuario@teste.com.br".to_owned(),
            role: UserRole::Company,
            company_id: Some(company.id),
        },
        &conn,
    )?;

    println!("Creating test transactions...");

    let today = OffsetDateTime::now_utc();
    let transactions = [
        ("Venda de serviços", Decimal::new(150_000, 2), TransactionType::Income, "Serviços", true),
        ("Aluguel", Decimal::new(320_000, 2), TransactionType::Expense, "Aluguel", true),
        ("Consultoria", Decimal::new(87_550, 2), TransactionType::Income, "Serviços", false),
        ("Energia elétrica", Decimal::new(41_237, 2), TransactionType::Expense, "Utilidades", false),
    ];

    for (days_ago, (description, amount, transaction_type, category, paid)) in
        (0_i64..).zip(transactions)
    {
        create_transaction(
            Transaction::build(
                today - Duration::days(days_ago * 7),
                amount,
                description,
                transaction_type,
            )
            .category(Some(category))
            .payment_method(Some("PIX"))
            .paid(paid)
            .company_id(Some(company.id)),
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
