//! Gestão is the persistence layer of a multi-company accounting platform.
//!
//! This library stores companies, their financial transactions and the users
//! that belong to them in SQLite, and can export a company's data to CSV and
//! JSON files.
//!
//! Records are created from builders. Each builder goes through an explicit
//! `prepare_for_insert` step right before it is written, which checks the
//! required fields, generates the record ID and stamps the creation time.

#![warn(missing_docs)]

pub mod company;
pub mod database_id;
pub mod db;
mod error;
pub mod export;
pub mod timezone;
pub mod transaction;
pub mod user;

pub use db::initialize as initialize_db;
pub use error::{ConstraintViolation, Error};
