//! Company management.
//!
//! This module contains everything related to companies:
//! - The `Company` model, its status and the `CompanyBuilder` used to create companies
//! - Database functions for storing, querying, and updating companies and their permissions

mod db;
mod domain;

pub use db::{
    approve_company, count_companies, create_company, create_company_table, get_companies,
    get_company, get_company_by_cnpj, get_company_permissions, map_company_row, reject_company,
    set_company_permissions, update_company,
};
pub use domain::{AVAILABLE_PERMISSIONS, Company, CompanyBuilder, CompanyStatus};
