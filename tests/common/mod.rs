// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use mutuum::application::{
    AccountOpening, ApprovalTerms, Engine, LoanApplicationRequest, ReviewDecision,
};
use mutuum::config::BankConfig;
use mutuum::domain::{Account, AccountType, Customer, CustomerId, LoanApplication};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Helper to create a test engine with a temporary database
pub async fn test_engine() -> Result<(Engine, TempDir)> {
    test_engine_with_config(BankConfig::default()).await
}

/// Helper to create a test engine with explicit bank configuration
pub async fn test_engine_with_config(config: BankConfig) -> Result<(Engine, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let engine = Engine::init(db_path.to_str().unwrap(), config).await?;
    Ok((engine, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Helper to parse a decimal amount
pub fn amount(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub async fn create_customer(engine: &Engine, name: &str, email: &str) -> Result<Customer> {
    Ok(engine
        .customers
        .create_customer(name.to_string(), email.to_string())
        .await?)
}

/// Fixture: a customer holding an ACTIVE checking account with the given
/// opening balance.
pub async fn customer_with_checking(
    engine: &Engine,
    name: &str,
    email: &str,
    opening: &str,
) -> Result<(Customer, Account)> {
    let customer = create_customer(engine, name, email).await?;
    let account = engine
        .accounts
        .create_account(AccountOpening {
            customer_id: customer.id,
            account_type: AccountType::Checking,
            initial_deposit: Some(amount(opening)),
            currency: None,
        })
        .await?;
    Ok((customer, account))
}

/// A loan application request with plausible defaults
pub fn loan_request(customer_id: CustomerId, requested: &str, term: i64) -> LoanApplicationRequest {
    LoanApplicationRequest {
        customer_id,
        requested_amount: amount(requested),
        term_months: term,
        purpose: "Home improvement".to_string(),
        employment_status: "employed".to_string(),
        annual_income: amount("85000.00"),
        external_account_number: "9876543210".to_string(),
        external_routing_number: "021000021".to_string(),
    }
}

/// Approve with no overrides: requested amount, no rate, submitted term
pub fn approve_default() -> ReviewDecision {
    ReviewDecision::Approve(ApprovalTerms {
        approved_amount: None,
        interest_rate: None,
        term_months: None,
    })
}

/// Fixture: a customer whose loan has been submitted, approved, and
/// disbursed. Returns the final application state and the loan account.
pub async fn disbursed_loan(
    engine: &Engine,
    name: &str,
    email: &str,
    requested: &str,
) -> Result<(Customer, LoanApplication, Account)> {
    let customer = create_customer(engine, name, email).await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, requested, 24))
        .await?;
    engine
        .loans
        .review_application(application.id, approve_default())
        .await?;
    let application = engine.loans.disburse_loan(application.id, true).await?;
    let loan_account = engine
        .accounts
        .get_account(application.loan_account_id.unwrap())
        .await?;
    Ok((customer, application, loan_account))
}
