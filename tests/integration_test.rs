mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{amount, approve_default, create_customer, customer_with_checking, test_engine};
use mutuum::application::{AccountOpening, ApprovalTerms, ReviewDecision};
use mutuum::domain::{AccountStatus, AccountType, ApplicationStatus, CustomerStatus};
use mutuum::io::Exporter;

#[tokio::test]
async fn test_retail_customer_journey_with_statement_export() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (customer, account) =
        customer_with_checking(&engine, "Ada Lovelace", "ada@example.com", "1000.00").await?;
    assert_eq!(customer.status, CustomerStatus::Active);

    engine
        .transactions
        .deposit(
            account.id,
            amount("250.00"),
            "USD",
            Some("Paycheck".to_string()),
        )
        .await?;
    let withdrawal = engine
        .transactions
        .withdraw(account.id, amount("100.00"), "USD", None)
        .await?;

    let balance = engine.accounts.get_account(account.id).await?.balance;
    assert_eq!(balance, amount("1150.00"));

    // The opening deposit sets the balance directly; only the two
    // operations above appear on the statement, oldest first.
    let mut buffer = Vec::new();
    let exporter = Exporter::new(&engine);
    let rows = exporter
        .export_statement_csv(&mut buffer, account.id, None, None)
        .await?;
    assert_eq!(rows, 2);

    let csv_text = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv_text.lines().collect();
    assert_eq!(
        lines[0],
        "reference,type,amount,currency,balance_after,status,description,created_at,processed_at"
    );
    assert!(lines[1].contains("DEPOSIT"));
    assert!(lines[1].contains("250.00"));
    assert!(lines[1].contains("1250.00"));
    assert!(lines[1].contains("Paycheck"));
    assert!(lines[2].contains("WITHDRAWAL"));
    assert!(lines[2].contains("1150.00"));

    // A reversal shows up as the same row with flipped status
    engine
        .transactions
        .reverse_transaction(withdrawal.id, "teller error")
        .await?;
    let mut buffer = Vec::new();
    let rows = exporter
        .export_statement_csv(&mut buffer, account.id, None, None)
        .await?;
    assert_eq!(rows, 2);
    let csv_text = String::from_utf8(buffer)?;
    assert!(csv_text.contains("REVERSED"));
    assert_eq!(
        engine.accounts.get_account(account.id).await?.balance,
        amount("1250.00")
    );

    // A window after all activity exports an empty statement
    let tomorrow = Utc::now() + Duration::days(1);
    let mut buffer = Vec::new();
    let rows = exporter
        .export_statement_csv(&mut buffer, account.id, Some(tomorrow), None)
        .await?;
    assert_eq!(rows, 0);

    Ok(())
}

#[tokio::test]
async fn test_borrower_journey_from_application_to_payoff() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let borrower = create_customer(&engine, "Grace Hopper", "grace@example.com").await?;

    let application = engine
        .loans
        .submit_application(common::loan_request(borrower.id, "12000.00", 36))
        .await?;
    engine
        .loans
        .review_application(
            application.id,
            ReviewDecision::Approve(ApprovalTerms {
                approved_amount: None,
                interest_rate: Some(amount("0.0699")),
                term_months: None,
            }),
        )
        .await?;
    let disbursed = engine.loans.disburse_loan(application.id, true).await?;
    assert_eq!(disbursed.status, ApplicationStatus::Disbursed);

    let loan_account_id = disbursed.loan_account_id.unwrap();
    assert_eq!(
        engine.accounts.get_account(loan_account_id).await?.balance,
        amount("-12000.00")
    );
    assert_eq!(engine.bank.loans_outstanding().await?, amount("12000.00"));

    engine
        .loans
        .make_loan_payment(loan_account_id, amount("5000.00"), None)
        .await?;
    let payoff = engine
        .loans
        .make_loan_payment(loan_account_id, amount("7000.00"), None)
        .await?;
    assert_eq!(payoff.description.as_deref(), Some("Loan paid in full"));

    let loan_account = engine.accounts.get_account(loan_account_id).await?;
    assert_eq!(loan_account.status, AccountStatus::Closed);
    assert_eq!(engine.bank.loans_outstanding().await?, amount("0.00"));

    // With the loan settled and closed, the borrower can bank normally
    let checking = engine
        .accounts
        .create_account(AccountOpening {
            customer_id: borrower.id,
            account_type: AccountType::Checking,
            initial_deposit: Some(amount("50.00")),
            currency: None,
        })
        .await?;
    assert_eq!(checking.balance, amount("50.00"));

    Ok(())
}
