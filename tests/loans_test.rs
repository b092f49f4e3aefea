mod common;

use anyhow::Result;
use common::{
    amount, approve_default, create_customer, customer_with_checking, disbursed_loan,
    loan_request, test_engine,
};
use mutuum::application::{
    AccountOpening, ApprovalTerms, EngineError, ReviewDecision, TransactionFilter,
};
use mutuum::domain::{
    AccountStatus, AccountType, ApplicationStatus, TransactionStatus, TransactionType,
};

#[tokio::test]
async fn test_submit_application() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;

    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    assert_eq!(application.status, ApplicationStatus::Pending);
    assert!(application.application_number.starts_with("LOAN-"));
    assert_eq!(application.requested_amount, amount("10000.00"));
    assert_eq!(application.term_months, 24);
    assert!(application.approved_amount.is_none());
    assert!(application.loan_account_id.is_none());

    let applications = engine
        .loans
        .list_customer_applications(customer.id, None)
        .await?;
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].id, application.id);

    // Lookup by application number too
    let found = engine
        .loans
        .get_application_by_number(&application.application_number)
        .await?;
    assert_eq!(found.id, application.id);

    Ok(())
}

#[tokio::test]
async fn test_approve_with_explicit_terms() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    let approved = engine
        .loans
        .review_application(
            application.id,
            ReviewDecision::Approve(ApprovalTerms {
                approved_amount: Some(amount("8000.00")),
                interest_rate: Some(amount("0.0525")),
                term_months: Some(36),
            }),
        )
        .await?;

    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.approved_amount, Some(amount("8000.00")));
    assert_eq!(approved.interest_rate, Some(amount("0.0525")));
    assert_eq!(approved.term_months, 36);
    assert!(approved.reviewed_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_approve_with_defaults_falls_back_to_requested() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    let approved = engine
        .loans
        .review_application(application.id, approve_default())
        .await?;

    assert_eq!(approved.approved_amount, Some(amount("10000.00")));
    assert!(approved.interest_rate.is_none());
    assert_eq!(approved.term_months, 24);

    Ok(())
}

#[tokio::test]
async fn test_reject_records_reason_and_is_terminal() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    let rejected = engine
        .loans
        .review_application(
            application.id,
            ReviewDecision::Reject {
                reason: "Income too low for requested amount".to_string(),
            },
        )
        .await?;
    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Income too low for requested amount")
    );
    assert!(rejected.reviewed_at.is_some());

    // Terminal: cannot be reviewed again or cancelled
    let err = engine
        .loans
        .review_application(application.id, approve_default())
        .await
        .unwrap_err();
    match err {
        EngineError::LoanNotReviewable { status, .. } => {
            assert_eq!(status, ApplicationStatus::Rejected);
        }
        other => panic!("expected LoanNotReviewable, got {other:?}"),
    }

    let err = engine
        .loans
        .cancel_application(application.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LoanNotCancellable { .. }));

    Ok(())
}

#[tokio::test]
async fn test_one_pending_application_per_customer() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let first = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    let err = engine
        .loans
        .submit_application(loan_request(customer.id, "5000.00", 12))
        .await
        .unwrap_err();
    match err {
        EngineError::PendingApplicationExists { application_number } => {
            assert_eq!(application_number, first.application_number);
        }
        other => panic!("expected PendingApplicationExists, got {other:?}"),
    }

    // Cancelling frees the slot
    let cancelled = engine.loans.cancel_application(first.id).await?;
    assert_eq!(cancelled.status, ApplicationStatus::Cancelled);
    engine
        .loans
        .submit_application(loan_request(customer.id, "5000.00", 12))
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_cancelled_application_cannot_be_disbursed() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;
    engine.loans.cancel_application(application.id).await?;

    let err = engine
        .loans
        .disburse_loan(application.id, true)
        .await
        .unwrap_err();
    match err {
        EngineError::LoanNotDisbursable { status, .. } => {
            assert_eq!(status, ApplicationStatus::Cancelled);
        }
        other => panic!("expected LoanNotDisbursable, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_disbursement_requires_confirmation() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;
    engine
        .loans
        .review_application(application.id, approve_default())
        .await?;

    let err = engine
        .loans
        .disburse_loan(application.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationRequired));

    // Nothing moved: still APPROVED, no loan account created
    let unchanged = engine.loans.get_application(application.id).await?;
    assert_eq!(unchanged.status, ApplicationStatus::Approved);
    assert!(unchanged.loan_account_id.is_none());

    Ok(())
}

#[tokio::test]
async fn test_disbursement_creates_loan_account_and_transaction() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (_, application, loan_account) =
        disbursed_loan(&engine, "Ada Lovelace", "ada@example.com", "10000.00").await?;

    assert_eq!(application.status, ApplicationStatus::Disbursed);
    assert!(application.disbursed_at.is_some());

    assert_eq!(loan_account.account_type, AccountType::Loan);
    assert_eq!(loan_account.status, AccountStatus::Active);
    assert_eq!(loan_account.balance, amount("-10000.00"));
    assert!(loan_account.account_number.starts_with("LOAN-"));

    // The disbursement is a ledger row tied back to the application
    let (transactions, total) = engine
        .transactions
        .list_account_transactions(loan_account.id, TransactionFilter::default())
        .await?;
    assert_eq!(total, 1);
    assert_eq!(
        transactions[0].transaction_type,
        TransactionType::LoanDisbursement
    );
    assert_eq!(transactions[0].status, TransactionStatus::Completed);
    assert_eq!(transactions[0].amount, amount("10000.00"));
    assert_eq!(transactions[0].balance_after, amount("-10000.00"));
    assert!(
        transactions[0]
            .description
            .as_deref()
            .unwrap()
            .contains(&application.application_number)
    );

    Ok(())
}

#[tokio::test]
async fn test_disbursement_blocked_by_active_checking_account() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (customer, checking) =
        customer_with_checking(&engine, "Ada Lovelace", "ada@example.com", "100.00").await?;

    // The single-account rule is not checked at submission or approval
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;
    engine
        .loans
        .review_application(application.id, approve_default())
        .await?;

    let err = engine
        .loans
        .disburse_loan(application.id, true)
        .await
        .unwrap_err();
    match err {
        EngineError::SingleAccountViolation {
            account_type,
            account_number,
        } => {
            assert_eq!(account_type, AccountType::Checking);
            assert_eq!(account_number, checking.account_number);
        }
        other => panic!("expected SingleAccountViolation, got {other:?}"),
    }
    let unchanged = engine.loans.get_application(application.id).await?;
    assert_eq!(unchanged.status, ApplicationStatus::Approved);

    // Drain and close the checking account, then disbursement goes through
    engine
        .transactions
        .withdraw(checking.id, amount("100.00"), "USD", None)
        .await?;
    engine.accounts.close_account(checking.id).await?;

    let disbursed = engine.loans.disburse_loan(application.id, true).await?;
    assert_eq!(disbursed.status, ApplicationStatus::Disbursed);

    Ok(())
}

#[tokio::test]
async fn test_loan_payment_reduces_debt() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (_, _, loan_account) =
        disbursed_loan(&engine, "Ada Lovelace", "ada@example.com", "5000.00").await?;

    let payment = engine
        .loans
        .make_loan_payment(loan_account.id, amount("1000.00"), None)
        .await?;
    assert_eq!(payment.transaction_type, TransactionType::LoanPayment);
    assert_eq!(payment.status, TransactionStatus::Completed);
    assert_eq!(payment.balance_after, amount("-4000.00"));

    let refreshed = engine.accounts.get_account(loan_account.id).await?;
    assert_eq!(refreshed.balance, amount("-4000.00"));
    assert_eq!(refreshed.status, AccountStatus::Active);

    Ok(())
}

#[tokio::test]
async fn test_final_payment_closes_loan() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (customer, _, loan_account) =
        disbursed_loan(&engine, "Ada Lovelace", "ada@example.com", "500.00").await?;

    let payment = engine
        .loans
        .make_loan_payment(loan_account.id, amount("500.00"), None)
        .await?;
    assert_eq!(payment.balance_after, amount("0.00"));
    assert_eq!(payment.description.as_deref(), Some("Loan paid in full"));

    let refreshed = engine.accounts.get_account(loan_account.id).await?;
    assert_eq!(refreshed.balance, amount("0.00"));
    assert_eq!(refreshed.status, AccountStatus::Closed);

    // The closed loan no longer occupies the customer's account slot
    engine
        .accounts
        .create_account(AccountOpening {
            customer_id: customer.id,
            account_type: AccountType::Checking,
            initial_deposit: None,
            currency: None,
        })
        .await?;

    // And the closed account refuses further payments
    let err = engine
        .loans
        .make_loan_payment(loan_account.id, amount("10.00"), None)
        .await
        .unwrap_err();
    match err {
        EngineError::AccountNotTransactable { status, .. } => {
            assert_eq!(status, AccountStatus::Closed);
        }
        other => panic!("expected AccountNotTransactable, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_payoff_tag_appends_to_description() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (_, _, loan_account) =
        disbursed_loan(&engine, "Ada Lovelace", "ada@example.com", "300.00").await?;

    // A partial payment keeps its description as given
    let partial = engine
        .loans
        .make_loan_payment(
            loan_account.id,
            amount("100.00"),
            Some("March installment".to_string()),
        )
        .await?;
    assert_eq!(partial.description.as_deref(), Some("March installment"));

    let payoff = engine
        .loans
        .make_loan_payment(
            loan_account.id,
            amount("200.00"),
            Some("Final installment".to_string()),
        )
        .await?;
    assert_eq!(
        payoff.description.as_deref(),
        Some("Final installment (loan paid in full)")
    );

    Ok(())
}

#[tokio::test]
async fn test_payment_cannot_exceed_debt() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (_, _, loan_account) =
        disbursed_loan(&engine, "Ada Lovelace", "ada@example.com", "500.00").await?;

    let err = engine
        .loans
        .make_loan_payment(loan_account.id, amount("600.00"), None)
        .await
        .unwrap_err();
    match err {
        EngineError::PaymentExceedsDebt {
            outstanding,
            requested,
        } => {
            assert_eq!(outstanding, amount("500.00"));
            assert_eq!(requested, amount("600.00"));
        }
        other => panic!("expected PaymentExceedsDebt, got {other:?}"),
    }

    // An exact payoff is fine
    engine
        .loans
        .make_loan_payment(loan_account.id, amount("500.00"), None)
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_payment_rejected_on_checking_account() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let (_, checking) =
        customer_with_checking(&engine, "Ada Lovelace", "ada@example.com", "500.00").await?;

    let err = engine
        .loans
        .make_loan_payment(checking.id, amount("100.00"), None)
        .await
        .unwrap_err();
    match err {
        EngineError::AccountNotTransactable { account_type, .. } => {
            assert_eq!(account_type, AccountType::Checking);
        }
        other => panic!("expected AccountNotTransactable, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_submission_validation() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;

    let err = engine
        .loans
        .submit_application(loan_request(customer.id, "0.00", 24))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let mut bad_term = loan_request(customer.id, "1000.00", 24);
    bad_term.term_months = 0;
    let err = engine.loans.submit_application(bad_term).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let mut bad_income = loan_request(customer.id, "1000.00", 24);
    bad_income.annual_income = amount("-1.00");
    let err = engine
        .loans
        .submit_application(bad_income)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // Suspended customers cannot apply
    engine
        .customers
        .suspend_customer(customer.id, Some("fraud review".to_string()))
        .await?;
    let err = engine
        .loans
        .submit_application(loan_request(customer.id, "1000.00", 24))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CustomerInactive { .. }));

    let err = engine
        .loans
        .submit_application(loan_request(uuid::Uuid::new_v4(), "1000.00", 24))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CustomerNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_interest_rate_must_be_a_fraction() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let customer = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(customer.id, "10000.00", 24))
        .await?;

    // 5.25 is a percentage, not a fraction; the rate must be 0.0525
    let err = engine
        .loans
        .review_application(
            application.id,
            ReviewDecision::Approve(ApprovalTerms {
                approved_amount: None,
                interest_rate: Some(amount("5.25")),
                term_months: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let unchanged = engine.loans.get_application(application.id).await?;
    assert_eq!(unchanged.status, ApplicationStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_reserve_gate_at_approval() -> Result<()> {
    let (engine, _temp) = test_engine().await?;

    // Empty bank: capital 250,000.00, no deposits, no loans
    let over = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(over.id, "300000.00", 60))
        .await?;
    let err = engine
        .loans
        .review_application(application.id, approve_default())
        .await
        .unwrap_err();
    match err {
        EngineError::BankReserveInsufficient {
            available,
            requested,
        } => {
            assert_eq!(available, amount("250000.00"));
            assert_eq!(requested, amount("300000.00"));
        }
        other => panic!("expected BankReserveInsufficient, got {other:?}"),
    }

    // The refused application is untouched, not rejected
    let unchanged = engine.loans.get_application(application.id).await?;
    assert_eq!(unchanged.status, ApplicationStatus::Pending);

    // Exactly the available amount passes
    let boundary = create_customer(&engine, "Grace Hopper", "grace@example.com").await?;
    let application = engine
        .loans
        .submit_application(loan_request(boundary.id, "250000.00", 60))
        .await?;
    let approved = engine
        .loans
        .review_application(application.id, approve_default())
        .await?;
    assert_eq!(approved.status, ApplicationStatus::Approved);

    Ok(())
}

#[tokio::test]
async fn test_reserves_rechecked_at_disbursement() -> Result<()> {
    let (engine, _temp) = test_engine().await?;

    // Two approvals that individually fit but jointly exceed capacity.
    // Approval does not earmark funds, so both pass the gate.
    let first = create_customer(&engine, "Ada Lovelace", "ada@example.com").await?;
    let first_app = engine
        .loans
        .submit_application(loan_request(first.id, "200000.00", 60))
        .await?;
    engine
        .loans
        .review_application(first_app.id, approve_default())
        .await?;

    let second = create_customer(&engine, "Grace Hopper", "grace@example.com").await?;
    let second_app = engine
        .loans
        .submit_application(loan_request(second.id, "150000.00", 60))
        .await?;
    engine
        .loans
        .review_application(second_app.id, approve_default())
        .await?;

    // First disbursement consumes 200,000.00 of the 250,000.00 capacity
    engine.loans.disburse_loan(first_app.id, true).await?;

    let err = engine
        .loans
        .disburse_loan(second_app.id, true)
        .await
        .unwrap_err();
    match err {
        EngineError::BankReserveInsufficient {
            available,
            requested,
        } => {
            assert_eq!(available, amount("50000.00"));
            assert_eq!(requested, amount("150000.00"));
        }
        other => panic!("expected BankReserveInsufficient, got {other:?}"),
    }
    let refused = engine.loans.get_application(second_app.id).await?;
    assert_eq!(refused.status, ApplicationStatus::Approved);

    // Fresh deposits rebuild capacity: 250,000 + 0.25 x 400,000 - 200,000
    customer_with_checking(&engine, "Big Saver", "saver@example.com", "400000.00").await?;
    let disbursed = engine.loans.disburse_loan(second_app.id, true).await?;
    assert_eq!(disbursed.status, ApplicationStatus::Disbursed);

    Ok(())
}
