use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::BankConfig;
use crate::domain::{
    numbers, Account, AccountId, AccountStatus, AccountType, ApplicationId, ApplicationStatus,
    CustomerId, LoanApplication, Transaction, TransactionType,
};
use crate::storage::Repository;

use super::{validate_amount, AccountLocks, BankService, EngineError, LendingLock};

/// A request to open a loan application.
pub struct LoanApplicationRequest {
    pub customer_id: CustomerId,
    pub requested_amount: Decimal,
    pub term_months: i64,
    pub purpose: String,
    pub employment_status: String,
    pub annual_income: Decimal,
    /// External account the borrower nominates for settlement.
    pub external_account_number: String,
    pub external_routing_number: String,
}

/// Terms fixed at approval.
pub struct ApprovalTerms {
    /// Defaults to the requested amount.
    pub approved_amount: Option<Decimal>,
    /// Annual rate as a fraction, e.g. 0.0525 for 5.25%.
    pub interest_rate: Option<Decimal>,
    /// Overrides the term requested at submission.
    pub term_months: Option<i64>,
}

/// Outcome of an application review.
pub enum ReviewDecision {
    Approve(ApprovalTerms),
    Reject { reason: String },
}

/// Loan application state machine, disbursement, and payments.
///
/// Reserve checks run under the lending lock so two approvals or
/// disbursements cannot both observe the same capacity.
pub struct LoanService {
    repo: Arc<Repository>,
    config: BankConfig,
    locks: AccountLocks,
    lending: LendingLock,
    bank: BankService,
}

impl LoanService {
    pub fn new(
        repo: Arc<Repository>,
        config: BankConfig,
        locks: AccountLocks,
        lending: LendingLock,
        bank: BankService,
    ) -> Self {
        Self {
            repo,
            config,
            locks,
            lending,
            bank,
        }
    }

    /// Submit a loan application. A customer may have at most one PENDING
    /// application; no reserve check happens at submission.
    pub async fn submit_application(
        &self,
        request: LoanApplicationRequest,
    ) -> Result<LoanApplication, EngineError> {
        validate_amount(request.requested_amount)?;
        if request.term_months <= 0 {
            return Err(EngineError::InvalidAmount(
                "Term must be a positive number of months".to_string(),
            ));
        }
        if request.annual_income < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(
                "Annual income cannot be negative".to_string(),
            ));
        }

        let customer = self
            .repo
            .get_customer(request.customer_id)
            .await?
            .ok_or_else(|| EngineError::CustomerNotFound(request.customer_id.to_string()))?;
        if !customer.is_active() {
            return Err(EngineError::CustomerInactive {
                customer_id: customer.id,
                status: customer.status.to_string(),
            });
        }

        if let Some(pending) = self.repo.get_pending_application(customer.id).await? {
            return Err(EngineError::PendingApplicationExists {
                application_number: pending.application_number,
            });
        }

        let mut application_number = numbers::application_number(Utc::now());
        while self
            .repo
            .get_application_by_number(&application_number)
            .await?
            .is_some()
        {
            application_number = numbers::application_number(Utc::now());
        }

        let application = LoanApplication::new(
            customer.id,
            application_number,
            request.requested_amount,
            request.term_months,
            request.purpose,
            request.employment_status,
            request.annual_income,
            request.external_account_number,
            request.external_routing_number,
        );
        self.repo.save_application(&application).await?;

        info!(
            application_number = %application.application_number,
            requested_amount = %application.requested_amount,
            "submitted loan application"
        );
        Ok(application)
    }

    /// Review a PENDING application.
    ///
    /// Approval checks lending capacity first; on insufficient reserves
    /// the application stays PENDING.
    pub async fn review_application(
        &self,
        application_id: ApplicationId,
        decision: ReviewDecision,
    ) -> Result<LoanApplication, EngineError> {
        let mut application = self.fetch_application(application_id).await?;

        if !application.is_reviewable() {
            return Err(EngineError::LoanNotReviewable {
                application_number: application.application_number,
                status: application.status,
            });
        }

        match decision {
            ReviewDecision::Approve(terms) => {
                let approved_amount = terms
                    .approved_amount
                    .unwrap_or(application.requested_amount);
                validate_amount(approved_amount)?;
                if let Some(rate) = terms.interest_rate {
                    if rate < Decimal::ZERO || rate > Decimal::ONE {
                        return Err(EngineError::InvalidAmount(
                            "Interest rate must be a fraction between 0 and 1".to_string(),
                        ));
                    }
                }
                if let Some(term) = terms.term_months {
                    if term <= 0 {
                        return Err(EngineError::InvalidAmount(
                            "Term must be a positive number of months".to_string(),
                        ));
                    }
                }

                let _lending = self.lending.lock().await;

                let check = self.bank.can_approve_loan(approved_amount).await?;
                if !check.approved {
                    return Err(EngineError::BankReserveInsufficient {
                        available: check.available,
                        requested: approved_amount,
                    });
                }

                application.approve(approved_amount, terms.interest_rate, terms.term_months);
                self.repo.update_application(&application).await?;

                info!(
                    application_number = %application.application_number,
                    approved_amount = %approved_amount,
                    "approved loan application"
                );
            }
            ReviewDecision::Reject { reason } => {
                application.reject(reason);
                self.repo.update_application(&application).await?;

                info!(
                    application_number = %application.application_number,
                    "rejected loan application"
                );
            }
        }

        Ok(application)
    }

    /// Disburse an APPROVED loan: create the loan account at minus the
    /// approved amount, post the disbursement transaction, and mark the
    /// application DISBURSED, all in one commit.
    ///
    /// Capacity is re-checked here because reserves may have moved since
    /// approval; that failure leaves the application APPROVED. The
    /// borrower must hold no ACTIVE account at disbursement time.
    pub async fn disburse_loan(
        &self,
        application_id: ApplicationId,
        confirm: bool,
    ) -> Result<LoanApplication, EngineError> {
        let mut application = self.fetch_application(application_id).await?;

        if !application.is_disbursable() {
            return Err(EngineError::LoanNotDisbursable {
                application_number: application.application_number,
                status: application.status,
            });
        }

        if !confirm {
            return Err(EngineError::ConfirmationRequired);
        }

        let approved_amount = application
            .approved_amount
            .unwrap_or(application.requested_amount);

        let _lending = self.lending.lock().await;

        let check = self.bank.can_approve_loan(approved_amount).await?;
        if !check.approved {
            warn!(
                application_number = %application.application_number,
                available = %check.available,
                requested = %approved_amount,
                "reserves moved since approval; disbursement refused"
            );
            return Err(EngineError::BankReserveInsufficient {
                available: check.available,
                requested: approved_amount,
            });
        }

        if let Some(existing) = self.repo.get_active_account(application.customer_id).await? {
            return Err(EngineError::SingleAccountViolation {
                account_type: existing.account_type,
                account_number: existing.account_number,
            });
        }

        let mut account_number = numbers::account_number(AccountType::Loan);
        while self
            .repo
            .get_account_by_number(&account_number)
            .await?
            .is_some()
        {
            account_number = numbers::account_number(AccountType::Loan);
        }

        let loan_account = Account::new(
            application.customer_id,
            AccountType::Loan,
            account_number,
            self.config.currency.clone(),
        )
        .with_balance(-approved_amount);

        let reference = self.next_reference().await?;
        let transaction = Transaction::new(
            loan_account.id,
            TransactionType::LoanDisbursement,
            approved_amount,
            loan_account.currency.clone(),
            reference,
        )
        .with_description(format!(
            "Loan disbursement for application {}",
            application.application_number
        ))
        .completed(-approved_amount);

        application.mark_disbursed(loan_account.id);

        self.repo
            .apply_disbursement(&application, &loan_account, &transaction)
            .await?;

        info!(
            application_number = %application.application_number,
            account_number = %loan_account.account_number,
            amount = %approved_amount,
            "disbursed loan"
        );
        Ok(application)
    }

    /// Cancel a PENDING application. Customer-initiated; terminal.
    pub async fn cancel_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<LoanApplication, EngineError> {
        let mut application = self.fetch_application(application_id).await?;

        if !application.is_cancellable() {
            return Err(EngineError::LoanNotCancellable {
                application_number: application.application_number,
                status: application.status,
            });
        }

        application.cancel();
        self.repo.update_application(&application).await?;

        info!(
            application_number = %application.application_number,
            "cancelled loan application"
        );
        Ok(application)
    }

    /// Pay down a loan. The balance moves toward zero; paying it off
    /// exactly closes the loan account in the same commit.
    pub async fn make_loan_payment(
        &self,
        loan_account_id: AccountId,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Transaction, EngineError> {
        validate_amount(amount)?;

        let lock = self.locks.lock_for(loan_account_id);
        let _guard = lock.lock().await;

        let account = self
            .repo
            .get_account(loan_account_id)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(loan_account_id.to_string()))?;

        if account.account_type != AccountType::Loan || !account.can_transact() {
            return Err(EngineError::AccountNotTransactable {
                account_number: account.account_number.clone(),
                account_type: account.account_type,
                status: account.status,
            });
        }

        let outstanding = account.outstanding_debt();
        if amount > outstanding {
            return Err(EngineError::PaymentExceedsDebt {
                outstanding,
                requested: amount,
            });
        }

        let new_balance = account.balance + amount;
        let paid_off = new_balance == Decimal::ZERO;

        let reference = self.next_reference().await?;
        let mut transaction = Transaction::new(
            account.id,
            TransactionType::LoanPayment,
            amount,
            account.currency.clone(),
            reference,
        );
        let description = match (description, paid_off) {
            (Some(text), true) => Some(format!("{} (loan paid in full)", text)),
            (None, true) => Some("Loan paid in full".to_string()),
            (text, false) => text,
        };
        if let Some(text) = description {
            transaction = transaction.with_description(text);
        }

        let completed = transaction.clone().completed(new_balance);
        let new_status = if paid_off {
            Some(AccountStatus::Closed)
        } else {
            None
        };

        match self
            .repo
            .apply_transaction(&completed, new_balance, new_status)
            .await
        {
            Ok(()) => {
                info!(
                    account_number = %account.account_number,
                    amount = %amount,
                    paid_off,
                    "loan payment posted"
                );
                Ok(completed)
            }
            Err(err) => {
                let failed = transaction.failed(new_balance);
                if let Err(record_err) = self.repo.save_transaction(&failed).await {
                    warn!(
                        reference = %failed.reference_number,
                        error = %record_err,
                        "could not record failed transaction"
                    );
                }
                Err(EngineError::Storage(err))
            }
        }
    }

    /// Get an application by ID.
    pub async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<LoanApplication, EngineError> {
        self.fetch_application(id).await
    }

    /// Get an application by its application number.
    pub async fn get_application_by_number(
        &self,
        application_number: &str,
    ) -> Result<LoanApplication, EngineError> {
        self.repo
            .get_application_by_number(application_number)
            .await?
            .ok_or_else(|| EngineError::ApplicationNotFound(application_number.to_string()))
    }

    /// List a customer's applications, optionally filtered by status.
    pub async fn list_customer_applications(
        &self,
        customer_id: CustomerId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<LoanApplication>, EngineError> {
        Ok(self
            .repo
            .list_customer_applications(customer_id, status)
            .await?)
    }

    /// List applications across all customers with the total count for
    /// the filter.
    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LoanApplication>, i64), EngineError> {
        let items = self.repo.list_applications(status, limit, offset).await?;
        let total = self.repo.count_applications(status).await?;
        Ok((items, total))
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<LoanApplication, EngineError> {
        self.repo
            .get_application(id)
            .await?
            .ok_or_else(|| EngineError::ApplicationNotFound(id.to_string()))
    }

    async fn next_reference(&self) -> Result<String, EngineError> {
        let mut reference = numbers::transaction_reference(Utc::now());
        while self
            .repo
            .get_transaction_by_reference(&reference)
            .await?
            .is_some()
        {
            reference = numbers::transaction_reference(Utc::now());
        }
        Ok(reference)
    }
}
