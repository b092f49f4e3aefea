use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::customer::CustomerId;

pub type ApplicationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Disbursed => "DISBURSED",
            ApplicationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ApplicationStatus::Pending),
            "APPROVED" => Some(ApplicationStatus::Approved),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            "DISBURSED" => Some(ApplicationStatus::Disbursed),
            "CANCELLED" => Some(ApplicationStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A personal loan application.
///
/// Lifecycle: PENDING -> APPROVED | REJECTED | CANCELLED, then
/// APPROVED -> DISBURSED. REJECTED, CANCELLED and DISBURSED are terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub customer_id: CustomerId,
    /// Set at disbursement, when the loan account is created.
    pub loan_account_id: Option<AccountId>,
    pub application_number: String,
    pub requested_amount: Decimal,
    /// Set at approval; may differ from the requested amount.
    pub approved_amount: Option<Decimal>,
    /// Annual rate as a fraction, e.g. 0.0525 for 5.25%.
    pub interest_rate: Option<Decimal>,
    pub term_months: i64,
    pub purpose: String,
    pub employment_status: String,
    pub annual_income: Decimal,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub external_account_number: String,
    pub external_routing_number: String,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
}

impl LoanApplication {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: CustomerId,
        application_number: String,
        requested_amount: Decimal,
        term_months: i64,
        purpose: String,
        employment_status: String,
        annual_income: Decimal,
        external_account_number: String,
        external_routing_number: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            loan_account_id: None,
            application_number,
            requested_amount,
            approved_amount: None,
            interest_rate: None,
            term_months,
            purpose,
            employment_status,
            annual_income,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            external_account_number,
            external_routing_number,
            applied_at: Utc::now(),
            reviewed_at: None,
            disbursed_at: None,
        }
    }

    pub fn is_reviewable(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    pub fn is_cancellable(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    pub fn is_disbursable(&self) -> bool {
        self.status == ApplicationStatus::Approved
    }

    /// Approve with final terms. An absent `term_months` keeps the term
    /// requested at submission.
    pub fn approve(
        &mut self,
        approved_amount: Decimal,
        interest_rate: Option<Decimal>,
        term_months: Option<i64>,
    ) {
        self.status = ApplicationStatus::Approved;
        self.approved_amount = Some(approved_amount);
        self.interest_rate = interest_rate;
        if let Some(term) = term_months {
            self.term_months = term;
        }
        self.reviewed_at = Some(Utc::now());
    }

    pub fn reject(&mut self, reason: String) {
        self.status = ApplicationStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.reviewed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = ApplicationStatus::Cancelled;
    }

    pub fn mark_disbursed(&mut self, loan_account_id: AccountId) {
        self.status = ApplicationStatus::Disbursed;
        self.loan_account_id = Some(loan_account_id);
        self.disbursed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LoanApplication {
        LoanApplication::new(
            Uuid::new_v4(),
            "LOAN-20260101-000001".into(),
            Decimal::new(12_000_00, 2),
            36,
            "Home renovation".into(),
            "EMPLOYED".into(),
            Decimal::new(85_000_00, 2),
            "9876543210".into(),
            "021000021".into(),
        )
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Disbursed,
            ApplicationStatus::Cancelled,
        ] {
            let s = status.as_str();
            assert_eq!(ApplicationStatus::from_str(s), Some(status));
        }
    }

    #[test]
    fn test_new_application_is_pending() {
        let app = sample();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(app.is_reviewable());
        assert!(app.is_cancellable());
        assert!(!app.is_disbursable());
        assert!(app.approved_amount.is_none());
        assert!(app.reviewed_at.is_none());
    }

    #[test]
    fn test_approve_keeps_requested_term_unless_overridden() {
        let mut app = sample();
        app.approve(Decimal::new(10_000_00, 2), Some(Decimal::new(525, 4)), None);
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert_eq!(app.approved_amount, Some(Decimal::new(10_000_00, 2)));
        assert_eq!(app.interest_rate, Some(Decimal::new(525, 4)));
        assert_eq!(app.term_months, 36);
        assert!(app.reviewed_at.is_some());
        assert!(app.is_disbursable());
        assert!(!app.is_reviewable());

        let mut overridden = sample();
        overridden.approve(Decimal::new(10_000_00, 2), None, Some(24));
        assert_eq!(overridden.term_months, 24);
    }

    #[test]
    fn test_reject_records_reason() {
        let mut app = sample();
        app.reject("Debt-to-income ratio too high".into());
        assert_eq!(app.status, ApplicationStatus::Rejected);
        assert_eq!(
            app.rejection_reason.as_deref(),
            Some("Debt-to-income ratio too high")
        );
        assert!(app.reviewed_at.is_some());
        assert!(!app.is_disbursable());
    }

    #[test]
    fn test_disbursement_links_loan_account() {
        let mut app = sample();
        app.approve(Decimal::new(12_000_00, 2), None, None);
        let loan_account = Uuid::new_v4();
        app.mark_disbursed(loan_account);
        assert_eq!(app.status, ApplicationStatus::Disbursed);
        assert_eq!(app.loan_account_id, Some(loan_account));
        assert!(app.disbursed_at.is_some());
    }
}
