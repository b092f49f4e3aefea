use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    LoanDisbursement,
    LoanPayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::LoanDisbursement => "LOAN_DISBURSEMENT",
            TransactionType::LoanPayment => "LOAN_PAYMENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEPOSIT" => Some(TransactionType::Deposit),
            "WITHDRAWAL" => Some(TransactionType::Withdrawal),
            "LOAN_DISBURSEMENT" => Some(TransactionType::LoanDisbursement),
            "LOAN_PAYMENT" => Some(TransactionType::LoanPayment),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Reversed => "REVERSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransactionStatus::Pending),
            "COMPLETED" => Some(TransactionStatus::Completed),
            "FAILED" => Some(TransactionStatus::Failed),
            "REVERSED" => Some(TransactionStatus::Reversed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger entry. Rows are append-only: a posted transaction is
/// never edited, a reversal flips its status to REVERSED and restores the
/// account balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub transaction_type: TransactionType,
    /// Always positive; direction comes from `transaction_type`.
    pub amount: Decimal,
    pub currency: String,
    /// Account balance immediately after this entry posted.
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub reference_number: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        transaction_type: TransactionType,
        amount: Decimal,
        currency: String,
        reference_number: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            transaction_type,
            amount,
            currency,
            balance_after: Decimal::ZERO,
            description: None,
            reference_number,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn completed(mut self, balance_after: Decimal) -> Self {
        self.balance_after = balance_after;
        self.status = TransactionStatus::Completed;
        self.processed_at = Some(Utc::now());
        self
    }

    pub fn failed(mut self, balance_after: Decimal) -> Self {
        self.balance_after = balance_after;
        self.status = TransactionStatus::Failed;
        self
    }

    /// The delta this entry applies to its account's balance.
    ///
    /// Deposits and loan payments push the balance up; withdrawals and
    /// disbursements push it down (a disbursement posts to the loan
    /// account, driving it negative).
    pub fn signed_delta(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Deposit | TransactionType::LoanPayment => self.amount,
            TransactionType::Withdrawal | TransactionType::LoanDisbursement => -self.amount,
        }
    }

    /// The delta a reversal applies: the exact inverse of the original.
    pub fn reversal_delta(&self) -> Decimal {
        -self.signed_delta()
    }

    pub fn is_reversible(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(transaction_type: TransactionType) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            transaction_type,
            Decimal::new(250_00, 2),
            "USD".into(),
            "TXN-20260101-000001".into(),
        )
    }

    #[test]
    fn test_type_roundtrip() {
        for transaction_type in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::LoanDisbursement,
            TransactionType::LoanPayment,
        ] {
            let s = transaction_type.as_str();
            assert_eq!(TransactionType::from_str(s), Some(transaction_type));
        }
        assert_eq!(TransactionType::from_str("TRANSFER"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Reversed,
        ] {
            let s = status.as_str();
            assert_eq!(TransactionStatus::from_str(s), Some(status));
        }
    }

    #[test]
    fn test_signed_deltas() {
        let amount = Decimal::new(250_00, 2);
        assert_eq!(sample(TransactionType::Deposit).signed_delta(), amount);
        assert_eq!(sample(TransactionType::LoanPayment).signed_delta(), amount);
        assert_eq!(sample(TransactionType::Withdrawal).signed_delta(), -amount);
        assert_eq!(
            sample(TransactionType::LoanDisbursement).signed_delta(),
            -amount
        );
    }

    #[test]
    fn test_reversal_delta_is_inverse() {
        let txn = sample(TransactionType::Withdrawal);
        assert_eq!(txn.reversal_delta(), -txn.signed_delta());
    }

    #[test]
    fn test_lifecycle() {
        let txn = sample(TransactionType::Deposit);
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert!(txn.processed_at.is_none());
        assert!(!txn.is_reversible());

        let done = txn.completed(Decimal::new(350_00, 2));
        assert_eq!(done.status, TransactionStatus::Completed);
        assert_eq!(done.balance_after, Decimal::new(350_00, 2));
        assert!(done.processed_at.is_some());
        assert!(done.is_reversible());

        let failed = sample(TransactionType::Withdrawal).failed(Decimal::new(100_00, 2));
        assert_eq!(failed.status, TransactionStatus::Failed);
        assert!(failed.processed_at.is_none());
        assert!(!failed.is_reversible());
    }
}
