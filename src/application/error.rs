use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{AccountStatus, AccountType, ApplicationStatus, CustomerId, TransactionStatus};

/// Which withdrawal limit was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    PerTransaction,
    Daily,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitScope::PerTransaction => write!(f, "per-transaction"),
            LimitScope::Daily => write!(f, "daily"),
        }
    }
}

/// Coarse classification of engine failures, for callers that map
/// errors onto an outer surface without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    BusinessRule,
    Storage,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Loan application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Email already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Currency mismatch: account holds {account_currency}, requested {requested}")]
    CurrencyMismatch {
        account_currency: String,
        requested: String,
    },

    #[error("Confirmation required for disbursement")]
    ConfirmationRequired,

    #[error("Customer {customer_id} is {status}")]
    CustomerInactive {
        customer_id: CustomerId,
        status: String,
    },

    #[error(
        "Customer already has an active {account_type} account ({account_number}); \
         only one active account is allowed"
    )]
    SingleAccountViolation {
        account_type: AccountType,
        account_number: String,
    },

    #[error("Account {account_number} cannot transact: {account_type} account is {status}")]
    AccountNotTransactable {
        account_number: String,
        account_type: AccountType,
        status: AccountStatus,
    },

    #[error("Account {account_number} cannot be closed: status {status}, balance {balance}")]
    AccountNotClosable {
        account_number: String,
        status: AccountStatus,
        balance: Decimal,
    },

    #[error("Insufficient funds in account {account_number}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_number: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error(
        "Withdrawal exceeds {scope} limit: limit {limit}, requested {requested}, \
         already used {already_used}"
    )]
    TransactionLimitExceeded {
        scope: LimitScope,
        limit: Decimal,
        requested: Decimal,
        already_used: Decimal,
    },

    #[error("Transaction {reference_number} is not reversible: status {status}")]
    TransactionNotReversible {
        reference_number: String,
        status: TransactionStatus,
    },

    #[error(
        "Reversing {reference_number} would leave account {account_number} \
         at an invalid balance of {resulting_balance}"
    )]
    ReversalOutOfRange {
        reference_number: String,
        account_number: String,
        resulting_balance: Decimal,
    },

    #[error("Customer already has a pending application: {application_number}")]
    PendingApplicationExists { application_number: String },

    #[error("Application {application_number} cannot be reviewed: status {status}")]
    LoanNotReviewable {
        application_number: String,
        status: ApplicationStatus,
    },

    #[error("Application {application_number} cannot be disbursed: status {status}")]
    LoanNotDisbursable {
        application_number: String,
        status: ApplicationStatus,
    },

    #[error("Application {application_number} cannot be cancelled: status {status}")]
    LoanNotCancellable {
        application_number: String,
        status: ApplicationStatus,
    },

    #[error("Payment {requested} exceeds outstanding debt {outstanding}")]
    PaymentExceedsDebt {
        outstanding: Decimal,
        requested: Decimal,
    },

    #[error("Bank cannot lend {requested}: only {available} available under the reserve policy")]
    BankReserveInsufficient {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::CustomerNotFound(_)
            | EngineError::AccountNotFound(_)
            | EngineError::TransactionNotFound(_)
            | EngineError::ApplicationNotFound(_) => ErrorKind::NotFound,

            EngineError::EmailAlreadyRegistered(_)
            | EngineError::InvalidAmount(_)
            | EngineError::CurrencyMismatch { .. }
            | EngineError::ConfirmationRequired => ErrorKind::Validation,

            EngineError::CustomerInactive { .. }
            | EngineError::SingleAccountViolation { .. }
            | EngineError::AccountNotTransactable { .. }
            | EngineError::AccountNotClosable { .. }
            | EngineError::InsufficientFunds { .. }
            | EngineError::TransactionLimitExceeded { .. }
            | EngineError::TransactionNotReversible { .. }
            | EngineError::ReversalOutOfRange { .. }
            | EngineError::PendingApplicationExists { .. }
            | EngineError::LoanNotReviewable { .. }
            | EngineError::LoanNotDisbursable { .. }
            | EngineError::LoanNotCancellable { .. }
            | EngineError::PaymentExceedsDebt { .. }
            | EngineError::BankReserveInsufficient { .. } => ErrorKind::BusinessRule,

            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }
}
