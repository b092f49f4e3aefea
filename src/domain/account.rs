use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::customer::CustomerId;

pub type AccountId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Deposit account; balance is always >= 0
    Checking,
    /// Debt account; balance is always <= 0, magnitude is the outstanding debt
    Loan,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Loan => "LOAN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CHECKING" => Some(AccountType::Checking),
            "LOAN" => Some(AccountType::Loan),
            _ => None,
        }
    }

    /// Prefix used when generating account numbers, e.g. "CHK-1234567890".
    pub fn number_prefix(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHK",
            AccountType::Loan => "LOAN",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Frozen,
    /// Terminal; a closed account never reopens
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(AccountStatus::Active),
            "FROZEN" => Some(AccountStatus::Frozen),
            "CLOSED" => Some(AccountStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub account_number: String,
    pub status: AccountStatus,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        customer_id: CustomerId,
        account_type: AccountType,
        account_number: String,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            account_type,
            account_number,
            status: AccountStatus::Active,
            balance: Decimal::ZERO,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn can_transact(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Whether `balance` respects the sign constraint of this account type.
    pub fn allows_balance(&self, balance: Decimal) -> bool {
        match self.account_type {
            AccountType::Checking => balance >= Decimal::ZERO,
            AccountType::Loan => balance <= Decimal::ZERO,
        }
    }

    /// What the borrower still owes on a loan account.
    pub fn outstanding_debt(&self) -> Decimal {
        self.balance.abs()
    }
}
