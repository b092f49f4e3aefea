use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::BankConfig;
use crate::domain::ReservePosition;
use crate::storage::Repository;

use super::EngineError;

/// Result of a lending capacity check.
#[derive(Debug, Clone, Serialize)]
pub struct LendingDecision {
    pub approved: bool,
    pub available: Decimal,
    pub requested: Decimal,
    pub remaining_after: Decimal,
}

/// Account counts by type and status.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBreakdown {
    pub checking_accounts: i64,
    pub loan_accounts: i64,
    pub active_accounts: i64,
}

/// Bank-wide financial snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialStatus {
    pub bank_capital: Decimal,
    pub customer_deposits: Decimal,
    pub usable_deposits: Decimal,
    pub reserved_deposits: Decimal,
    pub loans_outstanding: Decimal,
    pub available_for_lending: Decimal,
    pub overextended: bool,
    pub accounts: AccountBreakdown,
    pub as_of: DateTime<Utc>,
}

/// Breakdown of how customer deposits split between lendable and held.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveStatus {
    pub total_deposits: Decimal,
    pub usable_amount: Decimal,
    pub reserved_amount: Decimal,
    pub usable_ratio: Decimal,
    pub reserved_ratio: Decimal,
}

/// Bank-level aggregation over the stored ledger.
///
/// Reads only; capacity is consumed by loan approval and disbursement,
/// which hold the lending lock while they call [`can_approve_loan`].
///
/// [`can_approve_loan`]: BankService::can_approve_loan
#[derive(Clone)]
pub struct BankService {
    repo: Arc<Repository>,
    config: BankConfig,
}

impl BankService {
    pub fn new(repo: Arc<Repository>, config: BankConfig) -> Self {
        Self { repo, config }
    }

    /// Current reserve position aggregated from the ledger.
    pub async fn position(&self) -> Result<ReservePosition, EngineError> {
        let total_deposits = self.repo.sum_checking_deposits().await?;
        let loans_outstanding = self.repo.sum_loans_outstanding().await?;
        Ok(ReservePosition {
            bank_capital: self.config.bank_capital,
            total_deposits,
            reserve_ratio: self.config.reserve_ratio,
            loans_outstanding,
        })
    }

    pub fn bank_capital(&self) -> Decimal {
        self.config.bank_capital
    }

    /// Sum of ACTIVE checking balances.
    pub async fn customer_deposits(&self) -> Result<Decimal, EngineError> {
        Ok(self.repo.sum_checking_deposits().await?)
    }

    /// Deposits the bank may redeploy as loans.
    pub async fn usable_deposits(&self) -> Result<Decimal, EngineError> {
        Ok(self.position().await?.usable_deposits())
    }

    /// Deposits held back against withdrawals.
    pub async fn reserved_deposits(&self) -> Result<Decimal, EngineError> {
        Ok(self.position().await?.reserved_deposits())
    }

    /// Total principal disbursed and not yet repaid.
    pub async fn loans_outstanding(&self) -> Result<Decimal, EngineError> {
        Ok(self.repo.sum_loans_outstanding().await?)
    }

    /// Capital plus usable deposits minus loans outstanding. May go
    /// negative when repaid deposits were withdrawn.
    pub async fn available_for_lending(&self) -> Result<Decimal, EngineError> {
        Ok(self.position().await?.available_for_lending())
    }

    /// Check whether lending `amount` keeps the bank within capacity.
    pub async fn can_approve_loan(&self, amount: Decimal) -> Result<LendingDecision, EngineError> {
        let position = self.position().await?;
        Ok(LendingDecision {
            approved: position.can_lend(amount),
            available: position.available_for_lending(),
            requested: amount,
            remaining_after: position.remaining_after(amount),
        })
    }

    /// Full financial snapshot for reporting.
    pub async fn financial_status(&self) -> Result<FinancialStatus, EngineError> {
        let position = self.position().await?;
        let counts = self.repo.count_active_accounts().await?;
        Ok(FinancialStatus {
            bank_capital: position.bank_capital,
            customer_deposits: position.total_deposits,
            usable_deposits: position.usable_deposits(),
            reserved_deposits: position.reserved_deposits(),
            loans_outstanding: position.loans_outstanding,
            available_for_lending: position.available_for_lending(),
            overextended: position.is_overextended(),
            accounts: AccountBreakdown {
                checking_accounts: counts.checking,
                loan_accounts: counts.loan,
                active_accounts: counts.total,
            },
            as_of: Utc::now(),
        })
    }

    /// How current deposits split between lendable and held portions.
    pub async fn reserve_status(&self) -> Result<ReserveStatus, EngineError> {
        let position = self.position().await?;
        Ok(ReserveStatus {
            total_deposits: position.total_deposits,
            usable_amount: position.usable_deposits(),
            reserved_amount: position.reserved_deposits(),
            usable_ratio: self.config.reserve_ratio,
            reserved_ratio: self.config.reserve_requirement(),
        })
    }
}
