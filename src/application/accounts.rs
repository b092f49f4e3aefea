use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::BankConfig;
use crate::domain::{
    has_cent_precision, numbers, Account, AccountId, AccountStatus, AccountType, CustomerId,
};
use crate::storage::Repository;

use super::{AccountLocks, EngineError};

/// A request to open an account.
pub struct AccountOpening {
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    /// Opening balance for checking accounts. Loan accounts never carry one.
    pub initial_deposit: Option<Decimal>,
    /// Overrides the configured default currency.
    pub currency: Option<String>,
}

/// Point-in-time view of one account's balance.
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub account_number: String,
    pub balance: Decimal,
    pub currency: String,
    pub status: AccountStatus,
    pub as_of: DateTime<Utc>,
}

/// Account lifecycle and the single-active-account rule.
pub struct AccountService {
    repo: Arc<Repository>,
    config: BankConfig,
    locks: AccountLocks,
}

impl AccountService {
    pub fn new(repo: Arc<Repository>, config: BankConfig, locks: AccountLocks) -> Self {
        Self {
            repo,
            config,
            locks,
        }
    }

    /// Open an account for a customer.
    ///
    /// A customer holds at most one ACTIVE account of any type, so this
    /// fails while any other account of theirs is still ACTIVE. Loan
    /// accounts are only created through disbursement.
    pub async fn create_account(&self, opening: AccountOpening) -> Result<Account, EngineError> {
        let customer = self
            .repo
            .get_customer(opening.customer_id)
            .await?
            .ok_or_else(|| EngineError::CustomerNotFound(opening.customer_id.to_string()))?;

        if !customer.is_active() {
            return Err(EngineError::CustomerInactive {
                customer_id: customer.id,
                status: customer.status.to_string(),
            });
        }

        if let Some(existing) = self.repo.get_active_account(opening.customer_id).await? {
            return Err(EngineError::SingleAccountViolation {
                account_type: existing.account_type,
                account_number: existing.account_number,
            });
        }

        let initial_balance = match (opening.account_type, opening.initial_deposit) {
            (AccountType::Loan, Some(_)) => {
                return Err(EngineError::InvalidAmount(
                    "Loan accounts cannot carry an initial deposit".to_string(),
                ));
            }
            (AccountType::Checking, Some(deposit)) => {
                if deposit < Decimal::ZERO {
                    return Err(EngineError::InvalidAmount(
                        "Initial deposit cannot be negative".to_string(),
                    ));
                }
                if !has_cent_precision(deposit) {
                    return Err(EngineError::InvalidAmount(
                        "Amounts cannot be finer than cents".to_string(),
                    ));
                }
                deposit
            }
            _ => Decimal::ZERO,
        };

        let currency = opening
            .currency
            .unwrap_or_else(|| self.config.currency.clone());

        let mut account_number = numbers::account_number(opening.account_type);
        while self
            .repo
            .get_account_by_number(&account_number)
            .await?
            .is_some()
        {
            account_number = numbers::account_number(opening.account_type);
        }

        let account = Account::new(
            opening.customer_id,
            opening.account_type,
            account_number,
            currency,
        )
        .with_balance(initial_balance);
        self.repo.save_account(&account).await?;

        info!(
            account_number = %account.account_number,
            account_type = %account.account_type,
            "opened account"
        );
        Ok(account)
    }

    /// Close an account. Requires status ACTIVE and a balance of exactly
    /// zero; CLOSED is terminal.
    pub async fn close_account(&self, id: AccountId) -> Result<Account, EngineError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let mut account = self.get_account(id).await?;
        if account.status != AccountStatus::Active || account.balance != Decimal::ZERO {
            return Err(EngineError::AccountNotClosable {
                account_number: account.account_number,
                status: account.status,
                balance: account.balance,
            });
        }

        self.repo
            .update_account_status(id, AccountStatus::Closed)
            .await?;
        account.status = AccountStatus::Closed;

        info!(account_number = %account.account_number, "closed account");
        Ok(account)
    }

    /// Freeze an ACTIVE account, blocking transactions without closing it.
    pub async fn freeze_account(
        &self,
        id: AccountId,
        reason: Option<String>,
    ) -> Result<Account, EngineError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let mut account = self.get_account(id).await?;
        if account.status != AccountStatus::Active {
            return Err(EngineError::AccountNotTransactable {
                account_number: account.account_number,
                account_type: account.account_type,
                status: account.status,
            });
        }

        self.repo
            .update_account_status(id, AccountStatus::Frozen)
            .await?;
        account.status = AccountStatus::Frozen;

        warn!(
            account_number = %account.account_number,
            reason = reason.as_deref().unwrap_or("unspecified"),
            "froze account"
        );
        Ok(account)
    }

    /// Thaw a FROZEN account back to ACTIVE.
    pub async fn unfreeze_account(&self, id: AccountId) -> Result<Account, EngineError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let mut account = self.get_account(id).await?;
        if account.status != AccountStatus::Frozen {
            return Err(EngineError::AccountNotTransactable {
                account_number: account.account_number,
                account_type: account.account_type,
                status: account.status,
            });
        }

        // A frozen account does not count as ACTIVE, so another account
        // may have been opened in the meantime.
        if let Some(existing) = self.repo.get_active_account(account.customer_id).await? {
            return Err(EngineError::SingleAccountViolation {
                account_type: existing.account_type,
                account_number: existing.account_number,
            });
        }

        self.repo
            .update_account_status(id, AccountStatus::Active)
            .await?;
        account.status = AccountStatus::Active;

        info!(account_number = %account.account_number, "unfroze account");
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, EngineError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(id.to_string()))
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Account, EngineError> {
        self.repo
            .get_account_by_number(account_number)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(account_number.to_string()))
    }

    /// List a customer's accounts, optionally filtered by type.
    pub async fn list_customer_accounts(
        &self,
        customer_id: CustomerId,
        account_type: Option<AccountType>,
    ) -> Result<Vec<Account>, EngineError> {
        Ok(self
            .repo
            .list_customer_accounts(customer_id, account_type)
            .await?)
    }

    /// Current balance for an account.
    pub async fn balance(&self, id: AccountId) -> Result<BalanceSnapshot, EngineError> {
        let account = self.get_account(id).await?;
        Ok(BalanceSnapshot {
            account_id: account.id,
            account_number: account.account_number,
            balance: account.balance,
            currency: account.currency,
            status: account.status,
            as_of: Utc::now(),
        })
    }
}
