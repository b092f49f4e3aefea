use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::BankConfig;
use crate::domain::{
    numbers, Account, AccountId, AccountType, Transaction, TransactionId, TransactionStatus,
    TransactionType,
};
use crate::storage::Repository;

use super::{validate_amount, AccountLocks, EngineError, LimitScope};

/// Filter for querying an account's transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Deposit and withdrawal execution, limits, and reversal.
pub struct TransactionService {
    repo: Arc<Repository>,
    config: BankConfig,
    locks: AccountLocks,
}

impl TransactionService {
    pub fn new(repo: Arc<Repository>, config: BankConfig, locks: AccountLocks) -> Self {
        Self {
            repo,
            config,
            locks,
        }
    }

    /// Deposit into a checking account.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        currency: &str,
        description: Option<String>,
    ) -> Result<Transaction, EngineError> {
        validate_amount(amount)?;

        let lock = self.locks.lock_for(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch_account(account_id).await?;
        Self::ensure_transactable(&account, AccountType::Checking)?;
        if account.currency != currency {
            return Err(EngineError::CurrencyMismatch {
                account_currency: account.currency,
                requested: currency.to_string(),
            });
        }

        let new_balance = account.balance + amount;
        let reference = self.next_reference().await?;
        let mut transaction = Transaction::new(
            account.id,
            TransactionType::Deposit,
            amount,
            account.currency.clone(),
            reference,
        );
        if let Some(text) = description {
            transaction = transaction.with_description(text);
        }

        let posted = self.post(transaction, new_balance).await?;
        info!(
            reference = %posted.reference_number,
            account_number = %account.account_number,
            amount = %amount,
            "deposit completed"
        );
        Ok(posted)
    }

    /// Withdraw from a checking account, subject to the per-transaction
    /// cap and the daily limit.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        currency: &str,
        description: Option<String>,
    ) -> Result<Transaction, EngineError> {
        validate_amount(amount)?;

        let lock = self.locks.lock_for(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch_account(account_id).await?;
        Self::ensure_transactable(&account, AccountType::Checking)?;
        if account.currency != currency {
            return Err(EngineError::CurrencyMismatch {
                account_currency: account.currency,
                requested: currency.to_string(),
            });
        }

        if amount > self.config.max_withdrawal {
            return Err(EngineError::TransactionLimitExceeded {
                scope: LimitScope::PerTransaction,
                limit: self.config.max_withdrawal,
                requested: amount,
                already_used: Decimal::ZERO,
            });
        }

        if amount > account.balance {
            return Err(EngineError::InsufficientFunds {
                account_number: account.account_number.clone(),
                balance: account.balance,
                requested: amount,
            });
        }

        let withdrawn_today = self.withdrawn_today(account.id).await?;
        if withdrawn_today + amount > self.config.daily_withdrawal_limit {
            return Err(EngineError::TransactionLimitExceeded {
                scope: LimitScope::Daily,
                limit: self.config.daily_withdrawal_limit,
                requested: amount,
                already_used: withdrawn_today,
            });
        }

        let new_balance = account.balance - amount;
        let reference = self.next_reference().await?;
        let mut transaction = Transaction::new(
            account.id,
            TransactionType::Withdrawal,
            amount,
            account.currency.clone(),
            reference,
        );
        if let Some(text) = description {
            transaction = transaction.with_description(text);
        }

        let posted = self.post(transaction, new_balance).await?;
        info!(
            reference = %posted.reference_number,
            account_number = %account.account_number,
            amount = %amount,
            "withdrawal completed"
        );
        Ok(posted)
    }

    /// Reverse a COMPLETED transaction: re-apply the inverse delta to the
    /// account and flip the row's status to REVERSED. The row itself is
    /// never deleted or rewritten.
    pub async fn reverse_transaction(
        &self,
        transaction_id: TransactionId,
        reason: &str,
    ) -> Result<Transaction, EngineError> {
        let located = self
            .repo
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))?;

        let lock = self.locks.lock_for(located.account_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; the status may have flipped meanwhile.
        let original = self
            .repo
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))?;

        if !original.is_reversible() {
            return Err(EngineError::TransactionNotReversible {
                reference_number: original.reference_number,
                status: original.status,
            });
        }

        let account = self.fetch_account(original.account_id).await?;
        let new_balance = account.balance + original.reversal_delta();
        if !account.allows_balance(new_balance) {
            return Err(EngineError::ReversalOutOfRange {
                reference_number: original.reference_number,
                account_number: account.account_number,
                resulting_balance: new_balance,
            });
        }

        self.repo
            .apply_reversal(original.id, account.id, new_balance)
            .await?;

        warn!(
            reference = %original.reference_number,
            account_number = %account.account_number,
            reason,
            "reversed transaction"
        );

        let mut reversed = original;
        reversed.status = TransactionStatus::Reversed;
        Ok(reversed)
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, EngineError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(id.to_string()))
    }

    /// Get a transaction by its reference number.
    pub async fn get_transaction_by_reference(
        &self,
        reference_number: &str,
    ) -> Result<Transaction, EngineError> {
        self.repo
            .get_transaction_by_reference(reference_number)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(reference_number.to_string()))
    }

    /// List an account's transactions, most recent first, together with
    /// the total row count for the filter (ignoring pagination).
    pub async fn list_account_transactions(
        &self,
        account_id: AccountId,
        filter: TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), EngineError> {
        let account = self.fetch_account(account_id).await?;

        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);

        let items = self
            .repo
            .list_account_transactions(
                account.id,
                filter.transaction_type,
                filter.status,
                filter.start,
                filter.end,
                limit,
                offset,
            )
            .await?;
        let total = self
            .repo
            .count_account_transactions(
                account.id,
                filter.transaction_type,
                filter.status,
                filter.start,
                filter.end,
            )
            .await?;

        Ok((items, total))
    }

    async fn fetch_account(&self, account_id: AccountId) -> Result<Account, EngineError> {
        self.repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))
    }

    fn ensure_transactable(account: &Account, expected: AccountType) -> Result<(), EngineError> {
        if account.account_type != expected || !account.can_transact() {
            return Err(EngineError::AccountNotTransactable {
                account_number: account.account_number.clone(),
                account_type: account.account_type,
                status: account.status,
            });
        }
        Ok(())
    }

    /// Sum of COMPLETED withdrawals so far in the current UTC calendar day.
    async fn withdrawn_today(&self, account_id: AccountId) -> Result<Decimal, EngineError> {
        let start_of_day = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let end_of_day = start_of_day + Duration::days(1);
        Ok(self
            .repo
            .sum_withdrawals_between(account_id, start_of_day, end_of_day)
            .await?)
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

    /// Commit the movement: balance update plus COMPLETED row in one
    /// storage transaction. On a storage failure the attempt is recorded
    /// best-effort as FAILED and the balance is left unchanged.
    async fn post(
        &self,
        transaction: Transaction,
        new_balance: Decimal,
    ) -> Result<Transaction, EngineError> {
        let completed = transaction.clone().completed(new_balance);
        match self
            .repo
            .apply_transaction(&completed, new_balance, None)
            .await
        {
            Ok(()) => Ok(completed),
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
}
