// Application layer - services orchestrating the domain over storage.
// Each service owns one slice of the engine; `Engine` wires them up
// over a shared repository, config, and lock registry.

pub mod accounts;
pub mod bank;
pub mod customers;
pub mod error;
pub mod loans;
pub mod locks;
pub mod transactions;

pub use accounts::*;
pub use bank::*;
pub use customers::*;
pub use error::*;
pub use loans::*;
pub use locks::*;
pub use transactions::*;

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::config::BankConfig;
use crate::domain::money;
use crate::storage::Repository;

/// Shared amount validation: positive, no finer than cents.
pub(crate) fn validate_amount(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if !money::has_cent_precision(amount) {
        return Err(EngineError::InvalidAmount(
            "Amounts cannot be finer than cents".to_string(),
        ));
    }
    Ok(())
}

/// The assembled engine: one service per concern, sharing a repository,
/// configuration, per-account locks, and the lending lock.
pub struct Engine {
    pub customers: CustomerService,
    pub accounts: AccountService,
    pub transactions: TransactionService,
    pub loans: LoanService,
    pub bank: BankService,
}

impl Engine {
    pub fn new(repo: Repository, config: BankConfig) -> Self {
        let repo = Arc::new(repo);
        let locks = AccountLocks::new();
        let lending: LendingLock = Arc::new(tokio::sync::Mutex::new(()));
        let bank = BankService::new(repo.clone(), config.clone());

        Self {
            customers: CustomerService::new(repo.clone()),
            accounts: AccountService::new(repo.clone(), config.clone(), locks.clone()),
            transactions: TransactionService::new(repo.clone(), config.clone(), locks.clone()),
            loans: LoanService::new(
                repo.clone(),
                config.clone(),
                locks,
                lending,
                bank.clone(),
            ),
            bank,
        }
    }

    /// Create the database (if needed), run migrations, and assemble
    /// the engine.
    pub async fn init(db_path: &str, config: BankConfig) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", db_path);
        let repo = Repository::init(&url).await?;
        Ok(Self::new(repo, config))
    }

    /// Open an existing database without running migrations.
    pub async fn connect(db_path: &str, config: BankConfig) -> Result<Self> {
        let url = format!("sqlite:{}", db_path);
        let repo = Repository::connect(&url).await?;
        Ok(Self::new(repo, config))
    }
}
