use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::AccountId;

/// Engine-wide lock serializing reserve-check-then-commit spans of loan
/// approval and disbursement.
pub type LendingLock = Arc<tokio::sync::Mutex<()>>;

/// Registry of per-account async locks.
///
/// Every balance-mutating operation acquires its account's lock before
/// reading the balance and holds it through commit. Movements on one
/// account serialize; different accounts proceed in parallel.
#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for an account.
    pub fn lock_for(&self, account_id: AccountId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_same_account_same_lock() {
        let locks = AccountLocks::new();
        let id = Uuid::new_v4();
        let a = locks.lock_for(id);
        let b = locks.lock_for(id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_accounts_different_locks() {
        let locks = AccountLocks::new();
        let a = locks.lock_for(Uuid::new_v4());
        let b = locks.lock_for(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registry_shared_across_clones() {
        let locks = AccountLocks::new();
        let id = Uuid::new_v4();
        let a = locks.lock_for(id);
        let b = locks.clone().lock_for(id);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
