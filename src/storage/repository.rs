use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    from_cents, to_cents, Account, AccountId, AccountStatus, AccountType, ApplicationId,
    ApplicationStatus, Customer, CustomerId, CustomerStatus, LoanApplication, Transaction,
    TransactionId, TransactionStatus, TransactionType,
};

use super::MIGRATION_001_INITIAL;

/// Counts of ACTIVE accounts by type.
#[derive(Debug, Clone, Copy)]
pub struct AccountCounts {
    pub checking: i64,
    pub loan: i64,
    pub total: i64,
}

/// Repository for persisting and querying customers, accounts,
/// transactions, and loan applications.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Customer operations
    // ========================

    /// Save a new customer to the database.
    pub async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.status.as_str())
        .bind(customer.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, status, created_at
            FROM customers
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_customer(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a customer by email address.
    pub async fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, status, created_at
            FROM customers
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer by email")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_customer(&row)?)),
            None => Ok(None),
        }
    }

    /// List all customers, ordered by name.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, status, created_at
            FROM customers
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Update a customer's status.
    pub async fn update_customer_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE customers SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update customer status")?;
        Ok(())
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            name: row.get("name"),
            email: row.get("email"),
            status: CustomerStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid customer status: {}", status_str))?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let balance_cents = to_cents(account.balance).context("Account balance out of range")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, account_type, account_number, status, balance_cents, currency, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.customer_id.to_string())
        .bind(account.account_type.as_str())
        .bind(&account.account_number)
        .bind(account.status.as_str())
        .bind(balance_cents)
        .bind(&account.currency)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, account_type, account_number, status, balance_cents, currency, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, account_type, account_number, status, balance_cents, currency, created_at
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a customer's ACTIVE account, if any. At most one exists.
    pub async fn get_active_account(&self, customer_id: CustomerId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, account_type, account_number, status, balance_cents, currency, created_at
            FROM accounts
            WHERE customer_id = ? AND status = 'ACTIVE'
            "#,
        )
        .bind(customer_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch active account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List a customer's accounts, optionally filtered by type.
    pub async fn list_customer_accounts(
        &self,
        customer_id: CustomerId,
        account_type: Option<AccountType>,
    ) -> Result<Vec<Account>> {
        let rows = match account_type {
            Some(account_type) => {
                sqlx::query(
                    r#"
                    SELECT id, customer_id, account_type, account_number, status, balance_cents, currency, created_at
                    FROM accounts
                    WHERE customer_id = ? AND account_type = ?
                    ORDER BY created_at
                    "#,
                )
                .bind(customer_id.to_string())
                .bind(account_type.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, customer_id, account_type, account_number, status, balance_cents, currency, created_at
                    FROM accounts
                    WHERE customer_id = ?
                    ORDER BY created_at
                    "#,
                )
                .bind(customer_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Update an account's status.
    pub async fn update_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update account status")?;
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let customer_id_str: String = row.get("customer_id");
        let account_type_str: String = row.get("account_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            customer_id: Uuid::parse_str(&customer_id_str).context("Invalid customer ID")?,
            account_type: AccountType::from_str(&account_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", account_type_str))?,
            account_number: row.get("account_number"),
            status: AccountStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account status: {}", status_str))?,
            balance: from_cents(row.get("balance_cents")),
            currency: row.get("currency"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Save a transaction row without touching any balance.
    /// Used to record FAILED attempts.
    pub async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let amount_cents = to_cents(transaction.amount).context("Amount out of range")?;
        let balance_after_cents =
            to_cents(transaction.balance_after).context("Balance out of range")?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.transaction_type.as_str())
        .bind(amount_cents)
        .bind(&transaction.currency)
        .bind(balance_after_cents)
        .bind(&transaction.description)
        .bind(&transaction.reference_number)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.processed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    /// Atomically set the account's new balance and insert the completed
    /// transaction row. `new_account_status` additionally flips the account
    /// status in the same commit (a full loan payoff closes the account).
    pub async fn apply_transaction(
        &self,
        transaction: &Transaction,
        new_balance: Decimal,
        new_account_status: Option<AccountStatus>,
    ) -> Result<()> {
        let balance_cents = to_cents(new_balance).context("Balance out of range")?;
        let amount_cents = to_cents(transaction.amount).context("Amount out of range")?;
        let balance_after_cents =
            to_cents(transaction.balance_after).context("Balance out of range")?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("UPDATE accounts SET balance_cents = ? WHERE id = ?")
            .bind(balance_cents)
            .bind(transaction.account_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to update account balance")?;

        if let Some(status) = new_account_status {
            sqlx::query("UPDATE accounts SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(transaction.account_id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to update account status")?;
        }

        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.transaction_type.as_str())
        .bind(amount_cents)
        .bind(&transaction.currency)
        .bind(balance_after_cents)
        .bind(&transaction.description)
        .bind(&transaction.reference_number)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.processed_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await
        .context("Failed to save transaction")?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    /// Atomically restore the account balance and flip the original
    /// transaction's status to REVERSED.
    pub async fn apply_reversal(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<()> {
        let balance_cents = to_cents(new_balance).context("Balance out of range")?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("UPDATE accounts SET balance_cents = ? WHERE id = ?")
            .bind(balance_cents)
            .bind(account_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to update account balance")?;

        sqlx::query("UPDATE transactions SET status = 'REVERSED' WHERE id = ?")
            .bind(transaction_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to mark transaction reversed")?;

        tx.commit().await.context("Failed to commit reversal")?;
        Ok(())
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a transaction by its reference number.
    pub async fn get_transaction_by_reference(
        &self,
        reference_number: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at
            FROM transactions
            WHERE reference_number = ?
            "#,
        )
        .bind(reference_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction by reference")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// List transactions for an account with optional filters,
    /// most recent first.
    #[allow(clippy::too_many_arguments)]
    pub async fn list_account_transactions(
        &self,
        account_id: AccountId,
        transaction_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at FROM transactions WHERE account_id = ?"
        );

        // Collect string bindings first so they live long enough
        let account_id_str = account_id.to_string();
        let start_str = start.map(|dt| dt.to_rfc3339());
        let end_str = end.map(|dt| dt.to_rfc3339());

        if transaction_type.is_some() {
            query.push_str(" AND transaction_type = ?");
        }
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        if start.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        if end.is_some() {
            query.push_str(" AND created_at <= ?");
        }

        query.push_str(" ORDER BY created_at DESC");
        query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        let mut sql_query = sqlx::query(&query).bind(&account_id_str);

        if let Some(transaction_type) = transaction_type {
            sql_query = sql_query.bind(transaction_type.as_str());
        }
        if let Some(status) = status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(ref start_str) = start_str {
            sql_query = sql_query.bind(start_str);
        }
        if let Some(ref end_str) = end_str {
            sql_query = sql_query.bind(end_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count transactions for an account under the same filters as
    /// `list_account_transactions`, ignoring pagination.
    pub async fn count_account_transactions(
        &self,
        account_id: AccountId,
        transaction_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let mut query =
            String::from("SELECT COUNT(*) as count FROM transactions WHERE account_id = ?");

        let account_id_str = account_id.to_string();
        let start_str = start.map(|dt| dt.to_rfc3339());
        let end_str = end.map(|dt| dt.to_rfc3339());

        if transaction_type.is_some() {
            query.push_str(" AND transaction_type = ?");
        }
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        if start.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        if end.is_some() {
            query.push_str(" AND created_at <= ?");
        }

        let mut sql_query = sqlx::query(&query).bind(&account_id_str);

        if let Some(transaction_type) = transaction_type {
            sql_query = sql_query.bind(transaction_type.as_str());
        }
        if let Some(status) = status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(ref start_str) = start_str {
            sql_query = sql_query.bind(start_str);
        }
        if let Some(ref end_str) = end_str {
            sql_query = sql_query.bind(end_str);
        }

        let row = sql_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;

        Ok(row.get("count"))
    }

    /// Sum COMPLETED withdrawals for an account in `[start, end)`.
    /// Backs the daily withdrawal limit check.
    pub async fn sum_withdrawals_between(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE account_id = ?
              AND transaction_type = 'WITHDRAWAL'
              AND status = 'COMPLETED'
              AND created_at >= ?
              AND created_at < ?
            "#,
        )
        .bind(account_id.to_string())
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum withdrawals")?;

        Ok(from_cents(row.get("total")))
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let transaction_type_str: String = row.get("transaction_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");
        let processed_at_str: Option<String> = row.get("processed_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            transaction_type: TransactionType::from_str(&transaction_type_str).ok_or_else(
                || anyhow::anyhow!("Invalid transaction type: {}", transaction_type_str),
            )?,
            amount: from_cents(row.get("amount_cents")),
            currency: row.get("currency"),
            balance_after: from_cents(row.get("balance_after_cents")),
            description: row.get("description"),
            reference_number: row.get("reference_number"),
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            processed_at: processed_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid processed_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    // ========================
    // Loan application operations
    // ========================

    /// Save a new loan application to the database.
    pub async fn save_application(&self, application: &LoanApplication) -> Result<()> {
        let requested_cents =
            to_cents(application.requested_amount).context("Requested amount out of range")?;
        let approved_cents = application
            .approved_amount
            .map(to_cents)
            .transpose()
            .context("Approved amount out of range")?;
        let income_cents =
            to_cents(application.annual_income).context("Annual income out of range")?;

        sqlx::query(
            r#"
            INSERT INTO loan_applications (id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.id.to_string())
        .bind(application.customer_id.to_string())
        .bind(application.loan_account_id.map(|id| id.to_string()))
        .bind(&application.application_number)
        .bind(requested_cents)
        .bind(approved_cents)
        .bind(application.interest_rate.map(|r| r.to_string()))
        .bind(application.term_months)
        .bind(&application.purpose)
        .bind(&application.employment_status)
        .bind(income_cents)
        .bind(application.status.as_str())
        .bind(&application.rejection_reason)
        .bind(&application.external_account_number)
        .bind(&application.external_routing_number)
        .bind(application.applied_at.to_rfc3339())
        .bind(application.reviewed_at.map(|dt| dt.to_rfc3339()))
        .bind(application.disbursed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save loan application")?;
        Ok(())
    }

    /// Persist review-time and disbursement-time changes to an application.
    pub async fn update_application(&self, application: &LoanApplication) -> Result<()> {
        let approved_cents = application
            .approved_amount
            .map(to_cents)
            .transpose()
            .context("Approved amount out of range")?;

        sqlx::query(
            r#"
            UPDATE loan_applications
            SET status = ?, approved_amount_cents = ?, interest_rate = ?, term_months = ?,
                rejection_reason = ?, loan_account_id = ?, reviewed_at = ?, disbursed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(application.status.as_str())
        .bind(approved_cents)
        .bind(application.interest_rate.map(|r| r.to_string()))
        .bind(application.term_months)
        .bind(&application.rejection_reason)
        .bind(application.loan_account_id.map(|id| id.to_string()))
        .bind(application.reviewed_at.map(|dt| dt.to_rfc3339()))
        .bind(application.disbursed_at.map(|dt| dt.to_rfc3339()))
        .bind(application.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update loan application")?;
        Ok(())
    }

    /// Atomically create the loan account, insert the disbursement
    /// transaction, and mark the application DISBURSED.
    pub async fn apply_disbursement(
        &self,
        application: &LoanApplication,
        loan_account: &Account,
        transaction: &Transaction,
    ) -> Result<()> {
        let balance_cents =
            to_cents(loan_account.balance).context("Account balance out of range")?;
        let amount_cents = to_cents(transaction.amount).context("Amount out of range")?;
        let balance_after_cents =
            to_cents(transaction.balance_after).context("Balance out of range")?;
        let approved_cents = application
            .approved_amount
            .map(to_cents)
            .transpose()
            .context("Approved amount out of range")?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, account_type, account_number, status, balance_cents, currency, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan_account.id.to_string())
        .bind(loan_account.customer_id.to_string())
        .bind(loan_account.account_type.as_str())
        .bind(&loan_account.account_number)
        .bind(loan_account.status.as_str())
        .bind(balance_cents)
        .bind(&loan_account.currency)
        .bind(loan_account.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save loan account")?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, transaction_type, amount_cents, currency, balance_after_cents, description, reference_number, status, created_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.transaction_type.as_str())
        .bind(amount_cents)
        .bind(&transaction.currency)
        .bind(balance_after_cents)
        .bind(&transaction.description)
        .bind(&transaction.reference_number)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.processed_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await
        .context("Failed to save disbursement transaction")?;

        sqlx::query(
            r#"
            UPDATE loan_applications
            SET status = ?, approved_amount_cents = ?, loan_account_id = ?, disbursed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(application.status.as_str())
        .bind(approved_cents)
        .bind(application.loan_account_id.map(|id| id.to_string()))
        .bind(application.disbursed_at.map(|dt| dt.to_rfc3339()))
        .bind(application.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update loan application")?;

        tx.commit().await.context("Failed to commit disbursement")?;
        Ok(())
    }

    /// Get a loan application by ID.
    pub async fn get_application(&self, id: ApplicationId) -> Result<Option<LoanApplication>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at
            FROM loan_applications
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch loan application")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a loan application by its application number.
    pub async fn get_application_by_number(
        &self,
        application_number: &str,
    ) -> Result<Option<LoanApplication>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at
            FROM loan_applications
            WHERE application_number = ?
            "#,
        )
        .bind(application_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch loan application by number")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a customer's PENDING application, if any. At most one exists.
    pub async fn get_pending_application(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<LoanApplication>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at
            FROM loan_applications
            WHERE customer_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(customer_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch pending application")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    /// List a customer's applications, optionally filtered by status,
    /// most recent first.
    pub async fn list_customer_applications(
        &self,
        customer_id: CustomerId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<LoanApplication>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at
                    FROM loan_applications
                    WHERE customer_id = ? AND status = ?
                    ORDER BY applied_at DESC
                    "#,
                )
                .bind(customer_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at
                    FROM loan_applications
                    WHERE customer_id = ?
                    ORDER BY applied_at DESC
                    "#,
                )
                .bind(customer_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list customer applications")?;

        rows.iter().map(Self::row_to_application).collect()
    }

    /// List applications across all customers, optionally filtered by
    /// status, most recent first.
    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LoanApplication>> {
        let mut query = String::from(
            "SELECT id, customer_id, loan_account_id, application_number, requested_amount_cents, approved_amount_cents, interest_rate, term_months, purpose, employment_status, annual_income_cents, status, rejection_reason, external_account_number, external_routing_number, applied_at, reviewed_at, disbursed_at FROM loan_applications"
        );

        if status.is_some() {
            query.push_str(" WHERE status = ?");
        }
        query.push_str(" ORDER BY applied_at DESC");
        query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        let mut sql_query = sqlx::query(&query);
        if let Some(status) = status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list applications")?;

        rows.iter().map(Self::row_to_application).collect()
    }

    /// Count applications, optionally filtered by status.
    pub async fn count_applications(&self, status: Option<ApplicationStatus>) -> Result<i64> {
        let row = match status {
            Some(status) => {
                sqlx::query("SELECT COUNT(*) as count FROM loan_applications WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT COUNT(*) as count FROM loan_applications")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .context("Failed to count applications")?;

        Ok(row.get("count"))
    }

    fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Result<LoanApplication> {
        let id_str: String = row.get("id");
        let customer_id_str: String = row.get("customer_id");
        let loan_account_id_str: Option<String> = row.get("loan_account_id");
        let interest_rate_str: Option<String> = row.get("interest_rate");
        let approved_cents: Option<i64> = row.get("approved_amount_cents");
        let status_str: String = row.get("status");
        let applied_at_str: String = row.get("applied_at");
        let reviewed_at_str: Option<String> = row.get("reviewed_at");
        let disbursed_at_str: Option<String> = row.get("disbursed_at");

        Ok(LoanApplication {
            id: Uuid::parse_str(&id_str).context("Invalid application ID")?,
            customer_id: Uuid::parse_str(&customer_id_str).context("Invalid customer ID")?,
            loan_account_id: loan_account_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid loan account ID")?,
            application_number: row.get("application_number"),
            requested_amount: from_cents(row.get("requested_amount_cents")),
            approved_amount: approved_cents.map(from_cents),
            interest_rate: interest_rate_str
                .map(|s| s.parse::<Decimal>())
                .transpose()
                .context("Invalid interest rate")?,
            term_months: row.get("term_months"),
            purpose: row.get("purpose"),
            employment_status: row.get("employment_status"),
            annual_income: from_cents(row.get("annual_income_cents")),
            status: ApplicationStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid application status: {}", status_str))?,
            rejection_reason: row.get("rejection_reason"),
            external_account_number: row.get("external_account_number"),
            external_routing_number: row.get("external_routing_number"),
            applied_at: DateTime::parse_from_rfc3339(&applied_at_str)
                .context("Invalid applied_at timestamp")?
                .with_timezone(&Utc),
            reviewed_at: reviewed_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid reviewed_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
            disbursed_at: disbursed_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid disbursed_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    // ========================
    // Bank aggregates
    // ========================

    /// Sum of balances across ACTIVE checking accounts.
    pub async fn sum_checking_deposits(&self) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(balance_cents), 0) as total
            FROM accounts
            WHERE account_type = 'CHECKING' AND status = 'ACTIVE'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum deposits")?;

        Ok(from_cents(row.get("total")))
    }

    /// Total owed across ACTIVE loan accounts, as a positive figure.
    /// Loan balances are stored negative.
    pub async fn sum_loans_outstanding(&self) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(balance_cents), 0) as total
            FROM accounts
            WHERE account_type = 'LOAN' AND status = 'ACTIVE'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum loans")?;

        Ok(from_cents(row.get::<i64, _>("total")).abs())
    }

    /// Count ACTIVE accounts by type.
    pub async fn count_active_accounts(&self) -> Result<AccountCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN account_type = 'CHECKING' THEN 1 ELSE 0 END), 0) as checking,
                COALESCE(SUM(CASE WHEN account_type = 'LOAN' THEN 1 ELSE 0 END), 0) as loan,
                COUNT(*) as total
            FROM accounts
            WHERE status = 'ACTIVE'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count accounts")?;

        Ok(AccountCounts {
            checking: row.get("checking"),
            loan: row.get("loan"),
            total: row.get("total"),
        })
    }
}
