use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    AccountOpening, ApprovalTerms, Engine, LoanApplicationRequest, ReviewDecision,
    TransactionFilter,
};
use crate::config::BankConfig;
use crate::domain::{
    format_amount, parse_amount, Account, AccountType, ApplicationStatus, Customer,
    LoanApplication, Transaction, TransactionStatus, TransactionType,
};

/// Mutuum - Ledger & Lending Engine
#[derive(Parser)]
#[command(name = "mutuum")]
#[command(about = "A retail banking ledger and lending engine for the command line")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "mutuum.db")]
    pub database: String,

    /// Bank configuration file (TOML); built-in defaults if omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit into a checking account
    Deposit {
        /// Account ID or account number
        account: String,

        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,

        /// Currency of the deposit; must match the account
        #[arg(short, long, default_value = "USD")]
        currency: String,

        /// Description of the deposit
        #[arg(long)]
        description: Option<String>,
    },

    /// Withdraw from a checking account
    Withdraw {
        /// Account ID or account number
        account: String,

        /// Amount to withdraw (e.g., "50.00" or "50")
        amount: String,

        /// Currency of the withdrawal; must match the account
        #[arg(short, long, default_value = "USD")]
        currency: String,

        /// Description of the withdrawal
        #[arg(long)]
        description: Option<String>,
    },

    /// List an account's transactions
    Transactions {
        /// Account ID or account number
        account: String,

        /// Filter by type: deposit, withdrawal, loan_disbursement, loan_payment
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,

        /// Filter by status: pending, completed, failed, reversed
        #[arg(short, long)]
        status: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of transactions to skip
        #[arg(long)]
        offset: Option<i64>,
    },

    /// Reverse a completed transaction
    Reverse {
        /// Transaction ID or reference number
        id: String,

        /// Reason for the reversal
        #[arg(short, long)]
        reason: String,
    },

    /// Loan application commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Bank-level reporting commands
    #[command(subcommand)]
    Bank(BankCommands),

    /// Export an account statement to CSV
    Export {
        /// Account ID or account number
        account: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a new customer
    Create {
        /// Customer's full name
        name: String,

        /// Email address (must be unique)
        email: String,
    },

    /// List all customers
    List,

    /// Show detailed customer information
    Show {
        /// Customer ID or email
        customer: String,
    },

    /// Suspend a customer
    Suspend {
        /// Customer ID or email
        customer: String,

        /// Reason for the suspension
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Reactivate a suspended customer
    Activate {
        /// Customer ID or email
        customer: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account for a customer
    Open {
        /// Customer ID or email
        customer: String,

        /// Account type: checking, loan
        #[arg(short = 't', long = "type", default_value = "checking")]
        account_type: String,

        /// Initial deposit for checking accounts (e.g., "100.00")
        #[arg(long)]
        deposit: Option<String>,

        /// Currency code; defaults to the configured currency
        #[arg(long)]
        currency: Option<String>,
    },

    /// Close an account (balance must be zero)
    Close {
        /// Account ID or account number
        account: String,
    },

    /// Freeze an account, blocking all money movement
    Freeze {
        /// Account ID or account number
        account: String,

        /// Reason for the freeze
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Unfreeze a frozen account
    Unfreeze {
        /// Account ID or account number
        account: String,
    },

    /// Show detailed account information
    Show {
        /// Account ID or account number
        account: String,
    },

    /// List a customer's accounts
    List {
        /// Customer ID or email
        customer: String,

        /// Filter by type: checking, loan
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Submit a loan application
    Apply {
        /// Customer ID or email
        customer: String,

        /// Requested amount (e.g., "5000.00")
        amount: String,

        /// Term in months
        #[arg(short, long)]
        term: i64,

        /// Purpose of the loan
        #[arg(short, long)]
        purpose: String,

        /// Employment status (e.g., "employed", "self-employed")
        #[arg(long)]
        employment: String,

        /// Annual income (e.g., "85000.00")
        #[arg(long)]
        income: String,

        /// External account number for settlement
        #[arg(long)]
        external_account: String,

        /// External routing number for settlement
        #[arg(long)]
        external_routing: String,
    },

    /// Review a pending application (approve or reject)
    Review {
        /// Application ID or application number
        application: String,

        /// Decision: approve, reject
        decision: String,

        /// Approved amount (defaults to the requested amount)
        #[arg(long)]
        amount: Option<String>,

        /// Annual interest rate as a fraction (e.g., "0.0525")
        #[arg(long)]
        rate: Option<String>,

        /// Term override in months
        #[arg(long)]
        term: Option<i64>,

        /// Rejection reason (required when rejecting)
        #[arg(long)]
        reason: Option<String>,
    },

    /// Disburse an approved loan
    Disburse {
        /// Application ID or application number
        application: String,

        /// Confirm the disbursement; refused without this flag
        #[arg(long)]
        confirm: bool,
    },

    /// Cancel a pending application
    Cancel {
        /// Application ID or application number
        application: String,
    },

    /// Make a payment against a loan account
    Pay {
        /// Loan account ID or account number
        account: String,

        /// Payment amount (e.g., "250.00")
        amount: String,

        /// Description of the payment
        #[arg(long)]
        description: Option<String>,
    },

    /// Show detailed application information
    Show {
        /// Application ID or application number
        application: String,
    },

    /// List loan applications
    List {
        /// Filter by customer ID or email
        #[arg(long)]
        customer: Option<String>,

        /// Filter by status: pending, approved, rejected, disbursed, cancelled
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of applications to show
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of applications to skip
        #[arg(long)]
        offset: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum BankCommands {
    /// Show the bank's financial status
    Status {
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show how deposits split between usable and reserved funds
    Reserves {
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => BankConfig::from_file(path)?,
            None => BankConfig::default(),
        };

        match self.command {
            Commands::Init => {
                Engine::init(&self.database, config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Customer(customer_cmd) => {
                let engine = Engine::connect(&self.database, config).await?;
                run_customer_command(&engine, customer_cmd).await?;
            }

            Commands::Account(account_cmd) => {
                let engine = Engine::connect(&self.database, config).await?;
                run_account_command(&engine, account_cmd).await?;
            }

            Commands::Deposit {
                account,
                amount,
                currency,
                description,
            } => {
                let engine = Engine::connect(&self.database, config).await?;
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let target = resolve_account(&engine, &account).await?;

                let transaction = engine
                    .transactions
                    .deposit(target.id, amount, &currency, description)
                    .await?;

                println!(
                    "Deposited {} into {} ({})",
                    format_amount(transaction.amount),
                    target.account_number,
                    transaction.reference_number
                );
                println!("New balance: {}", format_amount(transaction.balance_after));
            }

            Commands::Withdraw {
                account,
                amount,
                currency,
                description,
            } => {
                let engine = Engine::connect(&self.database, config).await?;
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let target = resolve_account(&engine, &account).await?;

                let transaction = engine
                    .transactions
                    .withdraw(target.id, amount, &currency, description)
                    .await?;

                println!(
                    "Withdrew {} from {} ({})",
                    format_amount(transaction.amount),
                    target.account_number,
                    transaction.reference_number
                );
                println!("New balance: {}", format_amount(transaction.balance_after));
            }

            Commands::Transactions {
                account,
                transaction_type,
                status,
                from_date,
                to_date,
                limit,
                offset,
            } => {
                let engine = Engine::connect(&self.database, config).await?;
                run_transactions_command(
                    &engine,
                    &account,
                    transaction_type,
                    status,
                    from_date,
                    to_date,
                    limit,
                    offset,
                )
                .await?;
            }

            Commands::Reverse { id, reason } => {
                let engine = Engine::connect(&self.database, config).await?;
                let original = resolve_transaction(&engine, &id).await?;

                let reversed = engine
                    .transactions
                    .reverse_transaction(original.id, &reason)
                    .await?;

                println!(
                    "Reversed {}: {} {} ({})",
                    reversed.reference_number,
                    reversed.transaction_type,
                    format_amount(reversed.amount),
                    reversed.status
                );
            }

            Commands::Loan(loan_cmd) => {
                let engine = Engine::connect(&self.database, config).await?;
                run_loan_command(&engine, loan_cmd).await?;
            }

            Commands::Bank(bank_cmd) => {
                let engine = Engine::connect(&self.database, config).await?;
                run_bank_command(&engine, bank_cmd).await?;
            }

            Commands::Export {
                account,
                output,
                from_date,
                to_date,
            } => {
                let engine = Engine::connect(&self.database, config).await?;
                run_export_command(&engine, &account, output.as_deref(), from_date, to_date)
                    .await?;
            }
        }

        Ok(())
    }
}

async fn run_customer_command(engine: &Engine, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Create { name, email } => {
            let customer = engine.customers.create_customer(name, email).await?;
            println!("Created customer: {} <{}>", customer.name, customer.email);
            println!("  ID: {}", customer.id);
        }

        CustomerCommands::List => {
            let customers = engine.customers.list_customers().await?;
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<38} {:<24} {:<28} {:<10}", "ID", "NAME", "EMAIL", "STATUS");
                println!("{}", "-".repeat(100));
                for customer in customers {
                    println!(
                        "{:<38} {:<24} {:<28} {:<10}",
                        customer.id,
                        truncate(&customer.name, 24),
                        truncate(&customer.email, 28),
                        customer.status
                    );
                }
            }
        }

        CustomerCommands::Show { customer } => {
            let customer = resolve_customer(engine, &customer).await?;

            println!("Customer: {}", customer.name);
            println!("  ID:      {}", customer.id);
            println!("  Email:   {}", customer.email);
            println!("  Status:  {}", customer.status);
            println!(
                "  Created: {}",
                customer.created_at.format("%Y-%m-%d %H:%M:%S")
            );

            let accounts = engine
                .accounts
                .list_customer_accounts(customer.id, None)
                .await?;
            if !accounts.is_empty() {
                println!();
                println!("  {:<16} {:<10} {:<8} {:>14}", "ACCOUNT", "TYPE", "STATUS", "BALANCE");
                for account in accounts {
                    println!(
                        "  {:<16} {:<10} {:<8} {:>14}",
                        account.account_number,
                        account.account_type,
                        account.status,
                        format_amount(account.balance)
                    );
                }
            }
        }

        CustomerCommands::Suspend { customer, reason } => {
            let customer = resolve_customer(engine, &customer).await?;
            let customer = engine
                .customers
                .suspend_customer(customer.id, reason)
                .await?;
            println!("Suspended customer: {} <{}>", customer.name, customer.email);
        }

        CustomerCommands::Activate { customer } => {
            let customer = resolve_customer(engine, &customer).await?;
            let customer = engine.customers.activate_customer(customer.id).await?;
            println!("Activated customer: {} <{}>", customer.name, customer.email);
        }
    }
    Ok(())
}

async fn run_account_command(engine: &Engine, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            customer,
            account_type,
            deposit,
            currency,
        } => {
            let account_type = parse_account_type(&account_type)?;
            let initial_deposit = deposit
                .map(|a| parse_amount(&a))
                .transpose()
                .context("Invalid deposit format. Use '100.00' or '100'")?;
            let customer = resolve_customer(engine, &customer).await?;

            let account = engine
                .accounts
                .create_account(AccountOpening {
                    customer_id: customer.id,
                    account_type,
                    initial_deposit,
                    currency,
                })
                .await?;

            println!(
                "Opened {} account: {} ({})",
                account.account_type, account.account_number, account.currency
            );
            println!("  Balance: {}", format_amount(account.balance));
        }

        AccountCommands::Close { account } => {
            let account = resolve_account(engine, &account).await?;
            let account = engine.accounts.close_account(account.id).await?;
            println!("Closed account: {}", account.account_number);
        }

        AccountCommands::Freeze { account, reason } => {
            let account = resolve_account(engine, &account).await?;
            let account = engine.accounts.freeze_account(account.id, reason).await?;
            println!("Froze account: {}", account.account_number);
        }

        AccountCommands::Unfreeze { account } => {
            let account = resolve_account(engine, &account).await?;
            let account = engine.accounts.unfreeze_account(account.id).await?;
            println!("Unfroze account: {}", account.account_number);
        }

        AccountCommands::Show { account } => {
            let account = resolve_account(engine, &account).await?;

            println!("Account: {}", account.account_number);
            println!("  ID:       {}", account.id);
            println!("  Customer: {}", account.customer_id);
            println!("  Type:     {}", account.account_type);
            println!("  Status:   {}", account.status);
            println!(
                "  Balance:  {} {}",
                format_amount(account.balance),
                account.currency
            );
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        AccountCommands::List {
            customer,
            account_type,
        } => {
            let account_type = account_type.as_deref().map(parse_account_type).transpose()?;
            let customer = resolve_customer(engine, &customer).await?;
            let accounts = engine
                .accounts
                .list_customer_accounts(customer.id, account_type)
                .await?;

            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<16} {:<10} {:<8} {:>14} {:<8}",
                    "ACCOUNT", "TYPE", "STATUS", "BALANCE", "CURRENCY"
                );
                println!("{}", "-".repeat(60));
                for account in accounts {
                    println!(
                        "{:<16} {:<10} {:<8} {:>14} {:<8}",
                        account.account_number,
                        account.account_type,
                        account.status,
                        format_amount(account.balance),
                        account.currency
                    );
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_transactions_command(
    engine: &Engine,
    account: &str,
    transaction_type: Option<String>,
    status: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<()> {
    let transaction_type = transaction_type
        .as_deref()
        .map(parse_transaction_type)
        .transpose()?;
    let status = status.as_deref().map(parse_transaction_status).transpose()?;
    let (start, end) = parse_date_range(from_date, to_date)?;

    let account = resolve_account(engine, account).await?;
    let filter = TransactionFilter {
        transaction_type,
        status,
        start,
        end,
        limit,
        offset,
    };

    let (transactions, total) = engine
        .transactions
        .list_account_transactions(account.id, filter)
        .await?;

    if transactions.is_empty() {
        println!("No transactions found.");
    } else {
        println!(
            "{:<12} {:<20} {:<18} {:>12} {:>14} {:<10} DESCRIPTION",
            "DATE", "REFERENCE", "TYPE", "AMOUNT", "BALANCE", "STATUS"
        );
        println!("{}", "-".repeat(110));

        for transaction in transactions.iter().rev() {
            let date = transaction.created_at.format("%Y-%m-%d");
            let desc = transaction.description.as_deref().unwrap_or("");

            println!(
                "{:<12} {:<20} {:<18} {:>12} {:>14} {:<10} {}",
                date,
                transaction.reference_number,
                transaction.transaction_type,
                format_amount(transaction.signed_delta()),
                format_amount(transaction.balance_after),
                transaction.status,
                truncate(desc, 30)
            );
        }

        println!();
        println!(
            "Showing {} of {} transaction(s) for {}",
            transactions.len(),
            total,
            account.account_number
        );
    }
    Ok(())
}

async fn run_loan_command(engine: &Engine, cmd: LoanCommands) -> Result<()> {
    match cmd {
        LoanCommands::Apply {
            customer,
            amount,
            term,
            purpose,
            employment,
            income,
            external_account,
            external_routing,
        } => {
            let requested_amount =
                parse_amount(&amount).context("Invalid amount format. Use '5000.00' or '5000'")?;
            let annual_income =
                parse_amount(&income).context("Invalid income format. Use '85000.00'")?;
            let customer = resolve_customer(engine, &customer).await?;

            let application = engine
                .loans
                .submit_application(LoanApplicationRequest {
                    customer_id: customer.id,
                    requested_amount,
                    term_months: term,
                    purpose,
                    employment_status: employment,
                    annual_income,
                    external_account_number: external_account,
                    external_routing_number: external_routing,
                })
                .await?;

            println!("Submitted application: {}", application.application_number);
            println!(
                "  Requested: {} over {} months",
                format_amount(application.requested_amount),
                application.term_months
            );
        }

        LoanCommands::Review {
            application,
            decision,
            amount,
            rate,
            term,
            reason,
        } => {
            let target = resolve_application(engine, &application).await?;

            let decision = match decision.as_str() {
                "approve" => {
                    let approved_amount = amount
                        .map(|a| parse_amount(&a))
                        .transpose()
                        .context("Invalid amount format. Use '5000.00' or '5000'")?;
                    let interest_rate = rate
                        .map(|r| r.parse())
                        .transpose()
                        .context("Invalid rate. Use a fraction like '0.0525'")?;
                    ReviewDecision::Approve(ApprovalTerms {
                        approved_amount,
                        interest_rate,
                        term_months: term,
                    })
                }
                "reject" => {
                    let reason =
                        reason.context("A rejection requires --reason")?;
                    ReviewDecision::Reject { reason }
                }
                other => {
                    anyhow::bail!("Invalid decision '{}'. Valid decisions: approve, reject", other);
                }
            };

            let application = engine.loans.review_application(target.id, decision).await?;

            match application.status {
                ApplicationStatus::Approved => {
                    println!(
                        "Approved application {}: {}",
                        application.application_number,
                        format_amount(
                            application
                                .approved_amount
                                .unwrap_or(application.requested_amount)
                        )
                    );
                }
                _ => {
                    println!("Rejected application {}", application.application_number);
                }
            }
        }

        LoanCommands::Disburse {
            application,
            confirm,
        } => {
            let target = resolve_application(engine, &application).await?;
            let application = engine.loans.disburse_loan(target.id, confirm).await?;

            println!("Disbursed application {}", application.application_number);
            if let Some(loan_account_id) = application.loan_account_id {
                let account = engine.accounts.get_account(loan_account_id).await?;
                println!(
                    "  Loan account: {} (balance {})",
                    account.account_number,
                    format_amount(account.balance)
                );
            }
        }

        LoanCommands::Cancel { application } => {
            let target = resolve_application(engine, &application).await?;
            let application = engine.loans.cancel_application(target.id).await?;
            println!("Cancelled application {}", application.application_number);
        }

        LoanCommands::Pay {
            account,
            amount,
            description,
        } => {
            let amount =
                parse_amount(&amount).context("Invalid amount format. Use '250.00' or '250'")?;
            let target = resolve_account(engine, &account).await?;

            let transaction = engine
                .loans
                .make_loan_payment(target.id, amount, description)
                .await?;

            println!(
                "Payment of {} applied to {} ({})",
                format_amount(transaction.amount),
                target.account_number,
                transaction.reference_number
            );
            println!(
                "Outstanding debt: {}",
                format_amount(transaction.balance_after.abs())
            );
        }

        LoanCommands::Show { application } => {
            let application = resolve_application(engine, &application).await?;
            print_application(&application);
        }

        LoanCommands::List {
            customer,
            status,
            limit,
            offset,
        } => {
            let status = status.as_deref().map(parse_application_status).transpose()?;

            let (applications, total) = match customer {
                Some(key) => {
                    let customer = resolve_customer(engine, &key).await?;
                    let items = engine
                        .loans
                        .list_customer_applications(customer.id, status)
                        .await?;
                    let total = items.len() as i64;
                    (items, total)
                }
                None => {
                    engine
                        .loans
                        .list_applications(status, limit.unwrap_or(50), offset.unwrap_or(0))
                        .await?
                }
            };

            if applications.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<22} {:<10} {:>12} {:>12} {:<12}",
                    "NUMBER", "STATUS", "REQUESTED", "APPROVED", "APPLIED"
                );
                println!("{}", "-".repeat(74));
                for app in &applications {
                    println!(
                        "{:<22} {:<10} {:>12} {:>12} {:<12}",
                        app.application_number,
                        app.status,
                        format_amount(app.requested_amount),
                        app.approved_amount
                            .map(format_amount)
                            .unwrap_or_default(),
                        app.applied_at.format("%Y-%m-%d")
                    );
                }
                println!();
                println!("Showing {} of {} application(s)", applications.len(), total);
            }
        }
    }
    Ok(())
}

async fn run_bank_command(engine: &Engine, cmd: BankCommands) -> Result<()> {
    match cmd {
        BankCommands::Status { format } => {
            let status = engine.bank.financial_status().await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }

            println!("Financial Status");
            println!("As of: {}", status.as_of.format("%Y-%m-%d %H:%M:%S"));
            println!();
            println!(
                "  {:<24} {:>15}",
                "Bank capital:",
                format_amount(status.bank_capital)
            );
            println!(
                "  {:<24} {:>15}",
                "Customer deposits:",
                format_amount(status.customer_deposits)
            );
            println!(
                "  {:<24} {:>15}",
                "Usable deposits:",
                format_amount(status.usable_deposits)
            );
            println!(
                "  {:<24} {:>15}",
                "Reserved deposits:",
                format_amount(status.reserved_deposits)
            );
            println!(
                "  {:<24} {:>15}",
                "Loans outstanding:",
                format_amount(status.loans_outstanding)
            );
            println!("  {}", "-".repeat(40));
            println!(
                "  {:<24} {:>15}",
                "Available for lending:",
                format_amount(status.available_for_lending)
            );
            if status.overextended {
                println!();
                println!("  WARNING: the bank is overextended.");
            }
            println!();
            println!(
                "Accounts: {} active ({} checking, {} loan)",
                status.accounts.active_accounts,
                status.accounts.checking_accounts,
                status.accounts.loan_accounts
            );
        }

        BankCommands::Reserves { format } => {
            let reserves = engine.bank.reserve_status().await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&reserves)?);
                return Ok(());
            }

            println!("Reserve Status");
            println!();
            println!(
                "  {:<20} {:>15}",
                "Total deposits:",
                format_amount(reserves.total_deposits)
            );
            println!(
                "  {:<20} {:>15}",
                format!("Usable ({}%):", percentage(reserves.usable_ratio)),
                format_amount(reserves.usable_amount)
            );
            println!(
                "  {:<20} {:>15}",
                format!("Reserved ({}%):", percentage(reserves.reserved_ratio)),
                format_amount(reserves.reserved_amount)
            );
        }
    }
    Ok(())
}

async fn run_export_command(
    engine: &Engine,
    account: &str,
    output: Option<&str>,
    from_date: Option<String>,
    to_date: Option<String>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let (start, end) = parse_date_range(from_date, to_date)?;
    let account = resolve_account(engine, account).await?;

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let exporter = Exporter::new(engine);
    let count = exporter
        .export_statement_csv(writer, account.id, start, end)
        .await?;

    if output.is_some() {
        eprintln!(
            "Exported {} transaction(s) for {}",
            count, account.account_number
        );
    }

    Ok(())
}

// ========================
// Lookup and parse helpers
// ========================

async fn resolve_customer(engine: &Engine, key: &str) -> Result<Customer> {
    match Uuid::parse_str(key) {
        Ok(id) => Ok(engine.customers.get_customer(id).await?),
        Err(_) => Ok(engine.customers.get_customer_by_email(key).await?),
    }
}

async fn resolve_account(engine: &Engine, key: &str) -> Result<Account> {
    match Uuid::parse_str(key) {
        Ok(id) => Ok(engine.accounts.get_account(id).await?),
        Err(_) => Ok(engine.accounts.get_account_by_number(key).await?),
    }
}

async fn resolve_transaction(engine: &Engine, key: &str) -> Result<Transaction> {
    match Uuid::parse_str(key) {
        Ok(id) => Ok(engine.transactions.get_transaction(id).await?),
        Err(_) => Ok(engine.transactions.get_transaction_by_reference(key).await?),
    }
}

async fn resolve_application(engine: &Engine, key: &str) -> Result<LoanApplication> {
    match Uuid::parse_str(key) {
        Ok(id) => Ok(engine.loans.get_application(id).await?),
        Err(_) => Ok(engine.loans.get_application_by_number(key).await?),
    }
}

fn parse_account_type(s: &str) -> Result<AccountType> {
    AccountType::from_str(s)
        .ok_or_else(|| anyhow::anyhow!("Invalid account type '{}'. Valid types: checking, loan", s))
}

fn parse_transaction_type(s: &str) -> Result<TransactionType> {
    TransactionType::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid transaction type '{}'. Valid types: deposit, withdrawal, \
             loan_disbursement, loan_payment",
            s
        )
    })
}

fn parse_transaction_status(s: &str) -> Result<TransactionStatus> {
    TransactionStatus::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid statuses: pending, completed, failed, reversed",
            s
        )
    })
}

fn parse_application_status(s: &str) -> Result<ApplicationStatus> {
    ApplicationStatus::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid statuses: pending, approved, rejected, \
             disbursed, cancelled",
            s
        )
    })
}

fn print_application(app: &LoanApplication) {
    println!("Application: {}", app.application_number);
    println!("  ID:         {}", app.id);
    println!("  Customer:   {}", app.customer_id);
    println!("  Status:     {}", app.status);
    println!("  Requested:  {}", format_amount(app.requested_amount));
    if let Some(approved) = app.approved_amount {
        println!("  Approved:   {}", format_amount(approved));
    }
    if let Some(rate) = app.interest_rate {
        println!("  Rate:       {}", rate);
    }
    println!("  Term:       {} months", app.term_months);
    println!("  Purpose:    {}", app.purpose);
    println!("  Employment: {}", app.employment_status);
    println!("  Income:     {}", format_amount(app.annual_income));
    println!(
        "  External:   {} / {}",
        app.external_account_number, app.external_routing_number
    );
    println!(
        "  Applied:    {}",
        app.applied_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(reviewed) = app.reviewed_at {
        println!("  Reviewed:   {}", reviewed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(disbursed) = app.disbursed_at {
        println!("  Disbursed:  {}", disbursed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(reason) = &app.rejection_reason {
        println!("  Rejection:  {}", reason);
    }
    if let Some(loan_account_id) = app.loan_account_id {
        println!("  Loan acct:  {}", loan_account_id);
    }
}

/// Render a fractional ratio as a percentage without trailing zeros.
fn percentage(ratio: rust_decimal::Decimal) -> rust_decimal::Decimal {
    (ratio * rust_decimal::Decimal::ONE_HUNDRED).normalize()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}

/// Parse an optional from/to date pair into a half-open filter range.
/// The to-date is inclusive, so the range ends at the following midnight.
fn parse_date_range(
    from: Option<String>,
    to: Option<String>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let start = from
        .as_deref()
        .map(parse_date)
        .transpose()
        .context("Invalid from-date")?;
    let end = to
        .as_deref()
        .map(parse_date)
        .transpose()
        .context("Invalid to-date")?
        .map(|d| d + Duration::days(1));
    Ok((start, end))
}
