use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::Write;

use crate::application::{Engine, TransactionFilter};
use crate::domain::AccountId;

/// Exporter for writing account statements to CSV.
pub struct Exporter<'a> {
    engine: &'a Engine,
}

impl<'a> Exporter<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Export an account's transaction history as CSV, oldest first.
    /// Returns the number of rows written.
    pub async fn export_statement_csv<W: Write>(
        &self,
        writer: W,
        account_id: AccountId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        // Probe for the total first so the real query covers every row.
        let probe = TransactionFilter {
            start,
            end,
            limit: Some(1),
            ..Default::default()
        };
        let (_, total) = self
            .engine
            .transactions
            .list_account_transactions(account_id, probe)
            .await?;

        let filter = TransactionFilter {
            start,
            end,
            limit: Some(total.max(1)),
            ..Default::default()
        };
        let (transactions, _) = self
            .engine
            .transactions
            .list_account_transactions(account_id, filter)
            .await?;

        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record([
            "reference",
            "type",
            "amount",
            "currency",
            "balance_after",
            "status",
            "description",
            "created_at",
            "processed_at",
        ])?;

        let mut count = 0;
        for transaction in transactions.iter().rev() {
            csv_writer.write_record([
                transaction.reference_number.clone(),
                transaction.transaction_type.as_str().to_string(),
                transaction.amount.to_string(),
                transaction.currency.clone(),
                transaction.balance_after.to_string(),
                transaction.status.as_str().to_string(),
                transaction.description.clone().unwrap_or_default(),
                transaction.created_at.to_rfc3339(),
                transaction
                    .processed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }
}
