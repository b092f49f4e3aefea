use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bank-wide policy configuration.
///
/// Capital and the reserve ratio drive the lending capacity calculation;
/// the withdrawal limits bound single transactions and per-day totals.
/// Capital is a configuration input, not a persisted balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// The bank's own capital, independent of customer deposits.
    pub bank_capital: Decimal,

    /// Fraction of customer deposits the bank may redeploy as loans.
    /// The complement must stay liquid to cover withdrawals.
    pub reserve_ratio: Decimal,

    /// Maximum amount of a single withdrawal.
    pub max_withdrawal: Decimal,

    /// Maximum sum of completed withdrawals per account per UTC calendar day.
    pub daily_withdrawal_limit: Decimal,

    /// Currency code for accounts opened without an explicit currency.
    pub currency: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            bank_capital: Decimal::new(250_000_00, 2),
            reserve_ratio: Decimal::new(25, 2),
            max_withdrawal: Decimal::new(10_000_00, 2),
            daily_withdrawal_limit: Decimal::new(50_000_00, 2),
            currency: "USD".to_string(),
        }
    }
}

impl BankConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: BankConfig = toml::from_str(&content).context("Failed to parse config")?;
        Ok(config)
    }

    /// Fraction of deposits that must remain liquid.
    pub fn reserve_requirement(&self) -> Decimal {
        Decimal::ONE - self.reserve_ratio
    }
}
