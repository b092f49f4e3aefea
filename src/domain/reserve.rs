use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A snapshot of the bank's fractional-reserve lending position.
///
/// The bank may lend its own capital plus `reserve_ratio` of customer
/// deposits; the remaining deposits stay liquid to cover withdrawals.
/// All figures are exact `Decimal` arithmetic, no rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePosition {
    pub bank_capital: Decimal,
    /// Sum of balances across ACTIVE checking accounts.
    pub total_deposits: Decimal,
    /// Fraction of deposits usable for lending, e.g. 0.25.
    pub reserve_ratio: Decimal,
    /// Total owed across ACTIVE loan accounts, as a positive figure.
    pub loans_outstanding: Decimal,
}

impl ReservePosition {
    pub fn usable_deposits(&self) -> Decimal {
        self.total_deposits * self.reserve_ratio
    }

    pub fn reserved_deposits(&self) -> Decimal {
        self.total_deposits - self.usable_deposits()
    }

    /// Available = capital + usable deposits - loans outstanding.
    pub fn available_for_lending(&self) -> Decimal {
        self.bank_capital + self.usable_deposits() - self.loans_outstanding
    }

    pub fn remaining_after(&self, amount: Decimal) -> Decimal {
        self.available_for_lending() - amount
    }

    /// A loan is approvable when lending it would not leave the position
    /// negative. Exactly exhausting capacity is allowed.
    pub fn can_lend(&self, amount: Decimal) -> bool {
        self.remaining_after(amount) >= Decimal::ZERO
    }

    pub fn is_overextended(&self) -> bool {
        self.available_for_lending() < Decimal::ZERO
    }
}
