use chrono::{DateTime, Utc};
use rand::Rng;

use super::account::AccountType;

/// Generate a candidate account number, e.g. "CHK-4827163950".
///
/// Uniqueness is the caller's responsibility; the services retry against
/// the store until the candidate is free.
pub fn account_number(account_type: AccountType) -> String {
    let digits: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
    format!("{}-{:010}", account_type.number_prefix(), digits)
}

/// Generate a candidate transaction reference, e.g. "TXN-20260314-952108".
pub fn transaction_reference(now: DateTime<Utc>) -> String {
    let digits: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("TXN-{}-{:06}", now.format("%Y%m%d"), digits)
}

/// Generate a candidate application number, e.g. "LOAN-20260314-269551".
pub fn application_number(now: DateTime<Utc>) -> String {
    let digits: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("LOAN-{}-{:06}", now.format("%Y%m%d"), digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_account_number_shape() {
        let number = account_number(AccountType::Checking);
        let (prefix, digits) = number.split_once('-').unwrap();
        assert_eq!(prefix, "CHK");
        assert_eq!(digits.len(), 10);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));

        let loan = account_number(AccountType::Loan);
        assert!(loan.starts_with("LOAN-"));
    }

    #[test]
    fn test_transaction_reference_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let reference = transaction_reference(now);
        assert!(reference.starts_with("TXN-20260314-"));
        let serial = reference.rsplit('-').next().unwrap();
        assert_eq!(serial.len(), 6);
        assert!(serial.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_application_number_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let number = application_number(now);
        assert!(number.starts_with("LOAN-20260314-"));
        assert_eq!(number.len(), "LOAN-20260314-000000".len());
    }
}
