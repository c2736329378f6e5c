//! Reconciliation of extracted summary figures against the transaction list
//!
//! Both identities are checked with exact decimal equality. There is no
//! tolerance: a statement that is off by a single cent is rejected.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::*;

/// The arithmetic identity that failed during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationCheck {
    /// beginning balance + credits - debits == ending balance
    Balance,
    /// sum of ordinary transactions == credits - debits
    TransactionTotal,
}

impl fmt::Display for ReconciliationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationCheck::Balance => f.write_str("ending balance"),
            ReconciliationCheck::TransactionTotal => f.write_str("transaction total"),
        }
    }
}

/// Whether the summary figures satisfy the balance identity
pub fn is_balanced(
    beginning_balance: &BigDecimal,
    total_credits: &BigDecimal,
    total_debits: &BigDecimal,
    ending_balance: &BigDecimal,
) -> bool {
    &(beginning_balance + total_credits - total_debits) == ending_balance
}

/// Whether the transaction amounts add up to the period's net movement
pub fn is_transaction_complete(
    transactions: &[Transaction],
    total_credits: &BigDecimal,
    total_debits: &BigDecimal,
) -> bool {
    let sum: BigDecimal = transactions.iter().map(|t| &t.amount).sum();
    sum == total_credits - total_debits
}

/// Check both identities on an extracted statement.
///
/// The balance identity is checked first. Installment rows are not part of
/// either identity.
pub fn reconcile(statement: &Statement) -> StatementResult<()> {
    if !is_balanced(
        &statement.beginning_balance,
        &statement.total_credits,
        &statement.total_debits,
        &statement.ending_balance,
    ) {
        return Err(StatementError::ReconciliationFailed {
            check: ReconciliationCheck::Balance,
            expected: statement.ending_balance.clone(),
            computed: &statement.beginning_balance + statement.net_change(),
        });
    }

    if !is_transaction_complete(
        &statement.transactions,
        &statement.total_credits,
        &statement.total_debits,
    ) {
        return Err(StatementError::ReconciliationFailed {
            check: ReconciliationCheck::TransactionTotal,
            expected: statement.net_change(),
            computed: statement.transaction_total(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn card(amount: &str) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2025, 10, 4).unwrap();
        Transaction::card(date, "PURCHASE".to_string(), dec(amount), date)
    }

    #[test]
    fn test_is_balanced() {
        let (beginning, credits, debits) = (dec("100"), dec("50"), dec("20"));
        assert!(is_balanced(&beginning, &credits, &debits, &dec("130")));
        assert!(!is_balanced(&beginning, &credits, &debits, &dec("131")));
    }

    #[test]
    fn test_is_balanced_has_no_tolerance() {
        assert!(!is_balanced(
            &dec("100.00"),
            &dec("50.00"),
            &dec("20.00"),
            &dec("130.01")
        ));
        assert!(is_balanced(
            &dec("0.10"),
            &dec("0.20"),
            &dec("0"),
            &dec("0.3")
        ));
    }

    #[test]
    fn test_is_transaction_complete() {
        let transactions = vec![card("40.00"), card("15.50"), card("-25.50")];
        assert!(is_transaction_complete(&transactions, &dec("50"), &dec("20")));

        let off_by_a_cent = vec![card("40.00"), card("15.51"), card("-25.50")];
        assert!(!is_transaction_complete(&off_by_a_cent, &dec("50"), &dec("20")));
    }

    #[test]
    fn test_empty_listing_matches_zero_movement() {
        assert!(is_transaction_complete(&[], &dec("0.00"), &dec("0.00")));
        assert!(!is_transaction_complete(&[], &dec("0.01"), &dec("0.00")));
    }

    #[test]
    fn test_reconcile_reports_balance_first() {
        let mut statement = Statement::new("bpi-credit".to_string(), String::new());
        statement.beginning_balance = dec("100");
        statement.total_credits = dec("50");
        statement.total_debits = dec("20");
        statement.ending_balance = dec("131");

        let err = reconcile(&statement).unwrap_err();
        assert_eq!(
            err,
            StatementError::ReconciliationFailed {
                check: ReconciliationCheck::Balance,
                expected: dec("131"),
                computed: dec("130"),
            }
        );
    }

    #[test]
    fn test_reconcile_reports_transaction_total() {
        let mut statement = Statement::new("bpi-credit".to_string(), String::new());
        statement.beginning_balance = dec("100");
        statement.total_credits = dec("50");
        statement.total_debits = dec("20");
        statement.ending_balance = dec("130");
        statement.transactions = vec![card("29.99")];

        let err = reconcile(&statement).unwrap_err();
        assert_eq!(
            err,
            StatementError::ReconciliationFailed {
                check: ReconciliationCheck::TransactionTotal,
                expected: dec("30"),
                computed: dec("29.99"),
            }
        );

        statement.transactions = vec![card("30.00")];
        assert!(reconcile(&statement).is_ok());
    }

    #[test]
    fn test_installments_stay_out_of_reconciliation() {
        let mut statement = Statement::new("bpi-credit".to_string(), String::new());
        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        statement.installment_transactions.push(Transaction::installment(
            date,
            "LAPTOP".to_string(),
            dec("1000.00"),
            date,
            dec("9000.00"),
        ));

        assert!(reconcile(&statement).is_ok());
    }
}
