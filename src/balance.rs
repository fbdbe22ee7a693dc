//! Running balance arithmetic
//!
//! Balances are `BigDecimal`, so a long chain of appends reproduces the same
//! digits for the same inputs no matter how many entries it spans.

use bigdecimal::BigDecimal;

use crate::types::ExpenseRecord;

/// Balance of a record appended after a record holding `last_balance`
pub fn next_balance(last_balance: &BigDecimal, amount: &BigDecimal) -> BigDecimal {
    last_balance + amount
}

/// Balance to stamp on a record appended after `last`
///
/// `last` is [`ExpenseRecord::zero`] for an empty store, whose balance is 0.
pub fn balance_after(last: &ExpenseRecord, amount: &BigDecimal) -> BigDecimal {
    next_balance(&last.balance, amount)
}

/// Index of the first record, in append order, whose balance is not the
/// previous balance plus its own amount
pub fn first_chain_break(records: &[ExpenseRecord]) -> Option<usize> {
    let mut running = BigDecimal::from(0);
    for (index, record) in records.iter().enumerate() {
        running = next_balance(&running, &record.amount);
        if running != record.balance {
            return Some(index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn test_next_balance_signed() {
        assert_eq!(next_balance(&dec("10.00"), &dec("-2.50")), dec("7.50"));
        assert_eq!(next_balance(&dec("0"), &dec("5.00")), dec("5.00"));
    }

    #[test]
    fn test_no_binary_float_drift() {
        let mut balance = BigDecimal::from(0);
        for _ in 0..1000 {
            balance = next_balance(&balance, &dec("0.1"));
        }
        assert_eq!(balance, dec("100"));
        assert_eq!(balance.to_string(), "100.0");
    }

    #[test]
    fn test_balance_after_empty_store() {
        assert_eq!(balance_after(&ExpenseRecord::zero(), &dec("3.25")), dec("3.25"));
    }

    #[test]
    fn test_first_chain_break() {
        let good = vec![
            ExpenseRecord::new("2020/01/01 00:00:00", dec("5"), dec("5")),
            ExpenseRecord::new("2020/01/01 00:00:01", dec("-2"), dec("3")),
        ];
        assert_eq!(first_chain_break(&good), None);

        let mut bad = good.clone();
        bad.push(ExpenseRecord::new("2020/01/01 00:00:02", dec("1"), dec("9")));
        assert_eq!(first_chain_break(&bad), Some(2));
    }
}
