use crate::account::{
    Account,
    Transaction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub account: Account,
    pub transactions: usize,
    pub replayed_balance: i128,
    pub replayed_spins: i128,
    /// Set when a prefix of the log drove either counter below zero.
    pub went_negative: bool,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        !self.went_negative
            && self.replayed_balance == i128::from(self.account.balance)
            && self.replayed_spins == i128::from(self.account.spins_remaining)
    }
}

/// Rebuild balance and spins from zero using only the transaction log.
pub fn replay(account: Account, transactions: &[Transaction]) -> AuditReport {
    let mut balance = 0i128;
    let mut spins = 0i128;
    let mut went_negative = false;
    let mut count = 0;
    for transaction in transactions
        .iter()
        .filter(|tx| tx.account_id == account.id)
    {
        count += 1;
        balance += i128::from(transaction.amount);
        spins += i128::from(transaction.spins);
        went_negative |= balance < 0 || spins < 0;
    }
    AuditReport {
        account,
        transactions: count,
        replayed_balance: balance,
        replayed_spins: spins,
        went_negative,
    }
}
