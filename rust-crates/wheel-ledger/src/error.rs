use crate::account::{
    AccountId,
    SpinToken,
};
use thiserror::Error;

/// Everything a ledger operation can fail with.
///
/// All variants are recoverable by the caller. Only [`Error::StoreUnavailable`]
/// is retried by the ledger itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no account registered for {0}")]
    AccountNotFound(AccountId),

    #[error("{0} already owns an account")]
    AlreadyRegistered(AccountId),

    #[error("unknown referral code {0:?}")]
    InvalidReferralCode(String),

    #[error("invalid {field}: {reason}")]
    InvalidProfileField { field: &'static str, reason: String },

    #[error("account {0} has no spins left")]
    NoSpinsAvailable(AccountId),

    #[error("account {account} holds {balance} points but the package costs {price}")]
    InsufficientBalance {
        account: AccountId,
        balance: u64,
        price: u64,
    },

    #[error("spin event {token} was already applied to account {account}")]
    DuplicateSpinEvent { account: AccountId, token: SpinToken },

    #[error("unknown spin package {0:?}")]
    UnknownPackage(String),

    #[error("spin token must not be empty")]
    InvalidSpinToken,

    #[error("{counter} of account {account} would overflow")]
    CounterOverflow {
        account: AccountId,
        counter: &'static str,
    },

    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("account store unavailable: {0:#}")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidProfileField {
            field,
            reason: reason.into(),
        }
    }

    /// Transient storage failures are the only kind worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}
