use crate::{
    Error,
    Result,
    config::SpinPackage,
    prize_table::PrizeEntry,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Stable external identity of a player, e.g. their chat user id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub contact: String,
    pub payout_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub profile: Profile,
    pub balance: u64,
    pub spins_remaining: u32,
    pub referral_code: String,
    pub referred_by: Option<AccountId>,
    pub total_referrals: u32,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: AccountId,
        profile: Profile,
        referral_code: String,
        referred_by: Option<AccountId>,
    ) -> Self {
        Self {
            id,
            profile,
            balance: 0,
            spins_remaining: 0,
            referral_code,
            referred_by,
            total_referrals: 0,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn credit_balance(&mut self, amount: u64) -> Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or(Error::CounterOverflow {
            account: self.id,
            counter: "balance",
        })?;
        Ok(())
    }

    pub(crate) fn credit_spins(&mut self, spins: u32) -> Result<()> {
        self.spins_remaining =
            self.spins_remaining
                .checked_add(spins)
                .ok_or(Error::CounterOverflow {
                    account: self.id,
                    counter: "spins_remaining",
                })?;
        Ok(())
    }
}

/// Caller-supplied identifier of one logical spin event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpinToken(String);

impl SpinToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::InvalidSpinToken);
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpinToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Win,
    Purchase,
    ReferralBonus,
    SignupBonus,
}

/// Append-only audit record. `amount` is the signed balance delta and `spins`
/// the signed spin delta the owning account received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: i64,
    pub spins: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub spin_token: Option<SpinToken>,
    pub created_at: DateTime<Utc>,
}

/// A transaction before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: TransactionKind,
    pub amount: i64,
    pub spins: i64,
    pub label: Option<String>,
}

impl Entry {
    pub fn win(prize: &PrizeEntry) -> Self {
        Self {
            kind: TransactionKind::Win,
            amount: i64::try_from(prize.value).unwrap_or(i64::MAX),
            spins: -1,
            label: Some(prize.label.clone()),
        }
    }

    pub fn purchase(package: &SpinPackage) -> Self {
        Self {
            kind: TransactionKind::Purchase,
            amount: -i64::try_from(package.price).unwrap_or(i64::MAX),
            spins: i64::from(package.spins),
            label: Some(package.id.clone()),
        }
    }

    pub fn signup_bonus(spins: u32) -> Self {
        Self {
            kind: TransactionKind::SignupBonus,
            amount: 0,
            spins: i64::from(spins),
            label: None,
        }
    }

    pub fn referral_bonus(spins: u32, referee: AccountId) -> Self {
        Self {
            kind: TransactionKind::ReferralBonus,
            amount: 0,
            spins: i64::from(spins),
            label: Some(format!("referee {referee}")),
        }
    }

    pub fn into_transaction(
        self,
        id: u64,
        account_id: AccountId,
        spin_token: Option<SpinToken>,
    ) -> Transaction {
        Transaction {
            id,
            account_id,
            kind: self.kind,
            amount: self.amount,
            spins: self.spins,
            label: self.label,
            spin_token,
            created_at: Utc::now(),
        }
    }
}
