use crate::{
    Error,
    Result,
    account::{
        Account,
        AccountId,
        Entry,
        SpinToken,
        Transaction,
    },
};
use anyhow::anyhow;

// optimistic re-reads before a snapshot gives up on a busy account
const SNAPSHOT_ATTEMPTS: u32 = 16;

/// Durable keyed storage for accounts and their transaction log.
///
/// Every mutating call is one atomic unit: the account rows it touches, the
/// transactions it appends and any spin token it records either all become
/// visible or none do.
pub trait AccountStore {
    fn get(&self, id: AccountId) -> Result<Option<Account>>;

    /// look up the owner of an (already normalized) referral code
    fn find_by_referral_code(&self, code: &str) -> Result<Option<Account>>;

    /// create the account unless its id or referral code is taken, applying
    /// the signup entry and the optional referrer credit in the same unit
    fn create_if_absent(&self, new_account: &NewAccount) -> Result<CreateOutcome>;

    /// Run `update` against the current row and persist the result together
    /// with the entry it returns.
    ///
    /// Fails with `AccountNotFound` for unknown ids and `DuplicateSpinEvent`
    /// when `token` was already applied to this account. An error returned by
    /// `update` aborts the unit. `update` may be invoked more than once if the
    /// backend retries on write conflicts.
    fn atomic_update(
        &self,
        id: AccountId,
        token: Option<&SpinToken>,
        update: &dyn Fn(&mut Account) -> Result<Entry>,
    ) -> Result<Updated>;

    /// transactions of one account in append order
    fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>>;

    /// Read the row and its log as one consistent pair.
    ///
    /// The default reads the log on both sides of the row and retries while
    /// they differ. Since the log is append-only and every mutation appends,
    /// equal reads mean no unit committed while the row was read.
    fn snapshot(&self, id: AccountId) -> Result<Option<Snapshot>> {
        for _ in 0..SNAPSHOT_ATTEMPTS {
            let before = self.transactions(id)?;
            let Some(account) = self.get(id)? else {
                return Ok(None);
            };
            let after = self.transactions(id)?;
            if before == after {
                return Ok(Some(Snapshot {
                    account,
                    transactions: after,
                }));
            }
        }
        Err(Error::StoreUnavailable(anyhow!(
            "account {id} kept changing across {SNAPSHOT_ATTEMPTS} snapshot attempts"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account: Account,
    pub signup: Entry,
    pub referral: Option<ReferralCredit>,
}

#[derive(Debug, Clone)]
pub struct ReferralCredit {
    pub referrer: AccountId,
    pub bonus_spins: u32,
}

impl ReferralCredit {
    pub(crate) fn apply(&self, referrer: &mut Account, referee: AccountId) -> Result<Entry> {
        referrer.credit_spins(self.bonus_spins)?;
        referrer.total_referrals = referrer.total_referrals.checked_add(1).ok_or(
            crate::Error::CounterOverflow {
                account: referrer.id,
                counter: "total_referrals",
            },
        )?;
        Ok(Entry::referral_bonus(self.bonus_spins, referee))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created {
        account: Account,
        referrer: Option<Account>,
    },
    IdentityTaken,
    ReferralCodeTaken,
    ReferrerMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updated {
    pub account: Account,
    pub transaction: Transaction,
}
