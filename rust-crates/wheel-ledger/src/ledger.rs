use crate::{
    Error,
    Result,
    account::{
        Account,
        AccountId,
        Entry,
        Profile,
        SpinToken,
        Transaction,
    },
    audit::{
        self,
        AuditReport,
    },
    config::{
        LedgerConfig,
        SpinPackage,
    },
    ledger::account_store::{
        AccountStore,
        CreateOutcome,
        NewAccount,
        ReferralCredit,
    },
    prize_table::{
        PrizeEntry,
        PrizeTable,
        RollSource,
        ThreadRngRolls,
    },
    referral::{
        self,
        NoopNotifier,
        ReferralNotice,
        ReferralNotifier,
    },
    registration::{
        self,
        Registration,
        RegistrationProgress,
        RegistrationSession,
    },
};
use anyhow::anyhow;

pub mod account_store;
pub mod in_memory_account_store;
pub mod sled_account_store;


// salted regenerations tried before giving up on a unique referral code
const MAX_REFERRAL_CODE_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    pub prize: PrizeEntry,
    pub balance: u64,
    pub spins_remaining: u32,
    pub transaction_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOutcome {
    pub package: SpinPackage,
    pub balance: u64,
    pub spins_remaining: u32,
    pub transaction_id: u64,
}

/// Owns every mutation of an account's balance and spins.
///
/// The ledger holds no per-account state itself; atomicity comes from the
/// [`AccountStore`], so one `Ledger` can be shared across threads.
pub struct Ledger<Store, Rolls = ThreadRngRolls, Notifier = NoopNotifier> {
    store: Store,
    config: LedgerConfig,
    prizes: PrizeTable,
    rolls: Rolls,
    notifier: Notifier,
}

impl<Store> Ledger<Store> {
    pub fn new(store: Store, config: LedgerConfig) -> Result<Self> {
        let prizes = config.validate()?;
        Ok(Self {
            store,
            config,
            prizes,
            rolls: ThreadRngRolls,
            notifier: NoopNotifier,
        })
    }
}

impl<Store, Rolls, Notifier> Ledger<Store, Rolls, Notifier> {
    pub fn with_rolls<R: RollSource>(self, rolls: R) -> Ledger<Store, R, Notifier> {
        Ledger {
            store: self.store,
            config: self.config,
            prizes: self.prizes,
            rolls,
            notifier: self.notifier,
        }
    }

    pub fn with_notifier<N: ReferralNotifier>(
        self,
        notifier: N,
    ) -> Ledger<Store, Rolls, N> {
        Ledger {
            store: self.store,
            config: self.config,
            prizes: self.prizes,
            rolls: self.rolls,
            notifier,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn prize_table(&self) -> &PrizeTable {
        &self.prizes
    }

    pub fn packages(&self) -> &[SpinPackage] {
        &self.config.packages
    }
}

impl<Store, Rolls, Notifier> Ledger<Store, Rolls, Notifier>
where
    Store: AccountStore,
    Rolls: RollSource,
    Notifier: ReferralNotifier,
{
    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        with_retry("get account", || self.store.get(id))?.ok_or(Error::AccountNotFound(id))
    }

    pub fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>> {
        let _ = self.get_account(id)?;
        with_retry("read transactions", || self.store.transactions(id))
    }

    /// Replay the account's log and compare it with the stored row. Both are
    /// taken from one store snapshot, so concurrent spins cannot fake drift.
    pub fn audit(&self, id: AccountId) -> Result<AuditReport> {
        let snapshot = with_retry("snapshot account", || self.store.snapshot(id))?
            .ok_or(Error::AccountNotFound(id))?;
        Ok(audit::replay(snapshot.account, &snapshot.transactions))
    }

    /// Consume one spin and credit a prize drawn here, never one reported by
    /// the caller. A token is applied at most once per account.
    pub fn spin(&self, id: AccountId, token: &SpinToken) -> Result<SpinOutcome> {
        let prize = self.prizes.draw(&self.rolls)?.clone();
        let update = |account: &mut Account| -> Result<Entry> {
            if account.spins_remaining == 0 {
                return Err(Error::NoSpinsAvailable(account.id));
            }
            account.credit_balance(prize.value)?;
            account.spins_remaining -= 1;
            Ok(Entry::win(&prize))
        };
        let updated =
            with_retry("spin", || self.store.atomic_update(id, Some(token), &update))?;
        tracing::debug!(
            "account {id} won {} with token {token}; balance {}, spins left {}",
            prize.label,
            updated.account.balance,
            updated.account.spins_remaining
        );
        Ok(SpinOutcome {
            prize,
            balance: updated.account.balance,
            spins_remaining: updated.account.spins_remaining,
            transaction_id: updated.transaction.id,
        })
    }

    pub fn purchase_spins(&self, id: AccountId, package_id: &str) -> Result<PurchaseOutcome> {
        let package = self
            .config
            .package(package_id)
            .cloned()
            .ok_or_else(|| Error::UnknownPackage(package_id.to_string()))?;
        let update = |account: &mut Account| -> Result<Entry> {
            if account.balance < package.price {
                return Err(Error::InsufficientBalance {
                    account: account.id,
                    balance: account.balance,
                    price: package.price,
                });
            }
            account.credit_spins(package.spins)?;
            account.balance -= package.price;
            Ok(Entry::purchase(&package))
        };
        let updated = with_retry("purchase spins", || {
            self.store.atomic_update(id, None, &update)
        })?;
        tracing::info!(
            "account {id} bought package {} for {}; balance {}, spins left {}",
            package.id,
            package.price,
            updated.account.balance,
            updated.account.spins_remaining
        );
        Ok(PurchaseOutcome {
            package,
            balance: updated.account.balance,
            spins_remaining: updated.account.spins_remaining,
            transaction_id: updated.transaction.id,
        })
    }

    /// Create the account for `identity`, crediting the owner of
    /// `referral_code` in the same atomic store unit.
    pub fn register(
        &self,
        identity: AccountId,
        profile: Profile,
        referral_code: Option<&str>,
    ) -> Result<Registration> {
        let profile = registration::validate_profile(&profile, &self.config.profile)?;
        let referrer = match referral_code {
            Some(raw) => Some(self.resolve_referrer(raw)?),
            None => None,
        };
        let signup_spins = match referrer {
            Some(_) => self.config.referred_signup_spins,
            None => self.config.base_spins,
        };
        let referral = referrer.map(|referrer| ReferralCredit {
            referrer: referrer.id,
            bonus_spins: self.config.referral_bonus_spins,
        });

        for nonce in 0..MAX_REFERRAL_CODE_ATTEMPTS {
            let code = referral::referral_code(
                identity,
                &profile.payout_address,
                nonce,
                self.config.referral_code_len,
            );
            let mut account = Account::new(
                identity,
                profile.clone(),
                code,
                referral.as_ref().map(|r| r.referrer),
            );
            account.spins_remaining = signup_spins;
            let new_account = NewAccount {
                account,
                signup: Entry::signup_bonus(signup_spins),
                referral: referral.clone(),
            };
            let outcome = with_retry("create account", || {
                self.store.create_if_absent(&new_account)
            })?;
            match outcome {
                CreateOutcome::Created { account, referrer } => {
                    tracing::info!(
                        "registered account {identity} with referral code {}",
                        account.referral_code
                    );
                    if let Some(referrer) = &referrer {
                        self.notify_referrer(referrer, identity);
                    }
                    return Ok(Registration { account, referrer });
                }
                CreateOutcome::IdentityTaken => return Err(Error::AlreadyRegistered(identity)),
                CreateOutcome::ReferrerMissing => {
                    return Err(Error::InvalidReferralCode(
                        referral_code.map(referral::normalize_code).unwrap_or_default(),
                    ));
                }
                CreateOutcome::ReferralCodeTaken => {
                    tracing::debug!(
                        "referral code collision for account {identity} at nonce {nonce}"
                    );
                }
            }
        }
        Err(Error::StoreUnavailable(anyhow!(
            "no unique referral code for account {identity} after \
             {MAX_REFERRAL_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Register from a session whose fields are all collected. An unknown
    /// referral code leaves the session usable for another attempt.
    pub fn complete_registration(&self, session: &RegistrationSession) -> Result<Registration> {
        let profile = session.profile().cloned().ok_or_else(|| {
            Error::invalid_field("registration", "profile fields are still being collected")
        })?;
        self.register(session.identity(), profile, session.referrer_code())
    }

    /// Feed one user reply into the session and register once it is complete.
    pub fn advance_registration(
        &self,
        session: &mut RegistrationSession,
        input: &str,
    ) -> Result<RegistrationProgress> {
        let step = session.submit(input, &self.config.profile)?.clone();
        if !session.is_done() {
            return Ok(RegistrationProgress::Next(step));
        }
        let registration = self.complete_registration(session)?;
        Ok(RegistrationProgress::Registered(registration))
    }

    fn resolve_referrer(&self, raw: &str) -> Result<Account> {
        let code = referral::normalize_code(raw);
        if code.is_empty() {
            return Err(Error::InvalidReferralCode(code));
        }
        with_retry("resolve referral code", || self.store.find_by_referral_code(&code))?
            .ok_or(Error::InvalidReferralCode(code))
    }

    fn notify_referrer(&self, referrer: &Account, referee: AccountId) {
        let notice = ReferralNotice {
            referrer: referrer.id,
            referee,
            bonus_spins: self.config.referral_bonus_spins,
            spins_remaining: referrer.spins_remaining,
            total_referrals: referrer.total_referrals,
        };
        if let Err(err) = self.notifier.referral_credited(&notice) {
            tracing::warn!(
                "referral bonus for account {} committed but notification failed: {err:#}",
                referrer.id
            );
        }
    }
}

/// Run `op`, retrying once immediately if the store reports a transient failure.
fn with_retry<T>(label: &str, op: impl Fn() -> Result<T>) -> Result<T> {
    match op() {
        Err(err) if err.is_retryable() => {
            tracing::warn!("{label} failed, retrying once: {err}");
            op()
        }
        result => result,
    }
}
