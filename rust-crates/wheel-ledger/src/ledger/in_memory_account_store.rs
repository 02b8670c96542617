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
    ledger::account_store::{
        AccountStore,
        CreateOutcome,
        NewAccount,
        Snapshot,
        Updated,
    },
};
use anyhow::anyhow;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        RwLock,
    },
};

struct AccountSlot {
    account: Account,
    spin_tokens: HashSet<SpinToken>,
}

type SharedSlot = Arc<Mutex<AccountSlot>>;

/// Process-local store. Each account lives behind its own mutex; the index
/// lock is only held to find or insert a slot.
///
/// Lock order: index, referral codes, account slot, transaction log.
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, SharedSlot>>>,
    referral_codes: Arc<Mutex<HashMap<String, AccountId>>>,
    transactions: Arc<Mutex<Vec<Transaction>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: AccountId) -> Result<Option<SharedSlot>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| anyhow!("account index lock poisoned"))?;
        Ok(accounts.get(&id).cloned())
    }

    fn append(
        log: &mut Vec<Transaction>,
        account_id: AccountId,
        entry: Entry,
        token: Option<SpinToken>,
    ) -> Transaction {
        let id = log.len() as u64 + 1;
        let transaction = entry.into_transaction(id, account_id, token);
        log.push(transaction.clone());
        transaction
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::StoreUnavailable(anyhow!("{what} lock poisoned")))
}

impl AccountStore for InMemoryAccountStore {
    fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let guard = lock(&*slot, "account slot")?;
        Ok(Some(guard.account.clone()))
    }

    fn find_by_referral_code(&self, code: &str) -> Result<Option<Account>> {
        let owner = lock(&self.referral_codes, "referral code")?
            .get(code)
            .copied();
        match owner {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    fn create_if_absent(&self, new_account: &NewAccount) -> Result<CreateOutcome> {
        let account = &new_account.account;
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| anyhow!("account index lock poisoned"))?;
        if accounts.contains_key(&account.id) {
            return Ok(CreateOutcome::IdentityTaken);
        }
        let mut codes = lock(&self.referral_codes, "referral code")?;
        if codes.contains_key(&account.referral_code) {
            return Ok(CreateOutcome::ReferralCodeTaken);
        }

        let referrer_slot = match &new_account.referral {
            Some(credit) => match accounts.get(&credit.referrer) {
                Some(slot) => Some((credit, slot.clone())),
                None => return Ok(CreateOutcome::ReferrerMissing),
            },
            None => None,
        };
        let mut referrer_guard = match &referrer_slot {
            Some((credit, slot)) => Some((*credit, lock(&**slot, "account slot")?)),
            None => None,
        };
        let credited = match &referrer_guard {
            Some((credit, guard)) => {
                let mut referrer = guard.account.clone();
                let entry = credit.apply(&mut referrer, account.id)?;
                Some((referrer, entry))
            }
            None => None,
        };

        let mut log = lock(&self.transactions, "transaction log")?;
        Self::append(&mut log, account.id, new_account.signup.clone(), None);
        let referrer = match (credited, referrer_guard.as_mut()) {
            (Some((referrer, entry)), Some((_, guard))) => {
                Self::append(&mut log, referrer.id, entry, None);
                guard.account = referrer.clone();
                Some(referrer)
            }
            _ => None,
        };

        codes.insert(account.referral_code.clone(), account.id);
        accounts.insert(
            account.id,
            Arc::new(Mutex::new(AccountSlot {
                account: account.clone(),
                spin_tokens: HashSet::new(),
            })),
        );
        Ok(CreateOutcome::Created {
            account: account.clone(),
            referrer,
        })
    }

    fn atomic_update(
        &self,
        id: AccountId,
        token: Option<&SpinToken>,
        update: &dyn Fn(&mut Account) -> Result<Entry>,
    ) -> Result<Updated> {
        let slot = self.slot(id)?.ok_or(Error::AccountNotFound(id))?;
        let mut guard = lock(&*slot, "account slot")?;
        if let Some(token) = token {
            if guard.spin_tokens.contains(token) {
                return Err(Error::DuplicateSpinEvent {
                    account: id,
                    token: token.clone(),
                });
            }
        }

        let mut account = guard.account.clone();
        let entry = update(&mut account)?;

        let mut log = lock(&self.transactions, "transaction log")?;
        let transaction = Self::append(&mut log, id, entry, token.cloned());
        if let Some(token) = token {
            guard.spin_tokens.insert(token.clone());
        }
        guard.account = account.clone();
        Ok(Updated {
            account,
            transaction,
        })
    }

    fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>> {
        let log = lock(&self.transactions, "transaction log")?;
        Ok(log
            .iter()
            .filter(|transaction| transaction.account_id == id)
            .cloned()
            .collect())
    }

    fn snapshot(&self, id: AccountId) -> Result<Option<Snapshot>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        // holding the slot keeps the row and this account's log still
        let guard = lock(&*slot, "account slot")?;
        let log = lock(&self.transactions, "transaction log")?;
        let transactions = log
            .iter()
            .filter(|transaction| transaction.account_id == id)
            .cloned()
            .collect();
        Ok(Some(Snapshot {
            account: guard.account.clone(),
            transactions,
        }))
    }
}
