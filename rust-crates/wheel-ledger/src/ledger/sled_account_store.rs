// Sled-backed account store. Every mutation runs as one multi-tree transaction
// so the row, the log append and the spin token commit together.
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
        Updated,
    },
};
use anyhow::Context;
use serde::{
    Serialize,
    de::DeserializeOwned,
};
use sled::{
    Config,
    Db,
    Transactional,
    Tree,
    transaction::{
        ConflictableTransactionError,
        ConflictableTransactionResult,
        TransactionError,
        TransactionResult,
        TransactionalTree,
    },
};
use std::path::Path;

#[derive(Clone)]
pub struct SledAccountStore {
    db: Db,
    accounts: Tree,
    referral_codes: Tree,
    transactions: Tree,
    spin_tokens: Tree,
}

impl SledAccountStore {
    pub fn new(db: &Db) -> Result<Self> {
        let accounts = db.open_tree("accounts").context("open accounts tree")?;
        let referral_codes = db
            .open_tree("referral_codes")
            .context("open referral_codes tree")?;
        let transactions = db
            .open_tree("transactions")
            .context("open transactions tree")?;
        let spin_tokens = db
            .open_tree("spin_tokens")
            .context("open spin_tokens tree")?;

        Ok(Self {
            db: db.clone(),
            accounts,
            referral_codes,
            transactions,
            spin_tokens,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::default().path(path);
        let db = config.open().context("open sled database")?;
        Self::new(&db)
    }

    fn account_key(id: AccountId) -> Vec<u8> {
        id.to_be_bytes().to_vec()
    }

    // account prefix keeps each account's log contiguous and in id order
    fn transaction_key(account: AccountId, id: u64) -> Vec<u8> {
        let mut key = Self::account_key(account);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn token_key(account: AccountId, token: &SpinToken) -> Vec<u8> {
        let mut key = Self::account_key(account);
        key.extend_from_slice(token.as_str().as_bytes());
        key
    }

    fn serialize_record<T: Serialize>(value: &T, label: &str) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(value).with_context(|| format!("serialize {label}"))?;
        Ok(bytes)
    }

    fn append(
        transactions: &TransactionalTree,
        account_id: AccountId,
        entry: Entry,
        token: Option<SpinToken>,
    ) -> ConflictableTransactionResult<Transaction, Error> {
        // sled ids start at zero
        let id = transactions.generate_id()? + 1;
        let transaction = entry.into_transaction(id, account_id, token);
        let bytes = abort(Self::serialize_record(&transaction, "transaction record"))?;
        transactions.insert(Self::transaction_key(account_id, id), bytes)?;
        Ok(transaction)
    }

    // a failed flush does not undo a committed transaction, so it is only logged
    fn flush(&self, label: &str) {
        if let Err(err) = self.db.flush() {
            tracing::warn!("failed to flush sled after {label}: {err}");
        }
    }
}

impl AccountStore for SledAccountStore {
    fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let value = match self
            .accounts
            .get(Self::account_key(id))
            .context("read account record")?
        {
            Some(value) => value,
            None => return Ok(None),
        };
        let account = deserialize::<Account>(value.as_ref())?;
        Ok(Some(account))
    }

    fn find_by_referral_code(&self, code: &str) -> Result<Option<Account>> {
        let Some(owner) = self
            .referral_codes
            .get(code.as_bytes())
            .context("read referral code")?
        else {
            return Ok(None);
        };
        let arr: [u8; 8] = owner
            .as_ref()
            .try_into()
            .context("referral code owner should be 8 bytes")?;
        self.get(AccountId(u64::from_be_bytes(arr)))
    }

    fn create_if_absent(&self, new_account: &NewAccount) -> Result<CreateOutcome> {
        let result: TransactionResult<CreateOutcome, Error> = (
            &self.accounts,
            &self.referral_codes,
            &self.transactions,
        )
            .transaction(|(accounts, codes, transactions)| {
                let account = &new_account.account;
                let key = Self::account_key(account.id);
                if accounts.get(&key)?.is_some() {
                    return Ok(CreateOutcome::IdentityTaken);
                }
                if codes.get(account.referral_code.as_bytes())?.is_some() {
                    return Ok(CreateOutcome::ReferralCodeTaken);
                }

                let referrer = match &new_account.referral {
                    Some(credit) => {
                        let referrer_key = Self::account_key(credit.referrer);
                        let Some(bytes) = accounts.get(&referrer_key)? else {
                            return Ok(CreateOutcome::ReferrerMissing);
                        };
                        let mut referrer = abort(deserialize::<Account>(bytes.as_ref()))?;
                        let entry = abort(credit.apply(&mut referrer, account.id))?;
                        let encoded =
                            abort(Self::serialize_record(&referrer, "account record"))?;
                        accounts.insert(referrer_key, encoded)?;
                        Self::append(transactions, referrer.id, entry, None)?;
                        Some(referrer)
                    }
                    None => None,
                };

                let encoded = abort(Self::serialize_record(account, "account record"))?;
                accounts.insert(key.clone(), encoded)?;
                codes.insert(account.referral_code.as_bytes(), key)?;
                Self::append(transactions, account.id, new_account.signup.clone(), None)?;
                Ok(CreateOutcome::Created {
                    account: account.clone(),
                    referrer,
                })
            });
        let outcome = finish(result, "create account")?;
        if matches!(outcome, CreateOutcome::Created { .. }) {
            self.flush("create account");
        }
        Ok(outcome)
    }

    fn atomic_update(
        &self,
        id: AccountId,
        token: Option<&SpinToken>,
        update: &dyn Fn(&mut Account) -> Result<Entry>,
    ) -> Result<Updated> {
        let result: TransactionResult<Updated, Error> = (
            &self.accounts,
            &self.transactions,
            &self.spin_tokens,
        )
            .transaction(|(accounts, transactions, spin_tokens)| {
                let key = Self::account_key(id);
                let Some(bytes) = accounts.get(&key)? else {
                    return Err(ConflictableTransactionError::Abort(
                        Error::AccountNotFound(id),
                    ));
                };
                if let Some(token) = token {
                    if spin_tokens.get(Self::token_key(id, token))?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            Error::DuplicateSpinEvent {
                                account: id,
                                token: token.clone(),
                            },
                        ));
                    }
                }

                let mut account = abort(deserialize::<Account>(bytes.as_ref()))?;
                let entry = abort(update(&mut account))?;
                let encoded = abort(Self::serialize_record(&account, "account record"))?;
                accounts.insert(key, encoded)?;
                let transaction = Self::append(transactions, id, entry, token.cloned())?;
                if let Some(token) = token {
                    spin_tokens.insert(
                        Self::token_key(id, token),
                        transaction.id.to_be_bytes().to_vec(),
                    )?;
                }
                Ok(Updated {
                    account,
                    transaction,
                })
            });
        let updated = finish(result, "update account")?;
        self.flush("update account");
        Ok(updated)
    }

    fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();
        for entry in self.transactions.scan_prefix(Self::account_key(id)) {
            let (_, value) = entry.context("iterate transaction records")?;
            transactions.push(deserialize::<Transaction>(value.as_ref())?);
        }
        Ok(transactions)
    }
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let value = serde_json::from_slice(bytes).context("deserialize sled record")?;
    Ok(value)
}

fn abort<T>(result: Result<T>) -> ConflictableTransactionResult<T, Error> {
    result.map_err(ConflictableTransactionError::Abort)
}

fn finish<T>(result: TransactionResult<T, Error>, label: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(error)) => Err(error),
        Err(TransactionError::Storage(error)) => Err(Error::StoreUnavailable(
            anyhow::Error::new(error).context(format!("{label} transaction")),
        )),
    }
}
