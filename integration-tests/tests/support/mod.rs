#![allow(dead_code)]

use tempdir::TempDir;
use wheel_ledger::{
    account::{
        AccountId,
        Profile,
        SpinToken,
    },
    config::LedgerConfig,
    ledger::{
        Ledger,
        sled_account_store::SledAccountStore,
    },
    prize_table::RollSource,
};

// rolls against the default table: 1..=40 -> 10, 41..=70 -> 20, 100 -> 500
pub const ROLL_TEN: u64 = 1;
pub const ROLL_TWENTY: u64 = 41;
pub const ROLL_FIVE_HUNDRED: u64 = 100;

/// A sled database in a scratch directory that outlives ledger reopens.
pub struct TestContext {
    dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        wheel_ledger::init_tracing();
        let dir = TempDir::new("wheel-ledger-it").unwrap();
        Self { dir }
    }

    pub fn store(&self) -> SledAccountStore {
        SledAccountStore::open(self.dir.path().join("ledger")).unwrap()
    }

    pub fn ledger(&self, roll: u64) -> Ledger<SledAccountStore, impl RollSource + Sync> {
        Ledger::new(self.store(), LedgerConfig::default())
            .unwrap()
            .with_rolls(move |_total: u64| roll)
    }
}

pub fn profile(n: u64) -> Profile {
    Profile {
        name: format!("player {n}"),
        contact: "5550100".to_string(),
        payout_address: format!("0x{:040x}", n),
    }
}

pub fn token(raw: &str) -> SpinToken {
    SpinToken::new(raw).unwrap()
}

pub fn register(ledger: &Ledger<SledAccountStore, impl RollSource + Sync>, n: u64) -> String {
    ledger
        .register(AccountId(n), profile(n), None)
        .unwrap()
        .account
        .referral_code
}
