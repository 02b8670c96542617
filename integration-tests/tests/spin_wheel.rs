#![allow(non_snake_case)]

mod support;

use support::*;
use wheel_ledger::{
    Error,
    account::{
        AccountId,
        TransactionKind,
    },
};

#[test]
fn spin__balance_and_spins_survive_reopening_the_store() {
    let ctx = TestContext::new();

    // given
    {
        let ledger = ctx.ledger(ROLL_FIVE_HUNDRED);
        register(&ledger, 1);
        ledger.spin(AccountId(1), &token("evt-1")).unwrap();
    }

    // when
    let ledger = ctx.ledger(ROLL_TWENTY);
    let outcome = ledger.spin(AccountId(1), &token("evt-2")).unwrap();

    // then
    assert_eq!(outcome.balance, 520);
    assert_eq!(outcome.spins_remaining, 1);
    let kinds = ledger
        .transactions(AccountId(1))
        .unwrap()
        .into_iter()
        .map(|tx| tx.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::SignupBonus,
            TransactionKind::Win,
            TransactionKind::Win
        ]
    );
}

#[test]
fn spin__token_replayed_after_reopen_is_still_rejected() {
    let ctx = TestContext::new();

    // given
    {
        let ledger = ctx.ledger(ROLL_TEN);
        register(&ledger, 1);
        ledger.spin(AccountId(1), &token("evt-1")).unwrap();
    }

    // when
    let ledger = ctx.ledger(ROLL_TEN);
    let replay = ledger.spin(AccountId(1), &token("evt-1"));

    // then
    assert!(matches!(replay, Err(Error::DuplicateSpinEvent { .. })));
    let account = ledger.get_account(AccountId(1)).unwrap();
    assert_eq!(account.balance, 10);
    assert_eq!(account.spins_remaining, 2);
}

#[test]
fn spin__parallel_spins_never_overspend() {
    let ctx = TestContext::new();

    // given
    let ledger = ctx.ledger(ROLL_TEN);
    register(&ledger, 1);

    // when
    let successes = std::thread::scope(|scope| {
        let handles = (0..16)
            .map(|n| {
                let ledger = &ledger;
                scope.spawn(move || ledger.spin(AccountId(1), &token(&format!("evt-{n}"))))
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|result| result.is_ok())
            .count()
    });

    // then
    assert_eq!(successes, 3);
    let account = ledger.get_account(AccountId(1)).unwrap();
    assert_eq!(account.spins_remaining, 0);
    assert_eq!(account.balance, 30);
    assert!(ledger.audit(AccountId(1)).unwrap().is_consistent());
}

#[test]
fn purchase_spins__debit_and_grant_persist_together() {
    let ctx = TestContext::new();

    // given
    {
        let ledger = ctx.ledger(ROLL_FIVE_HUNDRED);
        register(&ledger, 1);
        ledger.spin(AccountId(1), &token("evt-1")).unwrap();
        ledger.purchase_spins(AccountId(1), "bucket").unwrap();
    }

    // when
    let ledger = ctx.ledger(ROLL_TEN);
    let account = ledger.get_account(AccountId(1)).unwrap();
    let second = ledger.purchase_spins(AccountId(1), "bucket");

    // then
    assert_eq!(account.balance, 250);
    assert_eq!(account.spins_remaining, 17);
    assert_eq!(second.unwrap().balance, 0);
    assert!(matches!(
        ledger.purchase_spins(AccountId(1), "single"),
        Err(Error::InsufficientBalance { balance: 0, .. })
    ));
}

#[test]
fn audit__reports_no_drift_while_spins_commit() {
    let ctx = TestContext::new();

    // given
    let ledger = ctx.ledger(ROLL_TWENTY);
    let code = register(&ledger, 1);
    for n in 2..6u64 {
        ledger
            .register(AccountId(n), profile(n), Some(&code))
            .unwrap();
    }

    // when
    let reports = std::thread::scope(|scope| {
        let spinner = scope.spawn(|| {
            let mut n = 0;
            while ledger.spin(AccountId(1), &token(&format!("evt-{n}"))).is_ok() {
                n += 1;
            }
        });
        let reports = (0..50)
            .map(|_| ledger.audit(AccountId(1)).unwrap())
            .collect::<Vec<_>>();
        spinner.join().unwrap();
        reports
    });

    // then
    assert!(reports.iter().all(|report| report.is_consistent()));
    let account = ledger.get_account(AccountId(1)).unwrap();
    assert_eq!(account.spins_remaining, 0);
    assert_eq!(account.balance, 20 * 11);
}
