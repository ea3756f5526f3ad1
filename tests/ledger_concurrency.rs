//! Concurrent transfer application against a shared ledger.

use std::sync::{Arc, Barrier};
use std::thread;

use interbank_cache::{BankSnapshot, Ledger, Party, SnapshotError, Transfer};

fn ledger_with(banks: &[(&str, u16)]) -> Arc<Ledger> {
    let ledger = Ledger::new();
    let rows: Vec<Result<BankSnapshot, SnapshotError>> = banks
        .iter()
        .map(|(name, id)| {
            Ok(BankSnapshot {
                name: name.to_string(),
                bank_id: *id,
                balance: 0,
            })
        })
        .collect();
    ledger.bootstrap(rows, Vec::new()).unwrap();
    Arc::new(ledger)
}

#[test]
fn ping_pong_even_count_restores_balances() {
    let ledger = ledger_with(&[("Alpha", 1), ("Beta", 2)]);
    let a_to_b = Transfer::new(Party::new("Alpha", 1), Party::new("Beta", 2), 75);
    let b_to_a = Transfer::new(Party::new("Beta", 2), Party::new("Alpha", 1), 75);

    let n = 2_000;
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let (a_to_b, b_to_a) = (a_to_b.clone(), b_to_a.clone());
            thread::spawn(move || {
                barrier.wait();
                for i in (t..n).step_by(threads) {
                    let transfer = if i % 2 == 0 { &a_to_b } else { &b_to_a };
                    ledger.apply(transfer).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.transactions(), n as u64);
    assert_eq!(ledger.bank_balance("Alpha"), Some(0));
    assert_eq!(ledger.bank_balance("Beta"), Some(0));
    assert_eq!(ledger.account_balance("Alpha", 1), Some(0));
    assert_eq!(ledger.account_balance("Beta", 2), Some(0));
}

#[test]
fn concurrent_first_touch_of_unseen_account_keeps_every_update() {
    for round in 0..20u32 {
        let ledger = ledger_with(&[("Alpha", 1), ("Beta", 2)]);
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let unseen = 10_000 + round;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let transfer =
                        Transfer::new(Party::new("Alpha", t as u32), Party::new("Beta", unseen), 3);
                    barrier.wait();
                    ledger.apply(&transfer).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.account_balance("Beta", unseen), Some(3 * threads as i32));
        // One receiver cell plus one sender cell per thread
        assert_eq!(ledger.account_count(), threads + 1);
    }
}

#[test]
fn balances_are_conserved_under_contention() {
    let banks = [("A", 1), ("B", 2), ("C", 3), ("D", 4)];
    let ledger = ledger_with(&banks);
    let threads = 8;
    let per_thread = 5_000;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let from = banks[(t + i) % banks.len()].0;
                    let to = banks[(t + i * 3 + 1) % banks.len()].0;
                    let transfer = Transfer::new(
                        Party::new(from, (i % 7) as u32),
                        Party::new(to, (i % 5) as u32),
                        (i % 100) as i32,
                    );
                    ledger.apply(&transfer).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let bank_total: i64 = banks
        .iter()
        .map(|(name, _)| ledger.bank_balance(name).unwrap())
        .sum();
    assert_eq!(bank_total, 0);

    let account_total: i64 = ledger
        .snapshot(true)
        .iter()
        .flat_map(|view| view.accounts.iter().map(|(_, b)| i64::from(*b)))
        .sum();
    assert_eq!(account_total, 0);

    for view in ledger.snapshot(true) {
        let accounts: i64 = view.accounts.iter().map(|(_, b)| i64::from(*b)).sum();
        assert_eq!(accounts, view.balance, "bank {} out of balance", view.name);
    }
    assert_eq!(ledger.transactions(), (threads * per_thread) as u64);
}

#[test]
fn unknown_bank_is_rejected_under_load() {
    let ledger = ledger_with(&[("Alpha", 1)]);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                let transfer = Transfer::new(Party::new("Alpha", 1), Party::new("Nowhere", 1), 1);
                (0..100).filter(|_| ledger.apply(&transfer).is_err()).count()
            })
        })
        .collect();
    let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(rejected, 400);
    assert_eq!(ledger.bank_balance("Alpha"), Some(0));
    assert_eq!(ledger.transactions(), 0);
}
