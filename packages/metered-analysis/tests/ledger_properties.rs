//! Property tests for the credit ledger balance invariant.

use std::sync::Arc;

use metered_analysis::{types::ledger::reconcile, CreditLedger, LedgerError, MemoryStore};
use proptest::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Spend(i64),
    Add(i64),
}

fn arb_ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (1i64..2_000).prop_map(Op::Spend),
            (1i64..1_000).prop_map(Op::Add),
        ],
        0..max,
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: any sequence of spends and adds keeps the balance
    /// non-negative and equal to credits minus debits.
    #[test]
    fn prop_balance_matches_transactions(ops in arb_ops(40)) {
        runtime().block_on(async {
            let ledger = CreditLedger::new(Arc::new(MemoryStore::new()));
            let org = Uuid::new_v4();
            let user = Uuid::new_v4();
            let mut expected = 0i64;

            for op in &ops {
                match *op {
                    Op::Add(amount) => {
                        ledger.add(org, amount, "Top-up", user).await.unwrap();
                        expected += amount;
                    }
                    Op::Spend(amount) => match ledger.spend(org, amount, "Document Analysis", user).await {
                        Ok(_) => {
                            assert!(expected >= amount);
                            expected -= amount;
                        }
                        Err(LedgerError::InsufficientCredit { balance, required }) => {
                            assert_eq!(balance, expected);
                            assert_eq!(required, amount);
                            assert!(balance < amount);
                        }
                        Err(other) => panic!("unexpected ledger error: {other}"),
                    },
                }

                let balance = ledger.get_balance(org).await.unwrap();
                assert!(balance >= 0);
                assert_eq!(balance, expected);
            }

            let txs = ledger.transactions(org).await.unwrap();
            assert_eq!(reconcile(&txs), ledger.get_balance(org).await.unwrap());
        });
    }

    /// Property: concurrent spends against one wallet never overdraw it.
    #[test]
    fn prop_concurrent_spends_never_overdraw(
        initial in 0i64..5_000,
        spends in prop::collection::vec(1i64..1_500, 1..16),
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let ledger = CreditLedger::new(Arc::new(MemoryStore::new()));
            let org = Uuid::new_v4();
            let user = Uuid::new_v4();
            if initial > 0 {
                ledger.add(org, initial, "Top-up", user).await.unwrap();
            }

            let handles: Vec<_> = spends
                .iter()
                .map(|&amount| {
                    let ledger = ledger.clone();
                    tokio::spawn(async move { ledger.spend(org, amount, "Document Analysis", user).await })
                })
                .collect();

            let mut spent = 0i64;
            for handle in handles {
                if let Ok(tx) = handle.await.unwrap() {
                    spent += tx.amount;
                }
            }

            let balance = ledger.get_balance(org).await.unwrap();
            assert!(balance >= 0);
            assert_eq!(balance, initial - spent);
            assert_eq!(reconcile(&ledger.transactions(org).await.unwrap()), balance);
        });
    }
}
