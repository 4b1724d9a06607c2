use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Accounts a task may touch; each task owns a disjoint id range so the
/// expected state does not depend on commit order.
pub(crate) const ACCOUNTS_PER_TASK: i64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AccountOp {
    Open { id: i64 },
    Deposit { id: i64, amount: i64 },
    Close { id: i64 },
    /// Violates `NOT NULL`; fails when executed.
    Fail { id: i64 },
    /// Panics while building its statement.
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expected {
    Committed(u64),
    RolledBack,
}

/// Balances a single task believes are committed.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskModel {
    pub(crate) task: usize,
    pub(crate) balances: BTreeMap<i64, i64>,
}

impl TaskModel {
    pub(crate) fn new(task: usize) -> Self {
        Self {
            task,
            balances: BTreeMap::new(),
        }
    }

    fn account(&self, rng: &mut ChaCha8Rng) -> i64 {
        let base = i64::try_from(self.task).unwrap_or(i64::MAX / ACCOUNTS_PER_TASK - 1);
        base * ACCOUNTS_PER_TASK + rng.random_range(0..ACCOUNTS_PER_TASK)
    }

    pub(crate) fn plan(
        &self,
        rng: &mut ChaCha8Rng,
        max_batch: usize,
        fail_rate: f64,
        panic_rate: f64,
    ) -> Vec<AccountOp> {
        let len = rng.random_range(1..=max_batch);
        let mut ops: Vec<AccountOp> = (0..len)
            .map(|_| {
                let id = self.account(rng);
                match rng.random_range(0..10) {
                    0..=2 => AccountOp::Open { id },
                    3..=8 => AccountOp::Deposit {
                        id,
                        amount: rng.random_range(-50..=100),
                    },
                    _ => AccountOp::Close { id },
                }
            })
            .collect();
        let roll = rng.random::<f64>();
        if roll < panic_rate {
            let at = rng.random_range(0..=ops.len());
            ops.insert(at, AccountOp::Panic);
        } else if roll < panic_rate + fail_rate {
            let at = rng.random_range(0..=ops.len());
            let id = self.account(rng);
            ops.insert(at, AccountOp::Fail { id });
        }
        ops
    }

    /// Outcome the executor should report for `ops`, and the balances after a
    /// commit.
    pub(crate) fn expect(&self, ops: &[AccountOp]) -> (Expected, BTreeMap<i64, i64>) {
        let mut next = self.balances.clone();
        let mut affected = 0u64;
        for op in ops {
            match *op {
                AccountOp::Open { id } => {
                    if !next.contains_key(&id) {
                        next.insert(id, 0);
                        affected += 1;
                    }
                }
                AccountOp::Deposit { id, amount } => {
                    if let Some(balance) = next.get_mut(&id) {
                        *balance += amount;
                        affected += 1;
                    }
                }
                AccountOp::Close { id } => {
                    if next.remove(&id).is_some() {
                        affected += 1;
                    }
                }
                AccountOp::Fail { .. } | AccountOp::Panic => {
                    return (Expected::RolledBack, self.balances.clone());
                }
            }
        }
        (Expected::Committed(affected), next)
    }
}
