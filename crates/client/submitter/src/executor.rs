use alloy::primitives::Address;
use bp_boop::NonceKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
struct Assignment {
    executor: usize,
    expires_at: Instant,
}

/// Picks the executor account sending the boops of each nonce track.
///
/// A track keeps its executor while it stays active, so that consecutive nonces are sent from the same account and
/// cannot be reordered across executors. Idle tracks go back to the least used executor.
pub struct ExecutorCache {
    executors: Vec<Address>,
    uses: Vec<AtomicUsize>,
    assignments: DashMap<NonceKey, Assignment>,
    ttl: Duration,
}

impl ExecutorCache {
    pub fn new(executors: Vec<Address>, ttl: Duration) -> Self {
        let uses = executors.iter().map(|_| AtomicUsize::new(0)).collect();
        Self { executors, uses, assignments: DashMap::new(), ttl }
    }

    /// Returns `None` only when no executor is configured.
    pub fn get(&self, key: NonceKey) -> Option<Address> {
        let now = Instant::now();
        self.assignments.retain(|_, assignment| {
            let active = assignment.expires_at > now;
            if !active {
                self.uses[assignment.executor].fetch_sub(1, Ordering::Relaxed);
            }
            active
        });

        let index = match self.assignments.entry(key) {
            Entry::Occupied(mut occupied) => {
                let assignment = occupied.get_mut();
                assignment.expires_at = now + self.ttl;
                assignment.executor
            }
            Entry::Vacant(vacant) => {
                let index = self.least_used()?;
                self.uses[index].fetch_add(1, Ordering::Relaxed);
                vacant.insert(Assignment { executor: index, expires_at: now + self.ttl });
                tracing::trace!(%key, executor = %self.executors[index], "Assigned executor");
                index
            }
        };
        Some(self.executors[index])
    }

    /// Number of active tracks assigned to each executor.
    pub fn stats(&self) -> Vec<(Address, usize)> {
        self.executors
            .iter()
            .zip(&self.uses)
            .map(|(executor, uses)| (*executor, uses.load(Ordering::Relaxed)))
            .collect()
    }

    // First minimum, so ties go to the executor declared first.
    fn least_used(&self) -> Option<usize> {
        self.uses.iter().enumerate().min_by_key(|(_, uses)| uses.load(Ordering::Relaxed)).map(|(index, _)| index)
    }
}
