use crate::error::AdmissionError;
use crate::nonce::NonceStore;
use alloy::primitives::{Address, U256};
use bp_boop::{Boop, BoopHash, NonceKey};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Clone, Debug)]
pub struct AdmissionLimits {
    /// Maximum number of buffered boops per nonce track, and how far ahead of the local nonce a boop may be.
    pub buffer_limit: usize,
    /// Maximum number of buffered boops across all tracks.
    pub max_capacity: usize,
    /// Time a boop may stay buffered before it is evicted.
    pub timeout: Duration,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self { buffer_limit: 50, max_capacity: 10_000, timeout: Duration::from_secs(30) }
    }
}

impl AdmissionLimits {
    #[cfg(any(test, feature = "testing"))]
    pub fn for_testing() -> Self {
        Self { buffer_limit: 4, max_capacity: 16, timeout: Duration::from_secs(1) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedBoop {
    pub nonce_track: U256,
    pub nonce_value: U256,
    pub boop_hash: BoopHash,
}

type Outcome = Result<(), AdmissionError>;

struct PendingEntry {
    /// Distinguishes an entry from the one that may replace it in the same slot.
    id: u64,
    boop_hash: BoopHash,
    sender: oneshot::Sender<Outcome>,
}

/// account -> nonce track -> nonce value -> buffered boop.
type BlockedIndex = DashMap<Address, HashMap<U256, BTreeMap<U256, PendingEntry>>>;

/// Decides whether a boop can go on-chain now or has to wait for the boops preceding it on its nonce track.
///
/// Boops ahead of the local nonce are buffered until [`AdmissionGate::increment_local_nonce`] is called for their
/// direct predecessor, they get replaced by another boop with the same nonce, or they time out. The index is sharded
/// by account, no lock is ever held across tracks of different accounts.
pub struct AdmissionGate {
    limits: AdmissionLimits,
    nonces: NonceStore,
    blocked: BlockedIndex,
    pending: AtomicUsize,
    next_id: AtomicU64,
}

impl AdmissionGate {
    pub fn new(nonces: NonceStore, limits: AdmissionLimits) -> Self {
        Self { limits, nonces, blocked: DashMap::new(), pending: AtomicUsize::new(0), next_id: AtomicU64::new(0) }
    }

    pub fn nonces(&self) -> &NonceStore {
        &self.nonces
    }

    /// Whether the boop is ahead of the next expected nonce of its track.
    pub async fn check_if_blocked(&self, entry_point: Address, boop: &Boop) -> Result<bool, AdmissionError> {
        let local = self.nonces.get_local_nonce(entry_point, boop.nonce_key()).await?;
        Ok(boop.nonce_value > local)
    }

    /// Buffers a blocked boop and waits until it can proceed.
    ///
    /// Returns `Ok(())` once every preceding nonce of the track went through, or right away if that already happened
    /// in the meantime. Dropping the returned future withdraws the boop from the buffer.
    pub async fn pause_until_unblocked(
        &self,
        entry_point: Address,
        boop: &Boop,
        boop_hash: BoopHash,
    ) -> Result<(), AdmissionError> {
        let key = boop.nonce_key();
        let nonce = boop.nonce_value;

        if self.buffered_in_track(key) >= self.limits.buffer_limit {
            return Err(AdmissionError::BufferExceeded { limit: self.limits.buffer_limit });
        }
        if self.pending.load(Ordering::SeqCst) >= self.limits.max_capacity {
            return Err(AdmissionError::OverCapacity { limit: self.limits.max_capacity });
        }

        let local = self.ensure_in_range(entry_point, key, nonce).await?;
        if nonce <= local {
            return Ok(());
        }

        let (id, mut receiver) = self.register(key, nonce, boop_hash)?;
        let _registration = Registration { gate: self, key, nonce, id };
        tracing::debug!(%key, %nonce, %boop_hash, "Boop buffered");

        // The predecessor may have gone through between the blocked check and the registration, in which case
        // nobody is left to release this entry.
        if nonce <= self.nonces.get_local_nonce(entry_point, key).await? {
            self.take_entry(key, nonce, Some(id));
            return Ok(());
        }

        match tokio::time::timeout(self.limits.timeout, &mut receiver).await {
            Ok(outcome) => outcome.unwrap_or(Err(AdmissionError::Closed)),
            Err(_) => {
                if self.take_entry(key, nonce, Some(id)).is_some() {
                    tracing::debug!(%key, %nonce, %boop_hash, "Buffered boop timed out");
                    return Err(AdmissionError::TransactionTimeout(self.limits.timeout));
                }
                // Resolved while the timer was firing.
                receiver.await.unwrap_or(Err(AdmissionError::Closed))
            }
        }
    }

    /// Records that the boop went on-chain: the track now expects the next nonce, and the boop buffered for that
    /// nonce, if any, is released.
    pub async fn increment_local_nonce(&self, boop: &Boop) {
        let key = boop.nonce_key();
        let next = boop.nonce_value.saturating_add(U256::from(1));
        self.nonces.set_local_nonce(key, next).await;

        if let Some(entry) = self.take_entry(key, next, None) {
            tracing::debug!(%key, nonce = %next, boop_hash = %entry.boop_hash, "Releasing buffered boop");
            // The waiting side may be gone already, its registration cleanup is then a no-op.
            let _ = entry.sender.send(Ok(()));
        }
    }

    /// Number of boops currently buffered across all tracks.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn buffered_in_track(&self, key: NonceKey) -> usize {
        self.blocked.get(&key.account).and_then(|tracks| tracks.get(&key.nonce_track).map(BTreeMap::len)).unwrap_or(0)
    }

    /// Boops of this account waiting on their predecessors, ordered by track then nonce.
    pub fn get_blocked_boops(&self, account: Address) -> Vec<BlockedBoop> {
        let Some(tracks) = self.blocked.get(&account) else {
            return Vec::new();
        };
        let mut blocked: Vec<_> = tracks
            .iter()
            .flat_map(|(track, entries)| {
                entries.iter().map(|(nonce, entry)| BlockedBoop {
                    nonce_track: *track,
                    nonce_value: *nonce,
                    boop_hash: entry.boop_hash,
                })
            })
            .collect();
        blocked.sort_unstable_by_key(|boop| (boop.nonce_track, boop.nonce_value));
        blocked
    }

    /// Returns the local nonce, refreshed from the chain once if the boop looks too far ahead of it.
    async fn ensure_in_range(&self, entry_point: Address, key: NonceKey, nonce: U256) -> Result<U256, AdmissionError> {
        let limit = self.limits.buffer_limit;
        let in_range = |local: U256| nonce <= local.saturating_add(U256::from(limit));

        let local = self.nonces.get_local_nonce(entry_point, key).await?;
        if in_range(local) {
            return Ok(local);
        }

        self.nonces.reset_local_nonce(key).await;
        let refreshed = self.nonces.get_local_nonce(entry_point, key).await?;
        if in_range(refreshed) {
            tracing::debug!(%key, %nonce, stale = %local, local = %refreshed, "Local nonce was stale");
            return Ok(refreshed);
        }
        Err(AdmissionError::NonceOutOfRange { nonce, local: refreshed, limit })
    }

    fn register(
        &self,
        key: NonceKey,
        nonce: U256,
        boop_hash: BoopHash,
    ) -> Result<(u64, oneshot::Receiver<Outcome>), AdmissionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let entry = PendingEntry { id, boop_hash, sender };

        let mut tracks = self.blocked.entry(key.account).or_default();
        let track = tracks.entry(key.nonce_track).or_default();

        if let Some(slot) = track.get_mut(&nonce) {
            // Same slot, so the buffered count does not change.
            let replaced = std::mem::replace(slot, entry);
            tracing::debug!(%key, %nonce, replaced = %replaced.boop_hash, %boop_hash, "Replaced buffered boop");
            let _ = replaced.sender.send(Err(AdmissionError::TransactionReplaced));
            return Ok((id, receiver));
        }

        // Checked again under the account lock, other boops may have been registered since the first check.
        let rejection = if track.len() >= self.limits.buffer_limit {
            Some(AdmissionError::BufferExceeded { limit: self.limits.buffer_limit })
        } else if !self.reserve() {
            Some(AdmissionError::OverCapacity { limit: self.limits.max_capacity })
        } else {
            None
        };

        if let Some(err) = rejection {
            if track.is_empty() {
                tracks.remove(&key.nonce_track);
            }
            let account_empty = tracks.is_empty();
            drop(tracks);
            if account_empty {
                self.blocked.remove_if(&key.account, |_, tracks| tracks.is_empty());
            }
            return Err(err);
        }

        track.insert(nonce, entry);
        Ok((id, receiver))
    }

    fn reserve(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending < self.limits.max_capacity).then_some(pending + 1)
            })
            .is_ok()
    }

    /// Removes the entry buffered at `nonce`, provided it is the one registered as `id` when given.
    /// Empty maps are dropped, together with the nonce slot of the track once its buffer is empty.
    fn take_entry(&self, key: NonceKey, nonce: U256, id: Option<u64>) -> Option<PendingEntry> {
        let mut tracks = self.blocked.get_mut(&key.account)?;
        let track = tracks.get_mut(&key.nonce_track)?;
        if !track.get(&nonce).is_some_and(|entry| id.is_none_or(|id| entry.id == id)) {
            return None;
        }
        let entry = track.remove(&nonce)?;

        let track_empty = track.is_empty();
        if track_empty {
            tracks.remove(&key.nonce_track);
        }
        let account_empty = tracks.is_empty();
        drop(tracks);
        if account_empty {
            self.blocked.remove_if(&key.account, |_, tracks| tracks.is_empty());
        }

        self.pending.fetch_sub(1, Ordering::SeqCst);
        if track_empty {
            self.nonces.prune(key);
        }
        Some(entry)
    }
}

/// Withdraws a buffered entry when its waiter goes away, whatever the reason.
struct Registration<'a> {
    gate: &'a AdmissionGate,
    key: NonceKey,
    nonce: U256,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.gate.take_entry(self.key, self.nonce, Some(self.id));
    }
}
