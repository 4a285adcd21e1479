use alloy::primitives::{Address, U256};
use bc_chain::{ChainError, ChainGateway};
use bp_boop::NonceKey;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Slots untouched for this long are dropped, the next read goes to the chain.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(5 * 60);

struct NonceSlot {
    nonce: Arc<Mutex<Option<U256>>>,
    last_used: Instant,
}

/// Local view of the next expected nonce for every nonce track.
///
/// Each track has its own slot behind an async mutex. Cold reads fetch the on-chain value while holding the slot,
/// so concurrent readers of the same track share a single chain read, and a chain read can never overwrite a local
/// advance made in between. Slots of tracks idle for longer than the idle ttl are evicted.
pub struct NonceStore {
    gateway: Arc<dyn ChainGateway>,
    slots: DashMap<NonceKey, NonceSlot>,
    idle_ttl: Duration,
    started: Instant,
    /// Milliseconds since `started` at which the next sweep is due.
    next_sweep: AtomicU64,
}

impl NonceStore {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self::with_idle_ttl(gateway, DEFAULT_IDLE_TTL)
    }

    pub fn with_idle_ttl(gateway: Arc<dyn ChainGateway>, idle_ttl: Duration) -> Self {
        Self { gateway, slots: DashMap::new(), idle_ttl, started: Instant::now(), next_sweep: AtomicU64::new(0) }
    }

    fn slot(&self, key: NonceKey) -> Arc<Mutex<Option<U256>>> {
        let now = Instant::now();
        self.sweep_if_due(now);

        // Clone the slot out so the map shard is never held across an await point.
        let mut slot = self.slots.entry(key).or_insert_with(|| NonceSlot { nonce: Arc::default(), last_used: now });
        slot.last_used = now;
        Arc::clone(&slot.nonce)
    }

    /// Returns the next expected nonce, reading it from the chain when there is no local value.
    /// Failed reads are not cached.
    pub async fn get_local_nonce(&self, entry_point: Address, key: NonceKey) -> Result<U256, ChainError> {
        let slot = self.slot(key);
        let mut nonce = slot.lock().await;
        if let Some(nonce) = *nonce {
            return Ok(nonce);
        }
        let fetched = self.gateway.read_nonce(entry_point, key.account, key.nonce_track).await?;
        tracing::trace!(%key, nonce = %fetched, "Fetched nonce from chain");
        *nonce = Some(fetched);
        Ok(fetched)
    }

    /// Records that `nonce` is now the next expected value. The local nonce never moves backwards through here,
    /// use [`NonceStore::reset_local_nonce`] to resynchronize with the chain.
    pub async fn set_local_nonce(&self, key: NonceKey, nonce: U256) {
        let slot = self.slot(key);
        let mut current = slot.lock().await;
        *current = Some(current.map_or(nonce, |current| current.max(nonce)));
    }

    /// Forgets the local value, the next read goes to the chain again.
    pub async fn reset_local_nonce(&self, key: NonceKey) {
        let slot = self.slot(key);
        *slot.lock().await = None;
        tracing::debug!(%key, "Reset local nonce");
    }

    /// Local value if one is known and the slot is not being refreshed.
    pub fn cached(&self, key: NonceKey) -> Option<U256> {
        let slot = self.slots.get(&key).map(|slot| Arc::clone(&slot.nonce))?;
        let nonce = slot.try_lock().ok()?;
        *nonce
    }

    /// Drops the slot of an idle track. Slots that are in use are kept.
    pub fn prune(&self, key: NonceKey) {
        self.slots.remove_if(&key, |_, slot| Arc::strong_count(&slot.nonce) == 1);
    }

    /// Drops every slot unused for the idle ttl, except those being read or written right now.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            Arc::strong_count(&slot.nonce) > 1 || now.duration_since(slot.last_used) < self.idle_ttl
        });
        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.slots.len(), "Evicted idle nonce slots");
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // At most one sweep per idle ttl, run by whichever caller sees it due first.
    fn sweep_if_due(&self, now: Instant) {
        let elapsed = millis(now.duration_since(self.started));
        let due = self.next_sweep.load(Ordering::Relaxed);
        if elapsed < due {
            return;
        }
        let next = elapsed.saturating_add(millis(self.idle_ttl));
        if self.next_sweep.compare_exchange(due, next, Ordering::Relaxed, Ordering::Relaxed).is_ok() {
            self.evict_idle();
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_chain::MockChainGateway;
    use rstest::{fixture, rstest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ENTRY_POINT: Address = Address::repeat_byte(0xe1);

    fn key(track: u64) -> NonceKey {
        NonceKey::new(Address::repeat_byte(0xaa), U256::from(track))
    }

    /// Gateway whose nonce reads take some time and are counted.
    fn slow_gateway(reads: Arc<AtomicUsize>, nonce: u64) -> MockChainGateway {
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().returning(move |_, _, _| {
            reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(U256::from(nonce))
        });
        gateway
    }

    #[fixture]
    fn reads() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[rstest]
    #[tokio::test]
    async fn cold_read_is_cached(reads: Arc<AtomicUsize>) {
        let store = NonceStore::new(Arc::new(slow_gateway(reads.clone(), 7)));
        assert_eq!(store.cached(key(0)), None);

        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(0)).await.unwrap(), U256::from(7));
        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(0)).await.unwrap(), U256::from(7));
        assert_eq!(store.cached(key(0)), Some(U256::from(7)));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cold_reads_share_one_chain_read(reads: Arc<AtomicUsize>) {
        let store = Arc::new(NonceStore::new(Arc::new(slow_gateway(reads.clone(), 3))));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.get_local_nonce(ENTRY_POINT, key(1)).await.unwrap() })
            })
            .collect();
        for nonce in futures::future::join_all(tasks).await {
            assert_eq!(nonce.unwrap(), U256::from(3));
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn set_is_monotonic_and_reset_refetches(reads: Arc<AtomicUsize>) {
        let store = NonceStore::new(Arc::new(slow_gateway(reads.clone(), 2)));

        store.set_local_nonce(key(0), U256::from(5)).await;
        store.set_local_nonce(key(0), U256::from(4)).await;
        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(0)).await.unwrap(), U256::from(5));
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        store.reset_local_nonce(key(0)).await;
        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(0)).await.unwrap(), U256::from(2));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_reads_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut gateway = MockChainGateway::new();
        let counter = calls.clone();
        gateway.expect_read_nonce().times(2).returning(move |_, _, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ChainError::Rpc("timeout".into()))
            } else {
                Ok(U256::from(1))
            }
        });
        let store = NonceStore::new(Arc::new(gateway));

        assert!(store.get_local_nonce(ENTRY_POINT, key(0)).await.is_err());
        assert_eq!(store.cached(key(0)), None);
        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(0)).await.unwrap(), U256::from(1));
    }

    #[rstest]
    #[tokio::test]
    async fn tracks_are_independent(reads: Arc<AtomicUsize>) {
        let store = NonceStore::new(Arc::new(slow_gateway(reads.clone(), 0)));
        store.set_local_nonce(key(0), U256::from(10)).await;

        assert_eq!(store.get_local_nonce(ENTRY_POINT, key(1)).await.unwrap(), U256::ZERO);
        assert_eq!(store.cached(key(0)), Some(U256::from(10)));
        assert_eq!(store.len(), 2);

        store.prune(key(0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.cached(key(0)), None);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn idle_slots_are_evicted(reads: Arc<AtomicUsize>) {
        let store = NonceStore::with_idle_ttl(Arc::new(slow_gateway(reads.clone(), 0)), Duration::from_secs(60));
        store.set_local_nonce(key(0), U256::from(4)).await;
        store.set_local_nonce(key(1), U256::from(9)).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        store.set_local_nonce(key(1), U256::from(10)).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        store.evict_idle();
        assert_eq!(store.len(), 1);
        assert_eq!(store.cached(key(0)), None);
        assert_eq!(store.cached(key(1)), Some(U256::from(10)));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn sweep_runs_on_access_once_due(reads: Arc<AtomicUsize>) {
        let store = NonceStore::with_idle_ttl(Arc::new(slow_gateway(reads.clone(), 0)), Duration::from_secs(60));
        for track in 0..10 {
            store.set_local_nonce(key(track), U256::from(1)).await;
        }
        assert_eq!(store.len(), 10);

        tokio::time::advance(Duration::from_secs(61)).await;
        store.set_local_nonce(key(42), U256::from(1)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.cached(key(42)), Some(U256::from(1)));
    }
}
