use bp_boop::{BoopHash, SimulationOutput};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct SimulationCacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for SimulationCacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000, ttl: Duration::from_secs(60) }
    }
}

impl SimulationCacheConfig {
    #[cfg(any(test, feature = "testing"))]
    pub fn for_testing() -> Self {
        Self { capacity: 8, ttl: Duration::from_secs(5) }
    }
}

#[derive(Clone, Debug)]
struct CachedSimulation {
    output: SimulationOutput,
    expires_at: Instant,
}

/// Simulation outcomes by boop hash. Entries are evicted least recently used first once the capacity is reached,
/// and expire after a fixed time to live whether they are used or not.
pub struct SimulationCache {
    entries: Mutex<LruCache<BoopHash, CachedSimulation>>,
    ttl: Duration,
}

impl SimulationCache {
    pub fn new(config: &SimulationCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), ttl: config.ttl }
    }

    pub async fn get(&self, hash: &BoopHash) -> Option<SimulationOutput> {
        let mut entries = self.entries.lock().await;
        let expired = entries.get(hash)?.expires_at <= Instant::now();
        if expired {
            entries.pop(hash);
            return None;
        }
        entries.peek(hash).map(|cached| cached.output.clone())
    }

    pub async fn set(&self, hash: BoopHash, output: SimulationOutput) {
        let cached = CachedSimulation { output, expires_at: Instant::now() + self.ttl };
        self.entries.lock().await.put(hash, cached);
    }

    pub async fn remove(&self, hash: &BoopHash) -> Option<SimulationOutput> {
        self.entries.lock().await.pop(hash).map(|cached| cached.output)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
