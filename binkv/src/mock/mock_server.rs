use crate::cache::cache::Cache;
use crate::memcache::store::MemcStore;
use crate::memory_store::sharded_store::ShardedMemoryStore;
use crate::server::timer;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub struct MockSystemTimer {
    pub current_time: AtomicU32,
}

pub trait SetableTimer: timer::Timer {
    fn set(&self, time: u32);
}

impl MockSystemTimer {
    pub fn new() -> Self {
        MockSystemTimer {
            current_time: AtomicU32::new(0),
        }
    }
}

impl Default for MockSystemTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl timer::Timer for MockSystemTimer {
    fn timestamp(&self) -> u32 {
        self.current_time.load(Ordering::Relaxed)
    }
}

impl SetableTimer for MockSystemTimer {
    fn set(&self, time: u32) {
        self.current_time.store(time, Ordering::Relaxed)
    }
}

pub struct MockServer {
    pub timer: Arc<MockSystemTimer>,
    pub storage: MemcStore,
}

impl MockServer {
    pub fn new(store: Arc<dyn Cache + Send + Sync>, timer: Arc<MockSystemTimer>) -> Self {
        MockServer {
            timer,
            storage: MemcStore::new(store),
        }
    }
}

pub fn create_server() -> MockServer {
    let timer = Arc::new(MockSystemTimer::new());
    MockServer::new(Arc::new(ShardedMemoryStore::new(timer.clone())), timer)
}

pub struct StoreWithMockTimer {
    pub timer: Arc<MockSystemTimer>,
    pub memc_store: Arc<MemcStore>,
}

pub fn create_storage() -> StoreWithMockTimer {
    let timer = Arc::new(MockSystemTimer::new());
    let memc_store = Arc::new(MemcStore::new(Arc::new(ShardedMemoryStore::new(
        timer.clone(),
    ))));
    StoreWithMockTimer { timer, memc_store }
}
