use crate::index::SearchIndex;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct LiveIndex {
    current: RwLock<Arc<SearchIndex>>,
    generation: AtomicU64,
}

impl LiveIndex {
    pub fn new(index: SearchIndex) -> Self {
        Self { current: RwLock::new(Arc::new(index)), generation: AtomicU64::new(0) }
    }

    pub fn snapshot(&self) -> Arc<SearchIndex> {
        self.current.read().clone()
    }

    /// Replace the served index, returning the one it displaced.
    pub fn publish(&self, index: SearchIndex) -> Arc<SearchIndex> {
        let next = Arc::new(index);
        let prev = std::mem::replace(&mut *self.current.write(), next);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(generation, num_docs = self.current.read().num_docs(), "published index");
        prev
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
