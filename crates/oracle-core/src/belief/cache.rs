//! Per-session cache of computed marginal bundles.
//!
//! Keyed by the constraint-store hash, so a query repeated between
//! observations is free and a stale entry can never be returned for the
//! current state.

use super::dispatch::Marginals;
use std::collections::{HashMap, VecDeque};

/// Stores marginal bundles with an LRU eviction policy.
#[derive(Debug)]
pub struct MarginalCache {
    entries: HashMap<u64, Marginals>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl MarginalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: u64) -> Option<&Marginals> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: u64, marginals: Marginals) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, marginals).is_none() {
            self.order.push_back(key);
        }
        self.evict_if_needed();
    }

    fn evict_if_needed(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}
