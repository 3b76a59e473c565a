//! Service-ID state cache (§4.6): keyed by `{server-ip, server-port,
//! protocol, detection-level}`, LRU-evicted once past capacity.
//!
//! The concurrent map is a `DashMap`; recency tracking for eviction is a
//! swappable `VecDeque` behind `ArcSwap` — read the current snapshot,
//! replace it wholesale on update, the same shape as a hot-swappable TLS
//! config reloader.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::wire::Proto;

use super::state::ServiceIdState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceIdKey {
    pub server_ip: Ipv4Addr,
    pub server_port: u16,
    pub protocol: Proto,
    pub detection_level: u8,
}

pub struct ServiceIdCache {
    entries: DashMap<ServiceIdKey, ServiceIdState>,
    recency: ArcSwap<VecDeque<ServiceIdKey>>,
    capacity: usize,
}

impl ServiceIdCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: DashMap::new(), recency: ArcSwap::from_pointee(VecDeque::new()), capacity }
    }

    /// Marks `key` as just-used, moving it to the back of the recency
    /// list (eviction takes from the front).
    fn touch_recency(&self, key: ServiceIdKey) {
        let mut list = (**self.recency.load()).clone();
        list.retain(|k| *k != key);
        list.push_back(key);
        self.recency.store(Arc::new(list));
    }

    fn evict_if_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let evicted = {
                let mut list = (**self.recency.load()).clone();
                let front = list.pop_front();
                self.recency.store(Arc::new(list));
                front
            };
            match evicted {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Looks up or creates the entry for `key`, touching its recency.
    pub fn get_or_insert(&self, key: ServiceIdKey, now: Instant) -> dashmap::mapref::one::RefMut<'_, ServiceIdKey, ServiceIdState> {
        let entry = self.entries.entry(key).or_insert_with(|| ServiceIdState::new(now));
        self.touch_recency(key);
        self.evict_if_over_capacity();
        entry
    }

    pub fn get(&self, key: &ServiceIdKey) -> Option<dashmap::mapref::one::Ref<'_, ServiceIdKey, ServiceIdState>> {
        if self.entries.contains_key(key) {
            self.touch_recency(*key);
        }
        self.entries.get(key)
    }

    /// Explicit reset: drops the entry entirely regardless of its state
    /// (§4.6 "evicted ... by explicit reset").
    pub fn reset(&self, key: &ServiceIdKey) {
        self.entries.remove(key);
        let mut list = (**self.recency.load()).clone();
        list.retain(|k| k != key);
        self.recency.store(Arc::new(list));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(port: u16) -> ServiceIdKey {
        ServiceIdKey { server_ip: Ipv4Addr::new(10, 0, 0, 1), server_port: port, protocol: Proto::Tcp, detection_level: 0 }
    }

    #[test]
    fn get_or_insert_creates_once_per_key() {
        let cache = ServiceIdCache::new(10);
        let now = Instant::now();
        cache.get_or_insert(key(80), now);
        cache.get_or_insert(key(80), now);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache = ServiceIdCache::new(2);
        let now = Instant::now();
        cache.get_or_insert(key(1), now);
        cache.get_or_insert(key(2), now);
        cache.get_or_insert(key(3), now); // evicts key(1), the LRU entry
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn touching_an_entry_protects_it_from_eviction() {
        let cache = ServiceIdCache::new(2);
        let now = Instant::now();
        cache.get_or_insert(key(1), now);
        cache.get_or_insert(key(2), now);
        cache.get(&key(1)); // key(1) is now more recent than key(2)
        cache.get_or_insert(key(3), now); // evicts key(2)
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());
    }

    #[test]
    fn reset_drops_entry_unconditionally() {
        let cache = ServiceIdCache::new(10);
        let now = Instant::now();
        cache.get_or_insert(key(1), now);
        cache.reset(&key(1));
        assert!(cache.is_empty());
    }
}
