// Copyright (C) 2024 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;
use netload_utils::info;
use netload_utils::request_key::RequestKey;

use super::ResourceManager;

/// In-memory store of downloaded bodies.
///
/// Entries are evicted least recently used first once the byte budget is
/// exhausted. A body larger than the whole budget is never stored.
pub struct DataCache {
    inner: Mutex<RamInner>,
}

struct RamInner {
    entries: HashMap<RequestKey, Bytes>,
    // Front is the least recently used key.
    order: VecDeque<RequestKey>,
    space: ResourceManager,
}

impl RamInner {
    fn touch(&mut self, key: &RequestKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &RequestKey) -> Option<Bytes> {
        let data = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.space.release(data.len() as u64);
        Some(data)
    }

    fn pop_lru(&mut self) -> Option<Bytes> {
        let key = self.order.pop_front()?;
        let data = self.entries.remove(&key)?;
        self.space.release(data.len() as u64);
        info!("ram {} evicted {}", key.brief(), data.len());
        Some(data)
    }
}

impl DataCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Mutex::new(RamInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                space: ResourceManager::new(capacity),
            }),
        }
    }

    /// Returns the body stored for `key`, marking it recently used.
    pub fn get(&self, key: &RequestKey) -> Option<Bytes> {
        let mut inner = self.inner.lock().unwrap();
        let data = inner.entries.get(key).cloned()?;
        inner.touch(key);
        Some(data)
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.inner.lock().unwrap().entries.contains_key(key)
    }

    /// Stores `data` under `key`, evicting older entries as needed.
    ///
    /// Returns `false` if the body cannot fit in the budget at all.
    pub fn insert(&self, key: RequestKey, data: Bytes) -> bool {
        let size = data.len() as u64;
        // Evicted bodies are dropped after the lock is released.
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(old) = inner.remove(&key) {
                evicted.push(old);
            }
            if !inner.space.fits(size) {
                info!("ram {} too large to cache {}", key.brief(), size);
                return false;
            }
            while !inner.space.apply_cache_size(size) {
                match inner.pop_lru() {
                    Some(data) => evicted.push(data),
                    None => return false,
                }
            }
            inner.order.push_back(key.clone());
            inner.entries.insert(key, data);
        }
        drop(evicted);
        true
    }

    pub fn remove(&self, key: &RequestKey) -> Option<Bytes> {
        self.inner.lock().unwrap().remove(key)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let entries = {
            let mut inner = self.inner.lock().unwrap();
            inner.order.clear();
            inner.space.used_capacity = 0;
            std::mem::take(&mut inner.entries)
        };
        info!("ram cache cleared {} entries", entries.len());
    }

    /// Changes the byte budget, evicting until usage fits again.
    pub fn set_capacity(&self, capacity: u64) {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.space.change_total_size(capacity);
            while inner.space.is_over() {
                match inner.pop_lru() {
                    Some(data) => evicted.push(data),
                    None => break,
                }
            }
        }
        drop(evicted);
    }

    /// Bytes currently held.
    pub fn used(&self) -> u64 {
        self.inner.lock().unwrap().space.used_capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
