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


//! Per-key callback multiplexer.
//!
//! The registry maps a request key to the listeners registered for it, and
//! a callback id back to every key it was registered against, so a caller
//! can withdraw its interest without touching other callers of the same key.
//! Both maps change together; the registry lives behind the scheduler lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use netload_utils::request_key::RequestKey;

use super::task::{Delivery, Outcome};
use crate::services::LoadCallback;

/// One registration of interest.
///
/// Events are delivered outside the registry lock; the listener's own lock
/// keeps its events in order and stops progress once a result was delivered.
pub(crate) struct Listener {
    inner: Mutex<ListenerInner>,
}

struct ListenerInner {
    callback: Option<Box<dyn LoadCallback>>,
    last_progress: u64,
}

impl Listener {
    fn new(callback: Box<dyn LoadCallback>) -> Self {
        Self {
            inner: Mutex::new(ListenerInner {
                callback: Some(callback),
                last_progress: 0,
            }),
        }
    }

    /// Forwards progress unless it is stale or the result was delivered.
    pub(crate) fn progress(&self, current: u64, total: u64) {
        let mut inner = self.inner.lock().unwrap();
        if current <= inner.last_progress {
            return;
        }
        inner.last_progress = current;
        if let Some(callback) = inner.callback.as_mut() {
            callback.on_progress(current, total);
        }
    }

    /// Delivers the terminal result. Later events are dropped.
    pub(crate) fn deliver(&self, outcome: Outcome) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(callback) = inner.callback.take() {
            deliver_to(callback, outcome);
        }
    }

    /// Delivers a cached result while staying registered for the reload.
    pub(crate) fn deliver_cached(&self, delivery: Delivery) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(callback) = inner.callback.as_mut() {
            callback.on_progress(delivery.received, delivery.total);
            callback.on_success(delivery.output);
        }
    }

    pub(crate) fn is_delivered(&self) -> bool {
        self.inner.lock().unwrap().callback.is_none()
    }
}

/// Final progress followed by the result, in one dispatch unit.
pub(crate) fn deliver_to(mut callback: Box<dyn LoadCallback>, outcome: Outcome) {
    match outcome {
        Ok(delivery) => {
            callback.on_progress(delivery.received, delivery.total);
            callback.on_success(delivery.output);
        }
        Err(e) => callback.on_fail(e),
    }
}

#[derive(Default)]
pub(crate) struct CallbackRegistry {
    listeners: HashMap<RequestKey, HashMap<String, Arc<Listener>>>,
    by_id: HashMap<String, HashSet<RequestKey>>,
}

impl CallbackRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `key` under `id`, replacing an earlier
    /// registration of the same pair.
    pub(crate) fn add(
        &mut self,
        key: RequestKey,
        id: String,
        callback: Box<dyn LoadCallback>,
    ) -> Arc<Listener> {
        let listener = Arc::new(Listener::new(callback));
        self.by_id
            .entry(id.clone())
            .or_default()
            .insert(key.clone());
        self.listeners
            .entry(key)
            .or_default()
            .insert(id, listener.clone());
        listener
    }

    /// Drops every registration of `id`. Returns how many keys it had.
    pub(crate) fn remove(&mut self, id: &str) -> usize {
        let Some(keys) = self.by_id.remove(id) else {
            return 0;
        };
        for key in keys.iter() {
            if let Some(listeners) = self.listeners.get_mut(key) {
                listeners.remove(id);
                if listeners.is_empty() {
                    self.listeners.remove(key);
                }
            }
        }
        keys.len()
    }

    /// Takes every listener of `key`.
    pub(crate) fn remove_all_for_key(&mut self, key: &RequestKey) -> Vec<Arc<Listener>> {
        let Some(listeners) = self.listeners.remove(key) else {
            return Vec::new();
        };
        for id in listeners.keys() {
            if let Some(keys) = self.by_id.get_mut(id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_id.remove(id);
                }
            }
        }
        listeners.into_values().collect()
    }

    pub(crate) fn is_registered(&self, key: &RequestKey) -> bool {
        self.listeners
            .get(key)
            .map_or(false, |listeners| !listeners.is_empty())
    }

    pub(crate) fn listeners(&self, key: &RequestKey) -> Vec<Arc<Listener>> {
        self.listeners
            .get(key)
            .map(|listeners| listeners.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live registrations.
    pub(crate) fn len(&self) -> usize {
        self.listeners.values().map(HashMap::len).sum()
    }
}
