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


//! Running and waiting lists of the scheduler.
//!
//! The running list takes new tasks at its head, so its tail holds the task
//! admitted longest ago. The waiting list is served from its head. A key
//! index over both lists answers same-key lookups without scanning.
//!
//! Methods that may admit tasks return them; the caller starts them after
//! releasing the scheduler lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use netload_utils::info;
use netload_utils::request_key::RequestKey;

use super::task::TransferTask;
use crate::services::SameKeyPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Running,
    Waiting,
}

struct Slot {
    task: Arc<TransferTask>,
    place: Place,
}

pub(crate) struct TaskQueue {
    running: VecDeque<Arc<TransferTask>>,
    waiting: VecDeque<Arc<TransferTask>>,
    index: HashMap<RequestKey, Vec<Slot>>,
    max_concurrent: usize,
    seq: u64,
}

impl TaskQueue {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            running: VecDeque::new(),
            waiting: VecDeque::new(),
            index: HashMap::new(),
            max_concurrent,
            seq: 0,
        }
    }

    /// Sequence number for the next task.
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn limit(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Admits `task` to the running list.
    pub(crate) fn add_run(&mut self, task: Arc<TransferTask>) -> Vec<Arc<TransferTask>> {
        let key = task.key().clone();
        let policy = task.spec().same_key;
        for running in self.tasks_of(&key, Place::Running) {
            match policy {
                SameKeyPolicy::Ignore => {
                    info!("{} already running, seq {} ignored", key.brief(), task.seq());
                    return Vec::new();
                }
                SameKeyPolicy::Replace => {
                    info!(
                        "{} seq {} replaced by seq {}",
                        key.brief(),
                        running.seq(),
                        task.seq()
                    );
                    self.take(&running);
                    running.cancel();
                }
                SameKeyPolicy::None => {}
            }
        }
        if policy != SameKeyPolicy::None {
            for waiting in self.tasks_of(&key, Place::Waiting) {
                self.take(&waiting);
                waiting.cancel();
            }
        }
        info!("run {} seq {}", key.brief(), task.seq());
        self.put(task.clone(), Place::Running, true);
        self.demote();
        vec![task]
    }

    /// Queues `task` on the waiting list, then fills free running slots.
    pub(crate) fn add_wait(&mut self, task: Arc<TransferTask>) -> Vec<Arc<TransferTask>> {
        let key = task.key().clone();
        let policy = task.spec().same_key;
        for running in self.tasks_of(&key, Place::Running) {
            match policy {
                SameKeyPolicy::Ignore => {
                    info!("{} already running, seq {} ignored", key.brief(), task.seq());
                    return Vec::new();
                }
                SameKeyPolicy::Replace => {
                    info!(
                        "{} seq {} replaced by seq {}",
                        key.brief(),
                        running.seq(),
                        task.seq()
                    );
                    self.take(&running);
                    running.cancel();
                }
                SameKeyPolicy::None => {}
            }
        }
        let mut queued = false;
        for waiting in self.tasks_of(&key, Place::Waiting) {
            match policy {
                SameKeyPolicy::Ignore => queued = true,
                SameKeyPolicy::Replace => {
                    self.take(&waiting);
                    waiting.cancel();
                }
                SameKeyPolicy::None => {}
            }
        }
        if queued {
            info!("{} already waiting, seq {} ignored", key.brief(), task.seq());
        } else {
            info!("wait {} seq {}", key.brief(), task.seq());
            self.put(task, Place::Waiting, false);
        }
        self.promote()
    }

    /// Moves excess running tasks back to the head of the waiting list.
    ///
    /// A demoted task is cancelled and replaced by a fresh one; bytes already
    /// in its partial file are kept for the range request of the new task.
    fn demote(&mut self) {
        let limit = self.limit();
        while self.running.len() > limit {
            let Some(task) = self.running.back().cloned() else {
                break;
            };
            self.take(&task);
            if task.cancel() {
                let seq = self.next_seq();
                let fresh = task.reissue(seq);
                info!(
                    "demote {} seq {} to waiting as seq {}",
                    task.key().brief(),
                    task.seq(),
                    seq
                );
                self.put(fresh, Place::Waiting, true);
            }
        }
    }

    /// Starts waiting tasks while there are free running slots.
    pub(crate) fn promote(&mut self) -> Vec<Arc<TransferTask>> {
        let mut started = Vec::new();
        while self.running.len() < self.limit() {
            let Some(task) = self.waiting.front().cloned() else {
                break;
            };
            self.take(&task);
            info!("promote {} seq {}", task.key().brief(), task.seq());
            self.put(task.clone(), Place::Running, true);
            started.push(task);
        }
        started
    }

    /// Drops the task `seq` of `key` after it reported, then backfills.
    pub(crate) fn finish(&mut self, key: &RequestKey, seq: u64) -> Vec<Arc<TransferTask>> {
        let task = self
            .index
            .get(key)
            .and_then(|slots| slots.iter().find(|slot| slot.task.seq() == seq))
            .map(|slot| slot.task.clone());
        if let Some(task) = task {
            self.take(&task);
        }
        self.promote()
    }

    /// Cancels and drops every task of `key`. Returns how many there were.
    pub(crate) fn remove_key(&mut self, key: &RequestKey) -> usize {
        let Some(slots) = self.index.remove(key) else {
            return 0;
        };
        for slot in slots.iter() {
            let seq = slot.task.seq();
            match slot.place {
                Place::Running => self.running.retain(|task| task.seq() != seq),
                Place::Waiting => self.waiting.retain(|task| task.seq() != seq),
            }
            slot.task.cancel();
        }
        slots.len()
    }

    /// Cancels and drops every task.
    pub(crate) fn clear(&mut self) {
        for slot in self.index.drain().flat_map(|(_, slots)| slots) {
            slot.task.cancel();
        }
        self.running.clear();
        self.waiting.clear();
    }

    pub(crate) fn set_max_concurrent(&mut self, max: usize) -> Vec<Arc<TransferTask>> {
        info!("max concurrent {} -> {}", self.max_concurrent, max);
        self.max_concurrent = max;
        self.demote();
        self.promote()
    }

    pub(crate) fn running_keys(&self) -> Vec<RequestKey> {
        self.running.iter().map(|task| task.key().clone()).collect()
    }

    pub(crate) fn waiting_keys(&self) -> Vec<RequestKey> {
        self.waiting.iter().map(|task| task.key().clone()).collect()
    }

    pub(crate) fn is_loading(&self, key: &RequestKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn running_len(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    fn tasks_of(&self, key: &RequestKey, place: Place) -> Vec<Arc<TransferTask>> {
        self.index
            .get(key)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| slot.place == place)
                    .map(|slot| slot.task.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn put(&mut self, task: Arc<TransferTask>, place: Place, front: bool) {
        let list = match place {
            Place::Running => &mut self.running,
            Place::Waiting => &mut self.waiting,
        };
        if front {
            list.push_front(task.clone());
        } else {
            list.push_back(task.clone());
        }
        self.index
            .entry(task.key().clone())
            .or_default()
            .push(Slot { task, place });
    }

    fn take(&mut self, task: &Arc<TransferTask>) {
        let seq = task.seq();
        let Some(slots) = self.index.get_mut(task.key()) else {
            return;
        };
        let Some(pos) = slots.iter().position(|slot| slot.task.seq() == seq) else {
            return;
        };
        let slot = slots.swap_remove(pos);
        if slots.is_empty() {
            self.index.remove(task.key());
        }
        match slot.place {
            Place::Running => self.running.retain(|task| task.seq() != seq),
            Place::Waiting => self.waiting.retain(|task| task.seq() != seq),
        }
    }
}
