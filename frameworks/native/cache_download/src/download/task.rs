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


//! One execution of a load.
//!
//! A [`TransferTask`] is created on admission and started at most once on a
//! blocking worker. `start` checks the cache, prepares the write path, hands
//! the request to the transport and then blocks on a [`Latch`] until the
//! transport reports a terminal event or the task is cancelled. The outcome is
//! reported exactly once through the [`Reporter`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use netload_cache::{CacheManager, LoadOutput, Updater};
use netload_utils::request_key::RequestKey;
use netload_utils::{error, info};

use super::callback::PrimeCallback;
use super::common::{HttpRequest, Transport, TransportHandle};
use super::error::NetworkError;
use super::{CANCEL, FAIL, PENDING, RUNNING, SUCCESS};
use crate::services::{CachePolicy, SameKeyPolicy};

/// Where the body of a load goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Storage {
    Memory,
    /// Disk load finalized under the given file name.
    Disk(String),
}

/// Everything needed to (re)issue a load.
#[derive(Debug, Clone)]
pub(crate) struct TaskSpec {
    pub(crate) key: RequestKey,
    pub(crate) request: HttpRequest,
    pub(crate) storage: Storage,
    pub(crate) cache_policy: CachePolicy,
    pub(crate) same_key: SameKeyPolicy,
}

/// A successful load as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) output: LoadOutput,
    pub(crate) received: u64,
    pub(crate) total: u64,
}

impl Delivery {
    /// A result served from cache, reported as one unit out of one.
    pub(crate) fn cached(output: LoadOutput) -> Self {
        Self {
            output,
            received: 1,
            total: 1,
        }
    }
}

pub(crate) type Outcome = Result<Delivery, NetworkError>;

/// Receiver of task events, implemented by the scheduler.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Reporter: Send + Sync {
    fn on_progress(&self, key: &RequestKey, seq: u64, received: u64, total: u64);

    /// Called exactly once for every task that was started.
    fn on_finish(&self, key: &RequestKey, seq: u64, outcome: Outcome);
}

/// Collaborators a task needs while it runs.
#[derive(Clone)]
pub(crate) struct TaskContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Arc<CacheManager>,
    pub(crate) reporter: Arc<dyn Reporter>,
}

/// What the transport sink hands back to the waiting task.
pub(crate) enum SinkResult {
    Done {
        updater: Updater,
        total: Option<u64>,
    },
    Failed(NetworkError),
}

/// One-shot wake-up of the thread running a task.
pub(crate) struct Latch {
    signaled: AtomicBool,
    done: Mutex<bool>,
    cond: Condvar,
    wakeups: AtomicUsize,
}

impl Latch {
    fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
            done: Mutex::new(false),
            cond: Condvar::new(),
            wakeups: AtomicUsize::new(0),
        }
    }

    /// Wakes the waiter. Only the first call has an effect.
    pub(crate) fn signal(&self) -> bool {
        if self.signaled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut done = self.done.lock().unwrap();
        *done = true;
        self.wakeups.fetch_add(1, Ordering::AcqRel);
        self.cond.notify_all();
        true
    }

    pub(crate) fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }
}

pub(crate) struct TransferTask {
    seq: u64,
    spec: Arc<TaskSpec>,
    state: AtomicUsize,
    handle: Mutex<Option<Arc<dyn TransportHandle>>>,
    result: Mutex<Option<SinkResult>>,
    latch: Latch,
}

impl TransferTask {
    pub(crate) fn new(seq: u64, spec: Arc<TaskSpec>) -> Self {
        Self {
            seq,
            spec,
            state: AtomicUsize::new(PENDING),
            handle: Mutex::new(None),
            result: Mutex::new(None),
            latch: Latch::new(),
        }
    }

    /// A fresh, unstarted task for the same load.
    pub(crate) fn reissue(&self, seq: u64) -> Arc<Self> {
        Arc::new(Self::new(seq, self.spec.clone()))
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn key(&self) -> &RequestKey {
        &self.spec.key
    }

    pub(crate) fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub(crate) fn state(&self) -> usize {
        self.state.load(Ordering::Acquire)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state() == CANCEL
    }

    /// Cancels the task unless it already reached a terminal state.
    ///
    /// Returns `true` if this call cancelled it.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state();
        loop {
            if state >= SUCCESS {
                return false;
            }
            match self.state.compare_exchange(state, CANCEL, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => state = current,
            }
        }
        info!("cancel task {} seq {}", self.key().brief(), self.seq);
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.cancel();
        }
        self.latch.signal();
        true
    }

    /// Stores the transport's result and wakes the running thread.
    pub(crate) fn complete(&self, result: SinkResult) {
        if self.latch.is_signaled() {
            return;
        }
        *self.result.lock().unwrap() = Some(result);
        self.latch.signal();
    }

    #[cfg(test)]
    pub(crate) fn take_result(&self) -> Option<SinkResult> {
        self.result.lock().unwrap().take()
    }

    /// Runs the load and reports its outcome. Does nothing if the task was
    /// started before or cancelled while pending.
    pub(crate) fn start(self: &Arc<Self>, ctx: &TaskContext) {
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!(
                "task {} seq {} not started, state {}",
                self.key().brief(),
                self.seq,
                self.state()
            );
            return;
        }
        let outcome = match self.run(ctx) {
            Ok(delivery) if self.settle(SUCCESS) => Ok(delivery),
            Err(e) if !e.is_cancelled() && self.settle(FAIL) => Err(e),
            _ => {
                self.settle(CANCEL);
                Err(NetworkError::cancelled())
            }
        };
        match &outcome {
            Ok(delivery) => info!(
                "task {} seq {} success {}/{}",
                self.key().brief(),
                self.seq,
                delivery.received,
                delivery.total
            ),
            Err(e) => info!("task {} seq {} end: {}", self.key().brief(), self.seq, e),
        }
        ctx.reporter.on_finish(self.key(), self.seq, outcome);
    }

    fn settle(&self, to: usize) -> bool {
        self.state
            .compare_exchange(RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn run(self: &Arc<Self>, ctx: &TaskContext) -> Result<Delivery, NetworkError> {
        let spec = &self.spec;
        if spec.cache_policy == CachePolicy::Cache {
            if let Some(delivery) = cached(&ctx.cache, spec) {
                return Ok(delivery);
            }
        }

        let updater = match &spec.storage {
            Storage::Memory => Updater::memory(spec.key.clone(), ctx.cache.clone()),
            Storage::Disk(name) => Updater::disk(spec.key.clone(), name, ctx.cache.clone())
                .map_err(|e| {
                    error!("{} open cache file failed: {}", spec.key.brief(), e);
                    NetworkError::from(e)
                })?,
        };

        let mut request = spec.request.clone();
        let offset = updater.resume_offset();
        if offset > 0 {
            info!("{} resume from {}", spec.key.brief(), offset);
            request.set_header("Range", format!("bytes={}-", offset));
        }

        let sink = PrimeCallback::new(self.clone(), updater, offset, ctx.reporter.clone());
        let handle = ctx.transport.execute(request, Box::new(sink));
        {
            let mut slot = self.handle.lock().unwrap();
            if self.is_cancelled() {
                drop(slot);
                handle.cancel();
            } else {
                *slot = Some(handle);
            }
        }

        self.latch.wait();
        self.handle.lock().unwrap().take();
        let result = self.result.lock().unwrap().take();
        match result {
            Some(SinkResult::Done { updater, total }) => {
                let received = updater.received();
                let store = spec.cache_policy != CachePolicy::Reload;
                let output = updater.cache_finish(store)?;
                Ok(Delivery {
                    output,
                    received,
                    total: total.unwrap_or(received).max(received),
                })
            }
            Some(SinkResult::Failed(e)) => Err(e),
            None => Err(NetworkError::cancelled()),
        }
    }
}

/// Looks up a finished result of `spec` in the cache.
pub(crate) fn cached(cache: &CacheManager, spec: &TaskSpec) -> Option<Delivery> {
    let output = match &spec.storage {
        Storage::Memory => LoadOutput::Data(cache.fetch_data(&spec.key)?),
        Storage::Disk(name) => LoadOutput::Path(cache.fetch_file(name)?),
    };
    Some(Delivery::cached(output))
}
