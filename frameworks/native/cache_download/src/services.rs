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


//! Load service interfaces and the scheduler.
//!
//! A [`Network`] owns the running and waiting task lists, the callback
//! registry and the cache. All list and registry changes happen under one
//! lock; task starts and callback deliveries are dispatched to blocking
//! workers after it is released.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use netload_cache::{CacheManager, DiskCache, LoadOutput};
use netload_utils::fastrand::callback_id;
use netload_utils::request_key::RequestKey;
use netload_utils::{error, info};
use tokio::runtime::{Handle, Runtime};
use url::Url;

use crate::config::NetworkConfig;
use crate::download::common::{HttpRequest, Transport};
use crate::download::error::NetworkError;
use crate::download::queue::TaskQueue;
use crate::download::registry::{deliver_to, CallbackRegistry};
use crate::download::task::{self, Outcome, Reporter, Storage, TaskContext, TaskSpec, TransferTask};

cfg_reqwest! {
    use crate::download::http::ReqwestTransport;
}

/// Receiver of the events of one load.
///
/// Every method runs on a blocking worker. After `on_success` or `on_fail`
/// no further event of the same request cycle is delivered.
#[allow(unused_variables)]
pub trait LoadCallback: Send {
    /// Bytes received so far and the expected total, 0 if unknown.
    fn on_progress(&mut self, current: u64, total: u64) {}

    fn on_success(&mut self, output: LoadOutput) {}

    fn on_fail(&mut self, error: NetworkError) {}
}

type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;
type ResultFn = Box<dyn FnMut(Result<LoadOutput, NetworkError>) + Send>;

/// A [`LoadCallback`] built from closures.
///
/// The result closure runs once per delivered result: once for most loads,
/// twice for a [`CachePolicy::CacheAndReload`] load that found a cached
/// result.
///
/// # Examples
///
/// ```rust
/// use netload::FnCallback;
///
/// let callback = FnCallback::new(|result| println!("{:?}", result))
///     .with_progress(|current, total| println!("{}/{}", current, total));
/// ```
pub struct FnCallback {
    progress: Option<ProgressFn>,
    result: ResultFn,
}

impl FnCallback {
    pub fn new<F>(result: F) -> Self
    where
        F: FnMut(Result<LoadOutput, NetworkError>) + Send + 'static,
    {
        Self {
            progress: None,
            result: Box::new(result),
        }
    }

    pub fn with_progress<P>(mut self, progress: P) -> Self
    where
        P: FnMut(u64, u64) + Send + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }
}

impl LoadCallback for FnCallback {
    fn on_progress(&mut self, current: u64, total: u64) {
        if let Some(progress) = self.progress.as_mut() {
            progress(current, total);
        }
    }

    fn on_success(&mut self, output: LoadOutput) {
        (self.result)(Ok(output));
    }

    fn on_fail(&mut self, error: NetworkError) {
        (self.result)(Err(error));
    }
}

/// How a load uses results of earlier loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Always download. Memory loads are not kept in the cache.
    Reload,
    /// Serve a cached result if there is one, otherwise download.
    #[default]
    Cache,
    /// Serve a cached result if there is one, then download again and deliver
    /// the fresh result too.
    CacheAndReload,
}

/// What a load does when a task for its key is already queued or running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameKeyPolicy {
    /// Keep the existing task; the new caller shares its result.
    #[default]
    Ignore,
    /// Cancel the existing task and start a fresh one.
    Replace,
    /// Run an independent task. Not available for disk loads, which fall
    /// back to `Ignore`.
    None,
}

/// Parameters of one load.
///
/// # Examples
///
/// ```rust
/// use netload::{CachePolicy, LoadRequest, SameKeyPolicy};
///
/// let mut request = LoadRequest::new("https://example.com/file.bin");
/// request
///     .header("Accept", "*/*")
///     .cache_policy(CachePolicy::Reload)
///     .same_key_policy(SameKeyPolicy::Replace)
///     .to_disk(true);
/// ```
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Overrides the key derived from url and body.
    pub key: Option<String>,
    pub cache_policy: CachePolicy,
    pub same_key_policy: SameKeyPolicy,
    /// Identifies the caller's registration, generated if unset.
    pub callback_id: Option<String>,
    pub to_disk: bool,
    /// Final file name of a disk load, the key if unset. A relative path of
    /// plain components; anything else is rejected.
    pub file_name: Option<String>,
    /// Admit to the running list at once instead of queueing.
    pub start_immediately: bool,
}

impl LoadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            key: None,
            cache_policy: CachePolicy::default(),
            same_key_policy: SameKeyPolicy::default(),
            callback_id: None,
            to_disk: false,
            file_name: None,
            start_immediately: true,
        }
    }

    pub fn method(&mut self, method: &str) -> &mut Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn key(&mut self, key: &str) -> &mut Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn cache_policy(&mut self, policy: CachePolicy) -> &mut Self {
        self.cache_policy = policy;
        self
    }

    pub fn same_key_policy(&mut self, policy: SameKeyPolicy) -> &mut Self {
        self.same_key_policy = policy;
        self
    }

    pub fn callback_id(&mut self, id: &str) -> &mut Self {
        self.callback_id = Some(id.to_string());
        self
    }

    pub fn to_disk(&mut self, to_disk: bool) -> &mut Self {
        self.to_disk = to_disk;
        self
    }

    /// Names the final file. Implies a disk load.
    pub fn file_name(&mut self, name: &str) -> &mut Self {
        self.file_name = Some(name.to_string());
        self.to_disk = true;
        self
    }

    pub fn start_immediately(&mut self, start: bool) -> &mut Self {
        self.start_immediately = start;
        self
    }

    /// Key this request is coalesced and cached under.
    pub fn request_key(&self) -> Result<RequestKey, NetworkError> {
        let url = Url::parse(&self.url)?;
        Ok(self.key_of(&url))
    }

    fn key_of(&self, url: &Url) -> RequestKey {
        match &self.key {
            Some(key) => RequestKey::new(key.clone()),
            None => RequestKey::from_parsed(url, self.body.as_deref()),
        }
    }

    fn to_spec(&self) -> Result<TaskSpec, NetworkError> {
        let url = Url::parse(&self.url)?;
        let key = self.key_of(&url);
        let storage = match (&self.file_name, self.to_disk) {
            (Some(name), _) => Storage::Disk(name.clone()),
            // Derived keys are hex; an override key is checked like a name.
            (None, true) => Storage::Disk(key.as_str().to_string()),
            (None, false) => Storage::Memory,
        };
        if let Storage::Disk(name) = &storage {
            if !DiskCache::is_valid_name(name) {
                return Err(NetworkError::invalid_request(format!(
                    "invalid file name {:?}",
                    name
                )));
            }
        }
        let mut same_key = self.same_key_policy;
        if same_key == SameKeyPolicy::None && storage != Storage::Memory {
            info!("{} disk load cannot run twice, same key ignored", key.brief());
            same_key = SameKeyPolicy::Ignore;
        }
        Ok(TaskSpec {
            key,
            request: HttpRequest {
                url: url.to_string(),
                method: self.method.clone(),
                headers: self.headers.clone(),
                body: self.body.clone(),
            },
            storage,
            cache_policy: self.cache_policy,
            same_key,
        })
    }
}

struct State {
    queue: TaskQueue,
    registry: CallbackRegistry,
}

struct Inner {
    me: Weak<Inner>,
    state: Mutex<State>,
    executor: Handle,
    transport: Arc<dyn Transport>,
    cache: Arc<CacheManager>,
}

/// The load scheduler.
///
/// Loads of the same key are coalesced according to their
/// [`SameKeyPolicy`], at most `max_concurrent` of them run at once and the
/// rest wait in arrival order.
pub struct Network {
    inner: Arc<Inner>,
    runtime: Option<Runtime>,
}

cfg_reqwest! {
    impl Network {
        /// Creates a loader with its own runtime and a reqwest transport.
        pub fn new(config: &NetworkConfig) -> Result<Self, NetworkError> {
            let runtime = runtime(config)?;
            let handle = runtime.handle().clone();
            let transport = Arc::new(ReqwestTransport::new(config, handle.clone())?);
            Self::build(config, handle, transport, Some(runtime))
        }
    }
}

impl Network {
    /// Creates a loader with its own runtime around `transport`.
    pub fn with_transport(
        config: &NetworkConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NetworkError> {
        let runtime = runtime(config)?;
        let handle = runtime.handle().clone();
        Self::build(config, handle, transport, Some(runtime))
    }

    /// Creates a loader running its work on an existing runtime.
    pub fn with_handle(
        config: &NetworkConfig,
        handle: Handle,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NetworkError> {
        Self::build(config, handle, transport, None)
    }

    fn build(
        config: &NetworkConfig,
        executor: Handle,
        transport: Arc<dyn Transport>,
        runtime: Option<Runtime>,
    ) -> Result<Self, NetworkError> {
        let cache = CacheManager::new(&config.path, config.ram_cache_size).map_err(|e| {
            error!("open storage {} failed: {}", config.path.display(), e);
            NetworkError::from(e)
        })?;
        info!(
            "network at {}, max concurrent {}",
            config.path.display(),
            config.max_concurrent
        );
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            state: Mutex::new(State {
                queue: TaskQueue::new(config.max_concurrent),
                registry: CallbackRegistry::new(),
            }),
            executor,
            transport,
            cache: Arc::new(cache),
        });
        Ok(Self { inner, runtime })
    }

    /// Starts or joins a load.
    ///
    /// Returns the key of the request, or `None` if the request is invalid,
    /// in which case `callback` receives the error.
    pub fn load(
        &self,
        request: &LoadRequest,
        callback: Box<dyn LoadCallback>,
    ) -> Option<RequestKey> {
        self.inner.load(request, callback)
    }

    /// Loads `url` into memory.
    pub fn data(&self, url: &str, callback: Box<dyn LoadCallback>) -> Option<RequestKey> {
        self.load(&LoadRequest::new(url), callback)
    }

    /// Downloads `url` to a file named by its key.
    pub fn download(&self, url: &str, callback: Box<dyn LoadCallback>) -> Option<RequestKey> {
        let mut request = LoadRequest::new(url);
        request.to_disk(true);
        self.load(&request, callback)
    }

    /// Cancels every task of `key`. Its callers receive a cancellation error.
    pub fn remove(&self, key: &RequestKey) {
        let (tasks, listeners, started) = {
            let mut state = self.inner.state.lock().unwrap();
            let tasks = state.queue.remove_key(key);
            let listeners = state.registry.remove_all_for_key(key);
            (tasks, listeners, state.queue.promote())
        };
        info!(
            "remove {} tasks {} callbacks {}",
            key.brief(),
            tasks,
            listeners.len()
        );
        self.inner.start_tasks(started);
        for listener in listeners {
            self.inner
                .dispatch(move || listener.deliver(Err(NetworkError::cancelled())));
        }
    }

    /// Withdraws the registration `id`. Transfers are left running.
    pub fn remove_callback(&self, id: &str) {
        let (removed, left) = {
            let mut state = self.inner.state.lock().unwrap();
            (state.registry.remove(id), state.registry.len())
        };
        info!("remove callback {} from {} keys, {} left", id, removed, left);
    }

    /// Changes the concurrency bound, demoting or promoting tasks at once.
    pub fn set_max_concurrent(&self, max: usize) {
        let started = self.inner.state.lock().unwrap().queue.set_max_concurrent(max);
        self.inner.start_tasks(started);
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.state.lock().unwrap().queue.max_concurrent()
    }

    /// Keys of running tasks, most recently admitted first.
    pub fn running_keys(&self) -> Vec<RequestKey> {
        self.inner.state.lock().unwrap().queue.running_keys()
    }

    /// Keys of waiting tasks, next to run first.
    pub fn waiting_keys(&self) -> Vec<RequestKey> {
        self.inner.state.lock().unwrap().queue.waiting_keys()
    }

    pub fn is_loading(&self, key: &RequestKey) -> bool {
        self.inner.state.lock().unwrap().queue.is_loading(key)
    }

    /// Whether any caller is still waiting for `key`.
    pub fn is_registered(&self, key: &RequestKey) -> bool {
        self.inner.state.lock().unwrap().registry.is_registered(key)
    }

    pub fn cache_manager(&self) -> &CacheManager {
        &self.inner.cache
    }

    /// Removes the finished and the partial file of `name`.
    pub fn remove_disk_file(&self, name: impl AsRef<str>) {
        self.inner.cache.remove_disk_file(name.as_ref());
    }

    pub fn remove_all_disk_file(&self) {
        self.inner.cache.remove_all_disk_file();
    }

    pub fn remove_all_partial_files(&self) {
        self.inner.cache.remove_all_partial_files();
    }

    pub fn disk_files(&self) -> Vec<PathBuf> {
        self.inner.cache.disk_files()
    }

    /// Drops the in-memory cache. Called by the host when memory runs low.
    pub fn on_memory_pressure(&self) {
        info!("memory pressure, clear ram cache");
        self.inner.cache.on_memory_pressure();
    }

    pub fn set_ram_cache_size(&self, size: u64) {
        info!("set ram cache size to {}", size);
        self.inner.cache.set_ram_cache_size(size);
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.inner.state.lock().unwrap().queue.clear();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Inner {
    fn load(&self, request: &LoadRequest, callback: Box<dyn LoadCallback>) -> Option<RequestKey> {
        let spec = match request.to_spec() {
            Ok(spec) => spec,
            Err(e) => {
                error!("load {} rejected: {}", request.url, e);
                self.dispatch(move || deliver_to(callback, Err(e)));
                return None;
            }
        };
        let key = spec.key.clone();
        let id = request.callback_id.clone().unwrap_or_else(callback_id);
        info!("load {} callback {}", key.brief(), id);

        let mut cached = None;
        if spec.cache_policy != CachePolicy::Reload {
            if let Some(delivery) = task::cached(&self.cache, &spec) {
                if spec.cache_policy == CachePolicy::Cache {
                    self.dispatch(move || deliver_to(callback, Ok(delivery)));
                    return Some(key);
                }
                cached = Some(delivery);
            }
        }

        let (listener, started) = {
            let mut state = self.state.lock().unwrap();
            let listener = state.registry.add(key.clone(), id, callback);
            let seq = state.queue.next_seq();
            let task = Arc::new(TransferTask::new(seq, Arc::new(spec)));
            let started = if request.start_immediately {
                state.queue.add_run(task)
            } else {
                state.queue.add_wait(task)
            };
            (listener, started)
        };

        match (cached, self.me.upgrade()) {
            // The cached result goes out before the reload can finish.
            (Some(delivery), Some(me)) => self.dispatch(move || {
                listener.deliver_cached(delivery);
                me.start_tasks(started);
            }),
            _ => self.start_tasks(started),
        }
        Some(key)
    }

    fn context(&self) -> Option<TaskContext> {
        let reporter: Arc<dyn Reporter> = self.me.upgrade()?;
        Some(TaskContext {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            reporter,
        })
    }

    fn start_tasks(&self, tasks: Vec<Arc<TransferTask>>) {
        if tasks.is_empty() {
            return;
        }
        let Some(ctx) = self.context() else {
            return;
        };
        for task in tasks {
            let ctx = ctx.clone();
            self.dispatch(move || task.start(&ctx));
        }
    }

    fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.executor.spawn_blocking(f);
    }
}

impl Reporter for Inner {
    fn on_progress(&self, key: &RequestKey, _seq: u64, received: u64, total: u64) {
        let listeners = self.state.lock().unwrap().registry.listeners(key);
        for listener in listeners.into_iter().filter(|l| !l.is_delivered()) {
            self.dispatch(move || listener.progress(received, total));
        }
    }

    fn on_finish(&self, key: &RequestKey, seq: u64, outcome: Outcome) {
        let (started, listeners) = {
            let mut state = self.state.lock().unwrap();
            let started = state.queue.finish(key, seq);
            let listeners = match &outcome {
                // A replaced, demoted or removed task; its callers are served
                // elsewhere.
                Err(e) if e.is_cancelled() => Vec::new(),
                _ => state.registry.remove_all_for_key(key),
            };
            (started, listeners)
        };
        info!(
            "{} seq {} finished, notify {} callbacks",
            key.brief(),
            seq,
            listeners.len()
        );
        self.start_tasks(started);
        for listener in listeners {
            let outcome = outcome.clone();
            self.dispatch(move || listener.deliver(outcome));
        }
    }
}

fn runtime(config: &NetworkConfig) -> Result<Runtime, NetworkError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = config.worker_threads {
        builder.worker_threads(threads);
    }
    builder
        .thread_name("netload")
        .enable_all()
        .build()
        .map_err(|e| {
            error!("build runtime failed: {}", e);
            NetworkError::from(e)
        })
}
