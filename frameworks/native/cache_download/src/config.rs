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


//! Construction parameters of a [`Network`](crate::Network).

use std::path::PathBuf;
use std::time::Duration;

use netload_cache::DEFAULT_RAM_CACHE_SIZE;

const DEFAULT_PATH: &str = "./netload";

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound of a whole request, long enough for large downloads.
const SECONDS_IN_ONE_WEEK: u64 = 7 * 24 * 60 * 60;

/// Configuration of a [`Network`](crate::Network).
///
/// # Examples
///
/// ```rust
/// use netload::NetworkConfig;
///
/// let mut config = NetworkConfig::new();
/// config.path("/tmp/netload").max_concurrent(4);
/// assert_eq!(config.max_concurrent, 4);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Storage root. Finished files go to `Data/`, partial ones to `Cache/`.
    pub path: PathBuf,
    /// Initial bound of concurrently running loads.
    pub max_concurrent: usize,
    /// Byte budget of the in-memory cache.
    pub ram_cache_size: u64,
    /// Worker threads of the owned runtime, tokio's default if unset.
    pub worker_threads: Option<usize>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Whether the HTTP client honors proxies from the environment.
    pub system_proxy: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            max_concurrent: usize::MAX,
            ram_cache_size: DEFAULT_RAM_CACHE_SIZE,
            worker_threads: None,
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: Duration::from_secs(SECONDS_IN_ONE_WEEK),
            system_proxy: true,
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.path = path.into();
        self
    }

    pub fn max_concurrent(&mut self, max: usize) -> &mut Self {
        self.max_concurrent = max;
        self
    }

    pub fn ram_cache_size(&mut self, size: u64) -> &mut Self {
        self.ram_cache_size = size;
        self
    }

    pub fn worker_threads(&mut self, threads: usize) -> &mut Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.request_timeout = timeout;
        self
    }

    pub fn system_proxy(&mut self, enabled: bool) -> &mut Self {
        self.system_proxy = enabled;
        self
    }
}
