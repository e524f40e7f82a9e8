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


use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use netload_utils::info;
use netload_utils::request_key::RequestKey;

use crate::data::{DataCache, DiskCache};

/// Default byte budget of the in-memory store.
pub const DEFAULT_RAM_CACHE_SIZE: u64 = 1024 * 1024 * 20;

/// Owner of the disk and memory stores of one loader.
pub struct CacheManager {
    disk: DiskCache,
    ram: DataCache,
}

impl CacheManager {
    /// Creates both stores under `root`.
    pub fn new(root: impl AsRef<Path>, ram_capacity: u64) -> io::Result<Self> {
        Ok(Self {
            disk: DiskCache::new(root)?,
            ram: DataCache::new(ram_capacity),
        })
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    pub fn ram(&self) -> &DataCache {
        &self.ram
    }

    /// Returns the cached body of a memory load.
    pub fn fetch_data(&self, key: &RequestKey) -> Option<Bytes> {
        let data = self.ram.get(key)?;
        info!("{} ram cache hit", key.brief());
        Some(data)
    }

    /// Returns the final path of a finished disk load.
    pub fn fetch_file(&self, name: &str) -> Option<PathBuf> {
        if self.disk.is_finished(name) {
            info!("{} file cache hit", name);
            Some(self.disk.final_path(name))
        } else {
            None
        }
    }

    /// Drops the in-memory store. Called by the host when memory runs low.
    pub fn on_memory_pressure(&self) {
        self.ram.clear();
    }

    pub fn set_ram_cache_size(&self, size: u64) {
        self.ram.set_capacity(size);
    }

    pub fn remove_disk_file(&self, name: &str) {
        info!("remove disk file {}", name);
        self.disk.remove_file(name);
    }

    pub fn remove_all_disk_file(&self) {
        info!("remove all disk files");
        self.disk.remove_all();
    }

    pub fn remove_all_partial_files(&self) {
        self.disk.remove_all_partial();
    }

    pub fn disk_files(&self) -> Vec<PathBuf> {
        self.disk.files()
    }
}
