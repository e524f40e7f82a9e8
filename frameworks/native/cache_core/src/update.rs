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
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use netload_utils::request_key::RequestKey;
use netload_utils::{error, info};

use crate::data::PartialFile;
use crate::manage::CacheManager;

const DEFAULT_TRUNK_CAPACITY: usize = 512;

/// Result of a completed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutput {
    /// Body of a memory load.
    Data(Bytes),
    /// Final path of a disk load.
    Path(PathBuf),
}

enum Target {
    Memory(BytesMut),
    Disk(PartialFile),
}

/// Write path of one transfer.
///
/// A memory updater accumulates the body in a buffer, a disk updater appends
/// it to the partial file of the download.
pub struct Updater {
    key: RequestKey,
    target: Target,
    manager: Arc<CacheManager>,
}

impl Updater {
    pub fn memory(key: RequestKey, manager: Arc<CacheManager>) -> Self {
        Self {
            key,
            target: Target::Memory(BytesMut::new()),
            manager,
        }
    }

    /// Opens the partial file `name` for a disk load.
    pub fn disk(key: RequestKey, name: &str, manager: Arc<CacheManager>) -> io::Result<Self> {
        let partial = manager.disk().open_partial(name)?;
        Ok(Self {
            key,
            target: Target::Disk(partial),
            manager,
        })
    }

    /// Bytes already stored before the transfer started.
    pub fn resume_offset(&self) -> u64 {
        match &self.target {
            Target::Memory(_) => 0,
            Target::Disk(partial) => partial.offset(),
        }
    }

    /// Bytes stored so far.
    pub fn received(&self) -> u64 {
        match &self.target {
            Target::Memory(buf) => buf.len() as u64,
            Target::Disk(partial) => partial.len(),
        }
    }

    /// Stores one chunk of the body.
    ///
    /// `content_length` is only consulted on the first chunk of a memory load
    /// to size the buffer.
    pub fn cache_receive<F>(&mut self, data: &[u8], content_length: F) -> io::Result<()>
    where
        F: FnOnce() -> Option<usize>,
    {
        match &mut self.target {
            Target::Memory(buf) => {
                if buf.capacity() == 0 {
                    let hint = content_length().unwrap_or(DEFAULT_TRUNK_CAPACITY);
                    buf.reserve(hint.max(data.len()));
                }
                buf.extend_from_slice(data);
                Ok(())
            }
            Target::Disk(partial) => partial.append(data).map_err(|e| {
                error!("{} cache write error: {}", self.key.brief(), e);
                e
            }),
        }
    }

    /// Discards everything stored, including bytes of earlier attempts.
    pub fn reset_cache(&mut self) -> io::Result<()> {
        let size = self.received();
        if size != 0 {
            info!("reset {} cache size {}", self.key.brief(), size);
        }
        match &mut self.target {
            Target::Memory(buf) => {
                buf.clear();
                Ok(())
            }
            Target::Disk(partial) => partial.truncate(),
        }
    }

    /// Completes the write.
    ///
    /// A disk load is renamed to its final path. A memory load is stored in
    /// the [`DataCache`](crate::DataCache) when `store` is set.
    pub fn cache_finish(self, store: bool) -> io::Result<LoadOutput> {
        match self.target {
            Target::Memory(buf) => {
                let data = buf.freeze();
                if store && !self.manager.ram().insert(self.key.clone(), data.clone()) {
                    info!("{} not kept in ram, size {}", self.key.brief(), data.len());
                }
                Ok(LoadOutput::Data(data))
            }
            Target::Disk(partial) => {
                let path = self.manager.disk().finalize(partial).map_err(|e| {
                    error!("{} finalize error: {}", self.key.brief(), e);
                    e
                })?;
                Ok(LoadOutput::Path(path))
            }
        }
    }
}
