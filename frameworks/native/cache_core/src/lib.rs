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


//! Storage for downloaded content.
//!
//! Two stores back a load: a [`DiskCache`] holding finalized files and the
//! partial files of interrupted downloads, and a [`DataCache`] holding the
//! bodies of memory loads under a byte budget. An [`Updater`] is the write
//! path of one transfer into either store, and the [`CacheManager`] owns
//! both.

#![deny(unused_must_use)]
#![allow(missing_docs, clippy::new_without_default)]

mod data;
mod manage;
mod update;

/// On-disk store and its in-progress file handles.
pub use data::{DiskCache, PartialFile, FINAL_DIR, PARTIAL_DIR, PARTIAL_SUFFIX};

/// In-memory store for memory loads.
pub use data::DataCache;

/// Owner of both stores.
pub use manage::{CacheManager, DEFAULT_RAM_CACHE_SIZE};

/// Write path of one transfer.
pub use update::{LoadOutput, Updater};
