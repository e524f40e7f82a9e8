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


//! Network loading with request coalescing and resumable disk caching.
//!
//! A [`Network`] schedules loads under a concurrency bound, shares one
//! transfer between callers of the same [`RequestKey`] and delivers each
//! result to every interested [`LoadCallback`]. Disk loads keep partial files
//! between attempts and resume them with byte-range requests.

#![allow(missing_docs, clippy::new_without_default)]

#[macro_use]
mod macros;

mod config;
mod download;

pub mod services;

pub use config::NetworkConfig;
pub use download::common::{HttpRequest, ResponseHead, TransferSink, Transport, TransportHandle};
pub use download::error::{ErrorKind, NetworkError};
pub use netload_cache::LoadOutput;
pub use netload_utils::request_key::RequestKey;
pub use services::{CachePolicy, FnCallback, LoadCallback, LoadRequest, Network, SameKeyPolicy};

cfg_reqwest! {
    pub use download::http::ReqwestTransport;
}
