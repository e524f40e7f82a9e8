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

//! Common utilities for network loading.
//!
//! This crate provides the pieces shared by the cache and download crates:
//! request key derivation, callback identifier generation, the logging
//! facade and helpers used by unit tests.

#![warn(missing_docs)]
#![allow(missing_docs, clippy::new_without_default)]

/// Fast pseudorandom number generation and callback identifiers.
pub mod fastrand;

/// Hash utilities.
pub mod hash;

/// Request key derivation and display.
pub mod request_key;


// Logging goes through the `log` facade; re-exported so dependent crates
// share one import path.
pub use log::{debug, error, info, warn};
