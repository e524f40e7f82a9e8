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


//! Request keys.
//!
//! A [`RequestKey`] names one logical request. Duplicate loads are coalesced
//! by key and cached files are stored under it, so the derivation has to be
//! deterministic: the same URL with the same body always yields the same key.

use std::fmt::Display;

use url::Url;

use crate::hash::sha256_hex;

/// Identifier of a logical request.
///
/// Derived keys are the SHA-256 digest of the absolute URL followed by the
/// request body, rendered as 64 lowercase hex characters. Callers may also
/// supply their own key with [`RequestKey::new`].
///
/// # Examples
///
/// ```rust
/// use netload_utils::request_key::RequestKey;
///
/// let key = RequestKey::from_url("https://example.com/a.png").unwrap();
/// let same = RequestKey::from_url("https://example.com/a.png").unwrap();
/// assert_eq!(key, same);
/// assert_eq!(key.as_str().len(), 64);
/// ```
#[derive(Debug, Hash, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct RequestKey {
    hash: String,
}

impl RequestKey {
    /// Wraps a caller-chosen key without hashing it.
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Parses `url` and derives its key.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `url` is not an absolute URL.
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        Ok(Self::from_parsed(&parsed, None))
    }

    /// Derives the key of an already parsed URL with an optional body.
    pub fn from_parsed(url: &Url, body: Option<&[u8]>) -> Self {
        let hash = match body {
            Some(body) if !body.is_empty() => sha256_hex(&[url.as_str().as_bytes(), body]),
            _ => sha256_hex(&[url.as_str().as_bytes()]),
        };
        Self { hash }
    }

    /// Parses `url` and derives the key of the request carrying `body`.
    pub fn from_request(url: &str, body: Option<&[u8]>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        Ok(Self::from_parsed(&parsed, body))
    }

    /// Returns the first quarter of the key, used in log lines.
    pub fn brief(&self) -> &str {
        let end = self.hash.len() / 4;
        match self.hash.get(..end) {
            Some(brief) => brief,
            None => &self.hash,
        }
    }

    /// Returns the full key.
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.hash
    }
}
