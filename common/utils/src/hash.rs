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


//! SHA-256 digests rendered as lowercase hex.

use sha2::{Digest, Sha256};

/// Hashes the concatenation of `parts` and returns the lowercase hex digest.
///
/// # Examples
///
/// ```rust
/// use netload_utils::hash::sha256_hex;
///
/// let joined = sha256_hex(&[b"https://example.com", b"body"]);
/// let whole = sha256_hex(&[b"https://example.combody"]);
/// assert_eq!(joined, whole);
/// ```
pub fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Hashes a URL string.
pub fn url_hash(url: &str) -> String {
    sha256_hex(&[url.as_bytes()])
}
