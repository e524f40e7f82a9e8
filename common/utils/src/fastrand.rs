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

//! Thread-local pseudorandom numbers and callback identifiers.
//!
//! Random values come from a per-thread xorshift* generator seeded from the
//! standard library's `RandomState`. They are not suitable for cryptographic
//! use; they only have to keep auto-generated callback identifiers apart.
//!
//! Reference: xorshift* <https://dl.acm.org/doi/10.1145/2845077>

use std::cell::Cell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Multiplier of the xorshift* output function.
const XORSHIFT_MULTIPLIER: u64 = 0x2545_f491_4f6c_dd1d;

/// Xorshift* generator state. Never zero.
struct XorShift {
    state: u64,
}

impl XorShift {
    fn seeded() -> Self {
        let random_state = RandomState::new();
        let mut salt = 0usize;
        loop {
            salt += 1;
            let mut hasher = random_state.build_hasher();
            hasher.write_usize(salt);
            let state = hasher.finish();
            if state != 0 {
                return Self { state };
            }
        }
    }

    fn next(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s >> 12;
        s ^= s << 25;
        s ^= s >> 27;
        self.state = s;
        s.wrapping_mul(XORSHIFT_MULTIPLIER)
    }
}

/// Generates a pseudorandom 64-bit unsigned integer.
///
/// # Examples
///
/// ```rust
/// use netload_utils::fastrand::fast_random;
///
/// let bounded = fast_random() % 100;
/// assert!(bounded < 100);
/// ```
pub fn fast_random() -> u64 {
    thread_local! {
        static RNG: Cell<Option<u64>> = const { Cell::new(None) };
    }

    RNG.with(|cell| {
        let mut rng = match cell.get() {
            Some(state) => XorShift { state },
            None => XorShift::seeded(),
        };
        let out = rng.next();
        cell.set(Some(rng.state));
        out
    })
}

/// Builds an identifier for one registration of interest in a request.
///
/// The identifier is the current UNIX time with microsecond precision
/// followed by a random suffix, e.g. `1718000000.123456-9876543210`.
///
/// # Examples
///
/// ```rust
/// use netload_utils::fastrand::callback_id;
///
/// assert_ne!(callback_id(), callback_id());
/// ```
pub fn callback_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}.{:06}-{}",
        now.as_secs(),
        now.subsec_micros(),
        fast_random()
    )
}
