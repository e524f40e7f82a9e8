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


use super::*;
use std::collections::HashSet;
use std::thread;

// @tc.name: ut_fast_random_non_zero
// @tc.desc: Verify fast_random never yields the zero state output
// @tc.precon: NA
// @tc.step: 1. Call fast_random() a hundred times
// @tc.expect: Every returned value is non-zero
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_fast_random_non_zero() {
    for _ in 0..100 {
        assert_ne!(fast_random(), 0);
    }
}

// @tc.name: ut_fast_random_consecutive_different
// @tc.desc: Verify consecutive calls advance the generator
// @tc.precon: NA
// @tc.step: 1. Call fast_random() twice
// 2. Compare the two results
// @tc.expect: Two different values are returned
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_fast_random_consecutive_different() {
    let first = fast_random();
    let second = fast_random();
    assert_ne!(first, second);
}

// @tc.name: ut_fast_random_thread_isolation
// @tc.desc: Verify each thread seeds its own generator
// @tc.precon: NA
// @tc.step: 1. Spawn two threads
// 2. Each thread calls fast_random() once
// @tc.expect: The two threads observe different values
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 3
#[test]
fn ut_fast_random_thread_isolation() {
    let first = thread::spawn(fast_random).join().unwrap();
    let second = thread::spawn(fast_random).join().unwrap();
    assert_ne!(first, second);
}

// @tc.name: ut_callback_id_format
// @tc.desc: Verify callback ids carry a timestamp and a random suffix
// @tc.precon: NA
// @tc.step: 1. Generate a callback id
// 2. Split it at the dash
// @tc.expect: Prefix is a decimal timestamp, suffix is a decimal number
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_callback_id_format() {
    let id = callback_id();
    let (timestamp, random) = id.split_once('-').unwrap();
    assert!(timestamp.parse::<f64>().unwrap() > 0.0);
    random.parse::<u64>().unwrap();
}

// @tc.name: ut_callback_id_unique
// @tc.desc: Verify generated callback ids do not repeat
// @tc.precon: NA
// @tc.step: 1. Generate a thousand ids in a tight loop
// @tc.expect: All ids are distinct
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_callback_id_unique() {
    let ids: HashSet<String> = (0..1000).map(|_| callback_id()).collect();
    assert_eq!(ids.len(), 1000);
}
