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



use bytes::Bytes;
use netload_cache::LoadOutput;

use super::*;
use crate::download::error::NetworkError;
use crate::test::{Event, Recorder};

fn key(name: &str) -> RequestKey {
    RequestKey::new(name)
}

fn data(body: &'static [u8]) -> Delivery {
    Delivery {
        output: LoadOutput::Data(Bytes::from_static(body)),
        received: body.len() as u64,
        total: body.len() as u64,
    }
}

// @tc.name: ut_registry_add
// @tc.desc: Test registered callbacks are found by key
// @tc.precon: NA
// @tc.step: 1. Register two ids for one key
// @tc.expect: The key is registered with two listeners, others are not
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_registry_add() {
    let mut registry = CallbackRegistry::new();
    registry.add(key("a"), "1".to_string(), Recorder::new().callback());
    registry.add(key("a"), "2".to_string(), Recorder::new().callback());
    assert!(registry.is_registered(&key("a")));
    assert!(!registry.is_registered(&key("b")));
    assert_eq!(registry.listeners(&key("a")).len(), 2);
    assert_eq!(registry.len(), 2);
}

// @tc.name: ut_registry_add_overwrite
// @tc.desc: Test reusing an id on the same key replaces the registration
// @tc.precon: NA
// @tc.step: 1. Register the same id twice for one key
// @tc.expect: Only one listener remains
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_registry_add_overwrite() {
    let mut registry = CallbackRegistry::new();
    registry.add(key("a"), "1".to_string(), Recorder::new().callback());
    registry.add(key("a"), "1".to_string(), Recorder::new().callback());
    assert_eq!(registry.len(), 1);
}

// @tc.name: ut_registry_remove_isolated
// @tc.desc: Test removing one id keeps other callers of the same key
// @tc.precon: NA
// @tc.step: 1. Register ids A and B for one key
//           2. Remove A
// @tc.expect: B is still registered and receives the result
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_registry_remove_isolated() {
    let mut registry = CallbackRegistry::new();
    let a = Recorder::new();
    let b = Recorder::new();
    registry.add(key("k"), "A".to_string(), a.callback());
    registry.add(key("k"), "B".to_string(), b.callback());

    assert_eq!(registry.remove("A"), 1);
    assert!(registry.is_registered(&key("k")));
    for listener in registry.remove_all_for_key(&key("k")) {
        listener.deliver(Ok(data(b"x")));
    }
    assert!(a.events().is_empty());
    assert_eq!(b.results().len(), 1);
}

// @tc.name: ut_registry_remove_all_keys
// @tc.desc: Test removing an id detaches it from every key
// @tc.precon: NA
// @tc.step: 1. Register one id for two keys
//           2. Remove the id
// @tc.expect: Neither key is registered any more
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_registry_remove_all_keys() {
    let mut registry = CallbackRegistry::new();
    registry.add(key("a"), "id".to_string(), Recorder::new().callback());
    registry.add(key("b"), "id".to_string(), Recorder::new().callback());
    assert_eq!(registry.remove("id"), 2);
    assert!(!registry.is_registered(&key("a")));
    assert!(!registry.is_registered(&key("b")));
    assert_eq!(registry.remove("id"), 0);
    assert_eq!(registry.len(), 0);
}

// @tc.name: ut_registry_remove_all_for_key
// @tc.desc: Test taking the listeners of a key cleans the reverse index
// @tc.precon: NA
// @tc.step: 1. Register an id for two keys
//           2. Take the listeners of the first key
// @tc.expect: The id is still attached to the second key only
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_registry_remove_all_for_key() {
    let mut registry = CallbackRegistry::new();
    registry.add(key("a"), "id".to_string(), Recorder::new().callback());
    registry.add(key("b"), "id".to_string(), Recorder::new().callback());
    registry.add(key("a"), "other".to_string(), Recorder::new().callback());

    assert_eq!(registry.remove_all_for_key(&key("a")).len(), 2);
    assert!(registry.remove_all_for_key(&key("a")).is_empty());
    assert_eq!(registry.remove("other"), 0);
    assert_eq!(registry.remove("id"), 1);
    assert!(!registry.is_registered(&key("b")));
}

// @tc.name: ut_listener_deliver_once
// @tc.desc: Test a listener delivers final progress then one result
// @tc.precon: NA
// @tc.step: 1. Deliver a result twice
//           2. Report progress afterwards
// @tc.expect: Exactly one progress and one success are recorded
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_listener_deliver_once() {
    let recorder = Recorder::new();
    let listener = Listener::new(recorder.callback());
    listener.deliver(Ok(data(b"body")));
    listener.deliver(Err(NetworkError::cancelled()));
    listener.progress(10, 20);

    assert!(listener.is_delivered());
    assert_eq!(
        recorder.events(),
        vec![
            Event::Progress(4, 4),
            Event::Success(LoadOutput::Data(Bytes::from_static(b"body"))),
        ]
    );
}

// @tc.name: ut_listener_progress_monotonic
// @tc.desc: Test stale progress is not forwarded
// @tc.precon: NA
// @tc.step: 1. Report progress 5, 3 and 8
// @tc.expect: Only 5 and 8 are recorded
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_listener_progress_monotonic() {
    let recorder = Recorder::new();
    let listener = Listener::new(recorder.callback());
    listener.progress(5, 10);
    listener.progress(3, 10);
    listener.progress(8, 10);
    assert_eq!(
        recorder.events(),
        vec![Event::Progress(5, 10), Event::Progress(8, 10)]
    );
}

// @tc.name: ut_listener_deliver_cached
// @tc.desc: Test a cached result keeps the listener waiting for the reload
// @tc.precon: NA
// @tc.step: 1. Deliver a cached result
//           2. Deliver the fresh result
// @tc.expect: Both results are recorded in order
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_listener_deliver_cached() {
    let recorder = Recorder::new();
    let listener = Listener::new(recorder.callback());
    listener.deliver_cached(Delivery::cached(LoadOutput::Data(Bytes::from_static(
        b"old",
    ))));
    assert!(!listener.is_delivered());
    listener.deliver(Ok(data(b"new")));
    assert_eq!(
        recorder.results(),
        vec![
            Ok(LoadOutput::Data(Bytes::from_static(b"old"))),
            Ok(LoadOutput::Data(Bytes::from_static(b"new"))),
        ]
    );
}
