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



use std::fs;
use std::net::TcpListener;
use std::time::Duration;

use bytes::Bytes;
use netload_cache::LoadOutput;
use netload_utils::test::log::init;
use netload_utils::test::server::{test_server, TestResponse};
use tempfile::TempDir;

use super::*;
use crate::download::error::ErrorKind;
use crate::services::{LoadRequest, Network};
use crate::test::Recorder;

const WAIT: Duration = Duration::from_secs(10);

fn network() -> (TempDir, Network) {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut config = NetworkConfig::new();
    config
        .path(dir.path())
        .system_proxy(false)
        .connect_timeout(Duration::from_secs(5))
        .request_timeout(Duration::from_secs(10));
    let network = Network::new(&config).unwrap();
    (dir, network)
}

// @tc.name: ut_reqwest_memory_load
// @tc.desc: Test a memory load over a real connection
// @tc.precon: NA
// @tc.step: 1. Serve a body from the local server
//           2. Load it into memory
// @tc.expect: The callback gets the body and the server saw one GET
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_reqwest_memory_load() {
    let server = test_server(1, |_| TestResponse::ok("hello reqwest"));
    let (_dir, network) = network();
    let recorder = Recorder::new();
    network.data(&format!("{}/data", server.url()), recorder.callback());
    assert_eq!(
        recorder.wait_result(WAIT),
        Some(Ok(LoadOutput::Data(Bytes::from_static(b"hello reqwest"))))
    );
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/data");
    assert_eq!(requests[0].header("range"), None);
}

// @tc.name: ut_reqwest_request_parts
// @tc.desc: Test method, headers and body reach the server
// @tc.precon: NA
// @tc.step: 1. Send a POST with a custom header and a body
// @tc.expect: The server records all three
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_reqwest_request_parts() {
    let server = test_server(1, |_| TestResponse::ok("created"));
    let (_dir, network) = network();
    let recorder = Recorder::new();
    let mut request = LoadRequest::new(format!("{}/post", server.url()));
    request
        .method("post")
        .header("X-Netload-Test", "yes")
        .body("payload");
    network.load(&request, recorder.callback());
    assert!(recorder.wait_result(WAIT).unwrap().is_ok());

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].header("x-netload-test"), Some("yes"));
    assert_eq!(requests[0].body, b"payload");
}

// @tc.name: ut_reqwest_resume
// @tc.desc: Test a download resumes a partial file with a range request
// @tc.precon: A partial file with the first 6 bytes
// @tc.step: 1. Serve the rest of the resource as 206
//           2. Download it under the partial file's name
// @tc.expect: The server saw the range, the final file is complete
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_reqwest_resume() {
    let server = test_server(1, |_| TestResponse::partial("world", 6, 11));
    let (_dir, network) = network();
    {
        let mut partial = network.cache_manager().disk().open_partial("resume").unwrap();
        partial.append(b"hello ").unwrap();
    }
    let recorder = Recorder::new();
    let mut request = LoadRequest::new(format!("{}/file", server.url()));
    request.file_name("resume");
    network.load(&request, recorder.callback());

    let path = network.cache_manager().disk().final_path("resume");
    assert_eq!(recorder.wait_result(WAIT), Some(Ok(LoadOutput::Path(path.clone()))));
    assert_eq!(fs::read(path).unwrap(), b"hello world");
    assert_eq!(server.requests()[0].header("range"), Some("bytes=6-"));
}

// @tc.name: ut_reqwest_range_ignored
// @tc.desc: Test a full response to a range request replaces the partial file
// @tc.precon: A partial file with stale bytes
// @tc.step: 1. Serve the whole resource as 200
//           2. Download it under the partial file's name
// @tc.expect: The final file holds only the served body
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_reqwest_range_ignored() {
    let server = test_server(1, |_| TestResponse::ok("hello world"));
    let (_dir, network) = network();
    {
        let mut partial = network.cache_manager().disk().open_partial("full").unwrap();
        partial.append(b"stale").unwrap();
    }
    let recorder = Recorder::new();
    let mut request = LoadRequest::new(format!("{}/file", server.url()));
    request.file_name("full");
    network.load(&request, recorder.callback());

    let path = network.cache_manager().disk().final_path("full");
    assert_eq!(recorder.wait_result(WAIT), Some(Ok(LoadOutput::Path(path.clone()))));
    assert_eq!(fs::read(path).unwrap(), b"hello world");
}

// @tc.name: ut_reqwest_error_status
// @tc.desc: Test an error status fails the load with its code
// @tc.precon: NA
// @tc.step: 1. Serve 404
// @tc.expect: The callback gets an Http error with code 404
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_reqwest_error_status() {
    let server = test_server(1, |_| TestResponse::status(404, "Not Found"));
    let (_dir, network) = network();
    let recorder = Recorder::new();
    network.data(&format!("{}/missing", server.url()), recorder.callback());
    let error = recorder.wait_result(WAIT).unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Http);
    assert_eq!(error.code(), 404);
}

// @tc.name: ut_reqwest_connect_fail
// @tc.desc: Test a refused connection fails the load
// @tc.precon: A local port nobody listens on
// @tc.step: 1. Load a url on that port
// @tc.expect: The callback gets a Tcp error
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_reqwest_connect_fail() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let (_dir, network) = network();
    let recorder = Recorder::new();
    network.data(&format!("http://127.0.0.1:{}/", port), recorder.callback());
    let error = recorder.wait_result(WAIT).unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Tcp);
}

// @tc.name: ut_reqwest_invalid_method
// @tc.desc: Test a method reqwest cannot send fails without a connection
// @tc.precon: NA
// @tc.step: 1. Load with a method containing a space
// @tc.expect: The callback gets an InvalidRequest error
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_reqwest_invalid_method() {
    let (_dir, network) = network();
    let recorder = Recorder::new();
    let mut request = LoadRequest::new("http://127.0.0.1:1/");
    request.method("BAD METHOD");
    network.load(&request, recorder.callback());
    let error = recorder.wait_result(WAIT).unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidRequest);
}

// @tc.name: ut_cancel_handle_once
// @tc.desc: Test a cancel handle only reports the first cancellation
// @tc.precon: NA
// @tc.step: 1. Cancel a handle twice
// @tc.expect: The first call returns true, the second false
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_cancel_handle_once() {
    let handle = CancelHandle::new(Arc::new(AtomicBool::new(false)), None);
    assert!(handle.cancel());
    assert!(!handle.cancel());
}
