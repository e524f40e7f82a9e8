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


//! The HTTP transport seam.
//!
//! A [`Transport`] executes one request and streams what happens to a
//! [`TransferSink`]: the response head, each body chunk, progress, and
//! exactly one terminal event (`on_success`, `on_fail` or `on_cancel`).
//! A transport may also stop without a terminal event after its handle was
//! cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::error::NetworkError;

/// A request as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any value of the same name.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

/// Status line and headers of a response. Header names are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Length of this response's body, if announced.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Whether the body continues an earlier transfer rather than starting
    /// the resource from its first byte.
    ///
    /// Only `206` or a `Content-Range` header count. `Accept-Ranges` on a
    /// `200` advertises support but the body still starts at byte 0, so such
    /// a response restarts the partial file instead of appending to it.
    pub fn is_partial(&self) -> bool {
        self.status == 206 || self.header("content-range").is_some()
    }
}

/// Receiver of transfer events.
pub trait TransferSink: Send {
    /// Called once with the response head before any body chunk. An error
    /// aborts the transfer and is passed to `on_fail`.
    fn on_response(&mut self, head: &ResponseHead) -> Result<(), NetworkError>;

    /// Called for each body chunk. An error aborts the transfer and is passed
    /// to `on_fail`.
    fn on_data_receive(&mut self, data: &[u8]) -> Result<(), NetworkError>;

    /// Bytes of this response's body received so far.
    fn on_progress(&mut self, downloaded: u64, total: Option<u64>);

    fn on_success(&mut self);

    fn on_fail(&mut self, error: NetworkError);

    fn on_cancel(&mut self);
}

/// Handle to an executing transfer.
pub trait TransportHandle: Send + Sync {
    /// Stops the transfer. Returns `false` if it was already cancelled.
    fn cancel(&self) -> bool;
}

/// Executes HTTP requests.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest, sink: Box<dyn TransferSink>)
        -> Arc<dyn TransportHandle>;
}
