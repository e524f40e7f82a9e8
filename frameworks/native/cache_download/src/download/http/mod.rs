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


//! Transport backed by reqwest.
//!
//! Each transfer runs as a tokio task streaming the response body chunk by
//! chunk into its sink. Cancelling sets an abort flag checked per chunk and
//! aborts the task, so a stalled connection stops too.

mod client;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::{Client, Method};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::common::{HttpRequest, ResponseHead, TransferSink, Transport, TransportHandle};
use super::error::NetworkError;
use crate::config::NetworkConfig;

/// [`Transport`] sending requests with a shared reqwest client.
pub struct ReqwestTransport {
    client: Client,
    handle: Handle,
}

impl ReqwestTransport {
    /// Creates a transport whose transfers run on `handle`.
    pub fn new(config: &NetworkConfig, handle: Handle) -> Result<Self, NetworkError> {
        Ok(Self {
            client: client::client(config)?,
            handle,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: HttpRequest,
        mut sink: Box<dyn TransferSink>,
    ) -> Arc<dyn TransportHandle> {
        let method = match Method::from_bytes(request.method.as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                sink.on_fail(NetworkError::invalid_request(format!(
                    "invalid method {}: {}",
                    request.method, e
                )));
                return Arc::new(CancelHandle::new(Arc::new(AtomicBool::new(true)), None));
            }
        };

        let flag = Arc::new(AtomicBool::new(false));
        let abort_flag = flag.clone();
        let client = self.client.clone();
        let task = self.handle.spawn(async move {
            match download(&client, method, request, sink.as_mut(), abort_flag).await {
                Ok(()) => sink.on_success(),
                Err(e) if e.is_cancelled() => sink.on_cancel(),
                Err(e) => sink.on_fail(e),
            }
        });
        Arc::new(CancelHandle::new(flag, Some(task.abort_handle())))
    }
}

/// Sends `request` and streams the response into `sink`.
async fn download(
    client: &Client,
    method: Method,
    request: HttpRequest,
    sink: &mut dyn TransferSink,
    abort_flag: Arc<AtomicBool>,
) -> Result<(), NetworkError> {
    let mut builder = client.request(method, request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await?;
    let head = ResponseHead {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    };
    sink.on_response(&head)?;

    let total = head.content_length();
    let mut downloaded = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if abort_flag.load(Ordering::Acquire) {
            return Err(NetworkError::cancelled());
        }
        let chunk = chunk?;
        sink.on_data_receive(&chunk)?;
        downloaded += chunk.len() as u64;
        sink.on_progress(downloaded, total);
    }
    if abort_flag.load(Ordering::Acquire) {
        return Err(NetworkError::cancelled());
    }
    Ok(())
}

struct CancelHandle {
    flag: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl CancelHandle {
    fn new(flag: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { flag, abort }
    }
}

impl TransportHandle for CancelHandle {
    fn cancel(&self) -> bool {
        if self.flag.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(abort) = self.abort.as_ref() {
            abort.abort();
        }
        true
    }
}
