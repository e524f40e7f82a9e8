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


//! Errors delivered to load callbacks.

use std::io;

/// Failure of a load.
///
/// One error is fanned out to every caller interested in a request, so it is
/// cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} error: {message}")]
pub struct NetworkError {
    /// Numeric error code, if available
    code: Option<i32>,
    /// Human-readable error message
    message: String,
    /// Categorizes the type of error that occurred
    kind: ErrorKind,
}

/// Category of a [`NetworkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The url could not be parsed or the request could not be built.
    InvalidRequest,
    /// Cache directory or file operations failed.
    Io,
    /// HTTP-level failures, including error statuses.
    Http,
    /// Connection could not be established or was reset.
    Tcp,
    /// The connect or request timeout elapsed.
    Timeout,
    /// Anything else the transport reports.
    Others,
    /// The load was cancelled before it finished.
    Cancelled,
}

impl NetworkError {
    pub fn new(kind: ErrorKind, code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, None, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, None, "load cancelled")
    }

    /// An error status returned by the server.
    pub fn status(status: u16) -> Self {
        Self::new(
            ErrorKind::Http,
            Some(status as i32),
            format!("server responded with status {}", status),
        )
    }

    /// Returns the error code, or 0 if there is none.
    pub fn code(&self) -> i32 {
        self.code.unwrap_or(0)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        NetworkError {
            code: err.raw_os_error(),
            message: err.to_string(),
            kind: ErrorKind::Io,
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        NetworkError::invalid_request(format!("invalid url: {}", err))
    }
}

cfg_reqwest! {
    impl From<reqwest::Error> for NetworkError {
        fn from(err: reqwest::Error) -> Self {
            let kind = if err.is_timeout() {
                ErrorKind::Timeout
            } else if err.is_connect() {
                ErrorKind::Tcp
            } else if err.is_builder() {
                ErrorKind::InvalidRequest
            } else if err.is_status()
                || err.is_request()
                || err.is_body()
                || err.is_decode()
                || err.is_redirect()
            {
                ErrorKind::Http
            } else {
                ErrorKind::Others
            };
            NetworkError {
                code: err.status().map(|status| status.as_u16() as i32),
                message: err.to_string(),
                kind,
            }
        }
    }
}
