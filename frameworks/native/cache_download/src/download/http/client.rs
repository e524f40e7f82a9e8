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


//! HTTP client construction for the reqwest transport.

use reqwest::redirect::Policy;
use reqwest::{tls, Client};

use crate::config::NetworkConfig;
use crate::download::error::NetworkError;

/// Builds the client shared by every transfer of one transport.
///
/// Redirects are followed without limit and TLS below 1.2 is refused.
pub(crate) fn client(config: &NetworkConfig) -> Result<Client, NetworkError> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .min_tls_version(tls::Version::TLS_1_2)
        .redirect(Policy::limited(usize::MAX));
    if !config.system_proxy {
        builder = builder.no_proxy();
    }
    builder.build().map_err(NetworkError::from)
}
