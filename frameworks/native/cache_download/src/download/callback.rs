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


//! Transfer sink of a task.
//!
//! [`PrimeCallback`] sits between the transport and a [`TransferTask`]: it
//! writes the body through the task's [`Updater`], forwards throttled
//! progress to the scheduler and hands the terminal result back to the task.

use std::sync::Arc;

use netload_cache::Updater;
use netload_utils::{error, info};

use super::common::{ResponseHead, TransferSink};
use super::error::{ErrorKind, NetworkError};
use super::task::{Reporter, SinkResult, TransferTask};

/// Progress is reported once every `PROGRESS_INTERVAL` updates.
const PROGRESS_INTERVAL: usize = 8;

const RANGE_NOT_SATISFIABLE: u16 = 416;

pub(crate) struct PrimeCallback {
    task: Arc<TransferTask>,
    updater: Option<Updater>,
    /// Bytes kept from earlier attempts.
    offset: u64,
    /// Size of the whole resource, if the server announced it.
    total: Option<u64>,
    progress_restriction: ProgressRestriction,
    reporter: Arc<dyn Reporter>,
    finished: bool,
}

struct ProgressRestriction {
    processed: u64,
    count: usize,
    data_receive: bool,
}

impl ProgressRestriction {
    fn new() -> Self {
        Self {
            processed: 0,
            count: 0,
            data_receive: false,
        }
    }
}

impl PrimeCallback {
    pub(crate) fn new(
        task: Arc<TransferTask>,
        updater: Updater,
        offset: u64,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            task,
            updater: Some(updater),
            offset,
            total: None,
            progress_restriction: ProgressRestriction::new(),
            reporter,
            finished: false,
        }
    }

    fn finish(&mut self, result: SinkResult) {
        self.finished = true;
        self.task.complete(result);
    }

    fn updater(&mut self) -> Result<&mut Updater, NetworkError> {
        self.updater.as_mut().ok_or_else(NetworkError::cancelled)
    }
}

impl TransferSink for PrimeCallback {
    fn on_response(&mut self, head: &ResponseHead) -> Result<(), NetworkError> {
        let brief = self.task.key().brief().to_string();
        info!("{} status {}", brief, head.status);
        if head.status == RANGE_NOT_SATISFIABLE {
            // The kept bytes are no use for the next attempt either.
            self.updater()?.reset_cache()?;
            self.offset = 0;
            return Err(NetworkError::status(head.status));
        }
        if head.status >= 400 {
            return Err(NetworkError::status(head.status));
        }
        if self.offset > 0 && !head.is_partial() {
            info!("{} range not honored, restart from 0", brief);
            self.updater()?.reset_cache()?;
            self.offset = 0;
        }
        self.total = head.content_length().map(|len| self.offset + len);
        Ok(())
    }

    fn on_data_receive(&mut self, data: &[u8]) -> Result<(), NetworkError> {
        if self.task.is_cancelled() {
            return Err(NetworkError::cancelled());
        }
        self.progress_restriction.data_receive = true;
        let total = self.total;
        self.updater()?
            .cache_receive(data, || total.map(|total| total as usize))?;
        Ok(())
    }

    fn on_progress(&mut self, downloaded: u64, _total: Option<u64>) {
        let received = self.offset + downloaded;
        let total = self.total.unwrap_or_default();
        if !self.progress_restriction.data_receive
            || self.task.is_cancelled()
            || received == self.progress_restriction.processed
            || received == total
        {
            return;
        }
        self.progress_restriction.processed = received;

        let count = self.progress_restriction.count;
        self.progress_restriction.count += 1;
        if count % PROGRESS_INTERVAL != 0 {
            return;
        }
        self.progress_restriction.count = 1;
        self.reporter
            .on_progress(self.task.key(), self.task.seq(), received, total);
    }

    fn on_success(&mut self) {
        match self.updater.take() {
            Some(updater) => {
                let total = self.total;
                self.finish(SinkResult::Done { updater, total });
            }
            None => self.finish(SinkResult::Failed(NetworkError::cancelled())),
        }
    }

    fn on_fail(&mut self, error: NetworkError) {
        error!("{} download failed {}", self.task.key().brief(), error);
        self.finish(SinkResult::Failed(error));
    }

    fn on_cancel(&mut self) {
        info!("{} is cancel", self.task.key().brief());
        self.finish(SinkResult::Failed(NetworkError::cancelled()));
    }
}

impl Drop for PrimeCallback {
    fn drop(&mut self) {
        // A transport dropped the transfer without a terminal event.
        if !self.finished {
            self.task.complete(SinkResult::Failed(NetworkError::new(
                ErrorKind::Others,
                None,
                "transfer ended without result",
            )));
        }
    }
}
