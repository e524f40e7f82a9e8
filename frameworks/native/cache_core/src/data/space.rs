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


/// Byte budget shared by the entries of one store.
pub(crate) struct ResourceManager {
    /// Total available capacity (in bytes)
    pub(super) total_capacity: u64,
    /// Currently used capacity (in bytes)
    pub(super) used_capacity: u64,
}

impl ResourceManager {
    pub(crate) fn new(capacity: u64) -> Self {
        Self {
            total_capacity: capacity,
            used_capacity: 0,
        }
    }

    /// Reserves `apply_size` bytes, failing if the budget would be exceeded.
    pub(crate) fn apply_cache_size(&mut self, apply_size: u64) -> bool {
        match self.used_capacity.checked_add(apply_size) {
            Some(used) if used <= self.total_capacity => {
                self.used_capacity = used;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn release(&mut self, size: u64) {
        self.used_capacity = self.used_capacity.saturating_sub(size);
    }

    pub(crate) fn change_total_size(&mut self, size: u64) {
        self.total_capacity = size;
    }

    /// Whether a single entry of `size` bytes could ever fit.
    pub(crate) fn fits(&self, size: u64) -> bool {
        size <= self.total_capacity
    }

    pub(crate) fn is_over(&self) -> bool {
        self.used_capacity > self.total_capacity
    }
}
