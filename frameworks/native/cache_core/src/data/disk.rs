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


use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use netload_utils::{debug, error, info};

/// Subfolder of finalized downloads.
pub const FINAL_DIR: &str = "Data";

/// Subfolder of in-progress downloads.
pub const PARTIAL_DIR: &str = "Cache";

/// Suffix of an in-progress download file.
pub const PARTIAL_SUFFIX: &str = ".cache";

type OpenFiles = Arc<Mutex<HashMap<String, usize>>>;

/// Files of downloads stored under one root directory.
///
/// A finalized download lives at `<root>/Data/<name>`; while it is in
/// progress its bytes are appended to `<root>/Cache/<name>.cache`, which
/// survives failures so a later attempt can resume with a byte range.
pub struct DiskCache {
    root: PathBuf,
    final_dir: PathBuf,
    partial_dir: PathBuf,
    open: OpenFiles,
}

impl DiskCache {
    /// Creates the store, making both subfolders if they are missing.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let final_dir = root.join(FINAL_DIR);
        let partial_dir = root.join(PARTIAL_DIR);
        fs::create_dir_all(&final_dir)?;
        fs::create_dir_all(&partial_dir)?;
        Ok(Self {
            root,
            final_dir,
            partial_dir,
            open: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn final_path(&self, name: &str) -> PathBuf {
        self.final_dir.join(name)
    }

    pub fn partial_path(&self, name: &str) -> PathBuf {
        self.partial_dir.join(format!("{}{}", name, PARTIAL_SUFFIX))
    }

    /// Whether `name` stays inside the store once joined to a subfolder.
    ///
    /// Names may nest (`img/a.png`) but must be relative and made of plain
    /// components only; `..`, `.` and roots are refused.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && Path::new(name)
                .components()
                .all(|part| matches!(part, Component::Normal(_)))
    }

    /// Whether a finalized file exists for `name`.
    pub fn is_finished(&self, name: &str) -> bool {
        Self::is_valid_name(name) && self.final_path(name).is_file()
    }

    /// Size of the partial file of `name`, zero if there is none.
    pub fn partial_size(&self, name: &str) -> u64 {
        fs::metadata(self.partial_path(name))
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    /// Opens the partial file of `name`, creating an empty one if absent.
    ///
    /// The returned handle remembers the size found on disk so the caller can
    /// request the remaining bytes.
    pub fn open_partial(&self, name: &str) -> io::Result<PartialFile> {
        if !Self::is_valid_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file name {:?} leaves the store", name),
            ));
        }
        let path = self.partial_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let offset = file.metadata()?.len();
        *self
            .open
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert(0) += 1;
        debug!("partial {} opened at {}", name, offset);
        Ok(PartialFile {
            name: name.to_string(),
            path,
            file,
            offset,
            len: offset,
            open: self.open.clone(),
        })
    }

    /// Names whose partial file is currently held open by a transfer.
    pub fn open_partials(&self) -> Vec<String> {
        self.open.lock().unwrap().keys().cloned().collect()
    }

    /// Moves a completed partial file to its final path.
    pub fn finalize(&self, partial: PartialFile) -> io::Result<PathBuf> {
        let from = partial.path.clone();
        let to = self.final_path(&partial.name);
        drop(partial);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)?;
        Ok(to)
    }

    /// Removes the finalized and the partial file of `name`.
    pub fn remove_file(&self, name: &str) {
        if !Self::is_valid_name(name) {
            error!("remove {:?} refused, name leaves the store", name);
            return;
        }
        remove_quietly(&self.final_path(name));
        remove_quietly(&self.partial_path(name));
    }

    /// Removes every stored file, finalized or partial.
    pub fn remove_all(&self) {
        clear_dir(&self.final_dir);
        clear_dir(&self.partial_dir);
    }

    /// Removes only the partial files.
    pub fn remove_all_partial(&self) {
        clear_dir(&self.partial_dir);
    }

    /// Lists every file under the root, recursively.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files);
        files.sort();
        files
    }
}

/// An open partial download file.
///
/// Every write goes to the end of the file and is synced before returning.
pub struct PartialFile {
    name: String,
    path: PathBuf,
    file: File,
    offset: u64,
    len: u64,
    open: OpenFiles,
}

impl PartialFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file when it was opened.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current size of the file.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Drops every byte written so far, including those of earlier attempts.
    pub fn truncate(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.rewind()?;
        if self.len != 0 {
            info!("partial {} truncated from {}", self.name, self.len);
        }
        self.len = 0;
        self.offset = 0;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let mut open = self.open.lock().unwrap();
        if let Some(count) = open.get_mut(&self.name) {
            *count -= 1;
            if *count == 0 {
                open.remove(&self.name);
            }
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() == io::ErrorKind::NotFound {
            debug!("remove {:?} skipped: {}", path, e);
        } else {
            error!("remove {:?} error: {}", path, e);
        }
    }
}

fn clear_dir(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("read dir {:?} error: {}", dir, e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let res = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = res {
            error!("remove {:?} error: {}", path, e);
        }
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files);
        } else {
            files.push(path);
        }
    }
}
