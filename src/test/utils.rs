// Copyright 2024 The compcache authors
//
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
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::cache::{CacheEntry, Storage};
use crate::errors::*;

/// Serializes tests that read and write the same process-global
/// environment variables; everything else uses per-test variable names.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

pub struct TestFixture {
    /// Temp directory; dropped (and deleted) with the fixture.
    pub tempdir: TempDir,
}

pub fn create_file<F: FnOnce(File) -> io::Result<()>>(
    dir: &Path,
    path: &str,
    fill_contents: F,
) -> io::Result<PathBuf> {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    let f = File::create(&full)?;
    fill_contents(f)?;
    full.canonicalize()
}

#[allow(dead_code)]
pub fn touch(dir: &Path, path: &str) -> io::Result<PathBuf> {
    create_file(dir, path, |_f| Ok(()))
}

impl TestFixture {
    pub fn new() -> TestFixture {
        TestFixture {
            tempdir: tempfile::Builder::new()
                .prefix("compcache_test")
                .tempdir()
                .unwrap(),
        }
    }

    #[allow(dead_code)]
    pub fn touch(&self, path: &str) -> io::Result<PathBuf> {
        touch(self.tempdir.path(), path)
    }

    pub fn create_file<F: FnOnce(File) -> io::Result<()>>(
        &self,
        path: &str,
        fill_contents: F,
    ) -> io::Result<PathBuf> {
        create_file(self.tempdir.path(), path, fill_contents)
    }
}

/// An in-memory `Storage` with failure knobs for orchestrator tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, CacheEntry>>,
    pub fail_get: Mutex<bool>,
    pub fail_put: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn insert(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().unwrap().insert(key.to_owned(), entry);
    }

    pub fn set_fail_get(&self, fail: bool) {
        *self.fail_get.lock().unwrap() = fail;
    }

    pub fn set_fail_put(&self, fail: bool) {
        *self.fail_put.lock().unwrap() = fail;
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        if *self.fail_get.lock().unwrap() {
            bail!("cache backend unavailable");
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        if *self.fail_put.lock().unwrap() {
            bail!("cache backend unavailable");
        }
        self.entries.lock().unwrap().insert(key.to_owned(), entry);
        Ok(())
    }

    fn location(&self) -> String {
        "Memory".to_owned()
    }
}
