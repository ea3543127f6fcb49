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

//! The cache client interface, and the minimal local-disk backend the
//! binary uses. Eviction, locking and remote stores are the backend's
//! concern and live outside this crate's core.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::*;

/// One stored compilation: the produced files keyed by their stable
/// labels, plus the captured compiler output to replay on a hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub files: HashMap<String, Vec<u8>>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// The port through which the orchestrator talks to a cache backend.
///
/// Implementations must publish entries atomically: a concurrent reader
/// sees either the full entry or none. Two processes storing the same
/// fingerprint may race; last-writer-wins is fine because equal
/// fingerprints imply equal content.
pub trait Storage {
    /// Look up a stored entry. `Ok(None)` is a plain miss; `Err` is a
    /// backend failure the caller should degrade on.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry under `key`.
    fn put(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// A human-readable description of where this cache lives.
    fn location(&self) -> String;
}

/// A cache that stores one serialized entry per fingerprint on local disk.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new<P: AsRef<Path>>(root: P) -> DiskCache {
        DiskCache {
            root: root.as_ref().to_owned(),
        }
    }
}

/// Shard entries two levels deep so no single directory grows huge.
fn make_key_path(key: &str) -> PathBuf {
    Path::new(&key[0..1]).join(&key[1..2]).join(key)
}

impl Storage for DiskCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        trace!("DiskCache::get({})", key);
        let path = self.root.join(make_key_path(key));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::from(e).context(format!("failed to read cache entry {:?}", path)))
            }
        };
        let entry = bincode::deserialize(&bytes)
            .with_context(|| format!("corrupt cache entry {:?}", path))?;
        Ok(Some(entry))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        trace!("DiskCache::put({})", key);
        let path = self.root.join(make_key_path(key));
        let parent = path.parent().expect("entry path has a parent");
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache directory {:?}", parent))?;
        let bytes = bincode::serialize(&entry).context("failed to serialize cache entry")?;
        // Write to a temporary file and rename into place, so readers see
        // the full entry or none.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("failed to create temporary cache file")?;
        tmp.write_all(&bytes)
            .context("failed to write cache entry")?;
        tmp.persist(&path)
            .with_context(|| format!("failed to publish cache entry {:?}", path))?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("Local disk: {:?}", self.root)
    }
}
