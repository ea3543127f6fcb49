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

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{self, Stdio};
use std::time::Duration;

use crate::errors::*;
use crate::mock_command::{CommandChild, RunCommand};

/// A streaming content hash.
///
/// Incremental `update` calls produce the same digest as a single
/// concatenated update. `update_file` reads file contents only, so the
/// digest is independent of OS metadata such as modification times.
pub struct Digest {
    inner: blake3::Hasher,
}

impl Digest {
    pub fn new() -> Digest {
        Digest {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Feed the contents of the file at `path` into the digest.
    pub fn update_file<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("failed to open file for hashing: {:?}", path))?;
        let mut reader = BufReader::new(f);
        let mut buffer = [0; 16 * 1024];
        loop {
            let count = reader
                .read(&mut buffer[..])
                .with_context(|| format!("failed to read file for hashing: {:?}", path))?;
            if count == 0 {
                break;
            }
            self.inner.update(&buffer[..count]);
        }
        Ok(())
    }

    pub fn finish(self) -> String {
        self.inner.finalize().to_hex().to_string()
    }

    /// The digest of the contents of the file at `path`.
    pub fn file<T: AsRef<Path>>(path: T) -> Result<String> {
        let mut d = Digest::new();
        d.update_file(path)?;
        Ok(d.finish())
    }
}

impl Default for Digest {
    fn default() -> Digest {
        Digest::new()
    }
}

/// Format `duration` as seconds with a fractional component.
pub fn fmt_duration_as_secs(duration: &Duration) -> String {
    format!("{}.{:03} s", duration.as_secs(), duration.subsec_millis())
}

/// The lowercased file stem of `path`: `/usr/bin/GCC.exe` -> `gcc`.
/// Wrappers match executables on this.
pub fn file_stem_lower(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Run `command`, capturing stdout and stderr, and return the exit status
/// and output. The child inherits the current (possibly scoped-mutated)
/// process environment and working directory.
pub fn run_input_output<C>(mut command: C) -> Result<process::Output>
where
    C: RunCommand,
{
    let child = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn child")?;
    child
        .wait_with_output()
        .context("failed to wait for child")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::utils::TestFixture;
    use std::io::Write;

    #[test]
    fn test_digest_incremental_equals_one_shot() {
        let mut one = Digest::new();
        one.update(b"hello world");
        let mut many = Digest::new();
        many.update(b"hello");
        many.update(b" ");
        many.update(b"world");
        assert_eq!(one.finish(), many.finish());
    }

    #[test]
    fn test_digest_file_matches_bytes() {
        let f = TestFixture::new();
        let path = f
            .create_file("digest.txt", |mut f| f.write_all(b"file contents"))
            .unwrap();
        let mut d = Digest::new();
        d.update(b"file contents");
        assert_eq!(Digest::file(&path).unwrap(), d.finish());
    }

    #[test]
    fn test_digest_file_ignores_metadata() {
        let f = TestFixture::new();
        let path = f
            .create_file("mtime.txt", |mut f| f.write_all(b"stable"))
            .unwrap();
        let before = Digest::file(&path).unwrap();
        // Rewrite the same contents; the mtime changes, the digest must not.
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&path, b"stable").unwrap();
        assert_eq!(Digest::file(&path).unwrap(), before);
    }

    #[test]
    fn test_digest_file_missing() {
        assert!(Digest::file("/nonexistent/compcache/digest").is_err());
    }

    #[test]
    fn test_fmt_duration_as_secs() {
        assert_eq!(fmt_duration_as_secs(&Duration::new(2, 345_000_000)), "2.345 s");
        assert_eq!(fmt_duration_as_secs(&Duration::new(0, 0)), "0.000 s");
    }

    #[test]
    fn test_file_stem_lower() {
        assert_eq!(file_stem_lower(Path::new("/usr/bin/RUSTC")), "rustc");
        assert_eq!(file_stem_lower(Path::new("/tools/CppCheck.exe")), "cppcheck");
        assert_eq!(file_stem_lower(Path::new("gcc")), "gcc");
    }
}
