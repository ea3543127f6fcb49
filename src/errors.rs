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

pub use anyhow::{anyhow, bail, Context, Error};

// We use `anyhow` for error handling.
// - Use `context()`/`with_context()` to annotate errors.
// - Use `anyhow!` with a string to create a new `anyhow::Error`.
// - `WrapperError` is an internal type that needs to be checked at points
//   other than the outermost error-checking layer: the orchestrator inspects
//   it to decide between failing the invocation and bypassing the cache.

pub type Result<T> = anyhow::Result<T>;

/// The ways argument resolution can reject an invocation.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    /// The invocation uses features the cache cannot reason about. The
    /// invocation fails with this message; the user must fix the command
    /// line (or stop running it through the cache).
    #[error("{0}")]
    Unsupported(String),

    /// The invocation is not a compilation we know how to cache (version
    /// queries, `--print`, response files, ...). It is forwarded to the
    /// real tool untouched.
    #[error("unhandled invocation: {0}")]
    Unhandled(String),
}

impl WrapperError {
    /// Look for a `WrapperError` anywhere in an `anyhow` error chain.
    pub fn from_error(err: &Error) -> Option<&WrapperError> {
        err.chain().find_map(|e| e.downcast_ref::<WrapperError>())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_downcast_through_context() {
        let err = Error::from(WrapperError::Unhandled("--version".to_owned()))
            .context("resolving arguments");
        match WrapperError::from_error(&err) {
            Some(WrapperError::Unhandled(what)) => assert_eq!(what, "--version"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_displays_bare_message() {
        let err = WrapperError::Unsupported("foo: Unsupported compiler argument -o".to_owned());
        assert_eq!(err.to_string(), "foo: Unsupported compiler argument -o");
    }
}
