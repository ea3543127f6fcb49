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

//! Process environment access with scoped mutation.
//!
//! All mutation of the process environment in this crate goes through the
//! scoped guards below, so that every temporary change is restored on scope
//! exit whether the scope is left normally, early, or through an error.

use std::env;

use crate::errors::*;

/// Values considered false by `EnvVar::as_bool` (case-insensitive). An
/// empty or undefined variable is also false; any other value is true.
const FALSY_VALUES: &[&str] = &["0", "off", "no", "false"];

/// Read a variable. `None` iff the variable is undefined; an empty string
/// is a valid defined value.
pub fn get(name: &str) -> Option<String> {
    env::var(name).ok()
}

pub fn set(name: &str, value: &str) {
    env::set_var(name, value);
}

pub fn unset(name: &str) {
    env::remove_var(name);
}

pub fn defined(name: &str) -> bool {
    env::var_os(name).is_some()
}

/// All current environment entries as `NAME=VALUE` strings, in no
/// particular order. Entries that are not valid UTF-8 are skipped.
pub fn enumerate() -> Vec<String> {
    env::vars().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Temporarily sets an environment variable, restoring the prior state
/// (defined-with-value or undefined) when dropped. Guards may be nested;
/// they restore in reverse drop order.
#[derive(Debug)]
pub struct ScopedSet {
    name: String,
    prior: Option<String>,
}

impl ScopedSet {
    pub fn new(name: &str, value: &str) -> ScopedSet {
        let prior = get(name);
        set(name, value);
        ScopedSet {
            name: name.to_owned(),
            prior,
        }
    }
}

impl Drop for ScopedSet {
    fn drop(&mut self) {
        match self.prior.take() {
            Some(value) => set(&self.name, &value),
            None => unset(&self.name),
        }
    }
}

/// Temporarily removes an environment variable, restoring the prior state
/// when dropped.
#[derive(Debug)]
pub struct ScopedUnset {
    name: String,
    prior: Option<String>,
}

impl ScopedUnset {
    pub fn new(name: &str) -> ScopedUnset {
        let prior = get(name);
        unset(name);
        ScopedUnset {
            name: name.to_owned(),
            prior,
        }
    }
}

impl Drop for ScopedUnset {
    fn drop(&mut self) {
        if let Some(value) = self.prior.take() {
            set(&self.name, &value);
        }
    }
}

/// A typed view of one environment variable, read at construction time.
#[derive(Debug, Clone)]
pub struct EnvVar {
    name: String,
    value: Option<String>,
}

impl EnvVar {
    pub fn new(name: &str) -> EnvVar {
        EnvVar {
            name: name.to_owned(),
            value: get(name),
        }
    }

    pub fn defined(&self) -> bool {
        self.value.is_some()
    }

    /// True iff the variable is defined with a non-empty value.
    pub fn is_set(&self) -> bool {
        self.value.as_deref().map_or(false, |v| !v.is_empty())
    }

    /// The value, or an empty string if undefined.
    pub fn as_string(&self) -> String {
        self.value.clone().unwrap_or_default()
    }

    /// The value parsed as a signed decimal 64-bit integer.
    pub fn as_i64(&self) -> Result<i64> {
        let value = self
            .value
            .as_deref()
            .ok_or_else(|| anyhow!("environment variable `{}` is not defined", self.name))?;
        value
            .trim()
            .parse()
            .with_context(|| format!("environment variable `{}` is not an integer", self.name))
    }

    /// The fixed truthy/falsy vocabulary: `"0"`, `"off"`, `"no"`,
    /// `"false"` (case-insensitive), the empty string and an undefined
    /// variable are false; anything else is true.
    pub fn as_bool(&self) -> bool {
        match self.value.as_deref() {
            None | Some("") => false,
            Some(value) => {
                let lower = value.to_lowercase();
                !FALSY_VALUES.contains(&lower.as_str())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Each test uses variable names unique to it, since the process
    // environment is shared across test threads.

    #[test]
    fn test_define_read_undefine() {
        let name = "COMPCACHE_TEST_ROUNDTRIP";
        set(name, "abcd");
        assert!(defined(name));
        assert_eq!(get(name).as_deref(), Some("abcd"));
        unset(name);
        assert!(!defined(name));
        assert_eq!(get(name), None);
    }

    #[test]
    fn test_unicode_names_and_values() {
        let name = "БуилдЦаче";
        let value = "είναι υπέροχο";
        set(name, value);
        assert!(defined(name));
        assert_eq!(get(name).as_deref(), Some(value));
        unset(name);
        assert!(!defined(name));
    }

    #[test]
    fn test_empty_value_is_defined() {
        let name = "COMPCACHE_TEST_EMPTY";
        set(name, "");
        assert!(defined(name));
        assert_eq!(get(name).as_deref(), Some(""));
        unset(name);
        assert!(!defined(name));
    }

    #[test]
    fn test_enumerate_contains_defined_vars() {
        let name = "COMPCACHE_TEST_ENUMERATE";
        set(name, "some=value");
        let entry = enumerate()
            .into_iter()
            .find(|e| e.starts_with("COMPCACHE_TEST_ENUMERATE="))
            .expect("defined variable should be enumerated");
        // Only the first `=` separates name from value.
        assert_eq!(entry, "COMPCACHE_TEST_ENUMERATE=some=value");
        unset(name);
        assert!(!enumerate()
            .iter()
            .any(|e| e.starts_with("COMPCACHE_TEST_ENUMERATE=")));
    }

    #[test]
    fn test_scoped_set_restores_undefined() {
        let name = "COMPCACHE_TEST_SCOPED_UNDEF";
        unset(name);
        {
            let _scoped = ScopedSet::new(name, "X");
            assert!(defined(name));
            assert_eq!(get(name).as_deref(), Some("X"));
        }
        assert!(!defined(name));
    }

    #[test]
    fn test_scoped_set_restores_prior_value() {
        let name = "COMPCACHE_TEST_SCOPED_PRIOR";
        set(name, "old");
        {
            let _scoped = ScopedSet::new(name, "X");
            assert_eq!(get(name).as_deref(), Some("X"));
        }
        assert!(defined(name));
        assert_eq!(get(name).as_deref(), Some("old"));
        unset(name);
    }

    #[test]
    fn test_scoped_set_restores_on_early_exit() {
        let name = "COMPCACHE_TEST_SCOPED_PANIC";
        unset(name);
        let result = std::panic::catch_unwind(|| {
            let _scoped = ScopedSet::new(name, "X");
            panic!("scope left by failure");
        });
        assert!(result.is_err());
        assert!(!defined(name));
    }

    #[test]
    fn test_scoped_set_stacks() {
        let name = "COMPCACHE_TEST_SCOPED_STACK";
        set(name, "first");
        {
            let _outer = ScopedSet::new(name, "second");
            {
                let _inner = ScopedSet::new(name, "third");
                assert_eq!(get(name).as_deref(), Some("third"));
            }
            assert_eq!(get(name).as_deref(), Some("second"));
        }
        assert_eq!(get(name).as_deref(), Some("first"));
        unset(name);
    }

    #[test]
    fn test_scoped_unset() {
        let name = "COMPCACHE_TEST_SCOPED_UNSET";
        set(name, "kept");
        {
            let _scoped = ScopedUnset::new(name);
            assert!(!defined(name));
        }
        assert_eq!(get(name).as_deref(), Some("kept"));
        unset(name);

        // Unsetting an undefined variable restores nothing.
        {
            let _scoped = ScopedUnset::new(name);
            assert!(!defined(name));
        }
        assert!(!defined(name));
    }

    #[test]
    fn test_env_var_as_string() {
        let name = "COMPCACHE_TEST_STRING";
        set(name, "Hello world!");
        assert_eq!(EnvVar::new(name).as_string(), "Hello world!");
        unset(name);
        assert_eq!(EnvVar::new(name).as_string(), "");
    }

    #[test]
    fn test_env_var_as_i64() {
        let name = "COMPCACHE_TEST_INT";
        set(name, "6542667823978");
        assert_eq!(EnvVar::new(name).as_i64().unwrap(), 6542667823978);
        set(name, "-1234567894561324");
        assert_eq!(EnvVar::new(name).as_i64().unwrap(), -1234567894561324);
        set(name, "not a number");
        assert!(EnvVar::new(name).as_i64().is_err());
        unset(name);
        assert!(EnvVar::new(name).as_i64().is_err());
    }

    #[test]
    fn test_env_var_as_bool() {
        let name = "COMPCACHE_TEST_BOOL";
        for truthy in &["TRUe", "On", "yES", "1", "Hello world!"] {
            set(name, truthy);
            assert!(EnvVar::new(name).as_bool(), "{} should be true", truthy);
        }
        for falsy in &["FaLSe", "OfF", "No", "0", ""] {
            set(name, falsy);
            assert!(!EnvVar::new(name).as_bool(), "{:?} should be false", falsy);
        }
        unset(name);
        assert!(!EnvVar::new(name).as_bool());
    }

    #[test]
    fn test_env_var_is_set() {
        let name = "COMPCACHE_TEST_IS_SET";
        set(name, "Something");
        assert!(EnvVar::new(name).is_set());
        set(name, "");
        assert!(!EnvVar::new(name).is_set());
        unset(name);
        assert!(!EnvVar::new(name).is_set());
    }
}
