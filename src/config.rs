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

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::env::EnvVar;
use crate::errors::*;

const TEN_GIGS: u64 = 10 * 1024 * 1024 * 1024;

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("compcache")
}

/// On-disk configuration file contents. All fields are optional; anything
/// unset falls back to the built-in defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub cache_dir: Option<PathBuf>,
    pub cache_size: Option<u64>,
    pub hard_links: Option<bool>,
    pub disabled: Option<bool>,
}

/// The resolved configuration: defaults, overlaid with the configuration
/// file, overlaid with `COMPCACHE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where cache entries are stored.
    pub cache_dir: PathBuf,
    /// Advisory maximum cache size in bytes; enforcement is the backend's
    /// concern.
    pub cache_size: u64,
    /// Permit hard-link restoration for wrappers that declare support.
    pub hard_links: bool,
    /// Bypass all caching.
    pub disabled: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            cache_dir: default_cache_dir(),
            cache_size: TEN_GIGS,
            hard_links: false,
            disabled: false,
        }
    }
}

impl Config {
    /// Load the configuration file (if any) and apply environment
    /// overrides.
    pub fn load() -> Result<Config> {
        let file_conf_path = env::var_os("COMPCACHE_CONF")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_cache_dir().join("config.toml"));
        let file_conf = if file_conf_path.is_file() {
            let text = fs::read_to_string(&file_conf_path)
                .with_context(|| format!("couldn't read config file {:?}", file_conf_path))?;
            toml::from_str(&text)
                .with_context(|| format!("couldn't parse config file {:?}", file_conf_path))?
        } else {
            FileConfig::default()
        };
        Ok(Config::from_file_and_env(file_conf))
    }

    fn from_file_and_env(file: FileConfig) -> Config {
        let defaults = Config::default();
        let mut conf = Config {
            cache_dir: file.cache_dir.unwrap_or(defaults.cache_dir),
            cache_size: file.cache_size.unwrap_or(defaults.cache_size),
            hard_links: file.hard_links.unwrap_or(defaults.hard_links),
            disabled: file.disabled.unwrap_or(defaults.disabled),
        };

        let dir = EnvVar::new("COMPCACHE_DIR");
        if dir.is_set() {
            conf.cache_dir = PathBuf::from(dir.as_string());
        }
        let size = EnvVar::new("COMPCACHE_CACHE_SIZE");
        if size.defined() {
            match size.as_i64() {
                Ok(size) if size >= 0 => conf.cache_size = size as u64,
                Ok(size) => warn!("ignoring negative COMPCACHE_CACHE_SIZE {}", size),
                Err(e) => warn!("ignoring COMPCACHE_CACHE_SIZE: {}", e),
            }
        }
        let hard_links = EnvVar::new("COMPCACHE_HARD_LINKS");
        if hard_links.defined() {
            conf.hard_links = hard_links.as_bool();
        }
        let disable = EnvVar::new("COMPCACHE_DISABLE");
        if disable.defined() {
            conf.disabled = disable.as_bool();
        }
        conf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::ScopedSet;

    #[test]
    fn test_defaults() {
        let conf = Config::default();
        assert_eq!(conf.cache_size, TEN_GIGS);
        assert!(!conf.hard_links);
        assert!(!conf.disabled);
        assert!(conf.cache_dir.ends_with("compcache"));
    }

    #[test]
    fn test_file_config_parse() {
        let file: FileConfig = toml::from_str(
            r#"
            cache_dir = "/tmp/elsewhere"
            cache_size = 1048576
            hard_links = true
            "#,
        )
        .unwrap();
        assert_eq!(file.cache_dir.as_deref(), Some(std::path::Path::new("/tmp/elsewhere")));
        assert_eq!(file.cache_size, Some(1048576));
        assert_eq!(file.hard_links, Some(true));
        assert_eq!(file.disabled, None);
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        assert!(toml::from_str::<FileConfig>("cache_sizzle = 1").is_err());
    }

    // The single test that resolves against the process environment; other
    // tests stay away from `from_file_and_env` so parallel runs don't race
    // on the COMPCACHE_* variables.
    #[test]
    fn test_file_values_and_env_overrides() {
        let file = FileConfig {
            cache_dir: Some(PathBuf::from("/tmp/elsewhere")),
            cache_size: Some(1048576),
            hard_links: Some(true),
            disabled: None,
        };
        {
            let _dir = ScopedSet::new("COMPCACHE_DIR", "/tmp/override");
            let _size = ScopedSet::new("COMPCACHE_CACHE_SIZE", "4096");
            let _disable = ScopedSet::new("COMPCACHE_DISABLE", "yes");
            let conf = Config::from_file_and_env(file.clone());
            // Environment wins over the file.
            assert_eq!(conf.cache_dir, PathBuf::from("/tmp/override"));
            assert_eq!(conf.cache_size, 4096);
            assert!(conf.disabled);
            assert!(conf.hard_links);
        }
        let conf = Config::from_file_and_env(file);
        // Without overrides, the file wins over the defaults.
        assert_eq!(conf.cache_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(conf.cache_size, 1048576);
        assert!(conf.hard_links);
        assert!(!conf.disabled);
    }
}
