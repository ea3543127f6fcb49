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

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use crate::arglist::ArgList;
use crate::cache::DiskCache;
use crate::cmdline::Command;
use crate::config::Config;
use crate::env::EnvVar;
use crate::errors::*;
use crate::mock_command::ProcessCommandCreator;
use crate::wrapper::{self, CacheControl};

/// Execute the parsed `Command`, returning the process exit code.
pub fn run_command(cmd: Command) -> Result<i32> {
    match cmd {
        Command::ShowConfig => {
            let config = Config::load()?;
            println!("{:#?}", config);
            Ok(0)
        }
        Command::Compile { exe, cmdline } => do_compile(exe, cmdline),
    }
}

/// Run `exe` directly with inherited stdio; the non-cached fallthrough.
fn run_direct(exe: &OsString, cmdline: &[OsString]) -> Result<i32> {
    let status = process::Command::new(exe)
        .args(cmdline)
        .status()
        .with_context(|| format!("failed to execute {:?}", exe))?;
    Ok(status.code().unwrap_or(1))
}

fn do_compile(exe: OsString, cmdline: Vec<OsString>) -> Result<i32> {
    let config = Config::load().unwrap_or_else(|e| {
        warn!("couldn't load configuration, using defaults: {:#}", e);
        Config::default()
    });

    // The wrappers reason about UTF-8 command lines; anything else is run
    // untouched.
    let mut argv = ArgList::new();
    match exe.clone().into_string() {
        Ok(arg0) => argv.push(arg0),
        Err(_) => {
            debug!("non-UTF-8 argv, running without cache");
            return run_direct(&exe, &cmdline);
        }
    }
    for arg in &cmdline {
        match arg.clone().into_string() {
            Ok(arg) => argv.push(arg),
            Err(_) => {
                debug!("non-UTF-8 argv, running without cache");
                return run_direct(&exe, &cmdline);
            }
        }
    }

    let creator = ProcessCommandCreator;
    let exe_path = PathBuf::from(argv[0].clone());
    let mut wrapper = match wrapper::find_wrapper(&creator, &exe_path, &argv) {
        Some(wrapper) if !config.disabled => wrapper,
        Some(_) => {
            debug!("caching disabled by configuration");
            return run_direct(&exe, &cmdline);
        }
        None => {
            debug!("no wrapper claims {:?}, running directly", exe);
            return run_direct(&exe, &cmdline);
        }
    };

    let storage = DiskCache::new(&config.cache_dir);
    let cache_control = if EnvVar::new("COMPCACHE_RECACHE").as_bool() {
        CacheControl::ForceRecache
    } else {
        CacheControl::Default
    };
    let (result, output) = wrapper::run_with_cache(
        &creator,
        wrapper.as_mut(),
        &storage,
        &config,
        cache_control,
    )?;
    debug!("compile result: {:?}", result);

    // Replay the tool's output exactly.
    let stdout = std::io::stdout();
    stdout.lock().write_all(&output.stdout)?;
    let stderr = std::io::stderr();
    stderr.lock().write_all(&output.stderr)?;
    Ok(output.status.code().unwrap_or(1))
}
