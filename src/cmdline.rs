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
use std::ffi::OsString;

use clap::{value_parser, Arg, ArgAction};
use which::which_in;

use crate::errors::*;

/// A specific command to run.
pub enum Command {
    /// Print the resolved configuration and exit.
    ShowConfig,
    /// Run a compiler command through the cache.
    Compile {
        /// The binary to execute.
        exe: OsString,
        /// The commandline arguments to pass to `exe`.
        cmdline: Vec<OsString>,
    },
}

/// Get the clap command used for argument parsing.
pub fn get_clap_command() -> clap::Command {
    clap::Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("compcache: a transparent compiler-invocation cache")
        .after_help(
            "Run a compiler through the cache:\n    compcache /usr/bin/gcc -c foo.c -o foo.o\n\
             A copy or hardlink of compcache named after a compiler acts as that compiler.",
        )
        .arg(
            Arg::new("show-config")
                .long("show-config")
                .action(ArgAction::SetTrue)
                .help("show the resolved configuration and exit"),
        )
        .arg(
            Arg::new("cmd")
                .num_args(0..)
                .value_parser(value_parser!(OsString))
                .allow_hyphen_values(true)
                .trailing_var_arg(true),
        )
}

/// Parse the commandline into a `Command` to execute.
///
/// When the binary has been copied or hardlinked under a compiler's name,
/// argv[0] names the tool to run: resolve the real one on PATH while
/// skipping the directory we live in, so the lookup doesn't find us
/// again.
pub fn parse() -> Result<Command> {
    trace!("parse");
    let mut args: Vec<OsString> = env::args_os().collect();
    if let Ok(exe) = env::current_exe() {
        match exe
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
        {
            // Invoked under our own name: nothing to do.
            Some(ref e) if e == env!("CARGO_PKG_NAME") => {}
            _ => {
                let cwd = env::current_dir()
                    .context("compcache: Couldn't determine current working directory")?;
                if let (Some(path), Some(exe_filename)) = (env::var_os("PATH"), exe.file_name()) {
                    match which_in(exe_filename, Some(&path), &cwd) {
                        Ok(ref full_path) if full_path.canonicalize().ok() == exe.canonicalize().ok() => {
                            // The PATH lookup found us; search again with
                            // our directory removed.
                            if let Some(dir) = full_path.parent() {
                                let path = env::join_paths(
                                    env::split_paths(&path).filter(|p| p != dir),
                                )
                                .ok();
                                if let Ok(full_path) = which_in(exe_filename, path, &cwd) {
                                    args[0] = full_path.into();
                                }
                            }
                        }
                        Ok(full_path) => args[0] = full_path.into(),
                        Err(_) => {}
                    }
                    args.insert(0, env!("CARGO_PKG_NAME").into());
                }
            }
        }
    }
    let matches = get_clap_command().get_matches_from(args);

    let show_config = matches.get_flag("show-config");
    let cmd: Option<Vec<OsString>> = matches
        .get_many::<OsString>("cmd")
        .map(|vals| vals.cloned().collect());
    if show_config && cmd.is_some() {
        bail!("Too many commands specified");
    }
    if show_config {
        return Ok(Command::ShowConfig);
    }
    if let Some(mut cmd) = cmd {
        if cmd.is_empty() {
            bail!("No compile command");
        }
        let exe = cmd.remove(0);
        return Ok(Command::Compile { exe, cmdline: cmd });
    }
    bail!("No command specified")
}
