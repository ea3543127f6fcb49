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

#![deny(rust_2018_idioms)]

#[macro_use]
extern crate log;

// To get macros in scope, this has to be first.
#[cfg(test)]
#[macro_use]
mod test;

pub mod arglist;
pub mod cache;
mod cmdline;
mod commands;
pub mod config;
pub mod env;
pub mod errors;
pub mod mock_command;
pub mod util;
pub mod wrapper;

use std::io::Write;

pub fn main() {
    init_logging();
    std::process::exit(match cmdline::parse() {
        Ok(cmd) => match commands::run_command(cmd) {
            Ok(code) => code,
            Err(e) => {
                let stderr = &mut std::io::stderr();
                writeln!(stderr, "error: {}", e).unwrap();
                for cause in e.chain().skip(1) {
                    writeln!(stderr, "caused by: {}", cause).unwrap();
                }
                2
            }
        },
        Err(e) => {
            println!("compcache: {}", e);
            cmdline::get_clap_command().print_help().unwrap();
            println!();
            1
        }
    });
}

fn init_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        if let Err(e) = env_logger::try_init() {
            panic!("Failed to initialize logging: {:?}", e);
        }
    }
}
