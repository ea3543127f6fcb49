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

//! A wrapper for GCC-family C/C++ compilers (gcc, g++, clang, and cross
//! prefixes thereof).
//!
//! These compilers have a real preprocessing stage, so the fingerprint is
//! built from the preprocessed source: include-search and macro arguments
//! never enter the hash directly, their effect is already in the `-E`
//! output. Invocations that are not a single-input `-c` compile are
//! forwarded without caching.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::arglist::ArgList;
use crate::env;
use crate::errors::*;
use crate::mock_command::{run_program, CommandCreator};
use crate::util::file_stem_lower;
use crate::wrapper::{ExpectedFile, ProgramWrapper};

/// Tick this to a new number if the hash format changes in a
/// non-backwards-compatible way.
const HASH_VERSION: &str = "1";

/// Executable basenames (or suffixes, for cross toolchains like
/// `arm-none-eabi-gcc`) this wrapper claims.
const COMPILER_NAMES: &[&str] = &["c++", "cc", "clang", "clang++", "g++", "gcc"];

/// Arguments that take a value as the following token. Shared between gcc
/// and clang.
const ARGS_WITH_VALUE: &[&str] = &[
    "--param",
    "-A",
    "-B",
    "-D",
    "-F",
    "-G",
    "-I",
    "-L",
    "-U",
    "-V",
    "-Xassembler",
    "-Xlinker",
    "-Xpreprocessor",
    "-aux-info",
    "-b",
    "-idirafter",
    "-iframework",
    "-imacros",
    "-imultilib",
    "-include",
    "-install_name",
    "-iprefix",
    "-iquote",
    "-isysroot",
    "-isystem",
    "-iwithprefix",
    "-iwithprefixbefore",
    "-u",
];

/// Value-taking arguments whose effect is fully captured by the
/// preprocessed source; they are fed to the preprocessor run but kept out
/// of the fingerprint.
const PREPROCESSOR_COVERED_ARGS: &[&str] = &[
    "-A",
    "-D",
    "-F",
    "-I",
    "-U",
    "-idirafter",
    "-iframework",
    "-imacros",
    "-imultilib",
    "-include",
    "-iprefix",
    "-iquote",
    "-isysroot",
    "-isystem",
    "-iwithprefix",
    "-iwithprefixbefore",
];

/// Environment variables that change Apple toolchain output.
const RELEVANT_ENV_VARS: &[&str] = &["IPHONEOS_DEPLOYMENT_TARGET", "MACOSX_DEPLOYMENT_TARGET"];

fn argument_takes_value(arg: &str) -> bool {
    ARGS_WITH_VALUE.binary_search(&arg).is_ok()
}

fn preprocessor_covered(arg: &str) -> bool {
    PREPROCESSOR_COVERED_ARGS.binary_search(&arg).is_ok()
}

/// Bypass: forward to the real compiler without caching.
fn unhandled(reason: &str) -> Error {
    WrapperError::Unhandled(reason.to_owned()).into()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ParsedArguments {
    /// The input source file, as given.
    input: String,
    /// Its lowercased extension.
    extension: String,
    /// The object file output (`-o`).
    output: PathBuf,
    /// Whether `-gsplit-dwarf` adds a `.dwo` sibling output.
    split_dwarf: bool,
    /// Arguments for the preprocessor only (dep-file generation, include
    /// and macro arguments).
    preprocessor_args: ArgList,
    /// Arguments for both the preprocessor and the compiler; these enter
    /// the fingerprint.
    common_args: ArgList,
}

pub struct GccWrapper<T: CommandCreator> {
    creator: T,
    executable: PathBuf,
    /// The raw argv, including argv[0].
    arguments: ArgList,
    parsed: ParsedArguments,
}

/// Iterator that expands `@file` arguments, which stand for reading a
/// file and interpreting its whitespace-separated contents as more
/// arguments (recursively). An unreadable file leaves the token as-is;
/// quoted contents are not expanded.
struct ExpandAtFile {
    stack: Vec<String>,
}

impl ExpandAtFile {
    fn new(arguments: &[String]) -> ExpandAtFile {
        ExpandAtFile {
            stack: arguments.iter().rev().cloned().collect(),
        }
    }
}

impl Iterator for ExpandAtFile {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let arg = self.stack.pop()?;
            let path = match arg.strip_prefix('@') {
                Some(path) => PathBuf::from(path),
                None => return Some(arg),
            };
            let mut contents = String::new();
            let read = File::open(&path).and_then(|mut f| f.read_to_string(&mut contents));
            if let Err(e) = read {
                debug!("failed to read @-file {:?}: {}", path, e);
                return Some(arg);
            }
            // Quote handling is not implemented; pass the token through
            // and let argument classification reject it.
            if contents.contains('"') || contents.contains('\'') {
                return Some(arg);
            }
            self.stack
                .extend(contents.split_whitespace().rev().map(str::to_owned));
        }
    }
}

impl<T: CommandCreator> GccWrapper<T> {
    pub fn new(creator: T, executable: &Path, arguments: ArgList) -> GccWrapper<T> {
        GccWrapper {
            creator,
            executable: executable.to_owned(),
            arguments,
            parsed: ParsedArguments::default(),
        }
    }

    fn parse_arguments(&mut self) -> Result<()> {
        let mut compilation = false;
        let mut input: Option<String> = None;
        let mut output: Option<String> = None;
        let mut dep_target: Option<String> = None;
        let mut need_explicit_dep_target = false;
        let mut parsed = ParsedArguments::default();

        let mut it = ExpandAtFile::new(&self.arguments.as_slice()[1..]);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "-c" => compilation = true,
                "-o" => output = it.next(),
                "-gsplit-dwarf" => {
                    parsed.split_dwarf = true;
                    parsed.common_args.push(arg.clone());
                }
                // Can't cache compiler modules or PGO-profiled output.
                "-fcxx-modules" | "-fmodules" | "-fprofile-use" => {
                    return Err(unhandled(&arg));
                }
                // -MF and -MQ take a value but only matter to the
                // preprocessor.
                "-MF" | "-MQ" => {
                    parsed.preprocessor_args.push(arg.clone());
                    if let Some(value) = it.next() {
                        parsed.preprocessor_args.push(value);
                    }
                }
                "-MT" => dep_target = it.next(),
                "-M" | "-MM" | "-MD" | "-MMD" => {
                    // Dep-file generation needs an explicit -MT on the
                    // preprocessor command line, passed or not.
                    need_explicit_dep_target = true;
                    parsed.preprocessor_args.push(arg.clone());
                }
                a if argument_takes_value(a) => {
                    let covered = preprocessor_covered(a);
                    let list = if covered {
                        &mut parsed.preprocessor_args
                    } else {
                        &mut parsed.common_args
                    };
                    list.push(arg.clone());
                    if let Some(value) = it.next() {
                        list.push(value);
                    }
                }
                // An @-file that couldn't be expanded above.
                a if a.starts_with('@') => return Err(unhandled(&arg)),
                a if a.starts_with('-') && a.len() > 1 => {
                    // Glued spellings of preprocessor-covered arguments
                    // (-DFOO, -Iinclude) stay out of the fingerprint too.
                    let prefix: String = a.chars().take(2).collect();
                    if preprocessor_covered(&prefix) {
                        parsed.preprocessor_args.push(arg.clone());
                    } else {
                        parsed.common_args.push(arg.clone());
                    }
                }
                // Anything else is an input file.
                _ => {
                    if input.is_some() || arg == "-" {
                        // Multiple inputs or compilation from stdin.
                        return Err(unhandled("multiple input files"));
                    }
                    input = Some(arg.clone());
                }
            }
        }

        if !compilation {
            return Err(unhandled("not a compilation"));
        }
        let input = input.ok_or_else(|| unhandled("no input file"))?;
        let extension = match Path::new(&input).extension() {
            Some(e) => e.to_string_lossy().to_lowercase(),
            None => return Err(unhandled("unknown source language")),
        };
        match extension.as_str() {
            "c" | "cc" | "cpp" | "cxx" => {}
            e => {
                trace!("unhandled source extension: {}", e);
                return Err(unhandled("unknown source language"));
            }
        }
        let output = match output {
            Some(o) => o,
            // Compilation has to go to a file for us to cache it.
            None => return Err(unhandled("no output file")),
        };
        if need_explicit_dep_target {
            parsed.preprocessor_args.push("-MT");
            parsed
                .preprocessor_args
                .push(dep_target.unwrap_or_else(|| output.clone()));
        }

        parsed.input = input;
        parsed.extension = extension;
        parsed.output = PathBuf::from(output);
        self.parsed = parsed;
        Ok(())
    }
}

impl<T: CommandCreator + 'static> ProgramWrapper for GccWrapper<T> {
    fn can_handle_command(&self) -> bool {
        let stem = file_stem_lower(&self.executable);
        COMPILER_NAMES
            .iter()
            .any(|name| stem == *name || stem.ends_with(&format!("-{}", name)))
    }

    fn resolve_args(&mut self) -> Result<()> {
        self.parse_arguments()
    }

    fn get_program_id(&mut self) -> Result<String> {
        let output = run_program(&self.creator, &self.executable, &["--version"])?;
        if !output.status.success() {
            bail!("Unable to get the compiler version information string.");
        }
        Ok(format!(
            "{}{}",
            HASH_VERSION,
            String::from_utf8_lossy(&output.stdout)
        ))
    }

    fn get_relevant_arguments(&self) -> ArgList {
        // The source path is included as given: diagnostics and debug info
        // spell it the way the command line did. Include and macro
        // arguments are not: their effect is in the preprocessed source.
        let mut relevant = ArgList::new();
        relevant.push(self.parsed.input.clone());
        relevant += self.parsed.common_args.clone();
        relevant
    }

    fn get_relevant_env_vars(&mut self) -> Result<BTreeMap<String, String>> {
        let mut env_vars = BTreeMap::new();
        for name in RELEVANT_ENV_VARS {
            if let Some(value) = env::get(name) {
                env_vars.insert((*name).to_owned(), value);
            }
        }
        Ok(env_vars)
    }

    fn get_build_files(&mut self) -> Result<HashMap<String, ExpectedFile>> {
        let mut files = HashMap::new();
        files.insert(
            "obj".to_owned(),
            ExpectedFile {
                path: self.parsed.output.clone(),
                required: true,
            },
        );
        if self.parsed.split_dwarf {
            files.insert(
                "dwo".to_owned(),
                ExpectedFile {
                    path: self.parsed.output.with_extension("dwo"),
                    required: true,
                },
            );
        }
        Ok(files)
    }

    fn preprocess_source(&mut self) -> Result<Vec<u8>> {
        let mut args = ArgList::new();
        args.push("-E");
        args.push(self.parsed.input.clone());
        args += self.parsed.preprocessor_args.clone();
        args += self.parsed.common_args.clone();
        trace!("preprocess: {}", args.join_quoted(' '));
        let output = run_program(&self.creator, &self.executable, args.as_slice())?;
        if !output.status.success() {
            bail!(
                "Preprocessing command was unsuccessful: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output.stdout)
    }

    fn hash_version(&self) -> &'static str {
        HASH_VERSION
    }

    fn executable(&self) -> &Path {
        &self.executable
    }

    fn arguments(&self) -> &ArgList {
        &self.arguments
    }

    fn output_pretty(&self) -> String {
        self.parsed
            .output
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}
