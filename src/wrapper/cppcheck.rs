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

//! A wrapper for the Cppcheck static analyzer.
//!
//! Cppcheck has a preprocessor (`-E`), so the fingerprint is built from
//! the preprocessed source plus the arguments that change how analysis of
//! that source proceeds. Only an explicit allow-list of arguments is
//! accepted; anything else fails the invocation rather than risk caching
//! an analysis we don't understand.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::arglist::ArgList;
use crate::errors::*;
use crate::mock_command::{run_program, CommandCreator};
use crate::util::file_stem_lower;
use crate::wrapper::{ExpectedFile, ProgramWrapper};

/// Tick this to a new number if the hash format changes in a
/// non-backwards-compatible way.
const HASH_VERSION: &str = "1";

/// Arguments whose value may follow as a separate token.
const TWO_PART_ARGS: &[&str] = &["-D", "-I", "-U", "-i", "-j", "-l"];

/// Source-file extensions Cppcheck analyzes (compared lowercased).
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "c++", "cc", "cpp", "cxx", "ipp", "ixx", "tpp", "txx",
];

/// The arguments we know how to cache, sorted. Everything else (project
/// files, addons, plist output, ...) fails the invocation.
const SUPPORTED_ARGS: &[&str] = &[
    "--check-level",
    "--check-library",
    "--disable",
    "--enable",
    "--error-exitcode",
    "--exitcode-suppressions",
    "--file-filter",
    "--force",
    "--fsigned-char",
    "--funsigned-char",
    "--inconclusive",
    "--inline-suppr",
    "--language",
    "--max-configs",
    "--max-ctu-depth",
    "--output-file",
    "--platform",
    "--premium",
    "--quiet",
    "--relative-paths",
    "--rule",
    "--showtime",
    "--std",
    "--suppress",
    "--template",
    "--template-location",
    "--verbose",
    "--xml",
    "-D",
    "-I",
    "-U",
    "-f",
    "-i",
    "-q",
    "-rp",
    "-v",
];

fn is_source_file(arg: &str) -> bool {
    match Path::new(arg).extension() {
        Some(ext) => SOURCE_EXTENSIONS
            .binary_search(&ext.to_string_lossy().to_lowercase().as_str())
            .is_ok(),
        None => false,
    }
}

fn is_two_part_arg(arg: &str) -> bool {
    TWO_PART_ARGS.contains(&arg)
}

fn is_supported_arg(arg: &str) -> bool {
    SUPPORTED_ARGS.binary_search(&arg).is_ok() || is_source_file(arg)
}

/// One parsed argument: the option, its value (possibly empty), and
/// whether they were joined with `=` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArgPair {
    arg: String,
    opt: String,
    equal_separator: bool,
}

impl ArgPair {
    /// Render the pair back into command-line tokens, preserving the
    /// original spelling.
    fn render(&self) -> ArgList {
        let mut result = ArgList::new();
        if self.equal_separator {
            result.push(format!("{}={}", self.arg, self.opt));
        } else {
            result.push(self.arg.clone());
            if !self.opt.is_empty() {
                result.push(self.opt.clone());
            }
        }
        result
    }
}

pub struct CppcheckWrapper<T: CommandCreator> {
    creator: T,
    executable: PathBuf,
    /// The raw argv, including argv[0].
    arguments: ArgList,
    arg_pairs: Vec<ArgPair>,
}

impl<T: CommandCreator> CppcheckWrapper<T> {
    pub fn new(creator: T, executable: &Path, arguments: ArgList) -> CppcheckWrapper<T> {
        CppcheckWrapper {
            creator,
            executable: executable.to_owned(),
            arguments,
            arg_pairs: vec![],
        }
    }

    /// Split the arguments into (arg, value, equal-separator) pairs:
    /// two-part options take the following token, glued spellings like
    /// `-DFOO` are split after the option, and `name=value` tokens are
    /// split on the first `=`.
    fn parse_arguments(&mut self) {
        self.arg_pairs.clear();

        // The first "arg" is the program name.
        let mut i = 1;
        while i < self.arguments.len() {
            let arg = &self.arguments[i];
            if is_two_part_arg(arg) && (i + 1) < self.arguments.len() {
                self.arg_pairs.push(ArgPair {
                    arg: arg.clone(),
                    opt: self.arguments[i + 1].clone(),
                    equal_separator: false,
                });
                i += 2;
                continue;
            }
            let first_two: String = arg.chars().take(2).collect();
            if is_two_part_arg(&first_two) && arg.len() > 2 {
                // A glued spelling: split for consistent hashing.
                self.arg_pairs.push(ArgPair {
                    arg: first_two,
                    opt: arg[2..].to_owned(),
                    equal_separator: false,
                });
            } else if let Some((name, value)) = arg.split_once('=') {
                self.arg_pairs.push(ArgPair {
                    arg: name.to_owned(),
                    opt: value.to_owned(),
                    equal_separator: true,
                });
            } else {
                self.arg_pairs.push(ArgPair {
                    arg: arg.clone(),
                    opt: String::new(),
                    equal_separator: false,
                });
            }
            i += 1;
        }
    }

    /// The preprocessor command: the original arguments minus the output
    /// file, plus `-E`.
    fn make_preprocessor_cmd(&self) -> ArgList {
        let mut preprocess_args = ArgList::new();
        for pair in &self.arg_pairs {
            if pair.arg == "--output-file" {
                continue;
            }
            preprocess_args += pair.render();
        }
        preprocess_args.push("-E");
        preprocess_args
    }
}

impl<T: CommandCreator + 'static> ProgramWrapper for CppcheckWrapper<T> {
    fn can_handle_command(&self) -> bool {
        file_stem_lower(&self.executable).contains("cppcheck")
    }

    fn resolve_args(&mut self) -> Result<()> {
        self.parse_arguments();

        // Report every unsupported argument, not just the first.
        let unsupported: Vec<String> = self
            .arg_pairs
            .iter()
            .filter(|pair| !is_supported_arg(&pair.arg))
            .map(|pair| format!("Unsupported argument: {}", pair.render().join(' ')))
            .collect();
        if !unsupported.is_empty() {
            return Err(WrapperError::Unsupported(unsupported.join("\n")).into());
        }
        Ok(())
    }

    fn get_program_id(&mut self) -> Result<String> {
        let output = run_program(&self.creator, &self.executable, &["--version"])?;
        if !output.status.success() {
            bail!("Unable to get the Cppcheck version information string.");
        }
        // Prepend the hash format version.
        Ok(format!(
            "{}{}",
            HASH_VERSION,
            String::from_utf8_lossy(&output.stdout)
        ))
    }

    fn get_relevant_arguments(&self) -> ArgList {
        let mut filtered_args = ArgList::new();

        // The first argument is the analyzer binary without the path.
        filtered_args.push(
            Path::new(&self.arguments[0])
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.arguments[0].clone()),
        );

        for pair in &self.arg_pairs {
            // Things that do not change how preprocessed code turns into
            // an analysis result are unwanted: -I, -D and -U are already
            // accounted for by the preprocessed source.
            // The source file path IS included, exactly as given: it shows
            // up in the report as a relative or absolute path depending on
            // the command-line spelling.
            // TODO: derive the source path the way Cppcheck does and
            // hash that instead, to become relative-path-insensitive.
            let is_unwanted = pair.arg == "-I" || pair.arg == "-D" || pair.arg == "-U";
            if is_unwanted {
                continue;
            }
            if pair.arg == "--output-file" {
                // Using --output-file affects the output, but the file
                // name itself must not enter the hash.
                filtered_args.push(pair.arg.clone());
            } else {
                filtered_args += pair.render();
            }
        }

        debug!("Filtered arguments: {}", filtered_args.join_quoted(' '));
        filtered_args
    }

    fn get_relevant_env_vars(&mut self) -> Result<BTreeMap<String, String>> {
        // TODO: determine which environment variables affect the
        // analysis result.
        Ok(BTreeMap::new())
    }

    fn get_build_files(&mut self) -> Result<HashMap<String, ExpectedFile>> {
        let mut files = HashMap::new();
        for pair in &self.arg_pairs {
            if pair.arg == "--output-file" {
                if files
                    .insert(
                        "output_file".to_owned(),
                        ExpectedFile {
                            path: PathBuf::from(&pair.opt),
                            required: true,
                        },
                    )
                    .is_some()
                {
                    bail!("Only a single output file can be specified.");
                }
            }
        }
        Ok(files)
    }

    fn preprocess_source(&mut self) -> Result<Vec<u8>> {
        let preprocessor_args = self.make_preprocessor_cmd();
        let output = run_program(&self.creator, &self.executable, preprocessor_args.as_slice())?;
        if !output.status.success() {
            bail!("Preprocessing command was unsuccessful.");
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
        self.arg_pairs
            .iter()
            .find(|pair| is_source_file(&pair.arg))
            .map(|pair| pair.arg.clone())
            .unwrap_or_else(|| "cppcheck".to_owned())
    }
}
