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

//! A wrapper for rustc as invoked by cargo.
//!
//! rustc has no useful preprocessing stage, so this wrapper forces direct
//! mode: the fingerprint covers the contents of every input file (the
//! source, dep-info discovered sources, and extern crates) plus the full
//! relevant command line. This is only intended to cover the rustc
//! invocations cargo produces; exotic invocations fail or bypass.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::env::consts::DLL_EXTENSION;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use crate::arglist::ArgList;
use crate::env::{self, ScopedUnset};
use crate::errors::*;
use crate::mock_command::{run_program, CommandCreator};
use crate::util::{file_stem_lower, Digest};
use crate::wrapper::args::*;
use crate::wrapper::{Capabilities, ExpectedFile, ProgramWrapper};

/// Tick this to a new number if the hash format changes in a
/// non-backwards-compatible way.
const HASH_VERSION: &str = "1";

/// Directory in the sysroot containing the shared libraries rustc loads.
#[cfg(not(windows))]
const LIBS_DIR: &str = "lib";
#[cfg(windows)]
const LIBS_DIR: &str = "bin";

/// Environment variables hidden from rustc while probing its identity, so
/// host-specific noise doesn't leak into the fingerprint. The guards are
/// scoped: the real build still sees the original environment.
const PROBE_SANITIZED_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "RUNNING_UNDER_RR",
    "HOSTNAME",
    "PWD",
    "HOST",
    "RPM_BUILD_ROOT",
    "SOURCE_DATE_EPOCH",
    "RPM_PACKAGE_RELEASE",
    "MINICOM",
    "RPM_PACKAGE_VERSION",
];

/// How each rustc option is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RustArg {
    /// Fails the cache; the user must fix the invocation.
    Unsupported,
    /// Bypasses the cache; the invocation is forwarded untouched.
    Unhandled,
    /// Never part of the fingerprint.
    Ignored,
    LibraryPath,
    Library,
    CrateType,
    CrateName,
    Emit,
    CodeGen,
    OutDir,
    Target,
    Extern,
    ResponseFile,
}

/// Whether the option requires an argument, as `--option value`,
/// `--option=value` or `-Ovalue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HasArg {
    No,
    Yes,
}

use self::HasArg::{No, Yes};
use self::RustArg::*;

/// Every option rustc accepts, and how we classify it. Sorted by option
/// string for the table search.
static ARGS: [(ArgInfo, (RustArg, HasArg)); 42] = [
    flag!("-", (Unsupported, No)),
    take_arg!("--allow", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--cap-lints", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--cfg", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--codegen", CanBeSeparated('='), (CodeGen, Yes)),
    take_arg!("--color", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--crate-name", CanBeSeparated('='), (CrateName, Yes)),
    take_arg!("--crate-type", CanBeSeparated('='), (CrateType, Yes)),
    take_arg!("--deny", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--diagnostic-width", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--edition", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--emit", CanBeSeparated('='), (Emit, Yes)),
    take_arg!("--error-format", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--explain", CanBeSeparated('='), (Unhandled, Yes)),
    take_arg!("--extern", CanBeSeparated('='), (Extern, Yes)),
    take_arg!("--forbid", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--force-warn", CanBeSeparated('='), (Ignored, Yes)),
    flag!("--help", (Unhandled, No)),
    take_arg!("--json", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("--out-dir", CanBeSeparated('='), (OutDir, Yes)),
    take_arg!("--print", CanBeSeparated('='), (Unhandled, Yes)),
    take_arg!("--remap-path-prefix", CanBeSeparated('='), (Unsupported, Yes)),
    take_arg!("--sysroot", CanBeSeparated('='), (Unsupported, Yes)),
    take_arg!("--target", CanBeSeparated('='), (Target, Yes)),
    flag!("--test", (Unhandled, No)),
    flag!("--verbose", (Ignored, No)),
    flag!("--version", (Unhandled, No)),
    take_arg!("--warn", CanBeSeparated('='), (Ignored, Yes)),
    take_arg!("-A", CanBeSeparated, (Ignored, Yes)),
    take_arg!("-C", CanBeSeparated, (CodeGen, Yes)),
    take_arg!("-D", CanBeSeparated, (Ignored, Yes)),
    take_arg!("-F", CanBeSeparated, (Ignored, Yes)),
    take_arg!("-L", CanBeSeparated, (LibraryPath, Yes)),
    flag!("-O", (CodeGen, No)),
    flag!("-V", (Unhandled, No)),
    take_arg!("-W", CanBeSeparated, (Ignored, Yes)),
    flag!("-g", (CodeGen, No)),
    flag!("-h", (Unhandled, No)),
    take_arg!("-l", CanBeSeparated, (Library, Yes)),
    take_arg!("-o", CanBeSeparated, (Unsupported, Yes)),
    flag!("-v", (Ignored, No)),
    take_arg!("@", Concatenated, (ResponseFile, No)),
];

/// Implicit inputs and env dependencies both come out of the dep-info
/// probe, so they are computed together and memoized.
#[derive(Debug, Clone)]
struct DepInfo {
    implicit_inputs: Vec<PathBuf>,
    env_vars: BTreeMap<String, String>,
}

pub struct RustWrapper<T: CommandCreator> {
    creator: T,
    executable: PathBuf,
    /// The raw argv, including argv[0].
    arguments: ArgList,
    /// The argv normalized to separated `option value` tokens.
    parsed_args: ArgList,
    relevant_args: ArgList,
    output_dir: PathBuf,
    externs: Vec<PathBuf>,
    staticlibs: Vec<PathBuf>,
    crate_name: String,
    /// The dep-info output filename, if `dep-info` is emitted.
    dep_info: Option<String>,
    /// The sorted `--emit` set.
    emit: Vec<String>,
    input: PathBuf,
    dep_state: Option<DepInfo>,
}

fn crate_error(crate_name: &str, message: String) -> Error {
    let header = if crate_name.is_empty() {
        "<unknown crate>"
    } else {
        crate_name
    };
    WrapperError::Unsupported(format!("{}: {}", header, message)).into()
}

/// Parse dependency info emitted by `--emit=dep-info`. The first line
/// names the source dependencies after the target; later lines of the
/// form `# env-dep:NAME=VALUE` (or `# env-dep:NAME`) name environment
/// variables the compile depends on.
fn parse_dep_info(dep_info: &str, cwd: &Path) -> (Vec<PathBuf>, BTreeMap<String, String>) {
    let mut files: Vec<PathBuf> = vec![];
    let mut env_vars = BTreeMap::new();
    let mut lines = dep_info.lines();
    if let Some(first) = lines.next() {
        files = first
            .split(' ')
            .skip(1)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| cwd.join(s))
            .collect();
    }
    for line in lines {
        if let Some(dep) = line.strip_prefix("# env-dep:") {
            let mut split = dep.splitn(2, '=');
            let name = split.next().unwrap_or("");
            // RUSTC_COLOR is controlled from the command line, and
            // CARGO_MAKEFLAGS carries jobserver fds.
            if name.is_empty() || name == "RUSTC_COLOR" || name == "CARGO_MAKEFLAGS" {
                continue;
            }
            env_vars.insert(name.to_owned(), split.next().unwrap_or("").to_owned());
        }
    }
    files.sort();
    (files, env_vars)
}

impl<T: CommandCreator> RustWrapper<T> {
    pub fn new(creator: T, executable: &Path, arguments: ArgList) -> RustWrapper<T> {
        RustWrapper {
            creator,
            executable: executable.to_owned(),
            arguments,
            parsed_args: ArgList::new(),
            relevant_args: ArgList::new(),
            output_dir: PathBuf::new(),
            externs: vec![],
            staticlibs: vec![],
            crate_name: String::new(),
            dep_info: None,
            emit: vec![],
            input: PathBuf::new(),
            dep_state: None,
        }
    }

    /// Run rustc for metadata discovery with the identity-probe
    /// environment sanitized.
    fn run_probe<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output> {
        let _scoped: Vec<ScopedUnset> = PROBE_SANITIZED_ENV_VARS
            .iter()
            .map(|name| ScopedUnset::new(name))
            .collect();
        run_program(&self.creator, &self.executable, args)
    }

    /// Parse and verify the whole command line, collecting every problem
    /// before reporting, and record the data the other hooks need.
    fn parse_options(&mut self) -> Result<()> {
        let cwd = std::env::current_dir().context("couldn't determine current working directory")?;

        let mut parsed_args = ArgList::new();
        let mut relevant_args = ArgList::new();
        let mut errors: Vec<String> = vec![];
        let mut unhandled: Vec<String> = vec![];
        let mut static_library_paths: Vec<PathBuf> = vec![];
        let mut static_library_names: Vec<String> = vec![];
        let mut crate_type_rlib = false;
        let mut crate_type_staticlib = false;
        let mut crate_name = String::new();
        let mut emit: Vec<String> = vec![];
        let mut extra_filename = String::new();
        let mut output_dir = String::new();
        let mut externs: Vec<PathBuf> = vec![];
        let mut input = String::new();

        parsed_args.push(self.arguments[0].clone());

        for item in ArgsIter::new(self.arguments.iter().skip(1).cloned(), &ARGS[..]) {
            let (attr, has_arg) = match item.data {
                Some(data) => data,
                None => match item.arg {
                    Argument::Raw(path) => {
                        parsed_args.push(path.clone());
                        if !input.is_empty() {
                            errors.push(format!("Cannot handle multiple inputs {}", path));
                            continue;
                        }
                        relevant_args.push(path.clone());
                        input = path;
                        continue;
                    }
                    Argument::UnknownFlag(flag) => {
                        parsed_args.push(flag.clone());
                        errors.push(format!("Unsupported compiler argument {}", flag));
                        continue;
                    }
                    _ => unreachable!(),
                },
            };
            let opt = item.arg.to_str().to_owned();
            let value = item.arg.get_value().map(str::to_owned);
            if has_arg == Yes && value.as_deref().map_or(true, str::is_empty) {
                errors.push(format!("Can't parse arguments, missing argument for {}", opt));
                continue;
            }

            parsed_args.push(opt.clone());
            if let Some(ref value) = value {
                if !value.is_empty() {
                    parsed_args.push(value.clone());
                }
            }

            match attr {
                Unsupported => {
                    errors.push(format!("Unsupported compiler argument {}", opt));
                    continue;
                }
                Unhandled => {
                    unhandled.push(opt);
                    continue;
                }
                Ignored => continue,
                LibraryPath => {
                    // `-L [kind=]path`. The path itself is not a relevant
                    // argument: the contents of any static libraries found
                    // there feed the program identity instead.
                    let value = value.unwrap();
                    let parts = ArgList::split(&value, '=');
                    let kind = if parts.len() == 2 { parts[0].as_str() } else { "" };
                    if kind.is_empty() || kind == "native" || kind == "all" {
                        static_library_paths.push(PathBuf::from(parts[parts.len() - 1].clone()));
                    }
                    continue;
                }
                Library => {
                    // `-l [kind=]name`; only static libraries feed the hash.
                    let parts = ArgList::split(value.as_deref().unwrap(), '=');
                    if parts.len() == 2 && parts[0] == "static" {
                        static_library_names.push(parts[1].clone());
                    }
                }
                CrateType => {
                    // lib implies rlib; only lib, rlib and staticlib can be
                    // cached, since anything else makes rustc drive the
                    // system linker with inputs we don't know about.
                    for crate_type in value.as_deref().unwrap().split(',') {
                        match crate_type {
                            "lib" | "rlib" => crate_type_rlib = true,
                            "staticlib" => crate_type_staticlib = true,
                            other => {
                                errors.push(format!("Can't cache crate type {}", other));
                            }
                        }
                    }
                }
                CrateName => crate_name = value.clone().unwrap(),
                Emit => {
                    if !emit.is_empty() {
                        errors.push("Cannot handle more than one --emit".to_owned());
                        continue;
                    }
                    emit = value
                        .as_deref()
                        .unwrap()
                        .split(',')
                        .map(str::to_owned)
                        .collect();
                    emit.sort();
                }
                CodeGen => {
                    if let Some(ref value) = value {
                        let mut split = value.splitn(2, '=');
                        let name = split.next().unwrap_or("");
                        let val = split.next().unwrap_or("");
                        if name == "extra-filename" {
                            if val.is_empty() {
                                errors.push("Can't cache extra-filename".to_owned());
                                continue;
                            }
                            extra_filename = val.to_owned();
                        }
                        if name == "incremental" {
                            errors.push("Can't cache incremental builds".to_owned());
                            continue;
                        }
                    }
                }
                OutDir => {
                    // Where the result is stored isn't relevant to the hash.
                    output_dir = value.unwrap();
                    continue;
                }
                Target => {
                    // Custom JSON target specs are files we'd have to hash.
                    let target = value.as_deref().unwrap();
                    if Path::new(target).extension() == Some(OsStr::new("json"))
                        || Path::new(&format!("{}.json", target)).exists()
                    {
                        errors.push(format!("Can't cache target {}", target));
                        continue;
                    }
                }
                Extern => {
                    // The extern path isn't a relevant argument; its
                    // contents are hashed as an input file. Relative paths
                    // are resolved against the working directory.
                    let parts = ArgList::split(value.as_deref().unwrap(), '=');
                    if parts.len() == 2 && !parts[1].is_empty() {
                        externs.push(cwd.join(&parts[1]));
                    }
                    continue;
                }
                ResponseFile => {
                    unhandled.push(format!(
                        "Cannot handle response file @{}",
                        value.as_deref().unwrap_or("")
                    ));
                    continue;
                }
            }

            relevant_args.push(opt);
            if let Some(value) = value {
                if !value.is_empty() {
                    relevant_args.push(value);
                }
            }
        }

        // Bypass-class arguments win: forwarding the invocation untouched
        // is always what would have happened without the cache.
        if !unhandled.is_empty() {
            return Err(WrapperError::Unhandled(unhandled.join(", ")).into());
        }
        if !errors.is_empty() {
            return Err(crate_error(&crate_name, errors.join("\n")));
        }

        // All options parsed; verify the required ones.
        if input.is_empty() {
            return Err(crate_error(
                &crate_name,
                "input file required to cache cargo/rustc compilation".to_owned(),
            ));
        }
        let allowed_emit = ["dep-info", "link", "metadata"];
        if emit.is_empty()
            || !emit.contains(&"link".to_owned())
            || !emit.contains(&"metadata".to_owned())
            || !emit.iter().all(|e| allowed_emit.contains(&e.as_str()))
        {
            return Err(crate_error(
                &crate_name,
                "--emit required to cache cargo/rustc compilation".to_owned(),
            ));
        }
        if output_dir.is_empty() {
            return Err(crate_error(
                &crate_name,
                "--out-dir required to cache cargo/rustc compilation".to_owned(),
            ));
        }
        if crate_name.is_empty() {
            return Err(crate_error(
                &crate_name,
                "--crate-name required to cache cargo/rustc compilation".to_owned(),
            ));
        }
        if !crate_type_rlib && !crate_type_staticlib {
            return Err(crate_error(
                &crate_name,
                "--crate-type required to cache cargo/rustc compilation".to_owned(),
            ));
        }

        // Locate the static libraries named on the command line; rustc
        // errors out on missing ones itself, so absent candidates are fine.
        let mut staticlibs: Vec<PathBuf> = vec![];
        for name in &static_library_names {
            for path in &static_library_paths {
                for candidate in [
                    format!("lib{}.a", name),
                    format!("{}.lib", name),
                    format!("{}.a", name),
                ] {
                    let lib_path = path.join(candidate);
                    if lib_path.exists() {
                        staticlibs.push(lib_path);
                    }
                }
            }
        }
        staticlibs.sort();

        let dep_info = if emit.iter().any(|e| e == "dep-info") {
            Some(format!("{}{}.d", crate_name, extra_filename))
        } else {
            None
        };

        // Cargo doesn't guarantee the order of externs, so sort them.
        externs.sort();

        trace!("[{}]: relevant arguments: {}", crate_name, relevant_args.join_quoted(' '));

        self.parsed_args = parsed_args;
        self.relevant_args = relevant_args;
        self.output_dir = PathBuf::from(output_dir);
        self.externs = externs;
        self.staticlibs = staticlibs;
        self.crate_name = crate_name;
        self.dep_info = dep_info;
        self.emit = emit;
        self.input = PathBuf::from(input);
        Ok(())
    }

    /// The implicit input files and (most of) the relevant environment
    /// variables both come out of a single `--emit=dep-info` run, so they
    /// are computed together, once.
    fn process_dep_info(&mut self) -> Result<()> {
        if self.dep_state.is_some() {
            return Ok(());
        }
        let cwd = std::env::current_dir().context("couldn't determine current working directory")?;
        let tmp_file = tempfile::Builder::new()
            .prefix("compcache")
            .suffix(".d")
            .tempfile()
            .context("failed to create dep-info temp file")?;

        // Existing --emit and --out-dir pairs (and all -C options) must go
        // before asking for dep-info output.
        let mut probe_args: Vec<String> = vec![];
        let mut skip_value = false;
        for arg in self.parsed_args.iter().skip(1) {
            if skip_value {
                skip_value = false;
                continue;
            }
            if arg == "--emit" || arg == "--out-dir" || arg == "-C" {
                skip_value = true;
                continue;
            }
            probe_args.push(arg.clone());
        }
        probe_args.push("-o".to_owned());
        probe_args.push(tmp_file.path().to_string_lossy().into_owned());
        probe_args.push("--emit=dep-info".to_owned());

        trace!("[{}]: dep-info probe: {:?}", self.crate_name, probe_args);
        let output = self.run_probe(&probe_args)?;
        if !output.status.success() {
            bail!(
                "Failed to generate dep-info for {}: {}",
                self.crate_name,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let text = fs::read_to_string(tmp_file.path()).context("failed to read dep-info output")?;
        let (implicit_inputs, mut env_vars) = parse_dep_info(&text, &cwd);

        // Also include every CARGO_* variable; CARGO_MAKEFLAGS carries
        // jobserver state and is never cacheable.
        for entry in env::enumerate() {
            if let Some((name, value)) = entry.split_once('=') {
                if name.starts_with("CARGO_") && name != "CARGO_MAKEFLAGS" {
                    env_vars.insert(name.to_owned(), value.to_owned());
                }
            }
        }

        trace!(
            "[{}]: {} implicit inputs, {} env deps",
            self.crate_name,
            implicit_inputs.len(),
            env_vars.len()
        );
        self.dep_state = Some(DepInfo {
            implicit_inputs,
            env_vars,
        });
        Ok(())
    }
}

impl<T: CommandCreator + 'static> ProgramWrapper for RustWrapper<T> {
    fn can_handle_command(&self) -> bool {
        // TODO: detect rustup proxies instead of trusting the
        // basename.
        file_stem_lower(&self.executable) == "rustc"
    }

    fn resolve_args(&mut self) -> Result<()> {
        self.parse_options()
    }

    fn get_capabilities(&self) -> Capabilities {
        // Direct mode is required by how rustc is invoked. Hard links are
        // safe because rustc never overwrites existing output files.
        Capabilities {
            force_direct_mode: true,
            hard_links: true,
        }
    }

    fn get_program_id(&mut self) -> Result<String> {
        let mut hasher = Digest::new();
        hasher.update(HASH_VERSION.as_bytes());

        let output = self.run_probe(&["-vV"])?;
        if !output.status.success() {
            bail!("Unable to get the compiler version information string.");
        }
        hasher.update(&output.stdout);

        let output = self.run_probe(&["--print=sysroot"])?;
        if !output.status.success() {
            bail!("Unable to get the compiler sysroot.");
        }
        let sysroot = String::from_utf8_lossy(&output.stdout).trim().to_owned();

        // Everything rustc dynamically loads can change its output.
        let libs_dir = Path::new(&sysroot).join(LIBS_DIR);
        let mut shared_libraries: Vec<PathBuf> = fs::read_dir(&libs_dir)
            .with_context(|| format!("failed to list rustc sysroot: {:?}", libs_dir))?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if entry.file_type().ok()?.is_file()
                    && path.extension() == Some(OsStr::new(DLL_EXTENSION))
                {
                    Some(path)
                } else {
                    None
                }
            })
            .collect();
        shared_libraries.sort();
        for library in &shared_libraries {
            hasher.update_file(library)?;
        }

        // Static libraries are hashed by name and contents.
        for library in &self.staticlibs {
            hasher.update(library.to_string_lossy().as_bytes());
            hasher.update_file(library)?;
        }

        Ok(hasher.finish())
    }

    fn get_relevant_arguments(&self) -> ArgList {
        self.relevant_args.clone()
    }

    fn get_relevant_env_vars(&mut self) -> Result<BTreeMap<String, String>> {
        self.process_dep_info()?;
        Ok(self.dep_state.as_ref().unwrap().env_vars.clone())
    }

    fn get_input_files(&self) -> Vec<PathBuf> {
        // The single source file plus every extern named on the command
        // line.
        let mut files = vec![self.input.clone()];
        files.extend(self.externs.iter().cloned());
        files
    }

    fn get_implicit_input_files(&mut self) -> Result<Vec<PathBuf>> {
        self.process_dep_info()?;
        Ok(self.dep_state.as_ref().unwrap().implicit_inputs.clone())
    }

    fn get_build_files(&mut self) -> Result<HashMap<String, ExpectedFile>> {
        // `--print file-names` tells us the library names; the metadata
        // files can't be queried but share the .rlib names, and the
        // dep-info name was derived while parsing.
        let mut probe_args: Vec<String> =
            self.parsed_args.iter().skip(1).cloned().collect();
        probe_args.push("--print".to_owned());
        probe_args.push("file-names".to_owned());
        let output = self.run_probe(&probe_args)?;
        if !output.status.success() {
            bail!(
                "Failed to get file names for {}: {}",
                self.crate_name,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        let stdout = String::from_utf8(output.stdout).context("error parsing rustc output")?;
        let mut files: Vec<String> = stdout.lines().map(str::to_owned).collect();

        if self.emit.iter().any(|e| e == "metadata") {
            let mut metadata: Vec<String> = vec![];
            for file in &files {
                if Path::new(file).extension() == Some(OsStr::new("rlib")) {
                    let rmeta = Path::new(file)
                        .with_extension("rmeta")
                        .to_string_lossy()
                        .into_owned();
                    if !metadata.contains(&rmeta) {
                        metadata.push(rmeta);
                    }
                }
            }
            files.extend(metadata);
        }
        if let Some(ref dep_info) = self.dep_info {
            files.push(dep_info.clone());
        }

        Ok(files
            .into_iter()
            .map(|file| {
                let path = self.output_dir.join(&file);
                (file, ExpectedFile { path, required: true })
            })
            .collect())
    }

    fn hash_version(&self) -> &'static str {
        HASH_VERSION
    }

    fn working_dir_is_relevant(&self) -> bool {
        true
    }

    fn executable(&self) -> &Path {
        &self.executable
    }

    fn arguments(&self) -> &ArgList {
        &self.arguments
    }

    fn output_pretty(&self) -> String {
        if self.crate_name.is_empty() {
            "<unknown crate>".to_owned()
        } else {
            self.crate_name.clone()
        }
    }
}
