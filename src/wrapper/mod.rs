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

//! The program-wrapper abstraction and the cache orchestration built on
//! top of it.

#[macro_use]
pub mod args;
pub mod cppcheck;
pub mod gcc;
pub mod rust;

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use crate::arglist::ArgList;
use crate::cache::{CacheEntry, Storage};
use crate::config::Config;
use crate::errors::*;
use crate::mock_command::{exit_status, CommandCreator, RunCommand};
use crate::util::{fmt_duration_as_secs, run_input_output, Digest};

/// A file the wrapper promises the compiler will produce, identified in
/// the cache entry by a stable label. A `required` file missing after a
/// successful compile is a protocol violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFile {
    pub path: PathBuf,
    pub required: bool,
}

/// Declared wrapper properties that change orchestrator behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Preprocessed-mode hashing would be unsound for this tool; always
    /// hash inputs directly.
    pub force_direct_mode: bool,
    /// Cached artifacts may be hard-linked to their destination rather
    /// than copied.
    pub hard_links: bool,
}

/// The contract every tool-specific wrapper implements. One wrapper
/// instance serves exactly one invocation; the orchestrator drives the
/// hooks in a fixed order (`resolve_args`, `get_capabilities`,
/// `preprocess_source` in preprocessed mode, `get_program_id`,
/// `get_relevant_arguments`, `get_relevant_env_vars`, the input-file hooks
/// in direct mode, then `get_build_files`). Hooks may memoize but must be
/// idempotent.
pub trait ProgramWrapper {
    /// Whether this wrapper claims the invocation, by executable basename
    /// and/or argv. The first claimer wins.
    fn can_handle_command(&self) -> bool;

    /// One-shot argument normalization and classification. Problems are
    /// collected and reported through `WrapperError`.
    fn resolve_args(&mut self) -> Result<()>;

    fn get_capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Identity of the compiler binary and anything it implicitly loads
    /// that could change output. Implementations embed their
    /// `hash_version` at the start of the digest input.
    fn get_program_id(&mut self) -> Result<String>;

    /// The subset of argv that affects output semantics.
    fn get_relevant_arguments(&self) -> ArgList;

    /// The environment variables relevant to output, and nothing else.
    fn get_relevant_env_vars(&mut self) -> Result<BTreeMap<String, String>>;

    /// Explicit inputs named on the command line (direct mode).
    fn get_input_files(&self) -> Vec<PathBuf> {
        vec![]
    }

    /// Files the compiler reads that are not on the command line (direct
    /// mode). May invoke the compiler to discover them.
    fn get_implicit_input_files(&mut self) -> Result<Vec<PathBuf>> {
        Ok(vec![])
    }

    /// The output files the compiler will produce, keyed by stable labels.
    fn get_build_files(&mut self) -> Result<HashMap<String, ExpectedFile>>;

    /// Run the tool's preprocessor and return its stdout bytes
    /// (preprocessed mode only). Failure is fatal for the invocation.
    fn preprocess_source(&mut self) -> Result<Vec<u8>> {
        bail!("tool has no preprocessor stage")
    }

    /// Hash-format version, bumped on incompatible fingerprint changes.
    fn hash_version(&self) -> &'static str;

    /// Whether the working directory participates in the fingerprint.
    fn working_dir_is_relevant(&self) -> bool {
        false
    }

    /// The resolved executable path.
    fn executable(&self) -> &Path;

    /// The raw argv, including argv[0].
    fn arguments(&self) -> &ArgList;

    /// A short label for log lines (crate name, output file name).
    fn output_pretty(&self) -> String;
}

/// Probe each registered wrapper in a fixed order; the first that claims
/// the invocation owns it. `None` means the outer system falls through to
/// direct execution.
pub fn find_wrapper<T>(
    creator: &T,
    executable: &Path,
    arguments: &ArgList,
) -> Option<Box<dyn ProgramWrapper>>
where
    T: CommandCreator + 'static,
{
    trace!("find_wrapper: {:?}", executable);
    let wrapper = gcc::GccWrapper::new(creator.clone(), executable, arguments.clone());
    if wrapper.can_handle_command() {
        debug!("find_wrapper: gcc wrapper claims {:?}", executable);
        return Some(Box::new(wrapper));
    }
    let wrapper = rust::RustWrapper::new(creator.clone(), executable, arguments.clone());
    if wrapper.can_handle_command() {
        debug!("find_wrapper: rust wrapper claims {:?}", executable);
        return Some(Box::new(wrapper));
    }
    let wrapper = cppcheck::CppcheckWrapper::new(creator.clone(), executable, arguments.clone());
    if wrapper.can_handle_command() {
        debug!("find_wrapper: cppcheck wrapper claims {:?}", executable);
        return Some(Box::new(wrapper));
    }
    None
}

/// Specifics about cache misses.
#[derive(Debug, PartialEq, Eq)]
pub enum MissType {
    /// The compilation was not found in the cache, nothing more.
    Normal,
    /// The backend failed or returned a corrupt entry; we degraded to a
    /// real compile.
    CacheReadError,
    /// Cache lookup was overridden, recompilation was forced.
    ForcedRecache,
}

/// Control of caching behavior.
#[derive(Debug, PartialEq, Eq)]
pub enum CacheControl {
    /// Default caching behavior.
    Default,
    /// Ignore existing cache entries, force recompilation.
    ForceRecache,
}

/// The result of a compilation or cache retrieval.
#[derive(Debug)]
pub enum CompileResult {
    /// Result was found in cache.
    CacheHit(Duration),
    /// Result was not found in cache; the real compiler ran and its
    /// outputs were stored.
    CacheMiss(MissType, Duration),
    /// The real compiler ran but its outputs were not stored.
    NotCached,
    /// The invocation was forwarded to the real tool without caching.
    Bypass,
    /// The real compiler ran and failed; nothing was stored.
    CompileFailed,
}

/// Compare by shape; durations are not part of equality.
impl PartialEq for CompileResult {
    fn eq(&self, other: &CompileResult) -> bool {
        match (self, other) {
            (&CompileResult::CacheHit(_), &CompileResult::CacheHit(_)) => true,
            (CompileResult::CacheMiss(m, _), CompileResult::CacheMiss(n, _)) => m == n,
            (&CompileResult::NotCached, &CompileResult::NotCached) => true,
            (&CompileResult::Bypass, &CompileResult::Bypass) => true,
            (&CompileResult::CompileFailed, &CompileResult::CompileFailed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashMode {
    Preprocessed,
    Direct,
}

/// Assemble the fingerprint for one invocation.
///
/// The hooks run in the fixed order the wrapper contract specifies, and
/// the hasher sees the labeled segments in the fixed order
/// `V P A E [S] [I] [C]`. Reordering either is a protocol violation.
fn compute_fingerprint(wrapper: &mut dyn ProgramWrapper, mode: HashMode) -> Result<String> {
    let preprocessed = match mode {
        HashMode::Preprocessed => Some(wrapper.preprocess_source()?),
        HashMode::Direct => None,
    };
    let program_id = wrapper.get_program_id()?;
    let relevant_args = wrapper.get_relevant_arguments();
    // BTreeMap iteration gives the lexicographic order the fingerprint
    // format requires.
    let env_vars = wrapper.get_relevant_env_vars()?;
    let inputs = match mode {
        HashMode::Direct => {
            let mut files = wrapper.get_input_files();
            files.extend(wrapper.get_implicit_input_files()?);
            files.sort();
            files.dedup();
            let mut hashed = Vec::with_capacity(files.len());
            for file in files {
                let digest = Digest::file(&file)
                    .with_context(|| format!("failed to hash input file {:?}", file))?;
                hashed.push((file, digest));
            }
            Some(hashed)
        }
        HashMode::Preprocessed => None,
    };

    let mut m = Digest::new();
    m.update(b"V");
    m.update(wrapper.hash_version().as_bytes());
    m.update(b"P");
    m.update(program_id.as_bytes());
    m.update(b"A");
    m.update(relevant_args.join('\0').as_bytes());
    m.update(b"E");
    let env_list: ArgList = env_vars
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    m.update(env_list.join('\0').as_bytes());
    if let Some(ref bytes) = preprocessed {
        m.update(b"S");
        m.update(bytes);
    }
    if let Some(ref inputs) = inputs {
        m.update(b"I");
        for (path, digest) in inputs {
            m.update(path.to_string_lossy().as_bytes());
            m.update(b"\0");
            m.update(digest.as_bytes());
        }
    }
    if wrapper.working_dir_is_relevant() {
        m.update(b"C");
        let cwd = env::current_dir().context("couldn't determine current working directory")?;
        m.update(cwd.to_string_lossy().as_bytes());
    }
    Ok(m.finish())
}

/// Run the real tool with the original argv, capturing its output.
fn run_real_tool<T>(creator: &T, wrapper: &dyn ProgramWrapper) -> Result<Output>
where
    T: CommandCreator,
{
    let mut cmd = creator.new_command(wrapper.executable());
    let args = wrapper.arguments();
    cmd.args(args.as_slice().get(1..).unwrap_or(&[]));
    run_input_output(cmd)
}

/// Write a cached entry's files to their destinations. An entry lacking a
/// required file is corrupt and turns the hit into a miss.
fn restore_outputs(entry: &CacheEntry, build_files: &HashMap<String, ExpectedFile>) -> Result<()> {
    for (label, expected) in build_files {
        match entry.files.get(label) {
            Some(bytes) => {
                if let Some(parent) = expected.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&expected.path, bytes)
                    .with_context(|| format!("failed to write output {:?}", expected.path))?;
            }
            None if expected.required => {
                bail!("cache entry is missing required file `{}`", label)
            }
            None => {}
        }
    }
    Ok(())
}

/// Read the files the compiler produced into a cache entry. A required
/// file the compiler did not produce is a protocol violation.
fn collect_outputs(build_files: &HashMap<String, ExpectedFile>, output: &Output) -> Result<CacheEntry> {
    let mut files = HashMap::new();
    for (label, expected) in build_files {
        match fs::read(&expected.path) {
            Ok(bytes) => {
                files.insert(label.clone(), bytes);
            }
            Err(e) if expected.required => {
                return Err(Error::from(e).context(format!(
                    "compiler did not produce expected file {:?}",
                    expected.path
                )))
            }
            Err(_) => {}
        }
    }
    Ok(CacheEntry {
        files,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
        exit_code: output.status.code().unwrap_or(0),
    })
}

/// Look up a cached result for this invocation; on a miss, run the real
/// compiler and store its outputs. This is the state machine of the
/// wrapper pipeline.
pub fn run_with_cache<T>(
    creator: &T,
    wrapper: &mut dyn ProgramWrapper,
    storage: &dyn Storage,
    config: &Config,
    cache_control: CacheControl,
) -> Result<(CompileResult, Output)>
where
    T: CommandCreator,
{
    if let Err(e) = wrapper.resolve_args() {
        let bypass = matches!(
            WrapperError::from_error(&e),
            Some(WrapperError::Unhandled(_))
        );
        if !bypass {
            return Err(e);
        }
        debug!("bypassing the cache: {}", e);
        let output = run_real_tool(creator, wrapper)?;
        return Ok((CompileResult::Bypass, output));
    }
    let out_label = wrapper.output_pretty();
    debug!(
        "[{}]: run_with_cache: {}",
        out_label,
        wrapper.arguments().join_quoted(' ')
    );

    let capabilities = wrapper.get_capabilities();
    let mode = if capabilities.force_direct_mode {
        HashMode::Direct
    } else {
        HashMode::Preprocessed
    };
    let key = compute_fingerprint(wrapper, mode)?;
    trace!("[{}]: fingerprint: {}", out_label, key);
    let build_files = wrapper.get_build_files()?;

    let start = Instant::now();
    let mut miss_type = MissType::Normal;
    if cache_control == CacheControl::ForceRecache {
        debug!("[{}]: forced recache", out_label);
        miss_type = MissType::ForcedRecache;
    } else {
        match storage.get(&key) {
            Ok(Some(entry)) => {
                if capabilities.hard_links && config.hard_links {
                    // The byte-entry backend can only copy; declared
                    // hard-link support is recorded but not exercised.
                    trace!("[{}]: hard links permitted, restoring by copy", out_label);
                }
                match restore_outputs(&entry, &build_files) {
                    Ok(()) => {
                        let duration = start.elapsed();
                        debug!(
                            "[{}]: cache hit in {}",
                            out_label,
                            fmt_duration_as_secs(&duration)
                        );
                        let output = Output {
                            status: exit_status(entry.exit_code),
                            stdout: entry.stdout,
                            stderr: entry.stderr,
                        };
                        return Ok((CompileResult::CacheHit(duration), output));
                    }
                    Err(e) => {
                        warn!("[{}]: bad cache entry, recompiling: {}", out_label, e);
                        miss_type = MissType::CacheReadError;
                    }
                }
            }
            Ok(None) => {
                debug!("[{}]: cache miss", out_label);
            }
            Err(e) => {
                warn!("[{}]: cache read failed, recompiling: {}", out_label, e);
                miss_type = MissType::CacheReadError;
            }
        }
    }

    let output = run_real_tool(creator, wrapper)?;
    if !output.status.success() {
        debug!(
            "[{}]: compiler failed with {:?}, not storing",
            out_label,
            output.status.code()
        );
        return Ok((CompileResult::CompileFailed, output));
    }
    let entry = match collect_outputs(&build_files, &output) {
        Ok(entry) => entry,
        Err(e) => {
            error!("[{}]: not caching: {:#}", out_label, e);
            return Ok((CompileResult::NotCached, output));
        }
    };
    if let Err(e) = storage.put(&key, entry) {
        warn!("[{}]: cache write failed: {}", out_label, e);
        return Ok((CompileResult::NotCached, output));
    }
    let duration = start.elapsed();
    debug!(
        "[{}]: compiled and stored in {}",
        out_label,
        fmt_duration_as_secs(&duration)
    );
    Ok((CompileResult::CacheMiss(miss_type, duration), output))
}
