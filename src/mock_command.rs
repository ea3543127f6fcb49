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

//! The port through which the core spawns compiler subprocesses, plus mock
//! implementations so wrapper probes are testable without real compilers.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::{Arc, Mutex};

pub trait CommandChild {
    fn wait_with_output(self) -> io::Result<Output>;
}

pub trait RunCommand {
    type C: CommandChild;

    fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self;
    fn args<S: AsRef<OsStr>>(&mut self, args: &[S]) -> &mut Self;
    fn stdin(&mut self, cfg: Stdio) -> &mut Self;
    fn stdout(&mut self, cfg: Stdio) -> &mut Self;
    fn stderr(&mut self, cfg: Stdio) -> &mut Self;
    fn spawn(&mut self) -> io::Result<Self::C>;
}

pub trait CommandCreator: Clone {
    type Cmd: RunCommand;

    fn new_command<S: AsRef<OsStr>>(&self, program: S) -> Self::Cmd;
}

impl CommandChild for Child {
    fn wait_with_output(self) -> io::Result<Output> {
        Child::wait_with_output(self)
    }
}

impl RunCommand for Command {
    type C = Child;

    fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Command {
        Command::arg(self, arg)
    }
    fn args<S: AsRef<OsStr>>(&mut self, args: &[S]) -> &mut Command {
        Command::args(self, args)
    }
    fn stdin(&mut self, cfg: Stdio) -> &mut Command {
        Command::stdin(self, cfg)
    }
    fn stdout(&mut self, cfg: Stdio) -> &mut Command {
        Command::stdout(self, cfg)
    }
    fn stderr(&mut self, cfg: Stdio) -> &mut Command {
        Command::stderr(self, cfg)
    }
    fn spawn(&mut self) -> io::Result<Child> {
        Command::spawn(self)
    }
}

/// The production `CommandCreator`: plain `std::process` commands.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandCreator;

impl CommandCreator for ProcessCommandCreator {
    type Cmd = Command;

    fn new_command<S: AsRef<OsStr>>(&self, program: S) -> Command {
        Command::new(program)
    }
}

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// A fake process whose output is determined either up front or by a
/// callback run with the arguments the command was given. Callbacks let
/// tests emulate compilers that write files (dep-info, object files).
pub struct MockChild {
    output: io::Result<Output>,
}

impl MockChild {
    pub fn new<O: AsRef<[u8]>, E: AsRef<[u8]>>(status: ExitStatus, stdout: O, stderr: E) -> MockChild {
        MockChild {
            output: Ok(Output {
                status,
                stdout: stdout.as_ref().to_vec(),
                stderr: stderr.as_ref().to_vec(),
            }),
        }
    }

    pub fn with_error(err: io::Error) -> MockChild {
        MockChild { output: Err(err) }
    }
}

impl CommandChild for MockChild {
    fn wait_with_output(self) -> io::Result<Output> {
        self.output
    }
}

enum ChildOrCall {
    Child(io::Result<MockChild>),
    Call(Box<dyn FnMut(&[OsString]) -> io::Result<MockChild> + Send>),
}

pub struct MockCommand {
    child: Option<ChildOrCall>,
    /// The arguments passed to the command, for callback children.
    pub args: Vec<OsString>,
}

impl RunCommand for MockCommand {
    type C = MockChild;

    fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut MockCommand {
        self.args.push(arg.as_ref().to_owned());
        self
    }
    fn args<S: AsRef<OsStr>>(&mut self, args: &[S]) -> &mut MockCommand {
        self.args.extend(args.iter().map(|a| a.as_ref().to_owned()));
        self
    }
    fn stdin(&mut self, _cfg: Stdio) -> &mut MockCommand {
        self
    }
    fn stdout(&mut self, _cfg: Stdio) -> &mut MockCommand {
        self
    }
    fn stderr(&mut self, _cfg: Stdio) -> &mut MockCommand {
        self
    }
    fn spawn(&mut self) -> io::Result<MockChild> {
        match self.child.take().unwrap() {
            ChildOrCall::Child(child) => child,
            ChildOrCall::Call(mut call) => call(&self.args),
        }
    }
}

/// Hands out queued `MockCommand`s in FIFO order.
#[derive(Default)]
pub struct MockCommandCreator {
    /// Commands and programs observed, for assertions.
    pub programs: Vec<OsString>,
    children: Vec<ChildOrCall>,
}

impl MockCommandCreator {
    pub fn new() -> MockCommandCreator {
        MockCommandCreator::default()
    }

    /// The next command created will spawn `child`.
    pub fn next_command_spawns(&mut self, child: io::Result<MockChild>) {
        self.children.push(ChildOrCall::Child(child));
    }

    /// The next command created will call `call` with its accumulated
    /// arguments to produce a child.
    pub fn next_command_calls<C>(&mut self, call: C)
    where
        C: FnMut(&[OsString]) -> io::Result<MockChild> + Send + 'static,
    {
        self.children.push(ChildOrCall::Call(Box::new(call)));
    }
}

impl CommandCreator for Arc<Mutex<MockCommandCreator>> {
    type Cmd = MockCommand;

    fn new_command<S: AsRef<OsStr>>(&self, program: S) -> MockCommand {
        let mut creator = self.lock().unwrap();
        assert!(
            !creator.children.is_empty(),
            "Too many calls to new_command, or not enough to next_command_spawns!"
        );
        creator.programs.push(program.as_ref().to_owned());
        let child = creator.children.remove(0);
        MockCommand {
            child: Some(child),
            args: vec![],
        }
    }
}

/// Convenience helpers for tests throughout the crate.
#[allow(dead_code)]
pub fn new_creator() -> Arc<Mutex<MockCommandCreator>> {
    Arc::new(Mutex::new(MockCommandCreator::new()))
}

#[allow(dead_code)]
pub fn next_command(creator: &Arc<Mutex<MockCommandCreator>>, child: io::Result<MockChild>) {
    creator.lock().unwrap().next_command_spawns(child);
}

#[allow(dead_code)]
pub fn next_command_calls<C>(creator: &Arc<Mutex<MockCommandCreator>>, call: C)
where
    C: FnMut(&[OsString]) -> io::Result<MockChild> + Send + 'static,
{
    creator.lock().unwrap().next_command_calls(call);
}

/// Run a command through a creator the way the wrappers do, spawning the
/// program at `exe` with `args`.
pub fn run_program<T, S>(creator: &T, exe: &Path, args: &[S]) -> crate::errors::Result<Output>
where
    T: CommandCreator,
    S: AsRef<OsStr>,
{
    let mut cmd = creator.new_command(exe);
    cmd.args(args);
    crate::util::run_input_output(cmd)
}

#[cfg(test)]
mod test {
    use super::*;

    fn spawn_output<T: CommandCreator>(creator: &T, program: &str) -> io::Result<Output> {
        creator.new_command(program).spawn().and_then(|c| c.wait_with_output())
    }

    #[test]
    fn test_mock_command_output() {
        let creator = new_creator();
        next_command(&creator, Ok(MockChild::new(exit_status(0), "hello", "error")));
        let output = spawn_output(&creator, "foo").unwrap();
        assert_eq!(Some(0), output.status.code());
        assert_eq!(b"hello".to_vec(), output.stdout);
        assert_eq!(b"error".to_vec(), output.stderr);
    }

    #[test]
    fn test_mock_command_callback_sees_args() {
        let creator = new_creator();
        next_command_calls(&creator, |args| {
            assert_eq!(args, &[OsString::from("-E"), OsString::from("foo.c")]);
            Ok(MockChild::new(exit_status(0), "preprocessed", ""))
        });
        let mut cmd = creator.new_command("cc");
        cmd.arg("-E").arg("foo.c");
        let output = cmd.spawn().unwrap().wait_with_output().unwrap();
        assert_eq!(b"preprocessed".to_vec(), output.stdout);
    }

    #[test]
    fn test_mock_spawn_error() {
        let creator = new_creator();
        next_command(
            &creator,
            Ok(MockChild::with_error(io::Error::new(io::ErrorKind::Other, "error"))),
        );
        let err = spawn_output(&creator, "foo").err().unwrap();
        assert_eq!(io::ErrorKind::Other, err.kind());
    }

    #[test]
    fn test_exit_status_codes() {
        assert_eq!(exit_status(0).code(), Some(0));
        assert_eq!(exit_status(1).code(), Some(1));
        assert!(exit_status(0).success());
        assert!(!exit_status(2).success());
    }
}
