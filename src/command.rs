// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Execution of external commands.
//!
//! Every external program (the nameserver, the update tool, and the
//! system utilities used to manage processes and addresses) is run
//! through a [`CommandRunner`]. Each call site states with an
//! [`OnFailure`] whether a failing command aborts the run.

use std::fmt;
use std::io;
use std::process;

use log::{debug, error};

/// A command line: a program and its arguments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What a failing command means for the run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OnFailure {
    /// The failure is returned to the caller.
    Abort,
    /// The failure is logged and otherwise ignored.
    Tolerate,
}

/// Runs external commands.
pub trait CommandRunner {
    /// Runs `command` to completion. A failure is always logged; it is
    /// returned only if `on_failure` is [`OnFailure::Abort`].
    fn run(&mut self, command: &CommandLine, on_failure: OnFailure) -> Result<(), Error>;
}

/// A [`CommandRunner`] that spawns real processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &CommandLine, on_failure: OnFailure) -> Result<(), Error> {
        debug!("Running command: {}", command);
        let result = match process::Command::new(&command.program)
            .args(&command.args)
            .output()
        {
            Ok(output) => {
                // Standard error follows standard output, as if the
                // two streams had been merged.
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                if output.status.success() {
                    if !combined.is_empty() {
                        debug!("Command output: {}", combined.trim_end());
                    }
                    Ok(())
                } else {
                    Err(Error {
                        command: command.clone(),
                        kind: ErrorKind::Failed {
                            status: output.status,
                            output: combined,
                        },
                    })
                }
            }
            Err(e) => Err(Error {
                command: command.clone(),
                kind: ErrorKind::Spawn(e),
            }),
        };
        settle(result, on_failure)
    }
}

/// Applies the failure policy to the result of running a command.
/// Runner implementations share this so that failures are logged the
/// same way everywhere.
pub fn settle(result: Result<(), Error>, on_failure: OnFailure) -> Result<(), Error> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{}", e);
            match on_failure {
                OnFailure::Abort => Err(e),
                OnFailure::Tolerate => Ok(()),
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// A command that could not be run or that exited unsuccessfully.
#[derive(Debug)]
pub struct Error {
    command: CommandLine,
    kind: ErrorKind,
}

impl Error {
    pub fn new(command: CommandLine, kind: ErrorKind) -> Self {
        Self { command, kind }
    }

    /// Returns the command that failed.
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    /// The program could not be started.
    Spawn(io::Error),
    /// The program exited unsuccessfully. `output` holds its standard
    /// output followed by its standard error.
    Failed {
        status: process::ExitStatus,
        output: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Spawn(_) => write!(f, "failed to run `{}`", self.command),
            ErrorKind::Failed { status, output } => {
                write!(f, "`{}` failed ({})", self.command, status)?;
                let output = output.trim_end();
                if !output.is_empty() {
                    write!(f, ":\n{}", output)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Spawn(e) => Some(e),
            ErrorKind::Failed { .. } => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
