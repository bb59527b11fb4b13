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

//! The update driver, which keeps changing the test record of a set of
//! zones so that propagation through the topology can be observed.

use std::fmt;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::command::{self, CommandLine, CommandRunner, OnFailure};
use crate::render::{self, Document, Renderer, UpdateStatements};
use crate::topology::UPDATE_RECORD_NAME;

/// The TTL given to each new value of the test record.
pub const UPDATE_TTL: u32 = 60;

/// How often a sleeping driver checks whether it has been stopped.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Submits dynamic updates that replace the value of the test record
/// in every target zone, once per cycle.
///
/// The value starts at 1 and increases by one with every completed
/// cycle; it lives only in the driver and is never read back from a
/// nameserver.
#[derive(Clone, Debug)]
pub struct UpdateDriver {
    nsupdate_path: PathBuf,
    statements_path: PathBuf,
    master_ip: Ipv4Addr,
    zones: Vec<String>,
    interval: Duration,
    on_failure: OnFailure,
    value: u64,
}

impl UpdateDriver {
    /// Creates a driver that submits updates for `zones` to the master
    /// at `master_ip` by running `nsupdate_path` on a statements file
    /// written to `statements_path`. Cycles are `interval` apart.
    pub fn new(
        nsupdate_path: impl Into<PathBuf>,
        statements_path: impl Into<PathBuf>,
        master_ip: Ipv4Addr,
        zones: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            nsupdate_path: nsupdate_path.into(),
            statements_path: statements_path.into(),
            master_ip,
            zones,
            interval,
            on_failure: OnFailure::Abort,
            value: 1,
        }
    }

    /// With `keep_going`, a failed submission is logged and the driver
    /// moves on to the next zone instead of stopping.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.on_failure = if keep_going {
            OnFailure::Tolerate
        } else {
            OnFailure::Abort
        };
        self
    }

    /// Returns the current value of the test record, i.e., the value
    /// the next cycle replaces.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Runs cycles until `stop` is set. The flag is checked after every
    /// cycle and while sleeping between cycles, so a cycle that has
    /// begun always completes.
    pub fn run<D, R>(
        &mut self,
        renderer: &D,
        runner: &mut R,
        stop: &AtomicBool,
    ) -> Result<(), Error>
    where
        D: Renderer + ?Sized,
        R: CommandRunner + ?Sized,
    {
        while !stop.load(Ordering::Relaxed) {
            self.run_cycle(renderer, runner)?;
            sleep_unless_stopped(self.interval, stop);
        }
        info!("Update driver stopped with the test record at {}.", self.value);
        Ok(())
    }

    /// Runs a single cycle: one update per target zone, in order.
    pub fn run_cycle<D, R>(&mut self, renderer: &D, runner: &mut R) -> Result<(), Error>
    where
        D: Renderer + ?Sized,
        R: CommandRunner + ?Sized,
    {
        info!(
            "Updating test TXT record from {} to {}",
            self.value,
            self.value + 1,
        );
        for zone in &self.zones {
            self.submit(zone, renderer, runner)?;
        }
        self.value += 1;
        Ok(())
    }

    fn submit<D, R>(&self, zone: &str, renderer: &D, runner: &mut R) -> Result<(), Error>
    where
        D: Renderer + ?Sized,
        R: CommandRunner + ?Sized,
    {
        let statements = renderer
            .render(&Document::Update(UpdateStatements {
                master_ip: self.master_ip,
                zone,
                record: UPDATE_RECORD_NAME,
                ttl: UPDATE_TTL,
                old_value: self.value,
                new_value: self.value + 1,
            }))
            .map_err(Error::Render)?;
        // Blank lines would end the transaction early.
        let statements = statements.replace("\n\n", "\n");

        debug!("Submitting an update for {}.", zone);
        fs::write(&self.statements_path, statements).map_err(|source| Error::Io {
            path: self.statements_path.clone(),
            source,
        })?;
        let command = CommandLine::new(self.nsupdate_path.display().to_string())
            .arg(self.statements_path.display().to_string());
        runner.run(&command, self.on_failure).map_err(Error::Command)
    }

    /// Returns where the update statements are written.
    pub fn statements_path(&self) -> &Path {
        &self.statements_path
    }
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(STOP_POLL_INTERVAL.min(deadline - now));
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that stop the update driver.
#[derive(Debug)]
pub enum Error {
    Render(render::Error),
    Io { path: PathBuf, source: io::Error },
    Command(command::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Render(e) => e.fmt(f),
            Self::Io { path, .. } => write!(f, "failed to write {}", path.display()),
            Self::Command(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => std::error::Error::source(e),
            Self::Io { source, .. } => Some(source),
            Self::Command(e) => std::error::Error::source(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
