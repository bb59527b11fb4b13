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

//! Starting a nameserver process for every node of a materialized
//! topology.

use std::path::Path;
use std::thread;
use std::time::Duration;

use log::info;

use crate::command::{self, CommandLine, CommandRunner, OnFailure};
use crate::layout::{Layout, CONFIG_PATH};
use crate::topology::{Nameserver, Topology};

/// How long to wait after asking previously running nameservers to
/// terminate. Nothing checks that they actually did.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// The program name to terminate if the nameserver path has no file
/// name.
const DEFAULT_NAMESERVER_PROGRAM: &str = "named";

/// Replaces any running nameservers with one per node of a topology.
#[derive(Clone, Debug)]
pub struct Orchestrator<'a> {
    layout: &'a Layout,
    nameserver_path: &'a Path,
    use_chroot: bool,
    settle_delay: Duration,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator starting `nameserver_path` on the trees
    /// of `layout`. With `use_chroot`, every nameserver is confined to
    /// its own tree.
    pub fn new(layout: &'a Layout, nameserver_path: &'a Path, use_chroot: bool) -> Self {
        Self {
            layout,
            nameserver_path,
            use_chroot,
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Overrides [`SETTLE_DELAY`].
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Terminates running nameservers, waits for them to settle,
    /// configures a loopback alias for every nameserver, and starts the
    /// nameservers. The steps happen in this order. Only the
    /// termination step tolerates failure.
    pub fn start<R>(&self, topology: &Topology, runner: &mut R) -> Result<(), command::Error>
    where
        R: CommandRunner + ?Sized,
    {
        self.kill_running_nameservers(runner)?;
        thread::sleep(self.settle_delay);
        self.configure_ips(topology, runner)?;
        self.start_nameservers(topology, runner)
    }

    fn kill_running_nameservers<R>(&self, runner: &mut R) -> Result<(), command::Error>
    where
        R: CommandRunner + ?Sized,
    {
        let program = self
            .nameserver_path
            .file_name()
            .map_or(DEFAULT_NAMESERVER_PROGRAM.into(), |name| {
                name.to_string_lossy().into_owned()
            });
        info!("Stopping running {} processes.", program);
        runner.run(&CommandLine::new("killall").arg(program), OnFailure::Tolerate)
    }

    fn configure_ips<R>(&self, topology: &Topology, runner: &mut R) -> Result<(), command::Error>
    where
        R: CommandRunner + ?Sized,
    {
        info!("Configuring IP addresses.");
        for (i, ns) in topology.nameservers().enumerate() {
            let command = CommandLine::new("ifconfig")
                .arg(format!("lo:{}", i))
                .arg(ns.ip().to_string());
            runner.run(&command, OnFailure::Abort)?;
        }
        Ok(())
    }

    fn start_nameservers<R>(
        &self,
        topology: &Topology,
        runner: &mut R,
    ) -> Result<(), command::Error>
    where
        R: CommandRunner + ?Sized,
    {
        info!("Starting nameservers.");
        for ns in topology.nameservers() {
            runner.run(&self.start_command(ns), OnFailure::Abort)?;
        }
        Ok(())
    }

    /// Returns the command line that starts the nameserver for `ns`.
    pub fn start_command(&self, ns: &Nameserver) -> CommandLine {
        let command = CommandLine::new(self.nameserver_path.display().to_string());
        if self.use_chroot {
            command
                .arg("-t")
                .arg(self.layout.node_dir(ns).display().to_string())
                .arg("-c")
                .arg(format!("/{}", CONFIG_PATH))
        } else {
            command
                .arg("-c")
                .arg(self.layout.config_path(ns).display().to_string())
        }
    }
}
