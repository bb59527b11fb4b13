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

//! Implements the `run` command.

use std::fmt::Write;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};
use signal_hook::consts::signal::{SIGINT, SIGTERM};

use zonefarm::builder;
use zonefarm::command::SystemRunner;
use zonefarm::layout::Layout;
use zonefarm::materialize::{self, Materializer};
use zonefarm::orchestrate::Orchestrator;
use zonefarm::render::AskamaRenderer;
use zonefarm::topology::Topology;
use zonefarm::update::UpdateDriver;

use crate::args::RunArgs;
use crate::config::{self, Config};

/// Runs the `run` command.
pub fn run(args: RunArgs) {
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(Env::new().default_filter_or(default_filter));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
    info!("Exiting with success.");
}

fn try_running(run_args: RunArgs) -> Result<()> {
    info!(
        "Zonefarm v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    let config = if let Some(ref config_path) = run_args.config {
        info!("Loading the configuration from {}.", config_path.display());
        config::load_from_path(config_path, &run_args)
            .context("failed to load the configuration")?
    } else {
        config::load_from_args(&run_args)
    };

    // The topology is derived (and the configuration checked) before
    // anything on disk is touched.
    let topology =
        builder::build(&config.topology_config()).context("the configuration is invalid")?;
    let layout = Layout::new(config.chroot_dir()).context("failed to locate the tree directory")?;

    materialize::clean(&layout).context("failed to remove the previous trees")?;
    Materializer::new(&layout, &AskamaRenderer)
        .materialize(&topology)
        .context("failed to build the nameserver trees")?;
    info!(
        "Built {} nameserver trees under {}.",
        topology.nameservers().count(),
        layout.root().display(),
    );

    let mut runner = SystemRunner;
    if let Some(ref nameserver_path) = config.nameserver_path {
        Orchestrator::new(&layout, nameserver_path, config.use_chroot)
            .start(&topology, &mut runner)
            .context("failed to start the nameservers")?;
    }

    if let Some(mut driver) = make_update_driver(&config, &topology) {
        let stop = set_up_signal_handling().context("failed to set up signal handling")?;
        info!("Starting updates; send SIGINT or SIGTERM to stop.");
        driver
            .run(&AskamaRenderer, &mut runner, &stop)
            .context("failed to submit an update")?;
    }
    Ok(())
}

fn make_update_driver(config: &Config, topology: &Topology) -> Option<UpdateDriver> {
    let updates = &config.updates;
    updates.nsupdate_path.as_ref().map(|nsupdate_path| {
        UpdateDriver::new(
            nsupdate_path,
            &updates.statements_path,
            topology.master().ip(),
            topology.master_zone_names(),
            Duration::from_secs(updates.interval),
        )
        .keep_going(updates.keep_going)
    })
}

/// Sets up a flag that is raised by SIGINT or SIGTERM. A second signal
/// terminates the process immediately.
fn set_up_signal_handling() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(sig, 1, stop.clone())?;
        signal_hook::flag::register(sig, stop.clone())?;
    }
    Ok(stop)
}
