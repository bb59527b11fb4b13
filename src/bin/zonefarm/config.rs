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

//! Implements the configuration file.

use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use zonefarm::builder::{IpPrefix, TopologyConfig};
use zonefarm::topology::ZoneTiming;

use crate::args::RunArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration from the file given by `path`, then applies
/// the overrides in `args`.
///
/// A relative `chroot_dir` in the file is interpreted relative to the
/// configuration file's directory.
pub fn load_from_path(path: impl AsRef<Path>, args: &RunArgs) -> Result<Config> {
    let path = path.as_ref();
    let raw_config = fs::read_to_string(path).context("failed to read the configuration file")?;
    let mut config: Config =
        toml::from_str(&raw_config).context("failed to parse the configuration file")?;

    if let (Some(dir), Some(chroot_dir)) = (path.parent(), config.chroot_dir.as_mut()) {
        if chroot_dir.is_relative() {
            *chroot_dir = dir.join(&*chroot_dir);
        }
    }

    config.apply_args(args);
    log_config_summary(&config);
    Ok(config)
}

/// Loads the configuration from the parsed command line arguments
/// given by `args`.
pub fn load_from_args(args: &RunArgs) -> Config {
    let mut config = Config::default();
    config.apply_args(args);
    log_config_summary(&config);
    config
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        // Don't compute the message if it will never be printed.
        return;
    }

    let topology = &config.topology;
    let optional = |path: &Option<PathBuf>| match path {
        Some(path) => path.display().to_string(),
        None => String::from("disabled"),
    };
    debug!(
        "Configuration loaded:\n\
         Trees:               {} ({})\n\
         Zones:               {} x {} test records under .{}\n\
         Master / root:       {} / {}\n\
         Secondaries:         {} at {}.*\n\
         Resolvers:           {} at {}.*\n\
         Subdomain resolvers: {} at {}.*\n\
         Recursive:           {} at {}.*\n\
         Nameserver:          {}\n\
         Updates:             {} every {}s",
        config.chroot_dir().display(),
        if config.use_chroot { "chroot" } else { "no chroot" },
        topology.zone_count,
        topology.record_count,
        topology.tld,
        topology.master_ip,
        topology.root_ip,
        topology.secondary_count,
        topology.secondary_ip_prefix.0,
        topology.resolver_count,
        topology.resolver_ip_prefix.0,
        topology.subdomain_resolver_count,
        topology.subdomain_resolver_ip_prefix.0,
        topology.recursive_count,
        topology.recursive_ip_prefix.0,
        optional(&config.nameserver_path),
        optional(&config.updates.nsupdate_path),
        config.updates.interval,
    );
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub chroot_dir: Option<PathBuf>,
    #[serde(default = "default_use_chroot")]
    pub use_chroot: bool,
    pub nameserver_path: Option<PathBuf>,
    #[serde(default)]
    pub topology: TopologySection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub updates: UpdateSection,
}

const DEFAULT_CHROOT_DIR: &str = "chroots";

fn default_use_chroot() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chroot_dir: None,
            use_chroot: default_use_chroot(),
            nameserver_path: None,
            topology: TopologySection::default(),
            timing: TimingSection::default(),
            updates: UpdateSection::default(),
        }
    }
}

impl Config {
    /// Returns the directory the nameserver trees are built in.
    pub fn chroot_dir(&self) -> &Path {
        self.chroot_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CHROOT_DIR))
    }

    /// Returns the configuration for the topology builder.
    pub fn topology_config(&self) -> TopologyConfig {
        let topology = &self.topology;
        TopologyConfig {
            zone_count: topology.zone_count,
            record_count: topology.record_count,
            tld: topology.tld.clone(),
            use_chroot: self.use_chroot,
            timing: ZoneTiming {
                refresh: Duration::from_secs(self.timing.refresh),
                retry: Duration::from_secs(self.timing.retry),
                expire: Duration::from_secs(self.timing.expire),
                negative_ttl: Duration::from_secs(self.timing.negative_ttl),
            },
            master_ip: topology.master_ip,
            root_ip: topology.root_ip,
            secondary_count: topology.secondary_count,
            secondary_ip_prefix: topology.secondary_ip_prefix.0,
            resolver_count: topology.resolver_count,
            resolver_ip_prefix: topology.resolver_ip_prefix.0,
            subdomain_resolver_count: topology.subdomain_resolver_count,
            subdomain_resolver_ip_prefix: topology.subdomain_resolver_ip_prefix.0,
            recursive_count: topology.recursive_count,
            recursive_ip_prefix: topology.recursive_ip_prefix.0,
        }
    }

    /// Overrides file values with those given on the command line.
    fn apply_args(&mut self, args: &RunArgs) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        if args.chroot_dir.is_some() {
            self.chroot_dir = args.chroot_dir.clone();
        }
        if args.no_chroots {
            self.use_chroot = false;
        }
        if args.ns_path.is_some() {
            self.nameserver_path = args.ns_path.clone();
        }

        let topology = &mut self.topology;
        set(&mut topology.zone_count, &args.zone_count);
        set(&mut topology.record_count, &args.record_count);
        set(&mut topology.tld, &args.tld);
        set(&mut topology.master_ip, &args.master_ip);
        set(&mut topology.root_ip, &args.root_ns_ip);
        set(&mut topology.secondary_count, &args.xfr_count);
        set(&mut topology.secondary_ip_prefix.0, &args.xfr_ip_prefix);
        set(&mut topology.resolver_count, &args.resolver_count);
        set(&mut topology.resolver_ip_prefix.0, &args.resolver_ip_prefix);
        set(
            &mut topology.subdomain_resolver_count,
            &args.subdomain_resolver_count,
        );
        set(
            &mut topology.subdomain_resolver_ip_prefix.0,
            &args.subdomain_resolver_ip_prefix,
        );
        set(&mut topology.recursive_count, &args.recursive_ns_count);
        set(&mut topology.recursive_ip_prefix.0, &args.recursive_ns_prefix);

        let timing = &mut self.timing;
        set(&mut timing.refresh, &args.refresh);
        set(&mut timing.retry, &args.retry);
        set(&mut timing.expire, &args.expire);
        set(&mut timing.negative_ttl, &args.negative_ttl);

        let updates = &mut self.updates;
        if args.nsupdate_path.is_some() {
            updates.nsupdate_path = args.nsupdate_path.clone();
        }
        set(&mut updates.interval, &args.nsupdate_interval);
        if args.keep_going {
            updates.keep_going = true;
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: TOPOLOGY                                    //
////////////////////////////////////////////////////////////////////////

/// The shape of the topology: how many of each nameserver, and where.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologySection {
    pub zone_count: usize,
    pub record_count: usize,
    pub tld: String,
    pub master_ip: Ipv4Addr,
    pub root_ip: Ipv4Addr,
    pub secondary_count: usize,
    pub secondary_ip_prefix: ConfigIpPrefix,
    pub resolver_count: usize,
    pub resolver_ip_prefix: ConfigIpPrefix,
    pub subdomain_resolver_count: usize,
    pub subdomain_resolver_ip_prefix: ConfigIpPrefix,
    pub recursive_count: usize,
    pub recursive_ip_prefix: ConfigIpPrefix,
}

impl Default for TopologySection {
    fn default() -> Self {
        let defaults = TopologyConfig::default();
        Self {
            zone_count: defaults.zone_count,
            record_count: defaults.record_count,
            tld: defaults.tld,
            master_ip: defaults.master_ip,
            root_ip: defaults.root_ip,
            secondary_count: defaults.secondary_count,
            secondary_ip_prefix: ConfigIpPrefix(defaults.secondary_ip_prefix),
            resolver_count: defaults.resolver_count,
            resolver_ip_prefix: ConfigIpPrefix(defaults.resolver_ip_prefix),
            subdomain_resolver_count: defaults.subdomain_resolver_count,
            subdomain_resolver_ip_prefix: ConfigIpPrefix(defaults.subdomain_resolver_ip_prefix),
            recursive_count: defaults.recursive_count,
            recursive_ip_prefix: ConfigIpPrefix(defaults.recursive_ip_prefix),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: TIMING                                      //
////////////////////////////////////////////////////////////////////////

/// The SOA timing values of generated zones, in seconds.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    pub refresh: u64,
    pub retry: u64,
    pub expire: u64,
    pub negative_ttl: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        let defaults = ZoneTiming::default();
        Self {
            refresh: defaults.refresh.as_secs(),
            retry: defaults.retry.as_secs(),
            expire: defaults.expire.as_secs(),
            negative_ttl: defaults.negative_ttl.as_secs(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: UPDATES                                     //
////////////////////////////////////////////////////////////////////////

/// The configuration of the update driver. Updates are only sent if
/// `nsupdate_path` is set.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateSection {
    pub nsupdate_path: Option<PathBuf>,
    pub interval: u64,
    pub keep_going: bool,
    pub statements_path: PathBuf,
}

impl Default for UpdateSection {
    fn default() -> Self {
        Self {
            nsupdate_path: None,
            interval: 1,
            keep_going: false,
            statements_path: PathBuf::from("/tmp/nsupdate_statements"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER ZONEFARM TYPES FOR SERDE                             //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type
/// from [`zonefarm`], using its [`FromStr`](std::str::FromStr)
/// implementation.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $description:literal) => {
        /// A macro-generated deserializable wrapper over a [`zonefarm`]
        /// type.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

make_serde_wrapper!(ConfigIpPrefix, IpPrefix, "IP prefix");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_partial_file_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            nameserver_path = "/usr/sbin/named"

            [topology]
            zone_count = 4
            secondary_ip_prefix = "10.0.2"

            [timing]
            refresh = 120
            "#,
        )
        .unwrap();
        let topology = config.topology_config();
        assert_eq!(topology.zone_count, 4);
        assert_eq!(topology.secondary_ip_prefix, IpPrefix([10, 0, 2]));
        assert_eq!(topology.resolver_count, 1);
        assert_eq!(topology.timing.refresh, Duration::from_secs(120));
        assert_eq!(topology.timing.retry, Duration::from_secs(30));
        assert!(topology.use_chroot);
        assert_eq!(config.chroot_dir(), Path::new("chroots"));
        assert!(config.updates.nsupdate_path.is_none());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_prefixes() {
        assert!(toml::from_str::<Config>("zones = 3").is_err());
        assert!(toml::from_str::<Config>("[topology]\nresolver_ip_prefix = \"1.2\"").is_err());
    }

    #[test]
    fn command_line_overrides_file_values() {
        let mut config: Config =
            toml::from_str("[topology]\nzone_count = 4\nrecord_count = 7").unwrap();
        config.apply_args(&RunArgs {
            zone_count: Some(9),
            no_chroots: true,
            nsupdate_interval: Some(3),
            ..RunArgs::default()
        });
        assert_eq!(config.topology.zone_count, 9);
        assert_eq!(config.topology.record_count, 7);
        assert!(!config.use_chroot);
        assert_eq!(config.updates.interval, 3);
    }

    #[test]
    fn command_line_defaults_match_the_builder() {
        let config = load_from_args(&RunArgs::default());
        assert_eq!(config.topology_config(), TopologyConfig::default());
    }
}
