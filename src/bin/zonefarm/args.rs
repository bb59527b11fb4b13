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

//! Implements command-line argument parsing.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use zonefarm::builder::IpPrefix;

/// Parses the command line arguemnts.
pub fn parse() -> Args {
    Args::parse()
}

/// Builds, starts, and exercises a multi-tier DNS deployment for local
/// testing
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the nameserver trees, then optionally start nameservers
    /// and drive updates
    Run(RunArgs),
}

/// Options for the `run` command. Options given here override those in
/// the configuration file; anything given in neither place takes its
/// default value.
#[derive(Debug, Default, Parser)]
pub struct RunArgs {
    /// Set the configuration file to use
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set the directory the nameserver trees are built in
    #[clap(long, value_name = "DIR")]
    pub chroot_dir: Option<PathBuf>,

    /// Set the number of top-level zones
    #[clap(long, value_name = "N")]
    pub zone_count: Option<usize>,

    /// Set the number of test records per zone
    #[clap(long, value_name = "N")]
    pub record_count: Option<usize>,

    /// Set the top-level domain of the generated zones
    #[clap(long, value_name = "LABEL")]
    pub tld: Option<String>,

    /// Set the master's IP address
    #[clap(long, value_name = "IP")]
    pub master_ip: Option<Ipv4Addr>,

    /// Set the root nameserver's IP address
    #[clap(long, value_name = "IP")]
    pub root_ns_ip: Option<Ipv4Addr>,

    /// Set the number of secondaries
    #[clap(long, value_name = "N")]
    pub xfr_count: Option<usize>,

    /// Set the IP prefix of the secondaries
    #[clap(long, value_name = "A.B.C", value_parser)]
    pub xfr_ip_prefix: Option<IpPrefix>,

    /// Set the number of resolvers
    #[clap(long, value_name = "N")]
    pub resolver_count: Option<usize>,

    /// Set the IP prefix of the resolvers
    #[clap(long, value_name = "A.B.C", value_parser)]
    pub resolver_ip_prefix: Option<IpPrefix>,

    /// Set the number of subdomain resolvers (0 disables subdomains)
    #[clap(long, value_name = "N")]
    pub subdomain_resolver_count: Option<usize>,

    /// Set the IP prefix of the subdomain resolvers
    #[clap(long, value_name = "A.B.C", value_parser)]
    pub subdomain_resolver_ip_prefix: Option<IpPrefix>,

    /// Set the number of recursive nameservers
    #[clap(long, value_name = "N")]
    pub recursive_ns_count: Option<usize>,

    /// Set the IP prefix of the recursive nameservers
    #[clap(long, value_name = "A.B.C", value_parser)]
    pub recursive_ns_prefix: Option<IpPrefix>,

    /// Set the SOA refresh interval, in seconds
    #[clap(long, value_name = "SECONDS")]
    pub refresh: Option<u64>,

    /// Set the SOA retry interval, in seconds
    #[clap(long, value_name = "SECONDS")]
    pub retry: Option<u64>,

    /// Set the SOA expire time, in seconds
    #[clap(long, value_name = "SECONDS")]
    pub expire: Option<u64>,

    /// Set the negative caching TTL, in seconds
    #[clap(long, value_name = "SECONDS")]
    pub negative_ttl: Option<u64>,

    /// Start the nameserver binary at this path for every tree
    #[clap(long, value_name = "PATH")]
    pub ns_path: Option<PathBuf>,

    /// Submit updates continuously with the nsupdate binary at this path
    #[clap(long, value_name = "PATH")]
    pub nsupdate_path: Option<PathBuf>,

    /// Set the time between update cycles, in seconds
    #[clap(long, value_name = "SECONDS")]
    pub nsupdate_interval: Option<u64>,

    /// Keep updating when an update fails
    #[clap(long)]
    pub keep_going: bool,

    /// Run nameservers without confining them to their trees
    #[clap(long)]
    pub no_chroots: bool,

    /// Log debugging information
    #[clap(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_options() {
        let args = Args::parse_from([
            "zonefarm",
            "run",
            "--zone-count",
            "3",
            "--xfr-ip-prefix",
            "10.0.2",
            "--no-chroots",
        ]);
        let Command::Run(run_args) = args.command;
        assert_eq!(run_args.zone_count, Some(3));
        assert_eq!(run_args.xfr_ip_prefix, Some(IpPrefix([10, 0, 2])));
        assert!(run_args.no_chroots);
        assert_eq!(run_args.resolver_count, None);
    }

    #[test]
    fn rejects_malformed_prefixes() {
        assert!(Args::try_parse_from(["zonefarm", "run", "--resolver-ip-prefix", "10.0"]).is_err());
    }
}
