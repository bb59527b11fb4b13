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

//! Construction of a [`Topology`] from a [`TopologyConfig`].

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use log::debug;

use crate::topology::{
    MasterZone, Nameserver, NsRecord, Role, RootZone, SlaveZone, Topology, Zone, ZoneTiming,
    ROOT_NAMESERVER_NAME,
};

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// The inputs from which a [`Topology`] is derived.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TopologyConfig {
    pub zone_count: usize,
    pub record_count: usize,
    pub tld: String,
    pub use_chroot: bool,
    pub timing: ZoneTiming,

    pub master_ip: Ipv4Addr,
    pub root_ip: Ipv4Addr,

    pub secondary_count: usize,
    pub secondary_ip_prefix: IpPrefix,
    pub resolver_count: usize,
    pub resolver_ip_prefix: IpPrefix,
    pub subdomain_resolver_count: usize,
    pub subdomain_resolver_ip_prefix: IpPrefix,
    pub recursive_count: usize,
    pub recursive_ip_prefix: IpPrefix,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            zone_count: 2,
            record_count: 1000,
            tld: String::from("com"),
            use_chroot: true,
            timing: ZoneTiming::default(),
            master_ip: Ipv4Addr::new(127, 1, 1, 1),
            root_ip: Ipv4Addr::new(127, 1, 1, 2),
            secondary_count: 2,
            secondary_ip_prefix: IpPrefix([127, 2, 2]),
            resolver_count: 1,
            resolver_ip_prefix: IpPrefix([127, 3, 3]),
            subdomain_resolver_count: 0,
            subdomain_resolver_ip_prefix: IpPrefix([127, 4, 4]),
            recursive_count: 1,
            recursive_ip_prefix: IpPrefix([127, 5, 5]),
        }
    }
}

impl TopologyConfig {
    /// Checks the configuration. [`build`] calls this before it
    /// constructs anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zone_count < 1 {
            return Err(ConfigError::NoZones);
        }
        if self.record_count < 1 {
            return Err(ConfigError::NoTestRecords);
        }

        let timings = [
            ("refresh", self.timing.refresh),
            ("retry", self.timing.retry),
            ("expire", self.timing.expire),
            ("negative TTL", self.timing.negative_ttl),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroTiming(*name));
        }

        let pools = [
            ("secondaries", self.secondary_count),
            ("resolvers", self.resolver_count),
            ("subdomain resolvers", self.subdomain_resolver_count),
            ("recursive nameservers", self.recursive_count),
        ];
        if let Some((role, count)) = pools
            .iter()
            .find(|(_, count)| *count > IpPrefix::MAX_HOSTS)
        {
            return Err(ConfigError::PrefixExhausted {
                role: *role,
                count: *count,
            });
        }
        self.check_addresses()?;

        if self.tld.is_empty() {
            return Err(ConfigError::EmptyTld);
        }
        Ok(())
    }

    /// Checks that no two nameservers would be assigned the same
    /// address. Must run after the pool sizes have been checked.
    fn check_addresses(&self) -> Result<(), ConfigError> {
        let pools = [
            (self.secondary_ip_prefix, self.secondary_count, "secondary"),
            (self.resolver_ip_prefix, self.resolver_count, "resolver"),
            (
                self.subdomain_resolver_ip_prefix,
                self.subdomain_resolver_count,
                "subdomain resolver",
            ),
            (self.recursive_ip_prefix, self.recursive_count, "recursive nameserver"),
        ];
        let singles = [(self.master_ip, "master"), (self.root_ip, "root")];
        let assigned = singles.into_iter().chain(
            pools
                .into_iter()
                .flat_map(|(prefix, count, role)| (0..count).map(move |i| (prefix.host(i), role))),
        );

        let mut seen = HashMap::new();
        for (address, role) in assigned {
            if let Some(first) = seen.insert(address, role) {
                return Err(ConfigError::DuplicateAddress {
                    address,
                    first,
                    second: role,
                });
            }
        }
        Ok(())
    }
}

/// The first three octets of an IPv4 address. Instance `i` of a role is
/// assigned `prefix.(i + 1)`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct IpPrefix(pub [u8; 3]);

impl IpPrefix {
    /// The most instances a single prefix can address.
    pub const MAX_HOSTS: usize = 255;

    /// Returns the address of the 0-based `index`th host.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`IpPrefix::MAX_HOSTS`].
    pub fn host(self, index: usize) -> Ipv4Addr {
        let [a, b, c] = self.0;
        let last = u8::try_from(index + 1).expect("host index out of range for prefix");
        Ipv4Addr::new(a, b, c, last)
    }
}

impl FromStr for IpPrefix {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut octets = [0; 3];
        let mut parts = text.split('.');
        for octet in &mut octets {
            *octet = parts
                .next()
                .ok_or("an IP prefix needs three octets")?
                .parse()
                .or(Err("IP prefix octets must be integers from 0 to 255"))?;
        }
        if parts.next().is_some() {
            Err("an IP prefix has exactly three octets")
        } else {
            Ok(Self(octets))
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

/// Errors caused by an unusable [`TopologyConfig`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    NoZones,
    NoTestRecords,
    ZeroTiming(&'static str),
    PrefixExhausted { role: &'static str, count: usize },
    DuplicateAddress {
        address: Ipv4Addr,
        first: &'static str,
        second: &'static str,
    },
    EmptyTld,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoZones => f.write_str("at least one zone needs to be configured"),
            Self::NoTestRecords => f.write_str("at least one test record needs to be configured"),
            Self::ZeroTiming(name) => write!(f, "the zone {} value must be positive", name),
            Self::PrefixExhausted { role, count } => write!(
                f,
                "{} {} cannot be addressed within one prefix (the maximum is {})",
                count,
                role,
                IpPrefix::MAX_HOSTS,
            ),
            Self::DuplicateAddress {
                address,
                first,
                second,
            } => write!(
                f,
                "a {} and a {} would both be assigned {}",
                first, second, address,
            ),
            Self::EmptyTld => f.write_str("the top-level domain must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

////////////////////////////////////////////////////////////////////////
// CONSTRUCTION                                                       //
////////////////////////////////////////////////////////////////////////

/// Builds the topology described by `config`. Nothing is constructed
/// unless the configuration passes [`TopologyConfig::validate`].
pub fn build(config: &TopologyConfig) -> Result<Topology, ConfigError> {
    config.validate()?;

    let pool = |prefix: IpPrefix, count: usize, base: &str, role: Role| -> Vec<Nameserver> {
        (0..count)
            .map(|i| {
                let name = format!("{}{}", base, i);
                Nameserver::new(name, prefix.host(i), role, config.use_chroot)
            })
            .collect()
    };

    let mut master = Nameserver::new(
        "master".into(),
        config.master_ip,
        Role::Master,
        config.use_chroot,
    );
    let mut secondaries = pool(
        config.secondary_ip_prefix,
        config.secondary_count,
        "secondary",
        Role::Secondary,
    );
    let mut resolvers = pool(
        config.resolver_ip_prefix,
        config.resolver_count,
        "resolver",
        Role::Resolver,
    );

    // The top-level zones, advertising the whole authoritative tier.
    let zone_names: Vec<String> = (0..config.zone_count)
        .map(|i| format!("zone{}.{}", i, config.tld))
        .collect();
    let authoritative_tier: Vec<NsRecord> = [&master]
        .into_iter()
        .chain(&secondaries)
        .chain(&resolvers)
        .map(Nameserver::ns_record)
        .collect();
    let master_zones: Vec<MasterZone> = zone_names
        .iter()
        .map(|name| {
            MasterZone::new(
                name.clone(),
                authoritative_tier.clone(),
                config.timing,
                config.record_count,
            )
        })
        .collect();
    master.extend_zones(master_zones.iter().cloned().map(Zone::Master));

    // Secondaries transfer from the master; resolvers transfer from the
    // secondaries. Each nameserver gets zone objects of its own.
    for secondary in &mut secondaries {
        secondary.extend_zones(slave_zones(&zone_names, &[config.master_ip]));
    }
    let secondary_ips: Vec<Ipv4Addr> = secondaries.iter().map(Nameserver::ip).collect();
    for resolver in &mut resolvers {
        resolver.extend_zones(slave_zones(&zone_names, &secondary_ips));
    }

    // Optional delegated subdomains, reached from the resolvers through
    // stub zones.
    let mut subdomain_resolvers = Vec::new();
    if config.subdomain_resolver_count > 0 {
        subdomain_resolvers = pool(
            config.subdomain_resolver_ip_prefix,
            config.subdomain_resolver_count,
            "sub",
            Role::Master,
        );
        let sub_names: Vec<String> = zone_names
            .iter()
            .map(|name| format!("sub.{}", name))
            .collect();
        let sub_tier: Vec<NsRecord> = subdomain_resolvers
            .iter()
            .map(Nameserver::ns_record)
            .collect();
        let sub_ips: Vec<Ipv4Addr> = subdomain_resolvers.iter().map(Nameserver::ip).collect();
        for sub in &mut subdomain_resolvers {
            sub.extend_zones(sub_names.iter().map(|name| {
                Zone::Master(MasterZone::new(
                    name.clone(),
                    sub_tier.clone(),
                    config.timing,
                    config.record_count,
                ))
            }));
        }
        for resolver in &mut resolvers {
            resolver.extend_zones(sub_names.iter().map(|name| {
                Zone::Stub(SlaveZone {
                    name: name.clone(),
                    master_ips: sub_ips.clone(),
                })
            }));
        }
    }

    // The root delegates every top-level zone to the resolver tier.
    let mut root = Nameserver::new(
        ROOT_NAMESERVER_NAME.into(),
        config.root_ip,
        Role::Master,
        config.use_chroot,
    );
    let root_zone = RootZone {
        root: root.ns_record(),
        timing: config.timing,
    };
    root.extend_zones([Zone::Root(root_zone)]);
    let resolver_tier: Vec<NsRecord> = resolvers.iter().map(Nameserver::ns_record).collect();
    root.set_delegated_zones(
        master_zones
            .iter()
            .map(|zone| zone.with_nameservers(resolver_tier.clone()))
            .collect(),
    );

    let recursive = pool(
        config.recursive_ip_prefix,
        config.recursive_count,
        "recursive",
        Role::Recursive {
            root_hint_ip: config.root_ip,
        },
    );

    let topology = Topology {
        root,
        master,
        secondaries,
        resolvers,
        subdomain_resolvers,
        recursive,
    };
    debug!(
        "Built a topology of {} nameservers serving {} top-level zones.",
        topology.nameservers().count(),
        config.zone_count,
    );
    Ok(topology)
}

fn slave_zones<'a>(
    names: &'a [String],
    master_ips: &'a [Ipv4Addr],
) -> impl Iterator<Item = Zone> + 'a {
    names.iter().map(move |name| {
        Zone::Slave(SlaveZone {
            name: name.clone(),
            master_ips: master_ips.to_vec(),
        })
    })
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
