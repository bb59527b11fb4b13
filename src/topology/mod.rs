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

//! The topology data model: nameservers, the zones they serve, and the
//! relationships between them.
//!
//! A [`Topology`] is produced once per run by
//! [`builder::build`](crate::builder::build) and is not modified
//! afterwards.

use std::fmt;
use std::net::Ipv4Addr;

mod zone;
pub use zone::{
    MasterZone, NsRecord, RootZone, SlaveZone, Zone, ZoneKind, ZoneTiming, UPDATE_RECORD_NAME,
};

/// The name of the nameserver holding the root zone. Root hints refer
/// to it by this name.
pub const ROOT_NAMESERVER_NAME: &str = "root";

////////////////////////////////////////////////////////////////////////
// NAMESERVERS                                                        //
////////////////////////////////////////////////////////////////////////

/// The role a [`Nameserver`] plays in the topology.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Authoritative for zones whose content it generates locally (the
    /// master, the root, and the subdomain resolvers).
    Master,
    /// Transfers the top-level zones from the master.
    Secondary,
    /// Transfers the top-level zones from the secondaries and holds
    /// stubs for any delegated subdomains.
    Resolver,
    /// Resolves recursively, starting from the root at `root_hint_ip`.
    Recursive { root_hint_ip: Ipv4Addr },
}

impl Role {
    /// Returns whether the nameserver performs recursion.
    pub fn is_recursive(&self) -> bool {
        matches!(self, Self::Recursive { .. })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Secondary => f.write_str("secondary"),
            Self::Resolver => f.write_str("resolver"),
            Self::Recursive { .. } => f.write_str("recursive"),
        }
    }
}

/// A nameserver instance in the topology.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nameserver {
    name: String,
    ip: Ipv4Addr,
    role: Role,
    use_chroot: bool,
    zones: Vec<Zone>,
    delegated_zones: Vec<MasterZone>,
}

impl Nameserver {
    /// Creates a nameserver with no zones.
    pub fn new(name: String, ip: Ipv4Addr, role: Role, use_chroot: bool) -> Self {
        Self {
            name,
            ip,
            role,
            use_chroot,
            zones: Vec::new(),
            delegated_zones: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn use_chroot(&self) -> bool {
        self.use_chroot
    }

    /// Returns the zones served by the nameserver, in order. This is
    /// always empty for recursive nameservers.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Returns the zones the root zone delegates to. This is empty for
    /// every nameserver but the root.
    pub fn delegated_zones(&self) -> &[MasterZone] {
        &self.delegated_zones
    }

    /// Returns the root hint address if this is a recursive nameserver.
    pub fn root_hint_ip(&self) -> Option<Ipv4Addr> {
        match self.role {
            Role::Recursive { root_hint_ip } => Some(root_hint_ip),
            _ => None,
        }
    }

    /// Returns a copy of the nameserver's identity for use in zone
    /// data.
    pub fn ns_record(&self) -> NsRecord {
        NsRecord {
            name: self.name.clone(),
            ip: self.ip,
        }
    }

    /// Appends `zones` to the nameserver's zone set.
    ///
    /// # Panics
    ///
    /// Panics if the nameserver is recursive or if a zone name would be
    /// repeated. The builder never does either.
    pub(crate) fn extend_zones(&mut self, zones: impl IntoIterator<Item = Zone>) {
        assert!(
            !self.role.is_recursive(),
            "recursive nameserver {} cannot serve zones",
            self.name,
        );
        for zone in zones {
            assert!(
                self.zones.iter().all(|z| z.name() != zone.name()),
                "{} already serves {}",
                self.name,
                zone.name(),
            );
            self.zones.push(zone);
        }
    }

    pub(crate) fn set_delegated_zones(&mut self, delegated_zones: Vec<MasterZone>) {
        self.delegated_zones = delegated_zones;
    }
}

////////////////////////////////////////////////////////////////////////
// TOPOLOGY                                                           //
////////////////////////////////////////////////////////////////////////

/// A complete, linked set of nameservers.
#[derive(Clone, Debug)]
pub struct Topology {
    pub(crate) root: Nameserver,
    pub(crate) master: Nameserver,
    pub(crate) secondaries: Vec<Nameserver>,
    pub(crate) resolvers: Vec<Nameserver>,
    pub(crate) subdomain_resolvers: Vec<Nameserver>,
    pub(crate) recursive: Vec<Nameserver>,
}

impl Topology {
    /// The nameserver holding the root zone.
    pub fn root(&self) -> &Nameserver {
        &self.root
    }

    /// The nameserver holding the top-level master zones.
    pub fn master(&self) -> &Nameserver {
        &self.master
    }

    pub fn secondaries(&self) -> &[Nameserver] {
        &self.secondaries
    }

    pub fn resolvers(&self) -> &[Nameserver] {
        &self.resolvers
    }

    pub fn subdomain_resolvers(&self) -> &[Nameserver] {
        &self.subdomain_resolvers
    }

    pub fn recursive(&self) -> &[Nameserver] {
        &self.recursive
    }

    /// Iterates over every nameserver in the canonical order: root,
    /// master, secondaries, resolvers, subdomain resolvers, recursive
    /// nameservers. Loopback alias numbering follows this order.
    pub fn nameservers(&self) -> impl Iterator<Item = &Nameserver> {
        [&self.root, &self.master]
            .into_iter()
            .chain(&self.secondaries)
            .chain(&self.resolvers)
            .chain(&self.subdomain_resolvers)
            .chain(&self.recursive)
    }

    /// Returns the names of the top-level master zones, in order. These
    /// are the zones the update driver mutates.
    pub fn master_zone_names(&self) -> Vec<String> {
        self.master
            .zones()
            .iter()
            .map(|zone| zone.name().to_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_hint_ip_is_only_present_for_recursive_nameservers() {
        let hint = Ipv4Addr::new(127, 1, 1, 2);
        let recursive = Nameserver::new(
            "recursive0".into(),
            Ipv4Addr::new(127, 5, 5, 1),
            Role::Recursive { root_hint_ip: hint },
            true,
        );
        let master = Nameserver::new(
            "master".into(),
            Ipv4Addr::new(127, 1, 1, 1),
            Role::Master,
            true,
        );
        assert_eq!(recursive.root_hint_ip(), Some(hint));
        assert_eq!(master.root_hint_ip(), None);
    }

    #[test]
    #[should_panic]
    fn recursive_nameservers_reject_zones() {
        let mut recursive = Nameserver::new(
            "recursive0".into(),
            Ipv4Addr::new(127, 5, 5, 1),
            Role::Recursive {
                root_hint_ip: Ipv4Addr::new(127, 1, 1, 2),
            },
            true,
        );
        recursive.extend_zones([Zone::Slave(SlaveZone {
            name: "zone0.com".into(),
            master_ips: vec![],
        })]);
    }

    #[test]
    #[should_panic]
    fn duplicate_zone_names_are_rejected() {
        let mut ns = Nameserver::new(
            "xfr".into(),
            Ipv4Addr::new(127, 2, 2, 1),
            Role::Secondary,
            true,
        );
        let zone = Zone::Slave(SlaveZone {
            name: "zone0.com".into(),
            master_ips: vec![Ipv4Addr::new(127, 1, 1, 1)],
        });
        ns.extend_zones([zone.clone(), zone]);
    }
}
