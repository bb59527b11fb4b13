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

//! Implementation of the [`Zone`] type and its variants.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// The name of the test record mutated by the update driver. Every
/// generated zone carries it with an initial value of `1`.
pub const UPDATE_RECORD_NAME: &str = "test";

/// A zone served by a [`Nameserver`](super::Nameserver).
///
/// Only [`Zone::Master`] and [`Zone::Root`] own authoritative content
/// that is generated locally. [`Zone::Slave`] and [`Zone::Stub`] zones
/// obtain their data from their masters at runtime.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Zone {
    Master(MasterZone),
    Root(RootZone),
    Slave(SlaveZone),
    Stub(SlaveZone),
}

impl Zone {
    /// Returns the zone's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Master(zone) => &zone.name,
            Self::Root(_) => RootZone::NAME,
            Self::Slave(zone) | Self::Stub(zone) => &zone.name,
        }
    }

    /// Returns the kind of the zone.
    pub fn kind(&self) -> ZoneKind {
        match self {
            Self::Master(_) => ZoneKind::Master,
            Self::Root(_) => ZoneKind::Root,
            Self::Slave(_) => ZoneKind::Slave,
            Self::Stub(_) => ZoneKind::Stub,
        }
    }

    /// Returns the name of the file (relative to a nameserver's zones
    /// directory) that holds the zone's content.
    pub fn file_name(&self) -> String {
        match self {
            Self::Root(_) => String::from("root.zone"),
            _ => format!("{}.zone", self.name()),
        }
    }

    /// Returns the IP addresses the zone is transferred from. This is
    /// empty for zones with local content.
    pub fn master_ips(&self) -> &[Ipv4Addr] {
        match self {
            Self::Master(_) | Self::Root(_) => &[],
            Self::Slave(zone) | Self::Stub(zone) => &zone.master_ips,
        }
    }

    /// Returns whether the zone's content is generated locally.
    pub fn has_local_content(&self) -> bool {
        self.kind().has_local_content()
    }
}

/// The kinds of zone, without their payloads.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ZoneKind {
    Master,
    Root,
    Slave,
    Stub,
}

impl ZoneKind {
    /// Returns whether zones of this kind own locally generated
    /// content.
    pub fn has_local_content(self) -> bool {
        matches!(self, Self::Master | Self::Root)
    }

    /// Returns the zone type keyword used in nameserver configuration.
    /// The root zone is an ordinary master zone from the nameserver's
    /// point of view.
    pub fn config_keyword(self) -> &'static str {
        match self {
            Self::Master | Self::Root => "master",
            Self::Slave => "slave",
            Self::Stub => "stub",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Root => f.write_str("root"),
            Self::Slave => f.write_str("slave"),
            Self::Stub => f.write_str("stub"),
        }
    }
}

/// A name and address pair identifying a nameserver from within zone
/// data. This is a copy, not a handle: zones never share state with the
/// [`Nameserver`](super::Nameserver)s they refer to.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NsRecord {
    pub name: String,
    pub ip: Ipv4Addr,
}

/// The SOA timing values of a zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ZoneTiming {
    pub refresh: Duration,
    pub retry: Duration,
    pub expire: Duration,
    pub negative_ttl: Duration,
}

impl Default for ZoneTiming {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(60),
            retry: Duration::from_secs(30),
            expire: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(5),
        }
    }
}

/// A zone whose authoritative content originates locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasterZone {
    pub name: String,
    pub authoritative_nameservers: Vec<NsRecord>,
    pub timing: ZoneTiming,
    pub test_records: Vec<String>,
}

impl MasterZone {
    /// Creates a master zone with `record_count` synthetic test records
    /// named `test0` through `test<record_count - 1>`.
    pub fn new(
        name: String,
        authoritative_nameservers: Vec<NsRecord>,
        timing: ZoneTiming,
        record_count: usize,
    ) -> Self {
        Self {
            name,
            authoritative_nameservers,
            timing,
            test_records: (0..record_count).map(|i| format!("test{}", i)).collect(),
        }
    }

    /// Derives a copy of this zone that advertises
    /// `authoritative_nameservers` instead of the original NS set.
    /// Every container is freshly allocated, so changes to the copy
    /// never reach `self`.
    pub fn with_nameservers(&self, authoritative_nameservers: Vec<NsRecord>) -> Self {
        Self {
            name: self.name.clone(),
            authoritative_nameservers,
            timing: self.timing,
            test_records: self.test_records.clone(),
        }
    }
}

/// The root zone. Its content points at the owning root nameserver and
/// delegates to the zones listed in that nameserver's
/// [`delegated_zones`](super::Nameserver::delegated_zones).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RootZone {
    pub root: NsRecord,
    pub timing: ZoneTiming,
}

impl RootZone {
    pub const NAME: &'static str = ".";
}

/// A zone obtained by transfer from one of `master_ips`. Also used as
/// the payload of [`Zone::Stub`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SlaveZone {
    pub name: String,
    pub master_ips: Vec<Ipv4Addr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str, last: u8) -> NsRecord {
        NsRecord {
            name: name.to_owned(),
            ip: Ipv4Addr::new(127, 0, 0, last),
        }
    }

    #[test]
    fn master_zone_generates_test_records() {
        let zone = MasterZone::new("zone0.com".into(), vec![], ZoneTiming::default(), 3);
        assert_eq!(zone.test_records, ["test0", "test1", "test2"]);
    }

    #[test]
    fn with_nameservers_does_not_alias_the_original() {
        let original = MasterZone::new(
            "zone0.com".into(),
            vec![ns("master", 1)],
            ZoneTiming::default(),
            2,
        );
        let mut derived = original.with_nameservers(vec![ns("resolver0", 2)]);
        derived.authoritative_nameservers.push(ns("resolver1", 3));
        derived.test_records.clear();
        derived.name.push_str(".changed");

        assert_eq!(original.name, "zone0.com");
        assert_eq!(original.authoritative_nameservers, [ns("master", 1)]);
        assert_eq!(original.test_records.len(), 2);
    }

    #[test]
    fn only_master_and_root_zones_have_local_content() {
        let slave = SlaveZone {
            name: "zone0.com".into(),
            master_ips: vec![Ipv4Addr::LOCALHOST],
        };
        let root = RootZone {
            root: ns("root", 2),
            timing: ZoneTiming::default(),
        };
        assert!(Zone::Root(root).has_local_content());
        assert!(!Zone::Slave(slave.clone()).has_local_content());
        assert!(!Zone::Stub(slave).has_local_content());
    }

    #[test]
    fn root_zone_file_name_is_readable() {
        let root = Zone::Root(RootZone {
            root: ns("root", 2),
            timing: ZoneTiming::default(),
        });
        assert_eq!(root.name(), ".");
        assert_eq!(root.file_name(), "root.zone");
    }
}
