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

//! Rendering of configuration, zone, and update documents.
//!
//! Each [`Document`] pairs a template with the flat set of values the
//! template needs. A [`Renderer`] turns documents into text; the
//! [`AskamaRenderer`] does so with the templates compiled in from the
//! crate's `templates` directory.

use std::fmt;
use std::net::Ipv4Addr;

use askama::Template;

use crate::topology::{MasterZone, Nameserver, RootZone, Zone, UPDATE_RECORD_NAME};

////////////////////////////////////////////////////////////////////////
// RENDERER                                                           //
////////////////////////////////////////////////////////////////////////

/// Turns [`Document`]s into text. Rendering must be deterministic.
pub trait Renderer {
    fn render(&self, document: &Document) -> Result<String, Error>;
}

/// The default [`Renderer`], backed by the compiled-in templates.
#[derive(Clone, Copy, Debug, Default)]
pub struct AskamaRenderer;

impl Renderer for AskamaRenderer {
    fn render(&self, document: &Document) -> Result<String, Error> {
        let result = match document {
            Document::Config(values) => values.render(),
            Document::Zone(values) => values.render(),
            Document::RootZone(values) => values.render(),
            Document::RootHints(values) => values.render(),
            Document::Update(values) => values.render(),
        };
        result.map_err(|source| Error {
            template: document.template_name(),
            source,
        })
    }
}

/// A template together with the values to render it with.
#[derive(Debug)]
pub enum Document<'a> {
    Config(NamedConf<'a>),
    Zone(ZoneFile<'a>),
    RootZone(RootZoneFile<'a>),
    RootHints(RootHints<'a>),
    Update(UpdateStatements<'a>),
}

impl Document<'_> {
    /// Returns the name of the template the document is rendered with.
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Config(_) => "named9.conf",
            Self::Zone(_) => "zone.db",
            Self::RootZone(_) => "root.db",
            Self::RootHints(_) => "db.cache",
            Self::Update(_) => "nsupdate.txt",
        }
    }
}

/// A rendering failure.
#[derive(Debug)]
pub struct Error {
    template: &'static str,
    source: askama::Error,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to render {}", self.template)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

////////////////////////////////////////////////////////////////////////
// DOCUMENTS                                                          //
////////////////////////////////////////////////////////////////////////

/// A nameserver configuration file.
#[derive(Debug, Template)]
#[template(path = "named9.conf", escape = "none")]
pub struct NamedConf<'a> {
    pub name: &'a str,
    pub role: String,
    pub ip: Ipv4Addr,
    pub base_dir: String,
    pub recursion: bool,
    pub root_hints_file: &'a str,
    pub zones: Vec<ZoneStanza<'a>>,
}

impl<'a> NamedConf<'a> {
    /// Collects the configuration values for `ns`. Paths in the
    /// configuration are relative to `base_dir`.
    pub fn new(ns: &'a Nameserver, base_dir: String) -> Self {
        Self {
            name: ns.name(),
            role: ns.role().to_string(),
            ip: ns.ip(),
            base_dir,
            recursion: ns.role().is_recursive(),
            root_hints_file: crate::layout::ROOT_HINTS_FILE,
            zones: ns.zones().iter().map(ZoneStanza::new).collect(),
        }
    }
}

/// The configuration of one zone within a [`NamedConf`].
#[derive(Debug)]
pub struct ZoneStanza<'a> {
    pub name: &'a str,
    pub kind: &'static str,
    pub file: String,
    pub master_ips: &'a [Ipv4Addr],
    pub allow_update: bool,
}

impl<'a> ZoneStanza<'a> {
    pub fn new(zone: &'a Zone) -> Self {
        Self {
            name: zone.name(),
            kind: zone.kind().config_keyword(),
            file: zone.file_name(),
            master_ips: zone.master_ips(),
            allow_update: matches!(zone, Zone::Master(_)),
        }
    }
}

/// The content of a master zone.
#[derive(Debug, Template)]
#[template(path = "zone.db", escape = "none")]
pub struct ZoneFile<'a> {
    pub zone: &'a MasterZone,
    pub primary: &'a str,
    pub update_record: &'static str,
}

impl<'a> ZoneFile<'a> {
    pub fn new(zone: &'a MasterZone) -> Self {
        Self {
            zone,
            primary: zone
                .authoritative_nameservers
                .first()
                .map_or("localhost.", |ns| ns.name.as_str()),
            update_record: UPDATE_RECORD_NAME,
        }
    }
}

/// The content of the root zone, delegating to `delegations`.
#[derive(Debug, Template)]
#[template(path = "root.db", escape = "none")]
pub struct RootZoneFile<'a> {
    pub zone: &'a RootZone,
    pub delegations: &'a [MasterZone],
}

/// The root hints of a recursive nameserver.
#[derive(Debug, Template)]
#[template(path = "db.cache", escape = "none")]
pub struct RootHints<'a> {
    pub root_name: &'a str,
    pub root_ip: Ipv4Addr,
}

/// A dynamic update transaction replacing the value of the test record.
#[derive(Debug, Template)]
#[template(path = "nsupdate.txt", escape = "none")]
pub struct UpdateStatements<'a> {
    pub master_ip: Ipv4Addr,
    pub zone: &'a str,
    pub record: &'a str,
    pub ttl: u32,
    pub old_value: u64,
    pub new_value: u64,
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::builder::{self, TopologyConfig};
    use crate::topology::ROOT_NAMESERVER_NAME;

    /// A [`Renderer`] that records which templates it was asked for and
    /// produces a fixed line per document.
    #[derive(Default)]
    pub struct RecordingRenderer {
        pub rendered: RefCell<Vec<&'static str>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, document: &Document) -> Result<String, Error> {
            self.rendered.borrow_mut().push(document.template_name());
            Ok(format!("{}\n", document.template_name()))
        }
    }

    fn topology() -> crate::topology::Topology {
        builder::build(&TopologyConfig {
            zone_count: 2,
            record_count: 2,
            subdomain_resolver_count: 1,
            ..TopologyConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn config_lists_zones_with_their_masters() {
        let topology = topology();
        let resolver = &topology.resolvers()[0];
        let text = AskamaRenderer
            .render(&Document::Config(NamedConf::new(resolver, String::new())))
            .unwrap();
        assert!(text.contains("listen-on { 127.3.3.1; };"));
        assert!(text.contains("recursion no;"));
        assert!(text.contains("zone \"zone0.com\" {\n\ttype slave;"));
        assert!(text.contains("masters { 127.2.2.1; 127.2.2.2; };"));
        assert!(text.contains("zone \"sub.zone1.com\" {\n\ttype stub;"));
        assert!(text.contains("directory \"/var/named\";"));
        assert!(!text.contains("allow-update"));
    }

    #[test]
    fn config_of_recursive_nameserver_uses_root_hints() {
        let topology = topology();
        let recursive = &topology.recursive()[0];
        let text = AskamaRenderer
            .render(&Document::Config(NamedConf::new(
                recursive,
                String::from("/srv/recursive0"),
            )))
            .unwrap();
        assert!(text.contains("recursion yes;"));
        assert!(text.contains("type hint;"));
        assert!(text.contains("file \"zones/db.cache\";"));
        assert!(text.contains("directory \"/srv/recursive0/var/named\";"));
    }

    #[test]
    fn master_config_allows_updates() {
        let topology = topology();
        let text = AskamaRenderer
            .render(&Document::Config(NamedConf::new(topology.master(), String::new())))
            .unwrap();
        assert!(text.contains("type master;\n\tfile \"zones/zone0.com.zone\";\n\tallow-update"));
    }

    #[test]
    fn zone_file_contains_nameservers_and_test_records() {
        let topology = topology();
        let zone = match &topology.master().zones()[0] {
            Zone::Master(zone) => zone,
            other => panic!("unexpected zone {:?}", other),
        };
        let text = AskamaRenderer
            .render(&Document::Zone(ZoneFile::new(zone)))
            .unwrap();
        assert!(text.starts_with("$ORIGIN zone0.com.\n$TTL 5\n"));
        assert!(text.contains("@\tIN\tNS\tsecondary1\n"));
        assert!(text.contains("resolver0\tIN\tA\t127.3.3.1\n"));
        assert!(text.contains("test\tIN\tTXT\t\"1\"\n"));
        assert!(text.contains("test1\tIN\tTXT\t\"test1\"\n"));
        assert!(text.contains("60\t; refresh"));
    }

    #[test]
    fn root_zone_delegates_to_resolvers() {
        let topology = topology();
        let root = topology.root();
        let zone = match &root.zones()[0] {
            Zone::Root(zone) => zone,
            other => panic!("unexpected zone {:?}", other),
        };
        let text = AskamaRenderer
            .render(&Document::RootZone(RootZoneFile {
                zone,
                delegations: root.delegated_zones(),
            }))
            .unwrap();
        assert!(text.contains(".\tIN\tNS\troot.\n"));
        assert!(text.contains("zone1.com.\tIN\tNS\tresolver0.zone1.com.\n"));
        assert!(text.contains("resolver0.zone1.com.\tIN\tA\t127.3.3.1\n"));
        assert!(!text.contains("secondary0"));
    }

    #[test]
    fn root_hints_point_at_root() {
        let text = AskamaRenderer
            .render(&Document::RootHints(RootHints {
                root_name: ROOT_NAMESERVER_NAME,
                root_ip: Ipv4Addr::new(127, 1, 1, 2),
            }))
            .unwrap();
        assert_eq!(
            text.trim_end(),
            ".\t3600000\tIN\tNS\troot.\nroot.\t3600000\tIN\tA\t127.1.1.2",
        );
    }

    #[test]
    fn update_statements_replace_the_test_value() {
        let text = AskamaRenderer
            .render(&Document::Update(UpdateStatements {
                master_ip: Ipv4Addr::new(127, 1, 1, 1),
                zone: "zone0.com",
                record: UPDATE_RECORD_NAME,
                ttl: 60,
                old_value: 4,
                new_value: 5,
            }))
            .unwrap();
        assert!(text.contains("server 127.1.1.1\nzone zone0.com\n"));
        assert!(text.contains("update delete test.zone0.com. TXT \"4\"\n"));
        assert!(text.contains("update add test.zone0.com. 60 TXT \"5\"\nsend"));
    }
}
