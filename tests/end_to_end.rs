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

//! Builds and materializes a small topology through the public API and
//! checks the resulting trees.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use zonefarm::builder::{self, TopologyConfig};
use zonefarm::layout::Layout;
use zonefarm::materialize::{self, Materializer};
use zonefarm::render::AskamaRenderer;

fn entries(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn two_zones_two_secondaries_one_resolver() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path().join("chroots")).unwrap();
    let topology = builder::build(&TopologyConfig {
        zone_count: 2,
        secondary_count: 2,
        resolver_count: 1,
        subdomain_resolver_count: 0,
        recursive_count: 1,
        record_count: 3,
        ..TopologyConfig::default()
    })
    .unwrap();

    materialize::clean(&layout).unwrap();
    Materializer::new(&layout, &AskamaRenderer)
        .materialize(&topology)
        .unwrap();

    assert_eq!(
        entries(layout.root()),
        set(&["master", "recursive0", "resolver0", "root", "secondary0", "secondary1"]),
    );
    for node in entries(layout.root()) {
        let node_dir = layout.root().join(&node);
        assert!(node_dir.join("var/named/named9.conf").is_file(), "{}", node);
        assert!(node_dir.join("var/log").is_dir(), "{}", node);
    }

    let master_zones = layout.root().join("master/var/named/zones");
    assert_eq!(entries(&master_zones), set(&["zone0.com.zone", "zone1.com.zone"]));
    assert!(entries(&layout.root().join("secondary0/var/named/zones")).is_empty());
    assert!(entries(&layout.root().join("resolver0/var/named/zones")).is_empty());

    let zone = fs::read_to_string(master_zones.join("zone1.com.zone")).unwrap();
    for record in ["test0", "test1", "test2"] {
        assert!(zone.contains(&format!("{}\tIN\tTXT", record)));
    }
    assert!(!zone.contains("test3\t"));

    let resolver_conf =
        fs::read_to_string(layout.root().join("resolver0/var/named/named9.conf")).unwrap();
    assert!(resolver_conf.contains("masters { 127.2.2.1; 127.2.2.2; };"));
    assert!(!resolver_conf.contains("sub."));

    // A second build over the same trees needs the clean step.
    assert!(Materializer::new(&layout, &AskamaRenderer)
        .materialize(&topology)
        .is_err());
    materialize::clean(&layout).unwrap();
    Materializer::new(&layout, &AskamaRenderer)
        .materialize(&topology)
        .unwrap();
}

#[test]
fn invalid_configuration_fails_before_anything_is_written() {
    let dir = TempDir::new().unwrap();
    let config = TopologyConfig {
        zone_count: 0,
        ..TopologyConfig::default()
    };
    assert!(builder::build(&config).is_err());
    assert!(entries(dir.path()).is_empty());
}
