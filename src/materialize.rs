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

//! Writing a [`Topology`] to the file system.
//!
//! The [`Materializer`] gives every nameserver its own directory tree
//! (see [`layout`](crate::layout)), containing the rendered nameserver
//! configuration and the content of every zone the nameserver is the
//! source of. Trees are never built over existing ones: a previous
//! run's state must be removed with [`clean`] first.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::layout::{Layout, ROOT_HINTS_FILE};
use crate::render::{self, Document, NamedConf, Renderer, RootHints, RootZoneFile, ZoneFile};
use crate::topology::{Nameserver, Topology, Zone, ROOT_NAMESERVER_NAME};

////////////////////////////////////////////////////////////////////////
// CLEANING                                                           //
////////////////////////////////////////////////////////////////////////

/// Removes everything under the layout's root, if it exists.
pub fn clean(layout: &Layout) -> Result<(), Error> {
    let root = layout.root();
    if root.exists() {
        info!("Removing existing trees under {}.", root.display());
        fs::remove_dir_all(root).map_err(|e| Error::io(root, e))?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// MATERIALIZATION                                                    //
////////////////////////////////////////////////////////////////////////

/// Writes nameserver trees according to a [`Layout`], rendering files
/// with a [`Renderer`].
pub struct Materializer<'a, R: ?Sized> {
    layout: &'a Layout,
    renderer: &'a R,
}

impl<'a, R: Renderer + ?Sized> Materializer<'a, R> {
    pub fn new(layout: &'a Layout, renderer: &'a R) -> Self {
        Self { layout, renderer }
    }

    /// Builds the tree of every nameserver in `topology`. On failure,
    /// the trees built so far are left in place.
    pub fn materialize(&self, topology: &Topology) -> Result<(), Error> {
        for ns in topology.nameservers() {
            self.build_node(ns)?;
        }
        Ok(())
    }

    /// Builds the tree of a single nameserver.
    pub fn build_node(&self, ns: &Nameserver) -> Result<(), Error> {
        info!("Building {}.", ns.name());
        self.build_dirs(ns)?;

        let config = self.render(&Document::Config(NamedConf::new(
            ns,
            self.layout.base_dir(ns),
        )))?;
        write(&self.layout.config_path(ns), &config)?;

        if let Some(root_ip) = ns.root_hint_ip() {
            let hints = self.render(&Document::RootHints(RootHints {
                root_name: ROOT_NAMESERVER_NAME,
                root_ip,
            }))?;
            write(&self.layout.zones_dir(ns).join(ROOT_HINTS_FILE), &hints)?;
        }

        for zone in ns.zones() {
            self.write_zone(ns, zone)?;
        }
        Ok(())
    }

    fn build_dirs(&self, ns: &Nameserver) -> Result<(), Error> {
        let root = self.layout.root();
        fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;

        let node_dir = self.layout.node_dir(ns);
        match fs::create_dir(&node_dir) {
            Ok(()) => (),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists(node_dir));
            }
            Err(e) => return Err(Error::io(&node_dir, e)),
        }

        for dir in [self.layout.zones_dir(ns), self.layout.log_dir(ns)] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }

    fn write_zone(&self, ns: &Nameserver, zone: &Zone) -> Result<(), Error> {
        let document = match zone {
            Zone::Master(master) => Document::Zone(ZoneFile::new(master)),
            Zone::Root(root) => Document::RootZone(RootZoneFile {
                zone: root,
                delegations: ns.delegated_zones(),
            }),
            // Transferred from the masters at runtime.
            Zone::Slave(_) | Zone::Stub(_) => return Ok(()),
        };
        let content = self.render(&document)?;
        write(&self.layout.zones_dir(ns).join(zone.file_name()), &content)
    }

    fn render(&self, document: &Document) -> Result<String, Error> {
        self.renderer.render(document).map_err(Error::Render)
    }
}

fn write(path: &Path, content: &str) -> Result<(), Error> {
    debug!("Writing {}.", path.display());
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise while materializing a topology.
#[derive(Debug)]
pub enum Error {
    /// A nameserver's directory was already present. The previous
    /// run's trees must be removed before building again.
    AlreadyExists(PathBuf),
    Io { path: PathBuf, source: io::Error },
    Render(render::Error),
}

impl Error {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AlreadyExists(path) => write!(
                f,
                "{} already exists; remove the previous trees first",
                path.display(),
            ),
            Self::Io { path, .. } => write!(f, "I/O error on {}", path.display()),
            Self::Render(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AlreadyExists(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Render(e) => std::error::Error::source(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::TempDir;

    use super::*;
    use crate::builder::{self, TopologyConfig};
    use crate::render::tests::RecordingRenderer;
    use crate::render::AskamaRenderer;

    fn topology(subdomain_resolver_count: usize, use_chroot: bool) -> Topology {
        builder::build(&TopologyConfig {
            zone_count: 2,
            record_count: 3,
            secondary_count: 2,
            resolver_count: 1,
            subdomain_resolver_count,
            recursive_count: 1,
            use_chroot,
            ..TopologyConfig::default()
        })
        .unwrap()
    }

    fn list(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect()
    }

    #[test]
    fn builds_the_expected_trees() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path().join("chroots")).unwrap();
        let topology = topology(0, true);
        Materializer::new(&layout, &AskamaRenderer)
            .materialize(&topology)
            .unwrap();

        let nodes: BTreeSet<_> = [
            "master",
            "recursive0",
            "resolver0",
            "root",
            "secondary0",
            "secondary1",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(list(layout.root()), nodes);

        let master = topology.master();
        assert_eq!(
            list(&layout.zones_dir(master)),
            ["zone0.com.zone", "zone1.com.zone"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<_>>(),
        );
        assert!(layout.config_path(master).is_file());
        assert!(layout.log_dir(master).is_dir());
        assert!(list(&layout.log_dir(master)).is_empty());

        for secondary in topology.secondaries() {
            assert!(list(&layout.zones_dir(secondary)).is_empty());
        }
        assert_eq!(
            list(&layout.zones_dir(topology.root())),
            BTreeSet::from([String::from("root.zone")]),
        );
        assert_eq!(
            list(&layout.zones_dir(&topology.recursive()[0])),
            BTreeSet::from([String::from("db.cache")]),
        );
    }

    #[test]
    fn writes_one_zone_file_per_master_or_root_zone() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path()).unwrap();
        let topology = topology(2, true);
        let renderer = RecordingRenderer::default();
        Materializer::new(&layout, &renderer)
            .materialize(&topology)
            .unwrap();

        let mut expected_zone_files = 0;
        for ns in topology.nameservers() {
            let local = ns.zones().iter().filter(|z| z.has_local_content()).count();
            let hints = usize::from(ns.root_hint_ip().is_some());
            assert_eq!(list(&layout.zones_dir(ns)).len(), local + hints);
            expected_zone_files += local;
        }

        let rendered = renderer.rendered.borrow();
        let count = |name: &str| rendered.iter().filter(|&&t| t == name).count();
        assert_eq!(count("named9.conf"), topology.nameservers().count());
        assert_eq!(count("zone.db") + count("root.db"), expected_zone_files);
        assert_eq!(count("root.db"), 1);
        // Two top-level zones on the master, two on each of the two
        // subdomain resolvers.
        assert_eq!(count("zone.db"), 6);
    }

    #[test]
    fn refuses_to_build_over_existing_trees() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path()).unwrap();
        let topology = topology(0, true);
        let materializer = Materializer::new(&layout, &AskamaRenderer);
        materializer.materialize(&topology).unwrap();

        match materializer.materialize(&topology) {
            Err(Error::AlreadyExists(path)) => assert_eq!(path, layout.node_dir(topology.root())),
            other => panic!("unexpected result {:?}", other),
        }

        clean(&layout).unwrap();
        assert!(!layout.root().exists());
        materializer.materialize(&topology).unwrap();
    }

    #[test]
    fn non_chroot_configs_use_absolute_paths() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path()).unwrap();
        let topology = topology(0, false);
        Materializer::new(&layout, &AskamaRenderer)
            .materialize(&topology)
            .unwrap();

        let master = topology.master();
        let config = fs::read_to_string(layout.config_path(master)).unwrap();
        let expected = format!(
            "directory \"{}/var/named\";",
            layout.node_dir(master).display(),
        );
        assert!(config.contains(&expected));
    }
}
