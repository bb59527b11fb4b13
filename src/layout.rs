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

//! Path conventions for the materialized topology.
//!
//! Every nameserver `N` gets the tree
//!
//! ```text
//! {root}/N/var/named/named9.conf
//! {root}/N/var/named/zones/<zone>.zone
//! {root}/N/var/log/
//! ```
//!
//! which doubles as the nameserver's chroot.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use crate::topology::Nameserver;

/// The configuration file path inside a nameserver's tree.
pub const CONFIG_PATH: &str = "var/named/named9.conf";

/// The zones directory inside a nameserver's tree.
pub const ZONES_DIR: &str = "var/named/zones";

/// The log directory inside a nameserver's tree.
pub const LOG_DIR: &str = "var/log";

/// The file name of the root hints used by recursive nameservers.
pub const ROOT_HINTS_FILE: &str = "db.cache";

/// The directory under which all nameserver trees are placed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `root`. A relative `root` is resolved
    /// against the current directory, since paths written into
    /// non-chroot configurations must be absolute.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let root = if root.is_relative() {
            env::current_dir()?.join(root)
        } else {
            root.to_owned()
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the top of the nameserver's tree.
    pub fn node_dir(&self, ns: &Nameserver) -> PathBuf {
        self.root.join(ns.name())
    }

    pub fn config_path(&self, ns: &Nameserver) -> PathBuf {
        self.node_dir(ns).join(CONFIG_PATH)
    }

    pub fn zones_dir(&self, ns: &Nameserver) -> PathBuf {
        self.node_dir(ns).join(ZONES_DIR)
    }

    pub fn log_dir(&self, ns: &Nameserver) -> PathBuf {
        self.node_dir(ns).join(LOG_DIR)
    }

    /// Returns the directory that paths in the nameserver's
    /// configuration are relative to: the filesystem root inside a
    /// chroot, or the node directory otherwise. The result never has a
    /// trailing separator, so configuration templates can append
    /// `/var/...` to it.
    pub fn base_dir(&self, ns: &Nameserver) -> String {
        if ns.use_chroot() {
            String::new()
        } else {
            self.node_dir(ns).display().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::topology::Role;

    fn ns(use_chroot: bool) -> Nameserver {
        Nameserver::new("master".into(), Ipv4Addr::new(127, 1, 1, 1), Role::Master, use_chroot)
    }

    #[test]
    fn paths_follow_the_node_tree() {
        let layout = Layout::new("/srv/chroots").unwrap();
        let ns = ns(true);
        assert_eq!(
            layout.config_path(&ns),
            Path::new("/srv/chroots/master/var/named/named9.conf"),
        );
        assert_eq!(layout.zones_dir(&ns), Path::new("/srv/chroots/master/var/named/zones"));
        assert_eq!(layout.log_dir(&ns), Path::new("/srv/chroots/master/var/log"));
    }

    #[test]
    fn relative_roots_become_absolute() {
        let layout = Layout::new("chroots").unwrap();
        assert!(layout.root().is_absolute());
        assert!(layout.root().ends_with("chroots"));
    }

    #[test]
    fn base_dir_depends_on_chroot_mode() {
        let layout = Layout::new("/srv/chroots").unwrap();
        assert_eq!(layout.base_dir(&ns(true)), "");
        assert_eq!(layout.base_dir(&ns(false)), "/srv/chroots/master");
    }
}
