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

//! Zonefarm builds multi-tier DNS deployments for local testing.
//!
//! A deployment is described by a [`Topology`](topology::Topology): a
//! master nameserver, secondaries transferring from it, resolvers
//! transferring from the secondaries, optional subdomain resolvers
//! reached through stub zones, a root nameserver delegating to the
//! resolvers, and optional recursive nameservers primed with the root.
//! The stages of a run are:
//!
//! 1. [`builder::build`] derives the topology from a
//!    [`TopologyConfig`](builder::TopologyConfig);
//! 2. a [`Materializer`](materialize::Materializer) writes each
//!    nameserver's configuration and zones into its own directory tree;
//! 3. an [`Orchestrator`](orchestrate::Orchestrator) starts one
//!    nameserver process per tree on its own loopback address;
//! 4. an [`UpdateDriver`](update::UpdateDriver) keeps changing a test
//!    record on the master.
//!
//! External programs and templates are reached only through the
//! [`CommandRunner`](command::CommandRunner) and
//! [`Renderer`](render::Renderer) traits.

pub mod builder;
pub mod command;
pub mod layout;
pub mod materialize;
pub mod orchestrate;
pub mod render;
pub mod topology;
pub mod update;
