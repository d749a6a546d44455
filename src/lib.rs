// viamilter – configuration reconciliation for a DKIM milter daemon
// Copyright © 2024–2025 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! A library converging a DKIM signing milter daemon onto declaratively
//! described configuration.
//!
//! The inputs are a signing table, a key table, and a reference to a secret
//! holding the PEM-encoded private keys (module `config`). One
//! reconciliation cycle (module `reconcile`) validates these inputs,
//! renders the daemon's on-disk configuration (module `render`), applies
//! it, and drives the daemon's lifecycle: the daemon is restarted only when
//! the main configuration file content actually changed (module `drift`)
//! and reloaded otherwise, then the applied configuration is validated with
//! the daemon's own tooling (module `check`). The terminal state of a cycle
//! maps to an externally visible status (module `status`).
//!
//! The pieces of the environment the cycle touches are trait seams: secret
//! resolution ([`SecretStore`]), the consuming peer relation
//! ([`MilterRelations`]), service lifecycle ([`ServiceManager`]), external
//! validation ([`ConfigCheck`]), and the filesystem ([`Files`]). Production
//! implementations are provided where the behaviour is fixed ([`HostFiles`],
//! [`Systemd`], [`TestKey`]); the remaining seams depend on the hosting
//! environment.
//!
//! # Usage
//!
//! Assemble a [`Reconciler`] from the five collaborators, then run one
//! cycle per external event and report the returned outcome:
//!
//! ```no_run
//! # async fn example<S, R>(secrets: S, relations: R, options: viamilter::Options)
//! # where S: viamilter::SecretStore, R: viamilter::MilterRelations {
//! use viamilter::{HostFiles, Reconciler, Systemd, TestKey, Trigger};
//!
//! let mut reconciler = Reconciler::new(
//!     secrets,
//!     relations,
//!     Systemd::default(),
//!     TestKey::default(),
//!     HostFiles,
//! );
//!
//! let result = reconciler.reconcile(Trigger::ConfigChanged, &options).await;
//! let status = viamilter::report(&result);
//! # }
//! ```
//!
//! Each cycle is independent and idempotent; re-invocation on the next
//! configuration, secret, or relation event is the hosting environment's
//! responsibility.

pub mod check;
pub mod config;
pub mod drift;
pub mod files;
pub mod logrotate;
pub mod reconcile;
pub mod relation;
pub mod render;
pub mod secret;
pub mod service;
pub mod status;
pub mod tables;
mod util;

pub use crate::{
    check::{CheckError, ConfigCheck, TestKey},
    config::{Config, ConfigError, Mode, Options, Paths, ResolveError, MILTER_PORT},
    files::{Files, HostFiles},
    reconcile::{Outcome, ReconcileError, Reconciler, Trigger},
    relation::{MilterRelations, RelationError},
    render::{render, Artifact, ArtifactSet},
    secret::{PrivateKeys, SecretError, SecretId, SecretStore},
    service::{ServiceError, ServiceManager, Systemd},
    status::{report, Status},
    util::CanonicalStr,
};
