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

//! The reconciliation cycle.

use crate::{
    check::{CheckError, ConfigCheck},
    config::{Config, ConfigError, Options, Paths, ResolveError, MILTER_PORT},
    drift,
    files::Files,
    relation::{MilterRelations, RelationError},
    render,
    secret::{SecretError, SecretStore},
    service::{ServiceError, ServiceManager},
    util::CanonicalStr,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};
use tracing::{debug, error, info};

/// The external event that caused a reconciliation cycle.
///
/// The cycle itself does not branch on the trigger: every cycle derives the
/// complete desired state from its inputs and converges the system to it,
/// whatever changed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trigger {
    ConfigChanged,
    SecretChanged,
    RelationChanged,
    RelationDeparted,
}

impl CanonicalStr for Trigger {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::ConfigChanged => "config-changed",
            Self::SecretChanged => "secret-changed",
            Self::RelationChanged => "relation-changed",
            Self::RelationDeparted => "relation-departed",
        }
    }
}

/// The terminal state of one reconciliation cycle.
#[derive(Debug)]
pub enum Outcome {
    /// The system matches the desired state and the daemon accepted it.
    Converged,
    /// No milter relation is present; nothing was written to disk.
    WaitingForRelation,
    /// The configuration options are unusable; nothing was written to disk.
    InvalidConfig(ConfigError),
    /// The configuration was applied but the daemon rejected it.
    CheckFailed(CheckError),
}

/// A collaborator failure that aborts the cycle.
#[derive(Debug)]
pub enum ReconcileError {
    Secret(SecretError),
    Relation(RelationError),
    Io(io::Error),
    Service(ServiceError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(error) => write!(f, "cannot resolve private keys secret: {error}"),
            Self::Relation(error) => write!(f, "cannot update relation data: {error}"),
            Self::Io(error) => write!(f, "cannot write configuration: {error}"),
            Self::Service(error) => error.fmt(f),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Secret(error) => Some(error),
            Self::Relation(error) => Some(error),
            Self::Io(error) => Some(error),
            Self::Service(error) => Some(error),
        }
    }
}

/// The convergence controller.
///
/// One `reconcile` call runs a single cycle: validate the raw options,
/// require a consuming peer, apply the rendered artifacts, restart the
/// daemon when the main configuration content changed and reload it in any
/// case, then have the daemon's own tooling validate the result.
///
/// Cycles are independent: no state is carried in memory between calls, and
/// the only state shared across cycles is the previously applied file
/// content on disk. Re-running a cycle with unchanged inputs converges
/// without a restart.
pub struct Reconciler<S, R, M, C, F> {
    secrets: S,
    relations: R,
    service: M,
    check: C,
    files: F,
    paths: Paths,
    port: u16,
}

impl<S, R, M, C, F> Reconciler<S, R, M, C, F>
where
    S: SecretStore,
    R: MilterRelations,
    M: ServiceManager,
    C: ConfigCheck,
    F: Files,
{
    pub fn new(secrets: S, relations: R, service: M, check: C, files: F) -> Self {
        Self {
            secrets,
            relations,
            service,
            check,
            files,
            paths: Paths::default(),
            port: MILTER_PORT,
        }
    }

    /// Replaces the artifact locations, for hosts with a non-standard
    /// layout.
    pub fn with_paths(mut self, paths: Paths) -> Self {
        self.paths = paths;
        self
    }

    /// Runs one reconciliation cycle to its terminal state.
    ///
    /// Recoverable conditions (invalid options, missing relation, daemon
    /// rejection) are terminal outcomes; collaborator failures abort the
    /// cycle as [`ReconcileError`]. Either way the caller reports status
    /// and waits for the next external event, no retries happen here.
    pub async fn reconcile(
        &mut self,
        trigger: Trigger,
        options: &Options,
    ) -> Result<Outcome, ReconcileError> {
        debug!(trigger = trigger.canonical_str(), "reconciling");

        let config = match Config::resolve(options, &self.paths, &self.secrets).await {
            Ok(config) => config,
            Err(ResolveError::Invalid(e)) => {
                error!(error = %e, "invalid configuration options");
                return Ok(Outcome::InvalidConfig(e));
            }
            Err(ResolveError::Secret(e)) => return Err(ReconcileError::Secret(e)),
        };

        // The relation gate comes before any write: key material must not
        // reach the disk without a consuming peer declared.
        if self.relations.is_empty() {
            return Ok(Outcome::WaitingForRelation);
        }
        self.relations
            .publish_port(self.port)
            .map_err(ReconcileError::Relation)?;

        let artifacts = render::render(&config, &self.paths);

        for artifact in artifacts.support() {
            self.files.write(artifact).await.map_err(ReconcileError::Io)?;
        }

        let previous = self
            .files
            .read_or_empty(&artifacts.conf.path)
            .await
            .map_err(ReconcileError::Io)?;

        if drift::needs_restart(&artifacts.conf.content, &previous) {
            self.files
                .write(&artifacts.conf)
                .await
                .map_err(ReconcileError::Io)?;
            info!("configuration changed, restarting the milter daemon");
            self.service.restart().await.map_err(ReconcileError::Service)?;
        }

        info!("reloading the milter daemon");
        self.service.reload().await.map_err(ReconcileError::Service)?;

        if let Err(e) = self.check.check(&artifacts.conf.path).await {
            error!(error = %e, "daemon rejected the applied configuration");
            return Ok(Outcome::CheckFailed(e));
        }

        Ok(Outcome::Converged)
    }
}
