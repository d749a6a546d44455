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

//! External validation of the applied configuration.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    future::Future,
    io,
    path::Path,
    pin::Pin,
    time::Duration,
};
use tokio::{process::Command, time};

/// The time bound on one validation run.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug)]
pub enum CheckError {
    /// The validation command could not be run at all.
    Spawn(io::Error),
    /// The daemon rejected the configuration; carries the tool's diagnostic
    /// output verbatim.
    Failed(String),
    /// The validation command did not finish within the time bound. Treated
    /// the same as a rejection.
    TimedOut(Duration),
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(error) => write!(f, "cannot run opendkim-testkey: {error}"),
            Self::Failed(detail) => write!(f, "opendkim-testkey failed: {detail}"),
            Self::TimedOut(limit) => {
                write!(f, "opendkim-testkey timed out after {}s", limit.as_secs())
            }
        }
    }
}

impl Error for CheckError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(error) => Some(error),
            Self::Failed(_) | Self::TimedOut(_) => None,
        }
    }
}

/// Validation of an applied configuration through the daemon's own tooling.
pub trait ConfigCheck {
    type Check<'a>: Future<Output = Result<(), CheckError>> + Send + 'a
    where
        Self: 'a;

    fn check(&self, conf_path: &Path) -> Self::Check<'_>;
}

/// [`ConfigCheck`] running `opendkim-testkey` against the configuration
/// file. The tool resolves every key table entry, so it also catches key
/// references that validation could not check, such as paths outside the
/// managed keys directory.
#[derive(Clone, Debug)]
pub struct TestKey {
    pub timeout: Duration,
}

impl Default for TestKey {
    fn default() -> Self {
        Self {
            timeout: CHECK_TIMEOUT,
        }
    }
}

impl ConfigCheck for TestKey {
    type Check<'a> = Pin<Box<dyn Future<Output = Result<(), CheckError>> + Send + 'a>>;

    fn check(&self, conf_path: &Path) -> Self::Check<'_> {
        let conf = conf_path.to_owned();
        let limit = self.timeout;

        Box::pin(async move {
            let run = Command::new("opendkim-testkey")
                .arg("-x")
                .arg(&conf)
                .arg("-vv")
                .output();

            let output = match time::timeout(limit, run).await {
                Ok(result) => result.map_err(CheckError::Spawn)?,
                Err(_) => return Err(CheckError::TimedOut(limit)),
            };

            if output.status.success() {
                Ok(())
            } else {
                let detail = String::from_utf8_lossy(&output.stderr);
                Err(CheckError::Failed(detail.trim().to_owned()))
            }
        })
    }
}
