//! Service manager control of the milter daemon.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    future::Future,
    io,
    pin::Pin,
    process::ExitStatus,
};
use tokio::process::Command;

/// The name of the system service running the milter daemon.
pub const DAEMON_SERVICE: &str = "opendkim";

#[derive(Debug)]
pub enum ServiceError {
    /// The service manager command could not be run at all.
    Spawn(io::Error),
    /// The service manager command ran and reported failure.
    Failed {
        verb: &'static str,
        status: ExitStatus,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(error) => write!(f, "cannot run systemctl: {error}"),
            Self::Failed { verb, status } => write!(f, "systemctl {verb} exited with {status}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(error) => Some(error),
            Self::Failed { .. } => None,
        }
    }
}

/// Lifecycle control of the managed service, fire-and-wait. A reload
/// re-reads configuration without dropping connections; a restart fully
/// stops and starts the process.
pub trait ServiceManager {
    type Action<'a>: Future<Output = Result<(), ServiceError>> + Send + 'a
    where
        Self: 'a;

    fn restart(&self) -> Self::Action<'_>;

    fn reload(&self) -> Self::Action<'_>;
}

/// [`ServiceManager`] driving a systemd service through `systemctl`.
#[derive(Clone, Debug)]
pub struct Systemd {
    service: String,
}

impl Systemd {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn run(&self, verb: &'static str) -> Result<(), ServiceError> {
        let status = Command::new("systemctl")
            .arg(verb)
            .arg(&self.service)
            .status()
            .await
            .map_err(ServiceError::Spawn)?;

        if status.success() {
            Ok(())
        } else {
            Err(ServiceError::Failed { verb, status })
        }
    }
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new(DAEMON_SERVICE)
    }
}

impl ServiceManager for Systemd {
    type Action<'a> = Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>>;

    fn restart(&self) -> Self::Action<'_> {
        Box::pin(self.run("restart"))
    }

    fn reload(&self) -> Self::Action<'_> {
        Box::pin(self.run("reload"))
    }
}
