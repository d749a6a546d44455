//! Status reporting.

use crate::reconcile::{Outcome, ReconcileError};
use std::fmt::{self, Display, Formatter};

/// The externally visible state of the managed workload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// Converged, daemon serving the desired configuration.
    Active,
    /// Not converged; the message says what the operator needs to fix or
    /// provide.
    Blocked(String),
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Blocked(message) => write!(f, "blocked: {message}"),
        }
    }
}

/// Maps the result of a reconciliation cycle to the status to report.
///
/// Pure: every failure, recoverable or fatal, becomes `Blocked` with a
/// human-readable reason; only a fully converged cycle is `Active`.
pub fn report(result: &Result<Outcome, ReconcileError>) -> Status {
    match result {
        Ok(Outcome::Converged) => Status::Active,
        Ok(Outcome::WaitingForRelation) => Status::Blocked("missing milter relations".into()),
        Ok(Outcome::InvalidConfig(error)) => Status::Blocked(error.to_string()),
        Ok(Outcome::CheckFailed(error)) => Status::Blocked(error.to_string()),
        Err(error) => Status::Blocked(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{check::CheckError, config::ConfigError};

    #[test]
    fn converged_is_active() {
        assert_eq!(report(&Ok(Outcome::Converged)), Status::Active);
    }

    #[test]
    fn missing_relation_blocks() {
        assert_eq!(
            report(&Ok(Outcome::WaitingForRelation)),
            Status::Blocked("missing milter relations".into())
        );
    }

    #[test]
    fn invalid_config_blocks_with_reason() {
        let outcome = Outcome::InvalidConfig(ConfigError::Fields(vec!["keytable".into()]));

        assert_eq!(
            report(&Ok(outcome)),
            Status::Blocked("wrong config options: keytable.".into())
        );
    }

    #[test]
    fn check_failure_blocks_with_detail() {
        let outcome = Outcome::CheckFailed(CheckError::Failed("key not found".into()));

        assert_eq!(
            report(&Ok(outcome)),
            Status::Blocked("opendkim-testkey failed: key not found".into())
        );
    }
}
