//! The milter peer relation.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationError {
    message: String,
}

impl RelationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for RelationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl Error for RelationError {}

/// The relation towards the mail transfer agents consuming this milter.
///
/// At least one relation instance must be present before any configuration
/// is written to disk: rendered key material must never end up in files
/// without a consuming peer declared.
pub trait MilterRelations {
    /// True when no relation instance is present.
    fn is_empty(&self) -> bool;

    /// Writes the milter port, as a decimal string under the key `port`,
    /// into the local data of every present relation instance.
    fn publish_port(&mut self, port: u16) -> Result<(), RelationError>;
}
