//! Private key material and its resolution.

use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{self, Display, Formatter},
    future::Future,
};

/// Private key material: key name to PEM-encoded private key content.
///
/// Backed by a `BTreeMap` so that iteration, and therefore rendering, is
/// deterministic regardless of the order in which the secret store returns
/// entries.
pub type PrivateKeys = BTreeMap<String, String>;

/// An opaque reference to a secret holding the private key material.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SecretId(String);

impl SecretId {
    /// Creates a secret reference, discarding a leading `secret:` scheme
    /// prefix if present.
    pub fn new(id: &str) -> Self {
        let id = id.strip_prefix("secret:").unwrap_or(id);
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SecretId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecretError {
    message: String,
}

impl SecretError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for SecretError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl Error for SecretError {}

/// A store resolving a secret reference to private key material.
///
/// Implementations must resolve fresh content on every call: secret content
/// may be rotated between reconciliation cycles, and the reconciler never
/// caches resolved material across cycles.
pub trait SecretStore {
    type Query<'a>: Future<Output = Result<PrivateKeys, SecretError>> + Send + 'a
    where
        Self: 'a;

    fn get(&self, id: &SecretId) -> Self::Query<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_id_strips_scheme_prefix() {
        assert_eq!(SecretId::new("secret:abc123").as_str(), "abc123");
        assert_eq!(SecretId::new("abc123").as_str(), "abc123");
    }
}
