//! Signing table and key table entries.
//!
//! The signing table maps sender address patterns to key selector references;
//! the key table maps each reference to the signing domain, the selector
//! published in DNS, and the location of the private key file. Both tables
//! are rendered one entry per line with the entry fields joined by a single
//! space, which is the format the milter daemon reads.

use serde::Deserialize;
use std::fmt::{self, Display, Formatter};

/// An entry of the signing table: a sender address pattern (for example
/// `*@example.com`) paired with the name of a key table entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "(String, String)")]
pub struct SigningTableEntry {
    pub pattern: String,
    pub selector: String,
}

impl SigningTableEntry {
    pub fn new(pattern: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            selector: selector.into(),
        }
    }

    /// Formats this entry as a signing table line.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.pattern, self.selector)
    }
}

impl From<(String, String)> for SigningTableEntry {
    fn from((pattern, selector): (String, String)) -> Self {
        Self { pattern, selector }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TableRowError {
    RowShape(usize),
    KeySpecSyntax,
}

impl Display for TableRowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowShape(n) => write!(f, "table row has {n} fields, expected 2 or 4"),
            Self::KeySpecSyntax => write!(f, "key specification is not domain:selector:path"),
        }
    }
}

impl std::error::Error for TableRowError {}

/// An entry of the key table.
///
/// Raw rows come in two shapes: the rendered two-column form, where the
/// second column carries `domain:selector:path` as a compound value, and the
/// split four-column form with one field per component.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "Vec<String>")]
pub struct KeyTableEntry {
    /// The key selector reference named by signing table entries.
    pub name: String,
    /// The signing domain recorded in the d= tag.
    pub domain: String,
    /// The selector under which the public key is published in DNS.
    pub selector: String,
    /// Location of the PEM-encoded private key file.
    pub key_path: String,
}

impl KeyTableEntry {
    pub fn from_row(row: &[String]) -> Result<Self, TableRowError> {
        match row {
            [name, spec] => {
                let mut parts = spec.splitn(3, ':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(domain), Some(selector), Some(key_path)) => Ok(Self {
                        name: name.clone(),
                        domain: domain.into(),
                        selector: selector.into(),
                        key_path: key_path.into(),
                    }),
                    _ => Err(TableRowError::KeySpecSyntax),
                }
            }
            [name, domain, selector, key_path] => Ok(Self {
                name: name.clone(),
                domain: domain.clone(),
                selector: selector.clone(),
                key_path: key_path.clone(),
            }),
            _ => Err(TableRowError::RowShape(row.len())),
        }
    }

    /// Formats this entry as a key table line, with the compound
    /// `domain:selector:path` second column.
    pub fn to_line(&self) -> String {
        format!(
            "{} {}:{}:{}",
            self.name, self.domain, self.selector, self.key_path
        )
    }
}

impl TryFrom<Vec<String>> for KeyTableEntry {
    type Error = TableRowError;

    fn try_from(row: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_row(&row)
    }
}
