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

//! Daemon configuration and its validation.

use crate::{
    secret::{PrivateKeys, SecretError, SecretId, SecretStore},
    tables::{KeyTableEntry, SigningTableEntry},
    util::CanonicalStr,
};
use serde::de::DeserializeOwned;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};
use tracing::error;

/// The TCP port on which the daemon accepts milter connections.
pub const MILTER_PORT: u16 = 8892;

pub const DEFAULT_CANONICALIZATION: &str = "relaxed/relaxed";

pub const DEFAULT_INTERNAL_HOSTS: &str = "0.0.0.0/0";

/// The default set of header fields to sign. These are the example header
/// fields given in RFC 6376, section 5.4.1.
pub const DEFAULT_SIGN_HEADERS: &str = "From,Reply-To,Subject,Date,To,Cc\
,Resent-From,Resent-Date,Resent-To,Resent-Cc\
,In-Reply-To,References\
,MIME-Version,Message-ID,Content-Type";

/// The raw operator-provided configuration options.
///
/// The two tables are YAML documents: a sequence of two-element string
/// sequences for the signing table, and a sequence of two- or four-element
/// string sequences for the key table. `private_keys` is a reference to the
/// secret holding the private key material.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Options {
    pub signing_table: Option<String>,
    pub key_table: Option<String>,
    pub private_keys: Option<String>,
}

/// The daemon operating mode: signing, verifying, or both.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    Sign,
    Verify,
    #[default]
    SignAndVerify,
}

impl CanonicalStr for Mode {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Sign => "s",
            Self::Verify => "v",
            Self::SignAndVerify => "sv",
        }
    }
}

/// Locations of the managed configuration artifacts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Paths {
    /// Directory holding the private key files and the two tables.
    pub keys_dir: PathBuf,
    /// Location of the main daemon configuration file.
    pub conf: PathBuf,
}

impl Paths {
    pub fn signing_table_path(&self) -> PathBuf {
        self.keys_dir.join("signingtable")
    }

    pub fn key_table_path(&self) -> PathBuf {
        self.keys_dir.join("keytable")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("/etc/dkimkeys"),
            conf: PathBuf::from("/etc/opendkim.conf"),
        }
    }
}

/// An error describing why the configuration options could not be turned
/// into a usable [`Config`].
///
/// Both variants aggregate every failure found, not only the first: the
/// operator gets one message naming everything that needs fixing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// One problem per unusable raw input, in input order.
    Input(Vec<String>),
    /// Names of the fields of the assembled configuration that failed
    /// validation, in field order.
    Fields(Vec<String>),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(problems) => f.write_str(&problems.join(" - ")),
            Self::Fields(fields) => write!(f, "wrong config options: {}.", fields.join(",")),
        }
    }
}

impl Error for ConfigError {}

/// An error that occurs when resolving the raw options into a [`Config`].
#[derive(Debug)]
pub enum ResolveError {
    /// The options are invalid; reported, and recoverable by reconfiguring.
    Invalid(ConfigError),
    /// The secret store could not produce the private key material; fatal
    /// for the running cycle.
    Secret(SecretError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(error) => error.fmt(f),
            Self::Secret(error) => error.fmt(f),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(error) => Some(error),
            Self::Secret(error) => Some(error),
        }
    }
}

/// The validated daemon configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The DKIM canonicalization scheme, as a `header/body` pair.
    pub canonicalization: String,
    /// The socket on which the daemon listens for milter connections.
    pub socket: String,
    /// Comma-separated list of header fields to sign.
    pub sign_headers: String,
    /// Hosts whose outgoing mail is to be signed.
    pub internal_hosts: String,
    /// The daemon operating mode.
    pub mode: Mode,
    pub signing_table: Vec<SigningTableEntry>,
    pub key_table: Vec<KeyTableEntry>,
    pub private_keys: PrivateKeys,
}

impl Config {
    /// Assembles a configuration from the parsed tables and key material,
    /// applying the defaults for everything else.
    pub fn new(
        signing_table: Vec<SigningTableEntry>,
        key_table: Vec<KeyTableEntry>,
        private_keys: PrivateKeys,
    ) -> Self {
        Self {
            canonicalization: DEFAULT_CANONICALIZATION.into(),
            socket: format!("inet:{MILTER_PORT}"),
            sign_headers: DEFAULT_SIGN_HEADERS.into(),
            internal_hosts: DEFAULT_INTERNAL_HOSTS.into(),
            mode: Mode::default(),
            signing_table,
            key_table,
            private_keys,
        }
    }

    /// Whether the daemon signs outgoing mail in the configured mode.
    pub fn signing_enabled(&self) -> bool {
        matches!(self.mode, Mode::Sign | Mode::SignAndVerify)
    }

    /// Validates the raw options and resolves the private key material into
    /// a usable configuration.
    ///
    /// Every independently checkable input is checked before reporting, so
    /// a single `ConfigError` names all invalid inputs at once. The secret
    /// is re-resolved on every call; content rotated since the last cycle is
    /// picked up here.
    pub async fn resolve<S>(
        options: &Options,
        paths: &Paths,
        secrets: &S,
    ) -> Result<Self, ResolveError>
    where
        S: SecretStore,
    {
        let mut problems = Vec::new();

        let signing_table: Option<Vec<SigningTableEntry>> =
            match parse_table_option(options.signing_table.as_deref(), "signingtable") {
                Ok(table) => Some(table),
                Err(problem) => {
                    problems.push(problem);
                    None
                }
            };

        let key_table: Option<Vec<KeyTableEntry>> =
            match parse_table_option(options.key_table.as_deref(), "keytable") {
                Ok(table) => Some(table),
                Err(problem) => {
                    problems.push(problem);
                    None
                }
            };

        let secret_ref = options
            .private_keys
            .as_deref()
            .filter(|value| !value.is_empty());
        if secret_ref.is_none() {
            problems.push("empty private-keys configuration".into());
        }

        // A problem was recorded exactly when one of the three is `None`.
        let (Some(signing_table), Some(key_table), Some(secret_ref)) =
            (signing_table, key_table, secret_ref)
        else {
            return Err(ResolveError::Invalid(ConfigError::Input(problems)));
        };

        let id = SecretId::new(secret_ref);
        let private_keys = secrets.get(&id).await.map_err(ResolveError::Secret)?;

        let config = Self::new(signing_table, key_table, private_keys);

        let mut fields: Vec<&str> = Vec::new();
        if config.signing_table.is_empty() {
            fields.push("signingtable");
        }
        if config.key_table.is_empty() {
            fields.push("keytable");
        }
        if config.private_keys.is_empty()
            || config
                .private_keys
                .keys()
                .any(|name| name.is_empty() || name.contains('/'))
        {
            fields.push("private-keys");
        }
        if config
            .key_table
            .iter()
            .any(|entry| dangling_key_ref(entry, &config.private_keys, &paths.keys_dir))
            && !fields.contains(&"keytable")
        {
            fields.push("keytable");
        }

        if !fields.is_empty() {
            let fields = fields.into_iter().map(String::from).collect();
            return Err(ResolveError::Invalid(ConfigError::Fields(fields)));
        }

        Ok(config)
    }
}

fn parse_table_option<T>(value: Option<&str>, name: &str) -> Result<T, String>
where
    T: DeserializeOwned,
{
    let value = value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("empty {name} configuration"))?;

    serde_yaml::from_str(value).map_err(|error| {
        error!(option = name, %error, "failed loading table option");
        format!("wrong {name} format")
    })
}

/// True when the entry points into the managed keys directory but names no
/// key present in the key material. Paths outside the managed directory are
/// provisioned by other means and are left to the external daemon check.
fn dangling_key_ref(entry: &KeyTableEntry, keys: &PrivateKeys, keys_dir: &Path) -> bool {
    let path = Path::new(&entry.key_path);
    if path.parent() != Some(keys_dir) {
        return false;
    }

    match path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(".private"))
    {
        Some(name) => !keys.contains_key(name),
        None => true,
    }
}
