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

//! Rendering of the on-disk configuration artifacts.
//!
//! Rendering is pure: a given [`Config`] always yields a byte-identical
//! [`ArtifactSet`], which is what makes content diffing against the
//! previously applied configuration meaningful.

use crate::{
    config::{Config, Paths},
    util::CanonicalStr,
};
use std::{collections::BTreeMap, path::PathBuf};

/// The system user owning the rendered files.
pub const DAEMON_USER: &str = "opendkim";

/// A file to be placed on disk: content plus permission and ownership
/// metadata. Constructed fresh on every reconciliation cycle and never
/// retained beyond it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
    /// POSIX permission bits, e.g. `0o600`.
    pub mode: u32,
    /// Name of the owning system user.
    pub owner: String,
}

/// The complete set of artifacts representing one desired on-disk state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactSet {
    /// One private key file per key, mode 0600.
    pub keys: Vec<Artifact>,
    pub signing_table: Artifact,
    pub key_table: Artifact,
    /// The main daemon configuration file. The only artifact participating
    /// in the restart decision.
    pub conf: Artifact,
}

impl ArtifactSet {
    /// All artifacts except the main configuration file. These carry no
    /// restart semantics of their own and are rewritten unconditionally.
    pub fn support(&self) -> impl Iterator<Item = &Artifact> {
        self.keys
            .iter()
            .chain(Some(&self.signing_table))
            .chain(Some(&self.key_table))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.support().chain(Some(&self.conf))
    }
}

/// Renders the artifact set for the given configuration.
pub fn render(config: &Config, paths: &Paths) -> ArtifactSet {
    let keys = config
        .private_keys
        .iter()
        .map(|(name, pem)| Artifact {
            path: paths.keys_dir.join(format!("{name}.private")),
            content: pem.clone(),
            mode: 0o600,
            owner: DAEMON_USER.into(),
        })
        .collect();

    let signing_table = Artifact {
        path: paths.signing_table_path(),
        content: table_body(config.signing_table.iter().map(|entry| entry.to_line())),
        mode: 0o644,
        owner: DAEMON_USER.into(),
    };

    let key_table = Artifact {
        path: paths.key_table_path(),
        content: table_body(config.key_table.iter().map(|entry| entry.to_line())),
        mode: 0o644,
        owner: DAEMON_USER.into(),
    };

    let conf = Artifact {
        path: paths.conf.clone(),
        content: conf_body(config, paths),
        mode: 0o644,
        owner: DAEMON_USER.into(),
    };

    ArtifactSet {
        keys,
        signing_table,
        key_table,
        conf,
    }
}

fn table_body(lines: impl Iterator<Item = String>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}

const CONF_TEMPLATE: &str = "\
# This file is managed by viamilter. Local changes will be overwritten.
Syslog                  yes
UMask                   007
UserID                  opendkim
PidFile                 /run/opendkim/opendkim.pid
TrustAnchorFile         /usr/share/dns/root.key
Canonicalization        {canonicalization}
Mode                    {mode}
Socket                  {socket}
SignHeaders             {signheaders}
InternalHosts           {internalhosts}
";

const CONF_SIGNING_TEMPLATE: &str = "\
SigningTable            refile:{signingtable}
KeyTable                {keytable}
";

/// Produces the main daemon configuration file content.
///
/// The directives enabling table-driven signing are included only when the
/// configured mode has signing enabled; that decision is made here, not in
/// the template text.
pub fn conf_body(config: &Config, paths: &Paths) -> String {
    let context = conf_context(config, paths);

    let mut body = substitute(CONF_TEMPLATE, &context);
    if config.signing_enabled() {
        body.push_str(&substitute(CONF_SIGNING_TEMPLATE, &context));
    }
    body
}

fn conf_context(config: &Config, paths: &Paths) -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("canonicalization", config.canonicalization.clone()),
        ("mode", config.mode.canonical_str().into()),
        ("socket", config.socket.clone()),
        ("signheaders", config.sign_headers.clone()),
        ("internalhosts", config.internal_hosts.clone()),
        (
            "signingtable",
            paths.signing_table_path().display().to_string(),
        ),
        ("keytable", paths.key_table_path().display().to_string()),
    ])
}

/// Replaces every `{name}` placeholder with the corresponding context value.
/// Identical inputs always produce identical output.
fn substitute(template: &str, context: &BTreeMap<&'static str, String>) -> String {
    let mut out = template.to_owned();
    for (name, value) in context {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
