//! Runs one reconciliation cycle on the local host.
//!
//! The private keys are read from a directory, one PEM file per key, in
//! place of a hosted secret store, and a single milter consumer is assumed
//! to be present. Requires the daemon and its tooling to be installed.

use std::{env, future::Future, path::PathBuf, pin::Pin, process};
use tokio::fs;
use viamilter::{
    report, HostFiles, MilterRelations, Options, PrivateKeys, Reconciler, RelationError,
    SecretError, SecretId, SecretStore, Status, Systemd, TestKey, Trigger,
};

/// Resolves the secret reference as a directory of PEM files.
struct DirSecrets;

impl SecretStore for DirSecrets {
    type Query<'a> = Pin<Box<dyn Future<Output = Result<PrivateKeys, SecretError>> + Send + 'a>>;

    fn get(&self, id: &SecretId) -> Self::Query<'_> {
        let dir = PathBuf::from(id.as_str());

        Box::pin(async move {
            let describe = |e: std::io::Error| SecretError::new(format!("{}: {e}", dir.display()));

            let mut keys = PrivateKeys::new();
            let mut entries = fs::read_dir(&dir).await.map_err(describe)?;
            while let Some(entry) = entries.next_entry().await.map_err(describe)? {
                let path = entry.path();
                if let Some(name) = path.file_stem().and_then(|name| name.to_str()) {
                    let pem = fs::read_to_string(&path).await.map_err(describe)?;
                    keys.insert(name.to_owned(), pem);
                }
            }
            Ok(keys)
        })
    }
}

/// A single assumed consumer; the published port is only printed.
struct AssumedRelation;

impl MilterRelations for AssumedRelation {
    fn is_empty(&self) -> bool {
        false
    }

    fn publish_port(&mut self, port: u16) -> Result<(), RelationError> {
        println!("milter port: {port}");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut args = env::args();

    let (signing_table, key_table, keys_dir) = match (
        args.next().as_deref(),
        args.next(),
        args.next(),
        args.next(),
        args.next(),
    ) {
        (_, Some(signing_table), Some(key_table), Some(keys_dir), None) => {
            (signing_table, key_table, keys_dir)
        }
        (program, ..) => {
            eprintln!(
                "usage: {} <signingtable.yaml> <keytable.yaml> <keys_dir>",
                program.unwrap_or("reconcile")
            );
            process::exit(2);
        }
    };

    let options = Options {
        signing_table: Some(fs::read_to_string(signing_table).await.unwrap()),
        key_table: Some(fs::read_to_string(key_table).await.unwrap()),
        private_keys: Some(keys_dir),
    };

    let mut reconciler = Reconciler::new(
        DirSecrets,
        AssumedRelation,
        Systemd::default(),
        TestKey::default(),
        HostFiles,
    );

    let result = reconciler.reconcile(Trigger::ConfigChanged, &options).await;

    let status = report(&result);
    println!("{status}");
    if status != Status::Active {
        process::exit(1);
    }
}
