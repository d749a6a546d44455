use std::{
    collections::BTreeMap,
    future::Future,
    io,
    path::{Path, PathBuf},
    pin::Pin,
    sync::{Arc, Mutex},
};
use viamilter::{
    Artifact, CheckError, ConfigCheck, Files, MilterRelations, Options, PrivateKeys,
    Reconciler, RelationError, SecretError, SecretId, SecretStore, ServiceError, ServiceManager,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const SIGNING_TABLE_YAML: &str = r#"[["*@example.com", "sel._domainkey.example.com"]]"#;
pub const KEY_TABLE_YAML: &str =
    r#"[["sel._domainkey.example.com", "example.com:sel:/etc/dkimkeys/k1.private"]]"#;

/// A file as it ended up on the virtual filesystem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredFile {
    pub content: String,
    pub mode: u32,
    pub owner: String,
}

/// In-memory [`Files`], shared between the test and the reconciler.
#[derive(Clone, Default)]
pub struct MemoryFiles {
    files: Arc<Mutex<BTreeMap<PathBuf, StoredFile>>>,
}

impl MemoryFiles {
    pub fn get(&self, path: &str) -> Option<StoredFile> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }

    pub fn count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// Places pre-existing content, as if applied by an earlier cycle.
    pub fn seed(&self, path: &str, content: &str) {
        self.files.lock().unwrap().insert(
            PathBuf::from(path),
            StoredFile {
                content: content.into(),
                mode: 0o644,
                owner: "opendkim".into(),
            },
        );
    }
}

impl Files for MemoryFiles {
    type Read<'a> = BoxFuture<'a, io::Result<String>>;
    type Write<'a> = BoxFuture<'a, io::Result<()>>;

    fn read_or_empty(&self, path: &Path) -> Self::Read<'_> {
        let content = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .map(|file| file.content.clone())
            .unwrap_or_default();

        Box::pin(async move { Ok(content) })
    }

    fn write(&self, artifact: &Artifact) -> Self::Write<'_> {
        self.files.lock().unwrap().insert(
            artifact.path.clone(),
            StoredFile {
                content: artifact.content.clone(),
                mode: artifact.mode,
                owner: artifact.owner.clone(),
            },
        );

        Box::pin(async move { Ok(()) })
    }
}

/// In-memory [`SecretStore`].
#[derive(Clone, Default)]
pub struct MemorySecrets {
    secrets: Arc<Mutex<BTreeMap<String, PrivateKeys>>>,
}

impl MemorySecrets {
    pub fn insert(&self, id: &str, keys: PrivateKeys) {
        self.secrets.lock().unwrap().insert(id.into(), keys);
    }
}

impl SecretStore for MemorySecrets {
    type Query<'a> = BoxFuture<'a, Result<PrivateKeys, SecretError>>;

    fn get(&self, id: &SecretId) -> Self::Query<'_> {
        let result = self
            .secrets
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| SecretError::new(format!("secret {id} not found")));

        Box::pin(async move { result })
    }
}

/// [`ServiceManager`] recording the sequence of lifecycle commands.
#[derive(Clone, Default)]
pub struct RecordingService {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub failing: bool,
}

impl RecordingService {
    fn record(&self, verb: &'static str) -> BoxFuture<'static, Result<(), ServiceError>> {
        self.calls.lock().unwrap().push(verb);
        let failing = self.failing;

        Box::pin(async move {
            if failing {
                Err(ServiceError::Spawn(io::Error::new(
                    io::ErrorKind::Other,
                    "service manager unavailable",
                )))
            } else {
                Ok(())
            }
        })
    }
}

impl ServiceManager for RecordingService {
    type Action<'a> = BoxFuture<'a, Result<(), ServiceError>>;

    fn restart(&self) -> Self::Action<'_> {
        self.record("restart")
    }

    fn reload(&self) -> Self::Action<'_> {
        self.record("reload")
    }
}

/// [`ConfigCheck`] with a canned verdict.
#[derive(Clone, Default)]
pub struct StubCheck {
    pub failure: Option<String>,
    pub checked: Arc<Mutex<Vec<PathBuf>>>,
}

impl ConfigCheck for StubCheck {
    type Check<'a> = BoxFuture<'a, Result<(), CheckError>>;

    fn check(&self, conf_path: &Path) -> Self::Check<'_> {
        self.checked.lock().unwrap().push(conf_path.to_owned());
        let result = match &self.failure {
            Some(detail) => Err(CheckError::Failed(detail.clone())),
            None => Ok(()),
        };

        Box::pin(async move { result })
    }
}

/// [`MilterRelations`] with a fixed number of instances, recording every
/// published port.
#[derive(Clone, Default)]
pub struct MockRelations {
    pub instances: usize,
    pub published: Arc<Mutex<Vec<u16>>>,
}

impl MilterRelations for MockRelations {
    fn is_empty(&self) -> bool {
        self.instances == 0
    }

    fn publish_port(&mut self, port: u16) -> Result<(), RelationError> {
        let mut published = self.published.lock().unwrap();
        for _ in 0..self.instances {
            published.push(port);
        }
        Ok(())
    }
}

pub fn scenario_options() -> Options {
    Options {
        signing_table: Some(SIGNING_TABLE_YAML.into()),
        key_table: Some(KEY_TABLE_YAML.into()),
        private_keys: Some("secret:opendkim-keys".into()),
    }
}

pub fn scenario_secrets() -> MemorySecrets {
    let secrets = MemorySecrets::default();
    let mut keys = PrivateKeys::new();
    keys.insert("k1".into(), "PEMDATA".into());
    secrets.insert("opendkim-keys", keys);
    secrets
}

/// The collaborators of one reconciler, kept around so tests can observe
/// what the cycle did to them.
pub struct Harness {
    pub secrets: MemorySecrets,
    pub relations: MockRelations,
    pub service: RecordingService,
    pub check: StubCheck,
    pub files: MemoryFiles,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            secrets: scenario_secrets(),
            relations: MockRelations {
                instances: 1,
                ..Default::default()
            },
            service: RecordingService::default(),
            check: StubCheck::default(),
            files: MemoryFiles::default(),
        }
    }

    pub fn reconciler(
        &self,
    ) -> Reconciler<MemorySecrets, MockRelations, RecordingService, StubCheck, MemoryFiles> {
        Reconciler::new(
            self.secrets.clone(),
            self.relations.clone(),
            self.service.clone(),
            self.check.clone(),
            self.files.clone(),
        )
    }
}
