//! Filesystem access for the rendered artifacts.

use crate::render::Artifact;
use std::{
    fs::Permissions,
    future::Future,
    io,
    os::unix::fs::PermissionsExt,
    path::Path,
    pin::Pin,
};
use tokio::fs;

/// Filesystem access as needed by the reconciler: read back the previously
/// applied content, and place an artifact on disk with its permission and
/// ownership metadata.
pub trait Files {
    type Read<'a>: Future<Output = io::Result<String>> + Send + 'a
    where
        Self: 'a;
    type Write<'a>: Future<Output = io::Result<()>> + Send + 'a
    where
        Self: 'a;

    /// Returns the content of the file at `path`, or the empty string when
    /// no such file exists. Absence is not an error.
    fn read_or_empty(&self, path: &Path) -> Self::Read<'_>;

    /// Writes the artifact's content and applies its mode and owner.
    fn write(&self, artifact: &Artifact) -> Self::Write<'_>;
}

/// [`Files`] backed by the host filesystem.
///
/// Writing is write, then chmod, then chown. Nothing but the daemon reads
/// these files after the cycle completes, so the brief window with default
/// ownership is acceptable.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFiles;

impl Files for HostFiles {
    type Read<'a> = Pin<Box<dyn Future<Output = io::Result<String>> + Send + 'a>>;
    type Write<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

    fn read_or_empty(&self, path: &Path) -> Self::Read<'_> {
        let path = path.to_owned();

        Box::pin(async move {
            match fs::read_to_string(&path).await {
                Ok(content) => Ok(content),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(String::new()),
                Err(error) => Err(error),
            }
        })
    }

    fn write(&self, artifact: &Artifact) -> Self::Write<'_> {
        let artifact = artifact.clone();

        Box::pin(async move {
            fs::write(&artifact.path, artifact.content.as_bytes()).await?;
            fs::set_permissions(&artifact.path, Permissions::from_mode(artifact.mode)).await?;
            chown(&artifact.path, &artifact.owner)
        })
    }
}

fn chown(path: &Path, owner: &str) -> io::Result<()> {
    let user = nix::unistd::User::from_name(owner)
        .map_err(errno_to_io)?
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such user: {owner}"))
        })?;

    nix::unistd::chown(path, Some(user.uid), Some(user.gid)).map_err(errno_to_io)
}

fn errno_to_io(errno: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[tokio::test]
    async fn host_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keytable");

        // Chowning to the user we already are is a no-op that works
        // unprivileged.
        let me = nix::unistd::User::from_uid(nix::unistd::geteuid())
            .unwrap()
            .unwrap();

        let artifact = Artifact {
            path: path.clone(),
            content: "k example.com:sel:/etc/dkimkeys/k.private".into(),
            mode: 0o600,
            owner: me.name,
        };

        let files = HostFiles;
        files.write(&artifact).await.unwrap();

        assert_eq!(files.read_or_empty(&path).await.unwrap(), artifact.content);
        assert_eq!(
            std::fs::metadata(&path).unwrap().mode() & 0o777,
            artifact.mode
        );
    }

    #[tokio::test]
    async fn read_or_empty_tolerates_absent_file() {
        let dir = tempfile::tempdir().unwrap();

        let content = HostFiles
            .read_or_empty(&dir.path().join("does-not-exist"))
            .await
            .unwrap();

        assert_eq!(content, "");
    }
}
