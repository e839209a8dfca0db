//! Source staging: writing submitted code where the runtime can mount it.

use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};

/// File mode of staged sources; the unit may run as any user.
#[cfg(unix)]
const STAGED_MODE: u32 = 0o777;

/// Writes each submission to its own uniquely named file.
#[derive(Debug, Clone)]
pub struct Stager {
    /// Directory this process writes into.
    local_dir: PathBuf,
    /// The same directory as seen by the Docker daemon.
    bind_prefix: PathBuf,
}

impl Stager {
    /// Create a stager.
    ///
    /// `bind_prefix` differs from `local_dir` when this process runs in a
    /// container that shares the staging directory with the Docker host.
    pub fn new(local_dir: impl Into<PathBuf>, bind_prefix: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            bind_prefix: bind_prefix.into(),
        }
    }

    /// A stager whose local and bind paths coincide.
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::new(dir.clone(), dir)
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn bind_prefix(&self) -> &Path {
        &self.bind_prefix
    }

    /// Write `source` to a fresh file and return a guard owning it.
    ///
    /// Nothing is left on disk when this returns an error.
    pub async fn stage(&self, source: &str) -> Result<StagedSource> {
        tokio::fs::create_dir_all(&self.local_dir)
            .await
            .map_err(CoreError::Staging)?;

        let file_name = uuid::Uuid::new_v4().to_string();
        let local_path = self.local_dir.join(&file_name);

        if let Err(e) = tokio::fs::write(&local_path, source.as_bytes()).await {
            let _ = tokio::fs::remove_file(&local_path).await;
            return Err(CoreError::Staging(e));
        }

        // From here on the guard owns the file.
        let staged = StagedSource {
            local_path,
            bind_path: self.bind_prefix.join(&file_name),
            len: source.len(),
            released: false,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &staged.local_path,
                std::fs::Permissions::from_mode(STAGED_MODE),
            )
            .await
            .map_err(CoreError::Staging)?;
        }

        tracing::trace!(path = %staged.local_path.display(), bytes = staged.len, "Source staged");
        Ok(staged)
    }
}

/// A staged source file, deleted when released or dropped.
#[derive(Debug)]
pub struct StagedSource {
    local_path: PathBuf,
    bind_path: PathBuf,
    len: usize,
    released: bool,
}

impl StagedSource {
    /// Path this process wrote.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Path to hand to the runtime as the bind-mount source.
    pub fn bind_path(&self) -> &Path {
        &self.bind_path
    }

    /// Size of the staged source in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the file.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.local_path).await {
            Ok(()) => {
                tracing::trace!(path = %self.local_path.display(), "Staged source removed")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.local_path.display(),
                error = %e,
                "Failed to remove staged source"
            ),
        }
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.local_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.local_path.display(),
                error = %e,
                "Failed to remove staged source"
            ),
        }
    }
}
