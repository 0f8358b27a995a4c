// Copyright 2024 Casper Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Scoped scratch files handed to the signing tool.
//!
//! Every transaction gets its own [`StagingArea`] so concurrent builds never share
//! files. Secret keys only touch disk through a [`SecretFile`], which is zeroed
//! before removal.

use std::path::Path;

use async_tempfile::TempFile;
use tokio::io::AsyncWriteExt;

use crate::key::SecretKey;

/// Unique staging and witness files for one transaction build.
///
/// Both files are removed when the area is dropped, whether or not the build succeeded.
pub struct StagingArea {
    staging: TempFile,
    witness: TempFile,
}

impl StagingArea {
    pub async fn new() -> anyhow::Result<Self> {
        let staging = TempFile::new().await?;
        let witness = TempFile::new().await?;
        tracing::trace!(
            staging = %staging.file_path().display(),
            witness = %witness.file_path().display(),
            "created staging area"
        );
        Ok(StagingArea { staging, witness })
    }

    /// Path of the staging file the tool mutates step by step.
    pub fn staging_path(&self) -> &Path {
        self.staging.file_path().as_path()
    }

    /// Path the tool writes the witness to.
    pub fn witness_path(&self) -> &Path {
        self.witness.file_path().as_path()
    }
}

/// A secret key written to a private temp file for the tool to read.
pub struct SecretFile {
    file: Option<TempFile>,
    len: usize,
}

impl SecretFile {
    pub async fn write(secret: &SecretKey) -> anyhow::Result<Self> {
        let mut file = TempFile::new().await?;
        restrict_permissions(file.file_path()).await?;
        file.write_all(secret.expose().as_bytes()).await?;
        file.flush().await?;
        Ok(SecretFile {
            file: Some(file),
            len: secret.expose().len(),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.file {
            Some(file) => file.file_path().as_path(),
            None => Path::new(""),
        }
    }

    /// Overwrite the key material with zeros, then remove the file.
    pub async fn erase(mut self) -> anyhow::Result<()> {
        if let Some(file) = self.file.take() {
            let mut f = tokio::fs::OpenOptions::new()
                .write(true)
                .open(file.file_path())
                .await?;
            f.write_all(&vec![0u8; self.len]).await?;
            f.sync_all().await?;
            drop(file);
        }
        Ok(())
    }
}

impl Drop for SecretFile {
    fn drop(&mut self) {
        // Reached when a build fails before `erase`.
        if let Some(file) = self.file.take() {
            if let Err(e) = zero_in_place(file.file_path(), self.len) {
                tracing::warn!(
                    path = %file.file_path().display(),
                    error = %e,
                    "failed to zero secret file"
                );
            }
        }
    }
}

/// Overwrite the first `len` bytes of `path` without truncating it.
fn zero_in_place(path: &Path, len: usize) -> std::io::Result<()> {
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().write(true).open(path)?;
    f.write_all(&vec![0u8; len])?;
    f.sync_all()
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("staging", &self.staging_path())
            .field("witness", &self.witness_path())
            .finish()
    }
}

impl std::fmt::Debug for SecretFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFile").field("path", &self.path()).finish()
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::key::parse_secret_key;

    #[tokio::test]
    async fn staging_files_are_unique_and_removed() {
        let a = StagingArea::new().await.unwrap();
        let b = StagingArea::new().await.unwrap();
        assert_ne!(a.staging_path(), b.staging_path());
        assert_ne!(a.staging_path(), a.witness_path());

        let paths: Vec<PathBuf> = vec![a.staging_path().into(), a.witness_path().into()];
        drop(a);
        for p in paths {
            assert!(!p.exists());
        }
    }

    #[tokio::test]
    async fn secret_files_are_erased() {
        let sk = parse_secret_key("ed25519e_sk1secret").unwrap();
        let file = SecretFile::write(&sk).await.unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "ed25519e_sk1secret"
        );
        file.erase().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn zeroing_overwrites_without_truncating() {
        let file = TempFile::new().await.unwrap();
        let path = file.file_path().clone();
        tokio::fs::write(&path, b"secretkey").await.unwrap();

        zero_in_place(&path, 6).unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"\0\0\0\0\0\0key");
    }

    #[tokio::test]
    async fn dropped_secret_files_are_removed() {
        let sk = parse_secret_key("ed25519e_sk1secret").unwrap();
        let file = SecretFile::write(&sk).await.unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }
}
