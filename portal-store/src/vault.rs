//! File vault
//!
//! Physical file storage: an active directory for files in circulation and an
//! archive subdirectory (`_approved`) for approved ones. All names are
//! validated as single path components before touching the filesystem.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use portal_core::constants::{ALLOWED_EXTENSIONS, ARCHIVE_COLLISION_MARKER, ARCHIVE_DIR_NAME};
use portal_core::CoreError;

use crate::error::{StoreError, StoreResult};

/// A physical file as listed from disk
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

pub struct FileVault {
    active_dir: PathBuf,
    archive_dir: PathBuf,
}

impl FileVault {
    /// Open the vault rooted at `active_dir`, creating both directories.
    pub async fn open(active_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let active_dir = active_dir.as_ref().to_path_buf();
        let archive_dir = active_dir.join(ARCHIVE_DIR_NAME);
        fs::create_dir_all(&archive_dir).await?;
        Ok(Self {
            active_dir,
            archive_dir,
        })
    }

    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Resolve a name inside the active directory, rejecting anything that is
    /// not a plain file name.
    pub fn active_path(&self, name: &str) -> StoreResult<PathBuf> {
        Ok(self.active_dir.join(checked_component(name)?))
    }

    pub fn archived_path(&self, name: &str) -> StoreResult<PathBuf> {
        Ok(self.archive_dir.join(checked_component(name)?))
    }

    pub async fn list_active(&self) -> StoreResult<Vec<StoredFile>> {
        list_dir(&self.active_dir).await
    }

    pub async fn list_archived(&self) -> StoreResult<Vec<StoredFile>> {
        list_dir(&self.archive_dir).await
    }

    pub async fn write_active(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.active_path(name)?;
        fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn exists_active(&self, name: &str) -> StoreResult<bool> {
        Ok(fs::try_exists(self.active_path(name)?).await?)
    }

    pub async fn exists_archived(&self, name: &str) -> StoreResult<bool> {
        Ok(fs::try_exists(self.archived_path(name)?).await?)
    }

    pub async fn remove_active(&self, name: &str) -> StoreResult<()> {
        remove(self.active_path(name)?, name).await
    }

    pub async fn remove_archived(&self, name: &str) -> StoreResult<()> {
        remove(self.archived_path(name)?, name).await
    }

    /// Move an active file into the archive. If the archive already holds a
    /// file with the same name, the incoming file is stored under a
    /// timestamp-disambiguated name; the final name is returned either way.
    pub async fn archive(&self, name: &str) -> StoreResult<String> {
        let src = self.active_path(name)?;
        if !fs::try_exists(&src).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let mut final_name = name.to_string();
        if fs::try_exists(self.archived_path(name)?).await? {
            final_name = collision_name(name, Utc::now());
        }

        fs::rename(&src, self.archived_path(&final_name)?).await?;
        Ok(final_name)
    }

    /// Move an archived file back into circulation. Fails with a conflict if
    /// an active file already holds the name.
    pub async fn restore(&self, name: &str) -> StoreResult<()> {
        let src = self.archived_path(name)?;
        if !fs::try_exists(&src).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let dst = self.active_path(name)?;
        if fs::try_exists(&dst).await? {
            return Err(StoreError::Conflict(name.to_string()));
        }
        fs::rename(&src, &dst).await?;
        Ok(())
    }
}

/// Disambiguated archive name: `{stem}__approved_{ts}{.ext}`
fn collision_name(name: &str, at: DateTime<Utc>) -> String {
    let ts = at.format("%Y%m%d%H%M%S");
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{ARCHIVE_COLLISION_MARKER}{ts}.{ext}"),
        None => format!("{name}{ARCHIVE_COLLISION_MARKER}{ts}"),
    }
}

fn checked_component(name: &str) -> StoreResult<&str> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0');
    if ok {
        Ok(name)
    } else {
        Err(CoreError::InvalidFilename(name.to_string()).into())
    }
}

async fn remove(path: PathBuf, name: &str) -> StoreResult<()> {
    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(name.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

async fn list_dir(dir: &Path) -> StoreResult<Vec<StoredFile>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let allowed = name
            .rsplit_once('.')
            .map(|(_, ext)| {
                ALLOWED_EXTENSIONS
                    .iter()
                    .any(|a| ext.eq_ignore_ascii_case(a))
            })
            .unwrap_or(false);
        if !allowed {
            continue;
        }
        out.push(StoredFile {
            name,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}
