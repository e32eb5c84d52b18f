//! Metadata index
//!
//! One JSON document mapping filename to [`FileRecord`]. The whole document
//! lives in memory behind a read/write lock; every mutation rewrites the file
//! while still holding the write lock, so writes are serialized and the disk
//! copy never interleaves two updates.
//!
//! Active and archived files are keyed in separate namespaces: active records
//! under the bare filename, archived records under [`archived_key`]. Without
//! the split, re-uploading a name that also exists in the archive would
//! clobber the archived copy's record.
//!
//! Loading is deliberately forgiving: a missing file is an empty index, and a
//! corrupt file is logged and treated as empty rather than taking the portal
//! down with it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;

use portal_core::constants::ARCHIVE_DIR_NAME;
use portal_core::FileRecord;

use crate::error::{StoreError, StoreResult};

/// Index key for an archived file. Sanitized filenames contain no `/`, so the
/// prefixed key can never collide with an active one.
pub fn archived_key(name: &str) -> String {
    format!("{ARCHIVE_DIR_NAME}/{name}")
}

pub struct MetadataIndex {
    path: PathBuf,
    records: RwLock<BTreeMap<String, FileRecord>>,
}

impl MetadataIndex {
    /// Load the index document at `path`, repairing legacy record shapes.
    /// Legacy documents keyed archived records by bare filename; those are
    /// re-keyed into the archive namespace here.
    pub async fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let loaded: BTreeMap<String, FileRecord> = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "index unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        let prefix = format!("{ARCHIVE_DIR_NAME}/");
        let mut records = BTreeMap::new();
        for (key, mut record) in loaded {
            record.normalize();
            let key = if record.archived_at.is_some() && !key.starts_with(&prefix) {
                archived_key(&key)
            } else {
                key
            };
            records.insert(key, record);
        }

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn get(&self, name: &str) -> Option<FileRecord> {
        self.records.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }

    /// Full copy of the index, for listings
    pub async fn snapshot(&self) -> BTreeMap<String, FileRecord> {
        self.records.read().await.clone()
    }

    /// Insert or replace a record
    pub async fn insert(&self, name: &str, mut record: FileRecord) -> StoreResult<()> {
        record.normalize();
        let mut records = self.records.write().await;
        records.insert(name.to_string(), record);
        self.persist(&records).await
    }

    /// Remove a record; missing names are not an error
    pub async fn remove(&self, name: &str) -> StoreResult<Option<FileRecord>> {
        let mut records = self.records.write().await;
        let removed = records.remove(name);
        if removed.is_some() {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    /// Move a record to a new key, as part of an archive rename
    pub async fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        records.insert(to.to_string(), record);
        self.persist(&records).await
    }

    /// Apply `mutate` to an existing record. The read-modify-write runs
    /// entirely under the write lock.
    pub async fn update<F>(&self, name: &str, mutate: F) -> StoreResult<FileRecord>
    where
        F: FnOnce(&mut FileRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        mutate(record);
        record.normalize();
        let updated = record.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    /// Like [`update`](Self::update), but inserts a default record first when
    /// the name is unknown. Used for files that exist on disk without an
    /// index entry.
    pub async fn upsert<F>(&self, name: &str, mutate: F) -> StoreResult<FileRecord>
    where
        F: FnOnce(&mut FileRecord),
    {
        let mut records = self.records.write().await;
        let record = records.entry(name.to_string()).or_default();
        mutate(record);
        record.normalize();
        let updated = record.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    /// Write the full document: serialize to a sibling temp file, then rename
    /// over the old copy so readers never see a half-written index.
    async fn persist(&self, records: &BTreeMap<String, FileRecord>) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::{Country, Role, Stage, Urgency};

    fn record(uploader: &str, role: Role) -> FileRecord {
        FileRecord::new_upload(
            uploader,
            role,
            Country::Uk,
            Urgency::Normal,
            Stage::FirstDraft,
            None,
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::load(dir.path().join("index.json")).await.unwrap();
        assert!(index.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{ definitely not json").unwrap();
        let index = MetadataIndex::load(&path).await.unwrap();
        assert!(index.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let index = MetadataIndex::load(&path).await.unwrap();
        index.insert("a.pdf", record("alice", Role::User)).await.unwrap();
        drop(index);

        let reloaded = MetadataIndex::load(&path).await.unwrap();
        let rec = reloaded.get("a.pdf").await.unwrap();
        assert_eq!(rec.uploader, "alice");
        assert_eq!(rec.uploader_role, Role::User);
    }

    #[tokio::test]
    async fn test_legacy_archived_records_rekeyed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        // Older documents keyed archived records by bare filename.
        let index = MetadataIndex::load(&path).await.unwrap();
        let mut rec = record("ed", Role::Admin);
        rec.archived_at = Some(chrono::Utc::now());
        index.insert("old.pdf", rec).await.unwrap();
        drop(index);

        let reloaded = MetadataIndex::load(&path).await.unwrap();
        assert!(reloaded.get("old.pdf").await.is_none());
        let rec = reloaded.get(&archived_key("old.pdf")).await.unwrap();
        assert_eq!(rec.uploader, "ed");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::load(dir.path().join("index.json")).await.unwrap();
        let err = index.update("ghost.pdf", |_| {}).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upsert_creates_default_record() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::load(dir.path().join("index.json")).await.unwrap();
        let rec = index
            .upsert("orphan.pdf", |r| {
                r.reviewed_by.insert("joe".to_string(), true);
            })
            .await
            .unwrap();
        assert_eq!(rec.reviewed_by.get("joe"), Some(&true));
        assert_eq!(rec.uploader_role, Role::Admin);
    }

    #[tokio::test]
    async fn test_concurrent_updates_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = std::sync::Arc::new(MetadataIndex::load(&path).await.unwrap());
        index.insert("a.pdf", record("alice", Role::Admin)).await.unwrap();
        index.insert("b.pdf", record("bob", Role::Admin)).await.unwrap();

        let i1 = index.clone();
        let i2 = index.clone();
        let t1 = tokio::spawn(async move {
            i1.update("a.pdf", |r| r.note = "note a".to_string()).await
        });
        let t2 = tokio::spawn(async move {
            i2.update("b.pdf", |r| r.note = "note b".to_string()).await
        });
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        let reloaded = MetadataIndex::load(&path).await.unwrap();
        assert_eq!(reloaded.get("a.pdf").await.unwrap().note, "note a");
        assert_eq!(reloaded.get("b.pdf").await.unwrap().note, "note b");
    }
}
