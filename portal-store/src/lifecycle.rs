//! File lifecycle
//!
//! Transitions between the active set, the archive and deletion. Every
//! transition touches both the vault and the index; a single operation mutex
//! keeps the pair consistent when handlers race on the same name.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use portal_core::FileRecord;

use crate::error::StoreResult;
use crate::index::{archived_key, MetadataIndex};
use crate::vault::FileVault;

pub struct LifecycleManager {
    vault: Arc<FileVault>,
    index: Arc<MetadataIndex>,
    op_lock: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(vault: Arc<FileVault>, index: Arc<MetadataIndex>) -> Self {
        Self {
            vault,
            index,
            op_lock: Mutex::new(()),
        }
    }

    /// Store an upload: write the bytes and install a fresh record.
    /// Re-uploading an existing name replaces both.
    pub async fn store_upload(
        &self,
        name: &str,
        bytes: &[u8],
        record: FileRecord,
    ) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        self.vault.write_active(name, bytes).await?;
        self.index.insert(name, record).await
    }

    /// Move an active file into the archive. Returns the name it was stored
    /// under, which differs from `name` when the archive already held one.
    /// The record follows the file into the archive namespace and is stamped
    /// with the archive time.
    pub async fn archive(&self, name: &str) -> StoreResult<String> {
        let _guard = self.op_lock.lock().await;
        let final_name = self.vault.archive(name).await?;

        let mut record = self.index.remove(name).await?.unwrap_or_default();
        record.archived_at = Some(Utc::now());
        self.index.insert(&archived_key(&final_name), record).await?;

        Ok(final_name)
    }

    /// Bring an archived file back into circulation
    pub async fn restore(&self, name: &str) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        self.vault.restore(name).await?;
        let mut record = self
            .index
            .remove(&archived_key(name))
            .await?
            .unwrap_or_default();
        record.archived_at = None;
        self.index.insert(name, record).await?;
        Ok(())
    }

    /// Remove an active file and its record
    pub async fn delete_active(&self, name: &str) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        self.vault.remove_active(name).await?;
        self.index.remove(name).await?;
        Ok(())
    }

    /// Remove an archived file and its record, irrevocably
    pub async fn delete_archived(&self, name: &str) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        self.vault.remove_archived(name).await?;
        self.index.remove(&archived_key(name)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use portal_core::{Country, Role, Stage, Urgency};

    async fn setup() -> (tempfile::TempDir, LifecycleManager) {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(FileVault::open(dir.path().join("files")).await.unwrap());
        let index = Arc::new(
            MetadataIndex::load(dir.path().join("index.json"))
                .await
                .unwrap(),
        );
        (dir, LifecycleManager::new(vault, index))
    }

    fn record(uploader: &str) -> FileRecord {
        FileRecord::new_upload(
            uploader,
            Role::Admin,
            Country::Uk,
            Urgency::High,
            Stage::FirstDraft,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_archive_moves_record_and_stamps_time() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"body", record("ed")).await.unwrap();

        let archived = lc.archive("a.pdf").await.unwrap();
        assert_eq!(archived, "a.pdf");

        let rec = lc.index.get(&archived_key("a.pdf")).await.unwrap();
        assert!(rec.archived_at.is_some());
        assert_eq!(rec.uploader, "ed");
        assert!(lc.index.get("a.pdf").await.is_none());
        assert!(!lc.vault.exists_active("a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_reupload_leaves_archived_record_intact() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"v1", record("ed")).await.unwrap();
        lc.archive("a.pdf").await.unwrap();

        lc.store_upload("a.pdf", b"v2", record("flo")).await.unwrap();

        let archived = lc.index.get(&archived_key("a.pdf")).await.unwrap();
        let active = lc.index.get("a.pdf").await.unwrap();
        assert_eq!(archived.uploader, "ed");
        assert!(archived.archived_at.is_some());
        assert_eq!(active.uploader, "flo");
        assert!(active.archived_at.is_none());
    }

    #[tokio::test]
    async fn test_archive_collision_keeps_both_records() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"v1", record("ed")).await.unwrap();
        lc.archive("a.pdf").await.unwrap();

        lc.store_upload("a.pdf", b"v2", record("flo")).await.unwrap();
        let second = lc.archive("a.pdf").await.unwrap();
        assert_ne!(second, "a.pdf");

        let first_rec = lc.index.get(&archived_key("a.pdf")).await.unwrap();
        let second_rec = lc.index.get(&archived_key(&second)).await.unwrap();
        assert_eq!(first_rec.uploader, "ed");
        assert_eq!(second_rec.uploader, "flo");
        assert!(second_rec.archived_at.is_some());
    }

    #[tokio::test]
    async fn test_restore_clears_archive_stamp() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"body", record("ed")).await.unwrap();
        lc.archive("a.pdf").await.unwrap();

        lc.restore("a.pdf").await.unwrap();
        let rec = lc.index.get("a.pdf").await.unwrap();
        assert!(rec.archived_at.is_none());
        assert_eq!(rec.uploader, "ed");
        assert!(lc.index.get(&archived_key("a.pdf")).await.is_none());
        assert!(lc.vault.exists_active("a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_into_occupied_name_fails_cleanly() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"v1", record("ed")).await.unwrap();
        lc.archive("a.pdf").await.unwrap();
        lc.store_upload("a.pdf", b"v2", record("flo")).await.unwrap();

        let err = lc.restore("a.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        // Archived copy untouched.
        assert!(lc.vault.exists_archived("a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_record() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"body", record("ed")).await.unwrap();

        lc.delete_active("a.pdf").await.unwrap();
        assert!(lc.index.get("a.pdf").await.is_none());
        assert!(!lc.vault.exists_active("a.pdf").await.unwrap());

        let err = lc.delete_active("a.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_permanent_delete_of_archived() {
        let (_dir, lc) = setup().await;
        lc.store_upload("a.pdf", b"body", record("ed")).await.unwrap();
        lc.archive("a.pdf").await.unwrap();

        lc.delete_archived("a.pdf").await.unwrap();
        assert!(lc.index.get(&archived_key("a.pdf")).await.is_none());
        assert!(!lc.vault.exists_archived("a.pdf").await.unwrap());
    }
}
