//! Portal Store
//!
//! Storage layer for the file exchange portal: the physical file vault, the
//! JSON metadata index that annotates it, the lifecycle transitions between
//! the two, and the append-only audit log.

pub mod audit;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod vault;

pub use audit::AuditLog;
pub use error::{StoreError, StoreResult};
pub use index::{archived_key, MetadataIndex};
pub use lifecycle::LifecycleManager;
pub use vault::{FileVault, StoredFile};
