//! Application State
//!
//! Shared state for the portal API service.

use std::sync::Arc;

use portal_db::Database;
use portal_store::{AuditLog, FileVault, LifecycleManager, MetadataIndex};

use crate::config::ServerConfig;
use crate::middleware::auth::{AuthState, JwtConfig};
use crate::services::notify::{TracingNotifier, UploadNotifier};

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Accounts and invites
    pub db: Database,
    /// Physical files
    pub vault: Arc<FileVault>,
    /// Metadata index
    pub index: Arc<MetadataIndex>,
    /// Vault/index lifecycle transitions
    pub lifecycle: Arc<LifecycleManager>,
    /// Append-only action trail
    pub audit: Arc<AuditLog>,
    /// Upload notification backend
    pub notifier: Arc<dyn UploadNotifier>,
    /// Token issuing and validation
    pub auth: AuthState,
    /// Registration code that bypasses the invite store
    pub invite_bypass_code: Option<String>,
}

impl AppState {
    /// Build the full state from configuration, creating data directories
    /// and bootstrapping the first superuser on an empty database.
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let db = Database::open(config.database_path())?;
        let vault = Arc::new(FileVault::open(config.files_dir()).await?);
        let index = Arc::new(MetadataIndex::load(config.index_path()).await?);
        let lifecycle = Arc::new(LifecycleManager::new(vault.clone(), index.clone()));
        let audit = Arc::new(AuditLog::new(config.audit_log_path()));

        let jwt = JwtConfig::try_new(config.jwt_secret.clone(), config.token_ttl_hours)?;

        let state = Self {
            db,
            vault,
            index,
            lifecycle,
            audit,
            notifier: Arc::new(TracingNotifier),
            auth: AuthState::new(jwt),
            invite_bypass_code: config.invite_bypass_code.clone(),
        };
        state.bootstrap_super(config)?;
        Ok(state)
    }

    /// Assemble state from prebuilt components. Used by tests.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        db: Database,
        vault: Arc<FileVault>,
        index: Arc<MetadataIndex>,
        lifecycle: Arc<LifecycleManager>,
        audit: Arc<AuditLog>,
        notifier: Arc<dyn UploadNotifier>,
        auth: AuthState,
        invite_bypass_code: Option<String>,
    ) -> Self {
        Self {
            db,
            vault,
            index,
            lifecycle,
            audit,
            notifier,
            auth,
            invite_bypass_code,
        }
    }

    /// Create the initial superuser when the account table is empty
    fn bootstrap_super(&self, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
        let users = self.db.users();
        if !users.list()?.is_empty() {
            return Ok(());
        }
        match &config.bootstrap_super_password {
            Some(password) => {
                users.create("admin", password, portal_core::Role::Super, None)?;
                tracing::info!("bootstrap superuser 'admin' created");
            }
            None => {
                tracing::warn!(
                    "account table is empty and PORTAL_BOOTSTRAP_SUPER_PASSWORD is unset; \
                     no one can log in"
                );
            }
        }
        Ok(())
    }
}
