//! Portal DB
//!
//! SQLite-backed persistence for accounts and invite codes. One connection is
//! shared behind a mutex; every operation is short enough to run on the
//! calling task.

pub mod error;
pub mod invites;
pub mod password;
pub mod schema;
pub mod users;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub use error::{DbError, DbResult};
pub use invites::{Invite, InviteStore};
pub use users::{User, UserStore};

/// Handle to the portal database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and run schema
    /// initialization.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.clone())
    }

    pub fn invites(&self) -> InviteStore {
        InviteStore::new(self.clone())
    }

    /// Lock the shared connection. A poisoned lock is recovered: SQLite
    /// state is consistent even if a holder panicked mid-operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}
