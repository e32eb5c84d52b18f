//! Account store
//!
//! CRUD over the `users` table plus the invariant checks that cannot live in
//! the API layer: the store refuses any change that would leave the system
//! without an active superuser.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use portal_core::Role;

use crate::error::{DbError, DbResult};
use crate::password::{hash_password, verify_password};
use crate::Database;

/// A portal account. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "id, username, role, active, email, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get(2)?;
    let created_at: Option<String> = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        // Unknown role strings degrade to the least-privileged role.
        role: Role::parse(&role_str).unwrap_or(Role::User),
        active: row.get::<_, i64>(3)? != 0,
        email: row.get(4)?,
        created_at: created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

/// Accounts repository
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an account. Fails if the username is taken.
    pub fn create(
        &self,
        username: &str,
        password: &str,
        role: Role,
        email: Option<&str>,
    ) -> DbResult<User> {
        let hash = hash_password(password)?;
        let conn = self.db.conn();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(DbError::UserExists(username.to_string()));
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, password_hash, role, active, email, created_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
            params![username, hash, role.as_role_str(), email, now.to_rfc3339()],
        )?;

        tracing::info!(username, role = %role, "account created");
        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            role,
            active: true,
            email: email.map(str::to_string),
            created_at: Some(now),
        })
    }

    /// Check a username/password pair. Inactive accounts never authenticate.
    pub fn verify_credentials(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let conn = self.db.conn();
        let row: Option<(User, String)> = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"),
                params![username],
                |row| {
                    let user = row_to_user(row)?;
                    let hash: String = row.get(6)?;
                    Ok((user, hash))
                },
            )
            .optional()?;

        Ok(match row {
            Some((user, hash)) if user.active && verify_password(password, &hash) => Some(user),
            _ => None,
        })
    }

    pub fn get(&self, username: &str) -> DbResult<Option<User>> {
        fetch(&self.db.conn(), username)
    }

    /// All accounts, ordered by username
    pub fn list(&self) -> DbResult<Vec<User>> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Change an account's role. The last-super check and the UPDATE run
    /// under one connection guard, so concurrent demotions serialize.
    pub fn set_role(&self, username: &str, role: Role) -> DbResult<()> {
        let conn = self.db.conn();
        let target = require(&conn, username)?;
        if target.active && target.role.is_super() && !role.is_super() {
            guard_last_super(&conn)?;
        }
        conn.execute(
            "UPDATE users SET role = ?1 WHERE username = ?2",
            params![role.as_role_str(), username],
        )?;
        tracing::info!(username, role = %role, "role changed");
        Ok(())
    }

    /// Activate or deactivate an account
    pub fn set_active(&self, username: &str, active: bool) -> DbResult<()> {
        let conn = self.db.conn();
        let target = require(&conn, username)?;
        if target.active && target.role.is_super() && !active {
            guard_last_super(&conn)?;
        }
        conn.execute(
            "UPDATE users SET active = ?1 WHERE username = ?2",
            params![active as i64, username],
        )?;
        tracing::info!(username, active, "account activation changed");
        Ok(())
    }

    /// Replace an account's password
    pub fn set_password(&self, username: &str, password: &str) -> DbResult<()> {
        let hash = hash_password(password)?;
        let conn = self.db.conn();
        require(&conn, username)?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE username = ?2",
            params![hash, username],
        )?;
        tracing::info!(username, "password reset");
        Ok(())
    }

    /// Delete an account outright
    pub fn delete(&self, username: &str) -> DbResult<()> {
        let conn = self.db.conn();
        let target = require(&conn, username)?;
        if target.active && target.role.is_super() {
            guard_last_super(&conn)?;
        }
        conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        tracing::info!(username, "account deleted");
        Ok(())
    }

    /// Number of active superuser accounts
    pub fn count_active_supers(&self) -> DbResult<i64> {
        active_super_count(&self.db.conn())
    }

    /// Active accounts with a notification email, filtered by role.
    /// Returns (username, email) pairs.
    pub fn notification_targets(&self, roles: &[Role]) -> DbResult<Vec<(String, String)>> {
        let users = self.list()?;
        Ok(users
            .into_iter()
            .filter(|u| u.active && roles.contains(&u.role))
            .filter_map(|u| {
                let email = u.email?;
                let email = email.trim().to_string();
                (!email.is_empty()).then_some((u.username, email))
            })
            .collect())
    }

}

fn fetch(conn: &Connection, username: &str) -> DbResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

fn require(conn: &Connection, username: &str) -> DbResult<User> {
    fetch(conn, username)?.ok_or_else(|| DbError::UserNotFound(username.to_string()))
}

fn active_super_count(conn: &Connection) -> DbResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'super' AND active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn guard_last_super(conn: &Connection) -> DbResult<()> {
    if active_super_count(conn)? <= 1 {
        return Err(DbError::LastActiveSuper);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::Country;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_verify() {
        let users = db().users();
        users.create("alice", "hunter22", Role::User, None).unwrap();

        let ok = users.verify_credentials("alice", "hunter22").unwrap();
        assert_eq!(ok.map(|u| u.username).as_deref(), Some("alice"));
        assert!(users.verify_credentials("alice", "nope").unwrap().is_none());
        assert!(users.verify_credentials("ghost", "hunter22").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let users = db().users();
        users.create("bob", "pw111111", Role::User, None).unwrap();
        assert!(matches!(
            users.create("bob", "pw222222", Role::Admin, None),
            Err(DbError::UserExists(_))
        ));
    }

    #[test]
    fn test_inactive_account_cannot_log_in() {
        let users = db().users();
        users.create("carol", "pw111111", Role::Admin, None).unwrap();
        users.create("boss", "pw222222", Role::Super, None).unwrap();
        users.set_active("carol", false).unwrap();
        assert!(users.verify_credentials("carol", "pw111111").unwrap().is_none());
    }

    #[test]
    fn test_last_active_super_is_protected() {
        let users = db().users();
        users.create("boss", "pw111111", Role::Super, None).unwrap();

        assert!(matches!(
            users.set_role("boss", Role::Admin),
            Err(DbError::LastActiveSuper)
        ));
        assert!(matches!(
            users.set_active("boss", false),
            Err(DbError::LastActiveSuper)
        ));
        assert!(matches!(users.delete("boss"), Err(DbError::LastActiveSuper)));

        // A second active super lifts the guard.
        users.create("boss2", "pw222222", Role::Super, None).unwrap();
        users.set_role("boss", Role::Admin).unwrap();
        assert_eq!(users.count_active_supers().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_demotions_keep_one_super() {
        // Two supers demoted from two threads: whichever UPDATE runs second
        // must see the count already at one and fail.
        let users = db().users();
        users.create("boss1", "pw111111", Role::Super, None).unwrap();
        users.create("boss2", "pw222222", Role::Super, None).unwrap();

        let u1 = users.clone();
        let u2 = users.clone();
        let t1 = std::thread::spawn(move || u1.set_role("boss1", Role::Admin));
        let t2 = std::thread::spawn(move || u2.set_role("boss2", Role::Admin));
        let results = [t1.join().unwrap(), t2.join().unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(DbError::LastActiveSuper))));
        assert_eq!(users.count_active_supers().unwrap(), 1);
    }

    #[test]
    fn test_role_round_trips_through_storage() {
        let users = db().users();
        users
            .create("hans", "pw111111", Role::CountryUser(Country::De), None)
            .unwrap();
        let hans = users.get("hans").unwrap().unwrap();
        assert_eq!(hans.role, Role::CountryUser(Country::De));
    }

    #[test]
    fn test_notification_targets_filter() {
        let users = db().users();
        users.create("a", "pw111111", Role::Admin, Some("a@x.example")).unwrap();
        users.create("b", "pw111111", Role::Admin, None).unwrap();
        users.create("c", "pw111111", Role::User, Some("c@x.example")).unwrap();
        users.create("s", "pw111111", Role::Super, Some("s@x.example")).unwrap();
        users.create("d", "pw111111", Role::Admin, Some("  "))
            .unwrap();

        let mut staff = users
            .notification_targets(&[Role::Admin, Role::Super])
            .unwrap();
        staff.sort();
        assert_eq!(
            staff,
            vec![
                ("a".to_string(), "a@x.example".to_string()),
                ("s".to_string(), "s@x.example".to_string()),
            ]
        );
    }

    #[test]
    fn test_password_reset() {
        let users = db().users();
        users.create("eve", "oldpass1", Role::User, None).unwrap();
        users.set_password("eve", "newpass1").unwrap();
        assert!(users.verify_credentials("eve", "oldpass1").unwrap().is_none());
        assert!(users.verify_credentials("eve", "newpass1").unwrap().is_some());
    }
}
