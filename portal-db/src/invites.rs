//! Invite code store
//!
//! Registration is invite-gated while any invite mechanism is active. Codes
//! are uppercase alphanumeric, generated in batches, optionally bound to a
//! country (which decides the role the registrant receives), and single-use:
//! consuming one records who used it and when.

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use portal_core::constants::{
    DEFAULT_INVITE_LEN, INVITE_CODE_CHARS, INVITE_COUNT_MAX, INVITE_COUNT_MIN, INVITE_LEN_MAX,
    INVITE_LEN_MIN,
};
use portal_core::Country;

use crate::error::{DbError, DbResult};
use crate::Database;

/// An invite code and its usage state
#[derive(Debug, Clone, Serialize)]
pub struct Invite {
    pub code: String,
    /// Bound country; a consumer becomes a country user for it
    pub country: Option<Country>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub used_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_used(&self) -> bool {
        self.used_by.is_some()
    }
}

fn row_to_invite(row: &Row<'_>) -> rusqlite::Result<Invite> {
    let country: Option<String> = row.get(1)?;
    let created_at: Option<String> = row.get(3)?;
    let used_at: Option<String> = row.get(5)?;
    let parse = |s: Option<String>| {
        s.as_deref()
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    };
    Ok(Invite {
        code: row.get(0)?,
        country: country.as_deref().and_then(Country::from_code),
        created_by: row.get(2)?,
        created_at: parse(created_at),
        used_by: row.get(4)?,
        used_at: parse(used_at),
    })
}

/// Generate one random invite code
fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let i = rng.gen_range(0..INVITE_CODE_CHARS.len());
            INVITE_CODE_CHARS[i] as char
        })
        .collect()
}

/// Invites repository
#[derive(Clone)]
pub struct InviteStore {
    db: Database,
}

impl InviteStore {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Generate a batch of fresh codes, optionally bound to a country.
    /// `count` and `len` are clamped to their allowed ranges rather than
    /// rejected.
    pub fn generate(
        &self,
        count: usize,
        len: Option<usize>,
        country: Option<Country>,
        created_by: &str,
    ) -> DbResult<Vec<String>> {
        let count = count.clamp(INVITE_COUNT_MIN, INVITE_COUNT_MAX);
        let len = len
            .unwrap_or(DEFAULT_INVITE_LEN)
            .clamp(INVITE_LEN_MIN, INVITE_LEN_MAX);

        let conn = self.db.conn();
        let now = Utc::now().to_rfc3339();
        let country_code = country.map(|c| c.code());
        let mut codes = Vec::with_capacity(count);
        while codes.len() < count {
            let code = random_code(len);
            // UNIQUE collisions just mean we roll again.
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO invites (code, country, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![code, country_code, created_by, now],
            )?;
            if inserted == 1 {
                codes.push(code);
            }
        }

        tracing::info!(count = codes.len(), created_by, "invite codes generated");
        Ok(codes)
    }

    /// All invites, newest first
    pub fn list(&self) -> DbResult<Vec<Invite>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT code, country, created_by, created_at, used_by, used_at
             FROM invites ORDER BY id DESC",
        )?;
        let invites = stmt
            .query_map([], row_to_invite)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invites)
    }

    pub fn get(&self, code: &str) -> DbResult<Option<Invite>> {
        let conn = self.db.conn();
        let invite = conn
            .query_row(
                "SELECT code, country, created_by, created_at, used_by, used_at
                 FROM invites WHERE code = ?1",
                params![code],
                row_to_invite,
            )
            .optional()?;
        Ok(invite)
    }

    /// Whether any unused invite exists
    pub fn any_unused(&self) -> DbResult<bool> {
        let conn = self.db.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM invites WHERE used_by IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Mark a code as used by `username`. Fails if the code is unknown or
    /// already consumed; the UPDATE's WHERE clause makes the check and the
    /// claim a single step.
    pub fn consume(&self, code: &str, username: &str) -> DbResult<()> {
        let invite = self
            .get(code)?
            .ok_or_else(|| DbError::InviteNotFound(code.to_string()))?;

        let conn = self.db.conn();
        let updated = conn.execute(
            "UPDATE invites SET used_by = ?1, used_at = ?2
             WHERE code = ?3 AND used_by IS NULL",
            params![username, Utc::now().to_rfc3339(), code],
        )?;
        if updated == 0 {
            return Err(DbError::InviteUsed(invite.code));
        }

        tracing::info!(code, username, "invite consumed");
        Ok(())
    }

    /// Return a just-consumed code to the pool. Only the consumer named in
    /// the claim can roll it back; used when the registration that consumed
    /// the code fails partway.
    pub fn release(&self, code: &str, username: &str) -> DbResult<()> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE invites SET used_by = NULL, used_at = NULL
             WHERE code = ?1 AND used_by = ?2",
            params![code, username],
        )?;
        tracing::info!(code, username, "invite released");
        Ok(())
    }

    /// Delete an unused code. Consumed codes are kept as registration history.
    pub fn revoke(&self, code: &str) -> DbResult<()> {
        let invite = self
            .get(code)?
            .ok_or_else(|| DbError::InviteNotFound(code.to_string()))?;
        if invite.is_used() {
            return Err(DbError::InviteUsed(invite.code));
        }

        let conn = self.db.conn();
        conn.execute("DELETE FROM invites WHERE code = ?1", params![code])?;
        tracing::info!(code, "invite revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InviteStore {
        Database::open_in_memory().unwrap().invites()
    }

    #[test]
    fn test_generate_respects_clamps() {
        let invites = store();
        let codes = invites.generate(500, Some(3), None, "boss").unwrap();
        assert_eq!(codes.len(), INVITE_COUNT_MAX);
        assert!(codes.iter().all(|c| c.len() == INVITE_LEN_MIN));
        assert!(codes.iter().all(|c| c
            .bytes()
            .all(|b| INVITE_CODE_CHARS.contains(&b))));
    }

    #[test]
    fn test_default_length() {
        let invites = store();
        let codes = invites.generate(1, None, None, "boss").unwrap();
        assert_eq!(codes[0].len(), DEFAULT_INVITE_LEN);
    }

    #[test]
    fn test_country_binding_round_trips() {
        let invites = store();
        let code = invites
            .generate(1, None, Some(Country::It), "boss")
            .unwrap()
            .remove(0);
        let invite = invites.get(&code).unwrap().unwrap();
        assert_eq!(invite.country, Some(Country::It));

        let plain = invites.generate(1, None, None, "boss").unwrap().remove(0);
        assert_eq!(invites.get(&plain).unwrap().unwrap().country, None);
    }

    #[test]
    fn test_consume_is_single_use() {
        let invites = store();
        let code = invites.generate(1, None, None, "boss").unwrap().remove(0);

        assert!(invites.any_unused().unwrap());
        invites.consume(&code, "alice").unwrap();
        assert!(!invites.any_unused().unwrap());

        assert!(matches!(
            invites.consume(&code, "bob"),
            Err(DbError::InviteUsed(_))
        ));
        let stored = invites.get(&code).unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("alice"));
        assert!(stored.used_at.is_some());
    }

    #[test]
    fn test_release_returns_code_to_pool() {
        let invites = store();
        let code = invites.generate(1, None, None, "boss").unwrap().remove(0);

        invites.consume(&code, "alice").unwrap();
        invites.release(&code, "alice").unwrap();
        assert!(invites.any_unused().unwrap());

        // Release is bound to the consumer that claimed the code.
        invites.consume(&code, "bob").unwrap();
        invites.release(&code, "alice").unwrap();
        assert_eq!(
            invites.get(&code).unwrap().unwrap().used_by.as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn test_unknown_code() {
        let invites = store();
        assert!(matches!(
            invites.consume("NOPE123", "alice"),
            Err(DbError::InviteNotFound(_))
        ));
    }

    #[test]
    fn test_revoke_only_unused() {
        let invites = store();
        let codes = invites.generate(2, None, None, "boss").unwrap();

        invites.revoke(&codes[0]).unwrap();
        assert!(invites.get(&codes[0]).unwrap().is_none());

        invites.consume(&codes[1], "alice").unwrap();
        assert!(matches!(
            invites.revoke(&codes[1]),
            Err(DbError::InviteUsed(_))
        ));
    }
}
