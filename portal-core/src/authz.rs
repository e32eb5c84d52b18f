//! Authorization Engine
//!
//! Pure decision function mapping (actor role, actor identity, action,
//! file-ownership facts) to allow/deny. Deterministic: the same inputs always
//! produce the same verdict, and nothing here touches storage or the clock.
//!
//! The one rule that dominates the whole capability matrix: urgency/stage
//! re-triage is denied for every actor, superusers included, when the target
//! was uploaded by a `user`-role account. Reporter submissions keep the
//! priority their author gave them.

use serde::{Deserialize, Serialize};

use crate::types::role::{Country, Role};

/// Actions subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzAction {
    /// See a file in a listing
    View,
    /// Stream file bytes
    Download,
    /// Create a new file
    Upload,
    /// Edit urgency/stage/note/country through the general edit form
    EditMetadata,
    /// Bulk urgency/stage/country/note update (staff form)
    UpdateAll,
    /// Set the shared note
    SetNote,
    /// Change the urgency flag
    SetUrgency,
    /// Change the workflow stage
    SetStage,
    /// Flip the caller's own review flag
    ToggleReviewed,
    /// Move active -> archived
    Archive,
    /// Move archived -> active
    Restore,
    /// Remove an active file and its record
    Delete,
    /// Remove an archived file and its record, irrevocably
    PermanentDelete,
    /// Account and invite administration
    ManageUsers,
}

impl AuthzAction {
    /// Actions that re-triage a file's urgency or stage
    fn is_retriage(&self) -> bool {
        matches!(
            self,
            AuthzAction::SetUrgency | AuthzAction::SetStage | AuthzAction::UpdateAll
        )
    }
}

/// Ownership facts about the target file, read from its metadata record
#[derive(Debug, Clone, PartialEq)]
pub struct FileFacts {
    /// Country assignment of the file
    pub country: Country,
    /// Identity of the uploading account
    pub uploader: String,
    /// Role snapshot taken at upload time
    pub uploader_role: Role,
}

impl FileFacts {
    pub fn from_record(record: &crate::types::FileRecord) -> Self {
        Self {
            country: record.country,
            uploader: record.uploader.clone(),
            uploader_role: record.uploader_role,
        }
    }
}

impl Default for FileFacts {
    fn default() -> Self {
        Self {
            country: Country::default(),
            uploader: String::new(),
            uploader_role: Role::Admin,
        }
    }
}

/// Denial reason. Terminal: a denied action is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The role/ownership matrix does not grant this action
    Forbidden,
    /// The target was uploaded by a reporter; urgency/stage are locked
    RetriageLocked,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::Forbidden => write!(f, "forbidden"),
            Denial::RetriageLocked => {
                write!(f, "urgency and stage are locked for reporter uploads")
            }
        }
    }
}

/// Decide whether `actor` (with `role`) may perform `action` on the file
/// described by `facts`.
///
/// Callers must resolve the target record before calling this: a missing
/// record is `NotFound`, reported before any permission evaluation.
pub fn authorize(
    role: Role,
    actor: &str,
    action: AuthzAction,
    facts: &FileFacts,
) -> Result<(), Denial> {
    // The retriage lock dominates the role table, super included.
    if action.is_retriage() && facts.uploader_role == Role::User {
        return Err(Denial::RetriageLocked);
    }

    match action {
        AuthzAction::Upload => Ok(()),

        AuthzAction::ManageUsers | AuthzAction::PermanentDelete => match role {
            Role::Super => Ok(()),
            _ => Err(Denial::Forbidden),
        },

        AuthzAction::Archive | AuthzAction::Restore => match role {
            Role::Admin | Role::Super => Ok(()),
            _ => Err(Denial::Forbidden),
        },

        AuthzAction::SetUrgency | AuthzAction::SetStage | AuthzAction::UpdateAll => match role {
            Role::Admin | Role::Super => Ok(()),
            _ => Err(Denial::Forbidden),
        },

        AuthzAction::View | AuthzAction::Download => match role {
            Role::User | Role::Admin | Role::Super => Ok(()),
            Role::CountryUser(c) => country_scoped(c, facts),
        },

        AuthzAction::EditMetadata | AuthzAction::SetNote => match role {
            Role::User | Role::Admin | Role::Super => Ok(()),
            Role::CountryUser(c) => country_scoped(c, facts),
        },

        // Review flags exist for reporters to track staff uploads; they do
        // not apply to files reporters uploaded themselves.
        AuthzAction::ToggleReviewed => match role {
            Role::User if facts.uploader_role != Role::User => Ok(()),
            _ => Err(Denial::Forbidden),
        },

        AuthzAction::Delete => match role {
            Role::Admin | Role::Super => Ok(()),
            Role::User => owner_only(actor, facts),
            Role::CountryUser(c) => {
                country_scoped(c, facts)?;
                owner_only(actor, facts)
            }
        },
    }
}

fn country_scoped(bound: Country, facts: &FileFacts) -> Result<(), Denial> {
    if facts.country == bound {
        Ok(())
    } else {
        Err(Denial::Forbidden)
    }
}

fn owner_only(actor: &str, facts: &FileFacts) -> Result<(), Denial> {
    if facts.uploader == actor {
        Ok(())
    } else {
        Err(Denial::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(country: Country, uploader: &str, uploader_role: Role) -> FileFacts {
        FileFacts {
            country,
            uploader: uploader.to_string(),
            uploader_role,
        }
    }

    #[test]
    fn test_decision_is_deterministic() {
        let f = facts(Country::De, "alice", Role::User);
        let a = authorize(Role::Super, "boss", AuthzAction::SetUrgency, &f);
        let b = authorize(Role::Super, "boss", AuthzAction::SetUrgency, &f);
        assert_eq!(a, b);
    }

    #[test]
    fn test_retriage_lock_dominates_every_role() {
        let f = facts(Country::Uk, "alice", Role::User);
        for role in [
            Role::User,
            Role::Admin,
            Role::Super,
            Role::CountryUser(Country::Uk),
        ] {
            for action in [
                AuthzAction::SetUrgency,
                AuthzAction::SetStage,
                AuthzAction::UpdateAll,
            ] {
                assert_eq!(
                    authorize(role, "anyone", action, &f),
                    Err(Denial::RetriageLocked),
                    "role {role:?} action {action:?}"
                );
            }
        }
    }

    #[test]
    fn test_retriage_requires_staff_for_staff_uploads() {
        let f = facts(Country::Uk, "ed", Role::Admin);
        assert!(authorize(Role::Admin, "x", AuthzAction::SetUrgency, &f).is_ok());
        assert!(authorize(Role::Super, "x", AuthzAction::SetStage, &f).is_ok());
        assert_eq!(
            authorize(Role::User, "x", AuthzAction::SetUrgency, &f),
            Err(Denial::Forbidden)
        );
        assert_eq!(
            authorize(
                Role::CountryUser(Country::Uk),
                "x",
                AuthzAction::UpdateAll,
                &f
            ),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn test_country_user_view_scope() {
        let de_file = facts(Country::De, "alice", Role::User);
        assert!(authorize(
            Role::CountryUser(Country::De),
            "hans",
            AuthzAction::Download,
            &de_file
        )
        .is_ok());
        assert_eq!(
            authorize(
                Role::CountryUser(Country::Uk),
                "joan",
                AuthzAction::Download,
                &de_file
            ),
            Err(Denial::Forbidden)
        );
        // Non-country roles see everything.
        assert!(authorize(Role::User, "joe", AuthzAction::View, &de_file).is_ok());
        assert!(authorize(Role::Admin, "ed", AuthzAction::View, &de_file).is_ok());
    }

    #[test]
    fn test_delete_identity_match() {
        let f = facts(Country::Fr, "alice", Role::User);
        assert!(authorize(Role::User, "alice", AuthzAction::Delete, &f).is_ok());
        assert_eq!(
            authorize(Role::User, "mallory", AuthzAction::Delete, &f),
            Err(Denial::Forbidden)
        );
        // Country user needs both country and identity.
        assert!(authorize(
            Role::CountryUser(Country::Fr),
            "alice",
            AuthzAction::Delete,
            &f
        )
        .is_ok());
        assert_eq!(
            authorize(
                Role::CountryUser(Country::Fr),
                "bob",
                AuthzAction::Delete,
                &f
            ),
            Err(Denial::Forbidden)
        );
        assert_eq!(
            authorize(
                Role::CountryUser(Country::De),
                "alice",
                AuthzAction::Delete,
                &f
            ),
            Err(Denial::Forbidden)
        );
        // Staff bypass identity match.
        assert!(authorize(Role::Admin, "ed", AuthzAction::Delete, &f).is_ok());
        assert!(authorize(Role::Super, "boss", AuthzAction::Delete, &f).is_ok());
    }

    #[test]
    fn test_lifecycle_gates() {
        let f = facts(Country::Uk, "ed", Role::Admin);
        assert!(authorize(Role::Admin, "ed", AuthzAction::Archive, &f).is_ok());
        assert!(authorize(Role::Super, "boss", AuthzAction::Restore, &f).is_ok());
        assert_eq!(
            authorize(Role::User, "joe", AuthzAction::Archive, &f),
            Err(Denial::Forbidden)
        );
        assert_eq!(
            authorize(Role::Admin, "ed", AuthzAction::PermanentDelete, &f),
            Err(Denial::Forbidden)
        );
        assert!(authorize(Role::Super, "boss", AuthzAction::PermanentDelete, &f).is_ok());
    }

    #[test]
    fn test_toggle_reviewed_is_user_only() {
        let f = facts(Country::Uk, "ed", Role::Admin);
        assert!(authorize(Role::User, "joe", AuthzAction::ToggleReviewed, &f).is_ok());
        for role in [Role::Admin, Role::Super, Role::CountryUser(Country::Uk)] {
            assert_eq!(
                authorize(role, "x", AuthzAction::ToggleReviewed, &f),
                Err(Denial::Forbidden)
            );
        }
        // No review flags on reporter uploads.
        let reporter_file = facts(Country::Uk, "alice", Role::User);
        assert_eq!(
            authorize(Role::User, "joe", AuthzAction::ToggleReviewed, &reporter_file),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn test_user_management_is_super_only() {
        let f = FileFacts::default();
        assert!(authorize(Role::Super, "boss", AuthzAction::ManageUsers, &f).is_ok());
        for role in [Role::User, Role::Admin, Role::CountryUser(Country::Es)] {
            assert_eq!(
                authorize(role, "x", AuthzAction::ManageUsers, &f),
                Err(Denial::Forbidden)
            );
        }
    }

    #[test]
    fn test_country_reassignment_moves_access() {
        // admin moves a DE file to FR; DE loses access, FR gains it
        let mut f = facts(Country::De, "alice", Role::User);
        assert!(authorize(
            Role::CountryUser(Country::De),
            "hans",
            AuthzAction::View,
            &f
        )
        .is_ok());

        f.country = Country::Fr;
        assert_eq!(
            authorize(
                Role::CountryUser(Country::De),
                "hans",
                AuthzAction::View,
                &f
            ),
            Err(Denial::Forbidden)
        );
        assert!(authorize(
            Role::CountryUser(Country::Fr),
            "remy",
            AuthzAction::View,
            &f
        )
        .is_ok());
    }
}
