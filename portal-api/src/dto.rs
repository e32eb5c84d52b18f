//! Data Transfer Objects for the portal API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use portal_core::{Country, FileRecord, PublicationStatus, Role, Stage, Urgency};
use portal_db::{Invite, User};
use portal_store::StoredFile;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// Registration request. An invite code is mandatory while any invite
/// mechanism is active; the invite's country binding decides the role.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[validate(length(max = 64))]
    pub invite_code: Option<String>,

    /// Optional notification email
    #[validate(email)]
    pub email: Option<String>,
}

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One file in the active listing
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub uploader: String,
    pub uploader_role: Role,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub urgency: Urgency,
    pub country: Country,
    pub stage: Stage,
    pub note: String,
    pub note_by: String,
    pub note_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<PublicationStatus>,
    /// Whether urgency/stage edits are locked for this file
    pub retriage_locked: bool,
    /// Whether the caller has flagged this file as reviewed
    pub reviewed_by_me: bool,
    /// Whether the caller may delete this file
    pub can_delete: bool,
}

impl FileEntry {
    pub fn from_parts(
        file: &StoredFile,
        record: &FileRecord,
        caller: &str,
        can_delete: bool,
    ) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size,
            modified: file.modified,
            uploader: record.uploader.clone(),
            uploader_role: record.uploader_role,
            uploaded_at: record.uploaded_at,
            urgency: record.urgency,
            country: record.country,
            stage: record.stage,
            note: record.note.clone(),
            note_by: record.note_by.clone(),
            note_at: record.note_at,
            publication_status: record.publication_status,
            retriage_locked: record.is_retriage_locked(),
            reviewed_by_me: record.reviewed_by.get(caller).copied().unwrap_or(false),
            can_delete,
        }
    }
}

/// Active file listing, split by uploader cohort
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    /// Uploads by admin/super accounts
    pub staff_files: Vec<FileEntry>,
    /// Uploads by reporter accounts, country-scoped ones included
    pub reporter_files: Vec<FileEntry>,
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Name the file was stored under, after sanitization
    pub name: String,
    pub urgency: Urgency,
    pub country: Country,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<PublicationStatus>,
}

/// Metadata edit request. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EditFileRequest {
    pub urgency: Option<String>,
    pub stage: Option<String>,
    pub country: Option<String>,
    #[validate(length(max = 100))]
    pub note: Option<String>,
}

/// Set-note request. Staff may reassign the country in the same request.
#[derive(Debug, Deserialize, Validate)]
pub struct SetNoteRequest {
    #[validate(length(max = 100))]
    pub note: String,

    pub country: Option<String>,
}

/// Set-urgency request
#[derive(Debug, Deserialize)]
pub struct SetUrgencyRequest {
    pub urgency: String,
}

/// Set-stage request
#[derive(Debug, Deserialize)]
pub struct SetStageRequest {
    pub stage: String,
}

/// Updated record, echoed after a metadata change
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub name: String,
    pub urgency: Urgency,
    pub country: Country,
    pub stage: Stage,
    pub note: String,
    pub note_by: String,
    pub note_at: Option<DateTime<Utc>>,
    pub reviewed_by_me: bool,
}

impl RecordResponse {
    pub fn from_record(name: &str, record: &FileRecord, caller: &str) -> Self {
        Self {
            name: name.to_string(),
            urgency: record.urgency,
            country: record.country,
            stage: record.stage,
            note: record.note.clone(),
            note_by: record.note_by.clone(),
            note_at: record.note_at,
            reviewed_by_me: record.reviewed_by.get(caller).copied().unwrap_or(false),
        }
    }
}

/// Archive approval response
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    /// Name the file holds in the archive, disambiguated on collision
    pub archived_as: String,
}

/// One file in the archive listing
#[derive(Debug, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub uploader: String,
    pub country: Country,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Archive listing
#[derive(Debug, Serialize)]
pub struct ArchiveListResponse {
    pub files: Vec<ArchiveEntry>,
}

/// Account as shown in the admin panel
#[derive(Debug, Serialize)]
pub struct UserEntry {
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<User> for UserEntry {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            role: user.role,
            active: user.active,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Invite as shown in the admin panel
#[derive(Debug, Serialize)]
pub struct InviteEntry {
    pub code: String,
    pub country: Option<Country>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub used_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<Invite> for InviteEntry {
    fn from(invite: Invite) -> Self {
        Self {
            code: invite.code,
            country: invite.country,
            created_by: invite.created_by,
            created_at: invite.created_at,
            used_by: invite.used_by,
            used_at: invite.used_at,
        }
    }
}

/// Admin panel listing
#[derive(Debug, Serialize)]
pub struct AdminUsersResponse {
    pub users: Vec<UserEntry>,
    pub invites: Vec<InviteEntry>,
}

/// Admin account/invite action
#[derive(Debug, Deserialize, Validate)]
pub struct AdminActionRequest {
    /// One of: promote, demote, make_super, set_country, activate,
    /// deactivate, reset_password, delete_user, gen_invites, revoke_invite
    #[validate(length(min = 1, max = 32))]
    pub action: String,

    /// Target account for account actions
    pub username: Option<String>,

    /// For reset_password
    #[validate(length(min = 6, max = 128))]
    pub new_password: Option<String>,

    /// For set_country, and the optional binding for gen_invites
    pub country: Option<String>,

    /// For gen_invites
    pub count: Option<usize>,
    pub length: Option<usize>,

    /// For revoke_invite
    pub code: Option<String>,
}

/// Generated invite codes
#[derive(Debug, Serialize)]
pub struct InviteBatchResponse {
    pub codes: Vec<String>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
