//! File annotation records
//!
//! A `FileRecord` is the metadata-index entry for one physical file. The
//! index has accumulated several historical shapes (per-user note maps,
//! missing countries, free-form stage strings), so deserialization is
//! deliberately lenient and `normalize` repairs whatever it finds instead of
//! failing the whole document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::MAX_NOTE_LEN;
use crate::types::role::{Country, Role};

/// Binary priority flag, High sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    High,
    Normal,
}

impl Urgency {
    /// Sort rank: High before Normal
    pub fn rank(&self) -> u8 {
        match self {
            Urgency::High => 0,
            Urgency::Normal => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "High",
            Urgency::Normal => "Normal",
        }
    }

    /// Lenient form-field parse: anything that is not High is Normal
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("high") {
            Urgency::High
        } else {
            Urgency::Normal
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Urgency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Urgency::parse_lenient(&s))
    }
}

/// Workflow phase of a document
///
/// `Unset` is the blank stage carried by reporter uploads; it is distinct
/// from the first stage and survives round-trips as an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Unset,
    FirstDraft,
    RewrittenUpdated,
    PublisherFeedback,
    FinalDraft,
}

impl Stage {
    /// Selectable stages, in workflow order
    pub const CHOICES: [Stage; 4] = [
        Stage::FirstDraft,
        Stage::RewrittenUpdated,
        Stage::PublisherFeedback,
        Stage::FinalDraft,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Unset => "",
            Stage::FirstDraft => "First draft",
            Stage::RewrittenUpdated => "Rewritten/Updated version",
            Stage::PublisherFeedback => "Publisher asked for feedback",
            Stage::FinalDraft => "Final draft",
        }
    }

    /// Legacy alias table applied before exact-label matching
    fn alias(value: &str) -> &str {
        match value {
            "Draft" | "First Draft" => "First draft",
            "Rewrite" | "Rewritten" | "Updated" | "Updated version" => {
                "Rewritten/Updated version"
            }
            "Feedback" | "Publisher feedback" => "Publisher asked for feedback",
            "Final" | "Final Draft" => "Final draft",
            other => other,
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Stage::CHOICES.into_iter().find(|s| s.label() == label)
    }

    /// Normalize a raw stage value.
    ///
    /// Missing values fall back to the first stage; an explicitly blank value
    /// stays blank; aliases are mapped; anything unrecognized falls back to
    /// the first stage.
    pub fn normalize(value: Option<&str>) -> Self {
        match value {
            None => Stage::FirstDraft,
            Some(raw) => {
                let v = raw.trim();
                if v.is_empty() {
                    return Stage::Unset;
                }
                let v = Stage::alias(v);
                Stage::from_label(v).unwrap_or(Stage::FirstDraft)
            }
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::FirstDraft
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Stage::normalize(Some(&s)))
    }
}

/// Publication status attached to reporter uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    NeedsReview,
    Ready,
}

impl PublicationStatus {
    /// Lenient form-field parse, defaulting to NeedsReview
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ready" => PublicationStatus::Ready,
            _ => PublicationStatus::NeedsReview,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::NeedsReview => "needs_review",
            PublicationStatus::Ready => "ready",
        }
    }
}

impl<'de> Deserialize<'de> for PublicationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PublicationStatus::parse_lenient(&s))
    }
}

/// Lenient timestamp field: missing, empty, or unparseable becomes `None`
mod lenient_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        })
    }
}

/// Uploader-role snapshot field: unknown or missing values fall back to
/// `Admin`, matching how records predating the snapshot were treated.
fn uploader_role_fallback<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Role, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(Role::parse)
        .unwrap_or(Role::Admin))
}

fn default_uploader_role() -> Role {
    Role::Admin
}

/// Truncate to the note length limit, counting characters
pub fn clip_note(note: &str) -> String {
    note.trim().chars().take(MAX_NOTE_LEN).collect()
}

/// Metadata-index entry for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identity of the account that uploaded the file
    #[serde(default)]
    pub uploader: String,

    /// Role snapshot taken at upload time. This is the authoritative anchor
    /// for the urgency/stage lock and is never recomputed from the live
    /// account: a later promotion must not unlock already-uploaded files.
    #[serde(default = "default_uploader_role", deserialize_with = "uploader_role_fallback")]
    pub uploader_role: Role,

    #[serde(default, with = "lenient_time")]
    pub uploaded_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub urgency: Urgency,

    #[serde(default)]
    pub country: Country,

    #[serde(default)]
    pub stage: Stage,

    /// Per-user review flags
    #[serde(default)]
    pub reviewed_by: BTreeMap<String, bool>,

    /// Shared note, at most [`MAX_NOTE_LEN`] characters
    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub note_by: String,

    #[serde(default, with = "lenient_time")]
    pub note_at: Option<DateTime<Utc>>,

    /// Only meaningful for non-admin uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_status: Option<PublicationStatus>,

    /// Present while the file sits in the archive directory
    #[serde(default, with = "lenient_time", skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    /// Legacy per-user note map, consumed by `normalize` and never persisted
    #[serde(default, skip_serializing)]
    pub notes_by: BTreeMap<String, String>,
}

impl Default for FileRecord {
    fn default() -> Self {
        Self {
            uploader: String::new(),
            uploader_role: Role::Admin,
            uploaded_at: None,
            urgency: Urgency::Normal,
            country: Country::Uk,
            stage: Stage::FirstDraft,
            reviewed_by: BTreeMap::new(),
            note: String::new(),
            note_by: String::new(),
            note_at: None,
            publication_status: None,
            archived_at: None,
            notes_by: BTreeMap::new(),
        }
    }
}

impl FileRecord {
    /// Record for a fresh upload
    pub fn new_upload(
        uploader: impl Into<String>,
        uploader_role: Role,
        country: Country,
        urgency: Urgency,
        stage: Stage,
        publication_status: Option<PublicationStatus>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uploader: uploader.into(),
            uploader_role,
            uploaded_at: Some(uploaded_at),
            urgency,
            country,
            stage,
            publication_status,
            ..Default::default()
        }
    }

    /// Urgency and stage are locked when the upload came from a reporter
    pub fn is_retriage_locked(&self) -> bool {
        self.uploader_role == Role::User
    }

    /// Repair legacy field shapes in place. Idempotent: applying this to an
    /// already-normalized record changes nothing.
    pub fn normalize(&mut self) {
        // Backfill the shared note from the historical per-user note map.
        if self.note.trim().is_empty() {
            if let Some(n) = self
                .notes_by
                .values()
                .find(|n| !n.trim().is_empty())
            {
                self.note = clip_note(n);
            } else {
                self.note.clear();
            }
        }
        self.note = clip_note(&self.note);
        self.note_by = self.note_by.trim().to_string();
        self.notes_by.clear();
    }
}
