//! Portal-wide constants

/// File extensions accepted for upload and listing
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["zip", "docx", "pdf"];

/// Maximum note length in characters
pub const MAX_NOTE_LEN: usize = 100;

/// Alphabet used for generated invite codes
pub const INVITE_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default invite code length
pub const DEFAULT_INVITE_LEN: usize = 7;

/// Invite batch size clamp
pub const INVITE_COUNT_MIN: usize = 1;
pub const INVITE_COUNT_MAX: usize = 50;

/// Invite code length clamp
pub const INVITE_LEN_MIN: usize = 5;
pub const INVITE_LEN_MAX: usize = 10;

/// Directory name for archived files under the active directory
pub const ARCHIVE_DIR_NAME: &str = "_approved";

/// Suffix marker inserted when an archive rename collides
pub const ARCHIVE_COLLISION_MARKER: &str = "__approved_";
