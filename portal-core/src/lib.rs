//! Portal Core
//!
//! Domain types and the authorization engine for the file exchange portal.
//! This crate is pure: no I/O, no clock beyond what callers pass in, so the
//! authorization decision function stays deterministic and unit-testable.

pub mod authz;
pub mod constants;
pub mod error;
pub mod types;
pub mod validation;

pub use authz::{authorize, AuthzAction, Denial, FileFacts};
pub use error::{CoreError, CoreResult};
pub use types::{
    clip_note, AuditEvent, Country, FileRecord, PublicationStatus, Role, Stage, Urgency,
};
pub use validation::{is_safe_filename, sanitize_filename};
