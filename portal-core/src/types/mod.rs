//! Portal domain types

pub mod audit;
pub mod file;
pub mod role;

pub use audit::AuditEvent;
pub use file::{clip_note, FileRecord, PublicationStatus, Stage, Urgency};
pub use role::{Country, Role};
