//! API services

pub mod notify;

pub use notify::{TracingNotifier, UploadNotice, UploadNotifier};
