//! API request handlers

pub mod admin;
pub mod archive;
pub mod auth;
pub mod files;
pub mod health;
