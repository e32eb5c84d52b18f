//! Audit trail events
//!
//! One event per state-changing action, serialized as a tab-separated line.
//! Events are append-only: nothing ever mutates or deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single audit trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        actor: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            actor: actor.into(),
            action: action.into(),
            detail: detail.into(),
        }
    }

    /// Render as a tab-separated log line (no trailing newline).
    /// Tabs and newlines inside fields are replaced so the line stays parseable.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.timestamp.to_rfc3339(),
            sanitize_field(&self.actor),
            sanitize_field(&self.action),
            sanitize_field(&self.detail),
        )
    }

    /// Parse a tab-separated log line
    pub fn parse_line(line: &str) -> Result<Self, CoreError> {
        let mut parts = line.splitn(4, '\t');
        let ts = parts
            .next()
            .ok_or_else(|| CoreError::InvalidAuditLine(line.to_string()))?;
        let actor = parts
            .next()
            .ok_or_else(|| CoreError::InvalidAuditLine(line.to_string()))?;
        let action = parts
            .next()
            .ok_or_else(|| CoreError::InvalidAuditLine(line.to_string()))?;
        let detail = parts.next().unwrap_or("");

        let timestamp = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| CoreError::InvalidAuditLine(line.to_string()))?
            .with_timezone(&Utc);

        Ok(Self::new(timestamp, actor, action, detail))
    }
}

fn sanitize_field(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_round_trip() {
        let event = AuditEvent::new(Utc::now(), "alice", "upload", "report.pdf (urgency=High)");
        let parsed = AuditEvent::parse_line(&event.to_line()).unwrap();
        assert_eq!(parsed.actor, "alice");
        assert_eq!(parsed.action, "upload");
        assert_eq!(parsed.detail, "report.pdf (urgency=High)");
    }

    #[test]
    fn test_embedded_tabs_sanitized() {
        let event = AuditEvent::new(Utc::now(), "bob", "edit", "a\tb\nc");
        let line = event.to_line();
        assert_eq!(line.matches('\t').count(), 3);
        let parsed = AuditEvent::parse_line(&line).unwrap();
        assert_eq!(parsed.detail, "a b c");
    }

    #[test]
    fn test_bad_line_rejected() {
        assert!(AuditEvent::parse_line("not a line").is_err());
        assert!(AuditEvent::parse_line("2020-01-01T00:00:00Z\tonlyactor").is_err());
    }
}
