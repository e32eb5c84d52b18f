//! Upload notifications
//!
//! Fire-and-forget: a failed or slow notification must never fail the upload
//! that triggered it, so dispatch happens on a detached task.
//!
//! Reporter uploads notify staff; staff uploads notify reporters. Only
//! active accounts with an email on file are targeted.

use std::sync::Arc;

use async_trait::async_trait;

use portal_core::{Country, Role, Urgency};
use portal_db::UserStore;

/// Everything a notifier needs to describe one upload
#[derive(Debug, Clone)]
pub struct UploadNotice {
    pub file: String,
    pub uploader: String,
    pub uploader_role: Role,
    pub urgency: Urgency,
    pub country: Country,
    /// (username, email) pairs
    pub recipients: Vec<(String, String)>,
}

/// Delivery backend for upload notices
#[async_trait]
pub trait UploadNotifier: Send + Sync {
    async fn notify(&self, notice: UploadNotice);
}

/// Default backend: writes each notice to the log. A mail transport would
/// implement the same trait.
pub struct TracingNotifier;

#[async_trait]
impl UploadNotifier for TracingNotifier {
    async fn notify(&self, notice: UploadNotice) {
        for (username, email) in &notice.recipients {
            tracing::info!(
                file = %notice.file,
                uploader = %notice.uploader,
                urgency = %notice.urgency,
                country = %notice.country,
                recipient = %username,
                email = %email,
                "upload notification"
            );
        }
    }
}

/// Roles to notify for an upload by `uploader_role`: reporter uploads go to
/// staff, staff uploads go to plain reporters.
fn recipient_roles(uploader_role: Role) -> Vec<Role> {
    if uploader_role.is_staff() {
        vec![Role::User]
    } else {
        vec![Role::Admin, Role::Super]
    }
}

/// Resolve recipients and dispatch the notice on a detached task
pub fn dispatch(
    notifier: Arc<dyn UploadNotifier>,
    users: UserStore,
    file: String,
    uploader: String,
    uploader_role: Role,
    urgency: Urgency,
    country: Country,
) {
    tokio::spawn(async move {
        let recipients = match users.notification_targets(&recipient_roles(uploader_role)) {
            Ok(targets) => targets,
            Err(err) => {
                tracing::warn!(%err, "could not resolve notification recipients");
                return;
            }
        };
        if recipients.is_empty() {
            return;
        }
        notifier
            .notify(UploadNotice {
                file,
                uploader,
                uploader_role,
                urgency,
                country,
                recipients,
            })
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_roles_cross_over() {
        assert_eq!(recipient_roles(Role::User), vec![Role::Admin, Role::Super]);
        assert_eq!(
            recipient_roles(Role::CountryUser(Country::De)),
            vec![Role::Admin, Role::Super]
        );
        assert_eq!(recipient_roles(Role::Admin), vec![Role::User]);
        assert_eq!(recipient_roles(Role::Super), vec![Role::User]);
    }
}
