//! Admin handlers: account and invite management, superuser only

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension, Json,
};
use validator::Validate;

use portal_core::{authorize, AuthzAction, Country, FileFacts, Role};

use crate::dto::{
    AdminActionRequest, AdminUsersResponse, InviteBatchResponse, InviteEntry, MessageResponse,
    UserEntry,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Session;
use crate::state::AppState;

fn require_super(session: &Session) -> ApiResult<()> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::ManageUsers,
        &FileFacts::default(),
    )?;
    Ok(())
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<AdminUsersResponse>> {
    require_super(&session)?;

    let users = state
        .db
        .users()
        .list()?
        .into_iter()
        .map(UserEntry::from)
        .collect();
    let invites = state
        .db
        .invites()
        .list()?
        .into_iter()
        .map(InviteEntry::from)
        .collect();

    Ok(Json(AdminUsersResponse { users, invites }))
}

/// POST /admin/users/action
///
/// One endpoint for all account and invite administration. Destructive
/// account actions cannot target the caller's own account, and the store
/// refuses anything that would remove the last active superuser.
pub async fn user_action(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<AdminActionRequest>,
) -> ApiResult<Response> {
    require_super(&session)?;
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;

    let users = state.db.users();
    let invites = state.db.invites();

    let target = |req: &AdminActionRequest| -> ApiResult<String> {
        req.username
            .clone()
            .ok_or_else(|| ApiError::validation("missing username"))
    };
    let not_self = |target: &str| -> ApiResult<()> {
        if target == session.username {
            return Err(ApiError::Conflict(
                "cannot apply this action to your own account".to_string(),
            ));
        }
        Ok(())
    };

    let detail: String;
    let response: Response = match req.action.as_str() {
        "promote" => {
            let username = target(&req)?;
            users.set_role(&username, Role::Admin)?;
            detail = format!("promote {username}");
            Json(MessageResponse::new(format!("{username} is now admin"))).into_response()
        }
        "demote" => {
            let username = target(&req)?;
            not_self(&username)?;
            users.set_role(&username, Role::User)?;
            detail = format!("demote {username}");
            Json(MessageResponse::new(format!("{username} is now user"))).into_response()
        }
        "make_super" => {
            let username = target(&req)?;
            users.set_role(&username, Role::Super)?;
            detail = format!("make_super {username}");
            Json(MessageResponse::new(format!("{username} is now super"))).into_response()
        }
        "set_country" => {
            let username = target(&req)?;
            not_self(&username)?;
            let raw = req
                .country
                .as_deref()
                .ok_or_else(|| ApiError::validation("missing country"))?;
            let country = Country::from_code(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown country: {raw}")))?;
            users.set_role(&username, Role::CountryUser(country))?;
            detail = format!("set_country {username} -> {country}");
            Json(MessageResponse::new(format!(
                "{username} is now scoped to {country}"
            )))
            .into_response()
        }
        "activate" => {
            let username = target(&req)?;
            users.set_active(&username, true)?;
            detail = format!("activate {username}");
            Json(MessageResponse::new(format!("{username} activated"))).into_response()
        }
        "deactivate" => {
            let username = target(&req)?;
            not_self(&username)?;
            users.set_active(&username, false)?;
            detail = format!("deactivate {username}");
            Json(MessageResponse::new(format!("{username} deactivated"))).into_response()
        }
        "reset_password" => {
            let username = target(&req)?;
            let password = req
                .new_password
                .as_deref()
                .ok_or_else(|| ApiError::validation("missing new_password"))?;
            users.set_password(&username, password)?;
            detail = format!("reset_password {username}");
            Json(MessageResponse::new(format!("password reset for {username}"))).into_response()
        }
        "delete_user" => {
            let username = target(&req)?;
            not_self(&username)?;
            users.delete(&username)?;
            detail = format!("delete_user {username}");
            Json(MessageResponse::new(format!("{username} deleted"))).into_response()
        }
        "gen_invites" => {
            let country = match req.country.as_deref() {
                Some(raw) => Some(Country::from_code(raw).ok_or_else(|| {
                    ApiError::validation(format!("unknown country: {raw}"))
                })?),
                None => None,
            };
            let codes = invites.generate(
                req.count.unwrap_or(1),
                req.length,
                country,
                &session.username,
            )?;
            detail = format!("gen_invites x{}", codes.len());
            Json(InviteBatchResponse { codes }).into_response()
        }
        "revoke_invite" => {
            let code = req
                .code
                .as_deref()
                .ok_or_else(|| ApiError::validation("missing code"))?;
            invites.revoke(code)?;
            detail = format!("revoke_invite {code}");
            Json(MessageResponse::new(format!("invite {code} revoked"))).into_response()
        }
        other => {
            return Err(ApiError::validation(format!("unknown action: {other}")));
        }
    };

    state
        .audit
        .record(&session.username, "admin", &detail)
        .await?;

    Ok(response)
}
