//! Authentication handlers: login, registration, logout

use axum::{extract::State, Extension, Json};
use validator::Validate;

use portal_core::Role;

use crate::dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{issue_token, Session};
use crate::state::AppState;

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;

    let user = state
        .db
        .users()
        .verify_credentials(&req.username, &req.password)?
        .ok_or_else(|| ApiError::Unauthorized("invalid username or password".to_string()))?;

    let token = issue_token(&state.auth.config, &user.username, user.role)
        .map_err(ApiError::internal)?;

    state.audit.record(&user.username, "login", "").await?;

    Ok(Json(LoginResponse {
        token,
        username: user.username,
        role: user.role,
    }))
}

/// POST /register
///
/// Invite-gated while any invite mechanism is active (a bypass code is
/// configured or an unused invite exists). A country-bound invite makes the
/// new account a country user for that country; otherwise the role is `user`.
/// The fresh account is logged in immediately.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;

    let invites = state.db.invites();
    let code = req
        .invite_code
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty());
    let bypass = match (&state.invite_bypass_code, &code) {
        (Some(configured), Some(submitted)) => configured.eq_ignore_ascii_case(submitted),
        _ => false,
    };
    let gated = state.invite_bypass_code.is_some() || invites.any_unused()?;

    let mut role = Role::User;
    let mut consume: Option<String> = None;
    if gated && !bypass {
        let code = code.ok_or_else(|| ApiError::validation("invite code required"))?;
        let invite = invites
            .get(&code)?
            .ok_or_else(|| ApiError::validation("invalid invite code"))?;
        if invite.is_used() {
            return Err(ApiError::Conflict(format!("invite already used: {code}")));
        }
        if let Some(country) = invite.country {
            role = Role::CountryUser(country);
        }
        consume = Some(code);
    }

    // Claim the invite first: a race on the same code must lose before any
    // account row exists. A failed create rolls the claim back.
    if let Some(code) = &consume {
        invites.consume(code, &req.username)?;
    }
    let created = state
        .db
        .users()
        .create(&req.username, &req.password, role, req.email.as_deref());
    let user = match created {
        Ok(user) => user,
        Err(err) => {
            if let Some(code) = &consume {
                invites.release(code, &req.username)?;
            }
            return Err(err.into());
        }
    };

    let detail = match &consume {
        Some(code) => format!("invite {code}"),
        None if bypass => "bypass code".to_string(),
        None => "open registration".to_string(),
    };

    state.audit.record(&req.username, "register", &detail).await?;

    let token = issue_token(&state.auth.config, &user.username, user.role)
        .map_err(ApiError::internal)?;

    Ok(Json(LoginResponse {
        token,
        username: user.username,
        role: user.role,
    }))
}

/// GET /logout
///
/// Sessions are stateless tokens, so there is nothing to invalidate
/// server-side; the endpoint exists to put the logout on the audit trail.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MessageResponse>> {
    state.audit.record(&session.username, "logout", "").await?;
    Ok(Json(MessageResponse::new("logged out")))
}
