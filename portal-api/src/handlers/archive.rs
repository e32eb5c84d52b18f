//! Archive handlers: approve, listing, restore, permanent delete

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};

use portal_core::{authorize, AuthzAction, Country, FileFacts};

use crate::dto::{ApproveResponse, ArchiveEntry, ArchiveListResponse, MessageResponse};
use crate::error::{ApiError, ApiResult};
use crate::handlers::files::ListQuery;
use crate::middleware::auth::Session;
use crate::state::AppState;

/// POST /approve/:file
///
/// Move an active file into the archive. The response carries the name the
/// file holds there, which differs from the request when the archive already
/// held one by the same name.
pub async fn approve(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApproveResponse>> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::Archive,
        &FileFacts::default(),
    )?;
    if !state.vault.exists_active(&name).await? {
        return Err(ApiError::not_found(&name));
    }

    let archived_as = state.lifecycle.archive(&name).await?;
    state
        .audit
        .record(&session.username, "approve", &format!("{name} -> {archived_as}"))
        .await?;

    Ok(Json(ApproveResponse { archived_as }))
}

/// GET /archive
pub async fn list_archive(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ArchiveListResponse>> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::Archive,
        &FileFacts::default(),
    )?;
    let filter = match query.country.as_deref() {
        Some(raw) => Some(
            Country::from_code(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown country: {raw}")))?,
        ),
        None => None,
    };

    let stored = state.vault.list_archived().await?;
    let records = state.index.snapshot().await;

    let files = stored
        .into_iter()
        .filter_map(|file| {
            let record = records
                .get(&portal_store::archived_key(&file.name))
                .cloned()
                .unwrap_or_default();
            if filter.is_some_and(|c| record.country != c) {
                return None;
            }
            Some(ArchiveEntry {
                name: file.name,
                size: file.size,
                modified: file.modified,
                uploader: record.uploader,
                country: record.country,
                archived_at: record.archived_at,
            })
        })
        .collect();

    Ok(Json(ArchiveListResponse { files }))
}

/// GET /download_archived/:file
pub async fn download_archived(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::Archive,
        &FileFacts::default(),
    )?;

    let path = state.vault.archived_path(&name)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found(&name))?;

    state
        .audit
        .record(&session.username, "download_archived", &name)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// POST /restore/:file
pub async fn restore(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::Restore,
        &FileFacts::default(),
    )?;

    state.lifecycle.restore(&name).await?;
    state
        .audit
        .record(&session.username, "restore", &name)
        .await?;

    Ok(Json(MessageResponse::new(format!("restored {name}"))))
}

/// POST /delete_archived/:file
///
/// Permanent removal of an archived file and its record.
pub async fn delete_archived(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    authorize(
        session.role,
        &session.username,
        AuthzAction::PermanentDelete,
        &FileFacts::default(),
    )?;

    state.lifecycle.delete_archived(&name).await?;
    state
        .audit
        .record(&session.username, "delete_archived", &name)
        .await?;

    Ok(Json(MessageResponse::new(format!(
        "permanently deleted {name}"
    ))))
}
