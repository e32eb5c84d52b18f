//! Active file handlers: listing, upload, metadata edits, download, delete

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use validator::Validate;

use portal_core::{
    authorize, is_safe_filename, sanitize_filename, AuthzAction, Country, FileFacts, FileRecord,
    PublicationStatus, Role, Stage, Urgency,
};

use crate::dto::{
    EditFileRequest, FileEntry, FileListResponse, MessageResponse, RecordResponse, SetNoteRequest,
    SetStageRequest, SetUrgencyRequest, UploadResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Session;
use crate::services::notify;
use crate::state::AppState;

/// Resolve ownership facts for an active file. Files on disk without an
/// index entry get default facts, the same shape `upsert` would create.
async fn active_facts(state: &AppState, name: &str) -> ApiResult<FileFacts> {
    if let Some(record) = state.index.get(name).await {
        return Ok(FileFacts::from_record(&record));
    }
    if state.vault.exists_active(name).await? {
        return Ok(FileFacts::default());
    }
    Err(ApiError::not_found(name))
}

/// Optional query parameters for the active listing
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListQuery {
    pub country: Option<String>,
}

/// GET /
///
/// Active files visible to the caller, split into staff and reporter uploads,
/// urgent first and newest first within an urgency. Non-country roles may
/// narrow the listing with `?country=`.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<FileListResponse>> {
    let filter = match query.country.as_deref() {
        Some(raw) if !session.role.is_country_user() => Some(
            Country::from_code(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown country: {raw}")))?,
        ),
        _ => None,
    };

    let stored = state.vault.list_active().await?;
    let records = state.index.snapshot().await;

    let mut staff_files = Vec::new();
    let mut reporter_files = Vec::new();
    for file in stored {
        let record = records.get(&file.name).cloned().unwrap_or_default();
        let facts = FileFacts::from_record(&record);
        if authorize(session.role, &session.username, AuthzAction::View, &facts).is_err() {
            continue;
        }
        if filter.is_some_and(|c| record.country != c) {
            continue;
        }
        let can_delete =
            authorize(session.role, &session.username, AuthzAction::Delete, &facts).is_ok();
        let entry = FileEntry::from_parts(&file, &record, &session.username, can_delete);
        if record.uploader_role.is_staff() {
            staff_files.push(entry);
        } else {
            reporter_files.push(entry);
        }
    }

    for cohort in [&mut staff_files, &mut reporter_files] {
        cohort.sort_by(|a, b| {
            a.urgency
                .rank()
                .cmp(&b.urgency.rank())
                .then_with(|| b.modified.cmp(&a.modified))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    Ok(Json(FileListResponse {
        staff_files,
        reporter_files,
    }))
}

/// POST /upload (multipart)
///
/// Country-scoped uploaders are pinned to their own country regardless of
/// the submitted field. Plain reporter uploads are forced to Normal urgency
/// and a blank stage; non-staff uploads carry a publication status,
/// defaulting to needs_review.
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut name: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut urgency_raw: Option<String> = None;
    let mut country_raw: Option<String> = None;
    let mut stage_raw: Option<String> = None;
    let mut status_raw: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                name = field.file_name().map(sanitize_filename);
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?
                        .to_vec(),
                );
            }
            Some("urgency") => {
                urgency_raw = Some(
                    field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            Some("country") => {
                country_raw = Some(
                    field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            Some("stage") => {
                stage_raw = Some(
                    field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            Some("publication_status") => {
                status_raw = Some(
                    field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError::validation("missing file field"))?;
    let bytes = bytes.ok_or_else(|| ApiError::validation("missing file field"))?;
    if !is_safe_filename(&name) {
        return Err(ApiError::validation(format!(
            "filename not allowed: {name}"
        )));
    }
    if bytes.is_empty() {
        return Err(ApiError::validation("empty file"));
    }

    let country = match session.role.country() {
        Some(bound) => bound,
        None => match country_raw.as_deref() {
            Some(raw) => Country::from_code(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown country: {raw}")))?,
            None => Country::default(),
        },
    };

    // Plain reporter uploads cannot self-triage; the lock keeps it that way.
    let (urgency, stage) = if session.role == Role::User {
        (Urgency::Normal, Stage::Unset)
    } else {
        (
            Urgency::parse_lenient(urgency_raw.as_deref().unwrap_or("")),
            Stage::normalize(stage_raw.as_deref()),
        )
    };
    let publication_status = if session.role.is_staff() {
        None
    } else {
        Some(PublicationStatus::parse_lenient(
            status_raw.as_deref().unwrap_or(""),
        ))
    };

    let record = FileRecord::new_upload(
        &session.username,
        session.role,
        country,
        urgency,
        stage,
        publication_status,
        Utc::now(),
    );

    state.lifecycle.store_upload(&name, &bytes, record).await?;
    state
        .audit
        .record(
            &session.username,
            "upload",
            &format!("{name} (urgency={urgency}, stage={stage})"),
        )
        .await?;

    notify::dispatch(
        state.notifier.clone(),
        state.db.users(),
        name.clone(),
        session.username.clone(),
        session.role,
        urgency,
        country,
    );

    Ok(Json(UploadResponse {
        name,
        urgency,
        country,
        stage,
        publication_status,
    }))
}

/// POST /edit/:file
///
/// Per-field authorization: each submitted field needs the corresponding
/// permission, and country reassignment is staff-only.
pub async fn edit_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(req): Json<EditFileRequest>,
) -> ApiResult<Json<RecordResponse>> {
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::EditMetadata, &facts)?;

    if req.urgency.is_some() {
        authorize(session.role, &session.username, AuthzAction::SetUrgency, &facts)?;
    }
    if req.stage.is_some() {
        authorize(session.role, &session.username, AuthzAction::SetStage, &facts)?;
    }
    if req.note.is_some() {
        authorize(session.role, &session.username, AuthzAction::SetNote, &facts)?;
    }
    let country = match &req.country {
        Some(raw) => {
            if !session.role.is_staff() {
                return Err(ApiError::forbidden("only staff can reassign countries"));
            }
            Some(Country::from_code(raw).ok_or_else(|| {
                ApiError::validation(format!("unknown country: {raw}"))
            })?)
        }
        None => None,
    };

    let updated = apply_edit(&state, &session, &name, &req, country).await?;
    state
        .audit
        .record(&session.username, "edit", &name)
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

/// POST /update_file/:file
///
/// Staff bulk update of urgency, stage, country and note in one request.
pub async fn update_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(req): Json<EditFileRequest>,
) -> ApiResult<Json<RecordResponse>> {
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::UpdateAll, &facts)?;

    let country = match &req.country {
        Some(raw) => Some(Country::from_code(raw).ok_or_else(|| {
            ApiError::validation(format!("unknown country: {raw}"))
        })?),
        None => None,
    };

    let updated = apply_edit(&state, &session, &name, &req, country).await?;
    state
        .audit
        .record(&session.username, "update_file", &name)
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

async fn apply_edit(
    state: &AppState,
    session: &Session,
    name: &str,
    req: &EditFileRequest,
    country: Option<Country>,
) -> ApiResult<FileRecord> {
    let username = session.username.clone();
    let urgency = req.urgency.as_deref().map(Urgency::parse_lenient);
    let stage = req.stage.as_deref().map(|s| Stage::normalize(Some(s)));
    let note = req.note.clone();

    let updated = state
        .index
        .upsert(name, move |record| {
            if let Some(u) = urgency {
                record.urgency = u;
            }
            if let Some(s) = stage {
                record.stage = s;
            }
            if let Some(c) = country {
                record.country = c;
            }
            if let Some(n) = note {
                record.note = n;
                record.note_by = username;
                record.note_at = Some(Utc::now());
            }
        })
        .await?;
    Ok(updated)
}

/// POST /set_note/:file
pub async fn set_note(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(req): Json<SetNoteRequest>,
) -> ApiResult<Json<RecordResponse>> {
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::SetNote, &facts)?;

    let country = match &req.country {
        Some(raw) => {
            if !session.role.is_staff() {
                return Err(ApiError::forbidden("only staff can reassign countries"));
            }
            Some(Country::from_code(raw).ok_or_else(|| {
                ApiError::validation(format!("unknown country: {raw}"))
            })?)
        }
        None => None,
    };

    let username = session.username.clone();
    let note = req.note;
    let updated = state
        .index
        .upsert(&name, move |record| {
            record.note = note;
            record.note_by = username;
            record.note_at = Some(Utc::now());
            if let Some(c) = country {
                record.country = c;
            }
        })
        .await?;

    state
        .audit
        .record(&session.username, "set_note", &name)
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

/// POST /set_urgency/:file
pub async fn set_urgency(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(req): Json<SetUrgencyRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::SetUrgency, &facts)?;

    let urgency = Urgency::parse_lenient(&req.urgency);
    let before = state
        .index
        .get(&name)
        .await
        .map(|r| r.urgency)
        .unwrap_or_default();
    let updated = state
        .index
        .upsert(&name, move |record| {
            record.urgency = urgency;
        })
        .await?;

    state
        .audit
        .record(
            &session.username,
            "set_urgency",
            &format!("{name}: {before} -> {urgency}"),
        )
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

/// POST /set_stage/:file
pub async fn set_stage(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(req): Json<SetStageRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::SetStage, &facts)?;

    let stage = Stage::normalize(Some(&req.stage));
    let before = state
        .index
        .get(&name)
        .await
        .map(|r| r.stage)
        .unwrap_or_default();
    let updated = state
        .index
        .upsert(&name, move |record| {
            record.stage = stage;
        })
        .await?;

    state
        .audit
        .record(
            &session.username,
            "set_stage",
            &format!("{name}: {before} -> {stage}"),
        )
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

/// POST /toggle_reviewed/:file
///
/// Reporters flag files they have looked at; each account has its own flag.
pub async fn toggle_reviewed(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::ToggleReviewed, &facts)?;

    let username = session.username.clone();
    let updated = state
        .index
        .upsert(&name, move |record| {
            let flag = record.reviewed_by.entry(username).or_insert(false);
            *flag = !*flag;
        })
        .await?;

    state
        .audit
        .record(&session.username, "toggle_reviewed", &name)
        .await?;

    Ok(Json(RecordResponse::from_record(&name, &updated, &session.username)))
}

/// GET /download/:file
pub async fn download(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::Download, &facts)?;

    let path = state.vault.active_path(&name)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found(&name))?;

    state
        .audit
        .record(&session.username, "download", &name)
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

/// POST /delete/:file
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let facts = active_facts(&state, &name).await?;
    authorize(session.role, &session.username, AuthzAction::Delete, &facts)?;

    state.lifecycle.delete_active(&name).await?;
    state
        .audit
        .record(&session.username, "delete", &name)
        .await?;

    Ok(Json(MessageResponse::new(format!("deleted {name}"))))
}
