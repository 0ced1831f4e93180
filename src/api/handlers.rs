use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::links::{Entry, EntryError, LinkTable};
use crate::registry::{Registry, RegistryError};
use crate::search::search as fuzzy_search;
use crate::storage::StorageError;

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<Registry>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: String,
    pub links: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.registry.storage_kind().to_string(),
        links: state.registry.len(),
    })
}

// ============================================================================
// Redirect
// ============================================================================

pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Redirect, ApiError> {
    let target = state
        .registry
        .get(path.trim_end_matches('/'))
        .ok_or_else(|| ApiError::NotFound(format!("No link for '{}'", path)))?;

    tracing::debug!(path = %path, target = %target, "redirecting");
    Ok(Redirect::temporary(&target))
}

// ============================================================================
// Bulk Operations
// ============================================================================

pub async fn get_all(State(state): State<Arc<AppState>>) -> Json<LinkTable> {
    Json(state.registry.get_all().as_ref().clone())
}

/// Replace every link with a links document (same format as the links file)
pub async fn replace_all(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<LinkTable>, ApiError> {
    let table = state.registry.replace_all(&body).await?;
    Ok(Json(table.as_ref().clone()))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlfredItem {
    pub uid: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub subtitle: String,
    pub arg: String,
    pub autocomplete: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlfredResponse {
    pub items: Vec<AlfredItem>,
}

impl From<&LinkTable> for AlfredResponse {
    fn from(table: &LinkTable) -> Self {
        let mut items: Vec<AlfredItem> = table
            .iter()
            .map(|(path, target)| AlfredItem {
                uid: path.clone(),
                item_type: "default".to_string(),
                title: path.clone(),
                subtitle: target.clone(),
                arg: target.clone(),
                autocomplete: path.clone(),
            })
            .collect();
        items.sort_by(|a, b| a.uid.cmp(&b.uid));

        Self { items }
    }
}

pub async fn get_all_alfred(State(state): State<Arc<AppState>>) -> Json<AlfredResponse> {
    Json(AlfredResponse::from(state.registry.get_all().as_ref()))
}

// ============================================================================
// Search
// ============================================================================

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(rename = "isAlfred", default)]
    pub is_alfred: bool,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let hits = fuzzy_search(&params.query, state.registry.get_all_keys());
    let matches = state.registry.get_filtered(hits.into_iter().map(|hit| hit.key));

    if params.is_alfred {
        Json(AlfredResponse::from(&matches)).into_response()
    } else {
        Json(matches).into_response()
    }
}

// ============================================================================
// Single Links
// ============================================================================

#[derive(Deserialize)]
pub struct TargetBody {
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkChange {
    pub old: Option<Entry>,
    pub new: Entry,
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<Entry>, ApiError> {
    let path = path.trim_end_matches('/').to_string();
    let target = state
        .registry
        .get(&path)
        .ok_or_else(|| ApiError::NotFound(format!("No link for '{}'", path)))?;

    Ok(Json(Entry { path, target }))
}

/// Create or retarget a link. Existing paths go through `update` so the
/// links file does not accumulate duplicates.
pub async fn post_link(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Json(body): Json<TargetBody>,
) -> Result<Json<LinkChange>, ApiError> {
    let entry = Entry::new(&path, body.target)?;

    let old = state.registry.get(&entry.path).map(|target| Entry {
        path: entry.path.clone(),
        target,
    });

    if old.is_some() {
        state
            .registry
            .update(entry.path.clone(), entry.target.clone())
            .await?;
    } else {
        state
            .registry
            .put(entry.path.clone(), entry.target.clone())
            .await?;
    }

    tracing::info!(path = %entry.path, target = %entry.target, "link saved");
    Ok(Json(LinkChange { old, new: entry }))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    let path = path.trim_end_matches('/');
    if state.registry.delete(path).await? {
        tracing::info!(path = %path, "link deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<EntryError> for ApiError {
    fn from(err: EntryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Storage(StorageError::MalformedEntry(e)) => e.into(),
            other => {
                tracing::error!(error = %other, "registry operation failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
