//! HTTP API exposing the document lifecycle endpoints and the live stream.

mod error;

pub use error::ApiError;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::sse::{self, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use doc_viewer_core::{
    archive::{ArchiveOutcome, Archiver},
    Document, DocumentStatus, DocumentStore, DocumentSummary, EventBroadcaster, NewDocument,
    StoreError,
};
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<DocumentStore>>,
    pub events: EventBroadcaster,
    pub archiver: Arc<dyn Archiver>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings, archiver: Arc<dyn Archiver>) -> Self {
        let events = EventBroadcaster::new();
        let store = DocumentStore::with_events(events.clone());
        Self {
            store: Arc::new(RwLock::new(store)),
            events,
            archiver,
            settings: Arc::new(settings),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CreateResponse {
    id: String,
    title: String,
    status: DocumentStatus,
    url: String,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct ListResponse {
    documents: Vec<DocumentSummary>,
    count: usize,
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<DocumentStatus>,
}

#[derive(Deserialize)]
struct UpdateRequest {
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct RenameRequest {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RenameResponse {
    id: String,
    title: String,
}

#[derive(Deserialize, Default)]
struct CompleteRequest {
    commit_message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CompleteResponse {
    id: String,
    status: DocumentStatus,
    git: ArchiveOutcome,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/documents",
            get(list_docs).post(create_doc).delete(clear_docs),
        )
        .route("/api/documents/stream", get(stream_events))
        .route(
            "/api/documents/{id}",
            get(get_doc)
                .put(update_doc)
                .patch(rename_doc)
                .delete(delete_doc),
        )
        .route("/api/documents/{id}/complete", post(complete_doc))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.settings.environment,
    }))
}

/// Base for links handed back to clients.
fn base_url(settings: &Settings, headers: &HeaderMap) -> String {
    if let Some(url) = &settings.public_url {
        return url.clone();
    }
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => format!("{scheme}://{host}"),
        None => format!("http://{}", settings.bind_addr()),
    }
}

async fn create_doc(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewDocument>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let Json(req) = body?;
    let doc = state.store.write().await.upsert_by_path(req)?;
    let url = format!("{}/doc/{}", base_url(&state.settings, &headers), doc.id);
    Ok(Json(CreateResponse {
        id: doc.id,
        title: doc.title,
        status: doc.status,
        url,
        created_at: doc.created_at,
    }))
}

async fn list_docs(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params?;
    let documents: Vec<DocumentSummary> = state
        .store
        .read()
        .await
        .list(params.status)
        .iter()
        .map(Document::summary)
        .collect();
    Ok(Json(ListResponse {
        count: documents.len(),
        documents,
    }))
}

async fn clear_docs(State(state): State<AppState>) -> Json<Value> {
    let deleted = state.store.write().await.clear_all();
    tracing::info!(deleted, "cleared all documents");
    Json(json!({ "deleted": deleted }))
}

async fn get_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let doc = state.store.read().await.get(&id).cloned();
    match doc {
        Some(doc) => Ok(Json(doc)),
        None => Err(StoreError::NotFound(id).into()),
    }
}

async fn update_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<Document>, ApiError> {
    let Json(req) = body?;
    let doc = state.store.write().await.update(&id, req.title, req.content)?;
    Ok(Json(doc))
}

async fn rename_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<RenameResponse>, ApiError> {
    let Json(req) = body?;
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let doc = state.store.write().await.rename(&id, title)?;
    Ok(Json(RenameResponse {
        id: doc.id,
        title: doc.title,
    }))
}

/// Mark the document complete, then archive it outside the store lock. The
/// document stays complete whatever the archive outcome.
async fn complete_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<CompleteResponse>, ApiError> {
    let req: CompleteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CompleteRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };

    let doc = state.store.write().await.complete(&id)?;
    let git = state
        .archiver
        .archive(&doc, req.commit_message.as_deref())
        .await;
    tracing::info!(
        id = %doc.id,
        backend = state.archiver.name(),
        committed = git.committed,
        "document completed"
    );
    Ok(Json(CompleteResponse {
        id: doc.id,
        status: doc.status,
        git,
    }))
}

async fn delete_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.write().await.delete(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::NotFound(id).into())
    }
}

/// Server-sent events for every newly created document. The subscription is
/// dropped together with the response stream when the client disconnects.
async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    let subscription = state.events.subscribe();
    tracing::debug!(subscriber = subscription.id(), "event stream connected");
    let stream = subscription.filter_map(|event| {
        future::ready(
            serde_json::to_string(&event)
                .ok()
                .map(|data| Ok(sse::Event::default().data(data))),
        )
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
