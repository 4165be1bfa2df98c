use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use reelsearch_core::persist::{load_text, save_text, IndexPaths};
use reelsearch_core::tokenizer::preprocess;
use reelsearch_core::{Corpus, Engine, IndexConfig, Method, RawMovie, SearchError, SnippetExtractor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_field")]
    pub field: String,
    /// `bm25` or a vector space code such as `lnc.ltc`
    #[serde(default = "default_method")]
    pub method: String,
}
fn default_k() -> usize { 10 }
fn default_field() -> String { "summaries".into() }
fn default_method() -> String { "bm25".into() }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub method: String,
    pub field: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    /// Queries take the read lock; batch, delete and commit take the write lock.
    pub engine: Arc<RwLock<Engine>>,
    pub admin_token: Option<String>,
}

pub fn build_app_with_token(index_dir: String, config: IndexConfig, admin_token: Option<String>) -> Result<Router> {
    // Load the stored index at startup
    let engine = Engine::open(&index_dir, config)?;
    tracing::info!(index = %index_dir, num_docs = engine.index().document_count(), "index loaded");
    let app_state = AppState { index_root: PathBuf::from(&index_dir), engine: Arc::new(RwLock::new(engine)), admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler).delete(delete_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn api_error(err: SearchError) -> ApiError {
    let status = if err.is_configuration() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, err.to_string())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    run_search(&state, params).map(Json)
}

fn run_search(state: &AppState, params: SearchParams) -> Result<SearchResponse, ApiError> {
    let start = std::time::Instant::now();
    let method: Method = params.method.parse().map_err(api_error)?;
    let terms = preprocess(&params.q);

    let engine = state.engine.read();
    let mut ranked = engine.search(&terms, &params.field, &method, usize::MAX).map_err(api_error)?;
    let total_hits = ranked.len();
    ranked.truncate(params.k.clamp(1, 100));

    let paths = IndexPaths::new(&state.index_root);
    let extractor = SnippetExtractor::default();
    let results = ranked
        .into_iter()
        .map(|(doc_id, score)| {
            let title = engine.index().document(&doc_id).and_then(|d| d.title.clone());
            let snippet = load_text(&paths, &params.field, &doc_id)
                .map(|text| extractor.find_snippet(&text, &params.q).text)
                .filter(|s| !s.is_empty());
            SearchHit { doc_id, score, title, snippet }
        })
        .collect();

    Ok(SearchResponse {
        query: params.q,
        method: method.to_string(),
        field: params.field,
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results,
    })
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = state.engine.read();
    let doc = engine.index().document(&doc_id).ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    let mut obj = serde_json::to_value(doc).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let paths = IndexPaths::new(&state.index_root);
    let texts: serde_json::Map<String, serde_json::Value> = engine
        .index()
        .fields()
        .iter()
        .filter_map(|field| load_text(&paths, field, &doc_id).map(|t| (field.clone(), serde_json::Value::String(t))))
        .collect();
    obj["texts"] = serde_json::Value::Object(texts);
    Ok(Json(obj))
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(movies): Json<Vec<RawMovie>>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_root);
    let mut engine = state.engine.write();
    let fields = engine.index().fields().to_vec();
    for movie in &movies {
        for field in &fields {
            save_text(&paths, field, &movie.id, &movie.text(field)).map_err(api_error)?;
        }
    }
    let docs = Corpus::new(movies).to_documents(&fields, preprocess);
    let added = engine.add_documents(docs).map_err(api_error)?;
    tracing::info!(added, num_docs = engine.index().document_count(), "indexed batch");
    Ok(Json(serde_json::json!({ "added": added, "num_docs": engine.index().document_count() })))
}

async fn delete_handler(State(state): State<AppState>, headers: HeaderMap, Path(doc_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let removed = state.engine.write().remove_document(&doc_id).map_err(api_error)?;
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "removed": removed })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let engine = state.engine.read();
    engine.store(&state.index_root).map_err(api_error)?;
    Ok(Json(serde_json::json!({ "committed": true, "num_docs": engine.index().document_count() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
