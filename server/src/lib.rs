use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use blogsearch_core::document::load_posts_from_path;
use blogsearch_core::persist::{load_index, save_index, IndexPaths};
use blogsearch_core::{search_page, DocId, Document, IdfMode, IndexBuilder, IndexConfig, LiveIndex, SearchError, SearchIndex, SearchOptions};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
    /// Record file or directory used by `/index/rebuild`, and to bootstrap
    /// when no index has been persisted yet.
    pub source: Option<PathBuf>,
    pub max_k: usize,
    pub admin_token: Option<String>,
    /// Comma-separated allowed origins; any origin when unset.
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    /// Paths from the caller, secrets and CORS from `ADMIN_TOKEN` and
    /// `CORS_ALLOW_ORIGIN`.
    pub fn from_env(index_dir: PathBuf, source: Option<PathBuf>, max_k: usize) -> Self {
        Self {
            index_dir,
            source,
            max_k,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub require_terms: bool,
    #[serde(default)]
    pub idf: Option<IdfMode>,
}
fn default_k() -> usize { 10 }

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f32,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RebuildSummary {
    pub generation: u64,
    pub num_docs: usize,
    pub num_terms: usize,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveIndex>,
    pub index_dir: PathBuf,
    pub source: Option<PathBuf>,
    pub max_k: usize,
    pub admin_token: Option<String>,
    /// Serializes rebuilds and reloads; searches never take it.
    rebuild_lock: Arc<tokio::sync::Mutex<()>>,
}

pub type ApiError = (StatusCode, String);

/// Load the persisted index, falling back to a build from `source`.
fn initial_index(config: &ServerConfig) -> Result<SearchIndex> {
    let paths = IndexPaths::new(&config.index_dir);
    match load_index(&paths) {
        Ok(index) => Ok(index),
        Err(err) => {
            let source = config
                .source
                .as_ref()
                .with_context(|| format!("loading index from {}: {err}", config.index_dir.display()))?;
            tracing::warn!(%err, source = %source.display(), "no usable index on disk, building from source");
            let posts = load_posts_from_path(source)?;
            let out = IndexBuilder::new(IndexConfig::default())?.build(posts);
            save_index(&paths, &out.index)?;
            Ok(out.index)
        }
    }
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    let index = initial_index(&config)?;
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "index loaded");

    let cors = match &config.cors_allow_origin {
        Some(val) => {
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
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app_state = AppState {
        live: Arc::new(LiveIndex::new(index)),
        index_dir: config.index_dir,
        source: config.source,
        max_k: config.max_k,
        admin_token: config.admin_token,
        rebuild_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(index_rebuild))
        .route("/index/reload", post(index_reload))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let index = state.live.snapshot();
    let opts = SearchOptions {
        limit: params.k.min(state.max_k),
        require_terms: params.require_terms,
        idf: params.idf.unwrap_or_default(),
        ..SearchOptions::default()
    };
    let page = search_page(&index, &params.q, &opts).map_err(|e| match e {
        SearchError::InvalidQuery { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
    })?;

    let pattern = highlight_pattern(&page.terms);
    let results = page
        .hits
        .iter()
        .map(|hit| -> Result<SearchResult, ApiError> {
            let doc = index.document(hit.doc_id).ok_or_else(|| {
                tracing::error!(doc_id = hit.doc_id, "search hit has no document");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("corrupt index: no document {}", hit.doc_id))
            })?;
            Ok(SearchResult {
                doc_id: hit.doc_id,
                score: hit.score,
                title: doc.title.clone(),
                url: doc.url.clone(),
                snippet: snippet(&doc.excerpt, pattern.as_ref()),
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: page.total_hits,
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<Document>, ApiError> {
    let index = state.live.snapshot();
    match index.document(doc_id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

/// Case-insensitive match of any query term at a word start; stemmed terms
/// extend to the end of the word.
fn highlight_pattern(terms: &[String]) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    RegexBuilder::new(&format!(r"\b(?:{})\w*", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .ok()
}

fn snippet(text: &str, pattern: Option<&Regex>) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let start = match pattern.and_then(|re| re.find(text)) {
        Some(m) => floor_char_boundary(text, m.start().saturating_sub(SNIPPET_CHARS / 2)),
        None => 0,
    };
    let snippet: String = text[start..].chars().take(SNIPPET_CHARS).collect();
    Some(match pattern {
        Some(re) => re.replace_all(&snippet, "<em>$0</em>").into_owned(),
        None => snippet,
    })
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

// --- Admin endpoints ---

/// Reload records from the configured source, build with the serving index's
/// config, persist, then swap.
async fn index_rebuild(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildSummary>, ApiError> {
    authorize(&state, &headers)?;
    let source = state
        .source
        .clone()
        .ok_or((StatusCode::CONFLICT, "server was started without a record source".to_string()))?;
    let _guard = state.rebuild_lock.lock().await;

    let config = state.live.snapshot().config().clone();
    let index_dir = state.index_dir.clone();
    let out = tokio::task::spawn_blocking(move || -> Result<_> {
        let posts = load_posts_from_path(&source)?;
        let out = IndexBuilder::new(config)?.build(posts);
        save_index(&IndexPaths::new(&index_dir), &out.index)?;
        Ok(out)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let num_docs = out.index.num_docs();
    let num_terms = out.index.num_terms();
    let warnings = out.warnings.iter().map(ToString::to_string).collect();
    state.live.publish(out.index);
    Ok(Json(RebuildSummary { generation: state.live.generation(), num_docs, num_terms, warnings }))
}

/// Swap in whatever index is currently persisted on disk.
async fn index_reload(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildSummary>, ApiError> {
    authorize(&state, &headers)?;
    let _guard = state.rebuild_lock.lock().await;

    let paths = IndexPaths::new(&state.index_dir);
    let index = tokio::task::spawn_blocking(move || load_index(&paths))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    let num_docs = index.num_docs();
    let num_terms = index.num_terms();
    state.live.publish(index);
    Ok(Json(RebuildSummary { generation: state.live.generation(), num_docs, num_terms, warnings: Vec::new() }))
}

fn internal<E: std::fmt::Display>(err: E) -> ApiError {
    tracing::error!(%err, "admin request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
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
