use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use search_core::{AutocompleteResponse, DataSource, DocType, Filters, IndexStats, Indexer, PopularSearch, RebuildStats, SearchEngine, SearchResponse};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const ADMIN_TOKEN_HEADER: &str = "X-ADMIN-TOKEN";

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub doc_type: Option<String>,
    /// `key:value` pairs separated by commas.
    pub filters: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AutocompleteParams {
    pub q: String,
    pub doc_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct DocTypeParams {
    pub doc_type: Option<String>,
}

pub struct AppState<S> {
    pub engine: SearchEngine,
    pub indexer: Arc<Indexer<S>>,
    pub admin_token: Option<String>,
}

// derive(Clone) would demand S: Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone(), indexer: Arc::clone(&self.indexer), admin_token: self.admin_token.clone() }
    }
}

impl<S> AppState<S> {
    pub fn new(engine: SearchEngine, indexer: Indexer<S>, admin_token: Option<String>) -> Self {
        Self { engine, indexer: Arc::new(indexer), admin_token }
    }
}

/// CORS from a comma-separated origin list; anything unparsable or absent allows any origin.
pub fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allow_origin
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    }
}

pub fn build_app<S: DataSource + 'static>(state: AppState<S>) -> Router {
    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler::<S>))
        .route("/search/popular", get(popular_handler::<S>))
        .route("/autocomplete", get(autocomplete_handler::<S>))
        .route("/index/stats", get(stats_handler::<S>))
        .route("/index/rebuild", post(rebuild_handler::<S>))
        .route("/index/player/:player_id", post(update_player_handler::<S>))
        .route("/index/clear", post(clear_handler::<S>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler<S>(State(state): State<AppState<S>>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let doc_type = parse_doc_type(params.doc_type.as_deref())?;
    let filters = params.filters.as_deref().map(parse_filters).transpose()?;
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(state.engine.search(&params.q, doc_type, filters.as_ref(), limit)))
}

pub async fn autocomplete_handler<S>(State(state): State<AppState<S>>, Query(params): Query<AutocompleteParams>) -> Result<Json<AutocompleteResponse>, ApiError> {
    let doc_type = parse_doc_type(params.doc_type.as_deref())?;
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    Ok(Json(state.engine.autocomplete(&params.q, doc_type, limit)))
}

pub async fn popular_handler<S>(State(state): State<AppState<S>>, Query(params): Query<LimitParams>) -> Json<Vec<PopularSearch>> {
    Json(state.engine.get_popular_searches(params.limit.unwrap_or(10).clamp(1, 100)))
}

pub async fn stats_handler<S>(State(state): State<AppState<S>>) -> Json<IndexStats> {
    Json(state.engine.get_index_stats())
}

// --- Admin endpoints ---
async fn rebuild_handler<S: DataSource>(State(state): State<AppState<S>>, headers: HeaderMap, Query(params): Query<DocTypeParams>) -> Result<Json<RebuildStats>, ApiError> {
    authorize(&state, &headers)?;
    let doc_type = parse_doc_type(params.doc_type.as_deref())?;
    tracing::info!(doc_type = ?doc_type, "rebuild requested");
    Ok(Json(state.indexer.rebuild_index(doc_type).await))
}

async fn update_player_handler<S: DataSource>(State(state): State<AppState<S>>, headers: HeaderMap, Path(player_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let updated = state.indexer.update_player_index(&player_id).await;
    Ok(Json(serde_json::json!({ "player_id": player_id, "updated": updated })))
}

async fn clear_handler<S: DataSource>(State(state): State<AppState<S>>, headers: HeaderMap, Query(params): Query<DocTypeParams>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let doc_type = parse_doc_type(params.doc_type.as_deref())?;
    let cleared = state.indexer.clear_index(doc_type);
    Ok(Json(serde_json::json!({ "cleared": cleared, "doc_type": doc_type })))
}

fn authorize<S>(state: &AppState<S>, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn parse_doc_type(raw: Option<&str>) -> Result<Option<DocType>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<DocType>().map(Some).map_err(|e: String| (StatusCode::BAD_REQUEST, e)),
        None => Ok(None),
    }
}

/// `position:QB,team:KC` into a filter map.
pub fn parse_filters(raw: &str) -> Result<Filters, ApiError> {
    let mut filters = Filters::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                filters.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => return Err((StatusCode::BAD_REQUEST, format!("malformed filter {pair:?}, expected key:value"))),
        }
    }
    Ok(filters)
}
