//! REST API: routes, handlers and the error-to-response mapping.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use sqlyard_common::models::{
    ConvertQueryRequest, ConvertQueryResponse, DbExtensionsResponse, ExtensionInfo,
    ExtensionListResponse, LoadExtensionRequest, MessageResponse, OptimizeQueryRequest,
    OptimizeQueryResponse, QueryRequest,
};
use sqlyard_error::{Error, ErrorCategory, ErrorCode};

use crate::AppState;

/// Response wrapper giving each error category its HTTP status.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Execution
            | ErrorCategory::Extension
            | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0 }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn create_api_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/query", post(submit_query))
        .route("/query/{task_id}", get(get_task))
        .route("/db/{db_name}", post(create_database))
        .route("/db/{db_name}/extensions", get(db_extensions))
        .route("/extensions", get(list_extensions))
        .route("/extensions/load", post(load_extension))
        .route("/extensions/upload", post(upload_extension))
        .route("/extensions/{name}", get(extension_info))
        .route("/tools/optimize", post(optimize_query))
        .route("/tools/convert", post(convert_query))
        .route("/cache/stats", get(cache_stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_api_key,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn submit_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = state.engine.submit(req)?;
    let task = state.engine.task(&id)?;
    Ok((StatusCode::ACCEPTED, Json(task)))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.task(&task_id)?))
}

async fn create_database(
    State(state): State<Arc<AppState>>,
    Path(db_name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.engine.registry().create_database(&db_name)?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Database '{db_name}' created"),
        }),
    ))
}

async fn db_extensions(
    State(state): State<Arc<AppState>>,
    Path(db_name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let registry = state.engine.registry();
    if !registry.database_exists(&db_name) {
        return Err(Error::not_found(
            ErrorCode::DatabaseNotFound,
            format!("Database '{db_name}' not found"),
        )
        .into());
    }
    Ok(Json(DbExtensionsResponse {
        extensions: registry.extensions_in_database(&db_name),
        db_name,
    }))
}

async fn list_extensions(State(state): State<Arc<AppState>>) -> Json<ExtensionListResponse> {
    let registry = state.engine.registry();
    let extensions = registry
        .available_extensions()
        .into_iter()
        .map(|ext| ExtensionInfo {
            loaded_in_dbs: registry.databases_with_extension(&ext.name),
            path: ext.path.display().to_string(),
            name: ext.name,
        })
        .collect();
    Json(ExtensionListResponse { extensions })
}

async fn extension_info(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ExtensionInfo>> {
    let registry = state.engine.registry();
    let ext = registry
        .available_extensions()
        .into_iter()
        .find(|ext| ext.name == name)
        .ok_or_else(|| {
            Error::not_found(
                ErrorCode::ExtensionNotFound,
                format!("Extension '{name}' not found"),
            )
        })?;
    Ok(Json(ExtensionInfo {
        loaded_in_dbs: registry.databases_with_extension(&ext.name),
        path: ext.path.display().to_string(),
        name: ext.name,
    }))
}

async fn load_extension(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadExtensionRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.engine.registry().load_extension(
        &req.db_name,
        &req.extension_name,
        req.entry_point.as_deref(),
    )?;
    Ok(Json(MessageResponse {
        message: format!(
            "Extension '{}' loaded into '{}'",
            req.extension_name, req.db_name
        ),
    }))
}

async fn upload_extension() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(MessageResponse {
            message: "Extension upload is not supported; place the library file in the extensions directory".to_string(),
        }),
    )
}

async fn optimize_query(
    Json(req): Json<OptimizeQueryRequest>,
) -> ApiResult<Json<OptimizeQueryResponse>> {
    let optimized_query = sqlyard_sql::optimize(&req.query)?;
    Ok(Json(OptimizeQueryResponse { optimized_query }))
}

async fn convert_query(
    Json(req): Json<ConvertQueryRequest>,
) -> ApiResult<Json<ConvertQueryResponse>> {
    let converted_query =
        sqlyard_sql::transpile(&req.query, &req.origin_dialect, &req.target_dialect)?;
    Ok(Json(ConvertQueryResponse { converted_query }))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.cache_stats())
}
