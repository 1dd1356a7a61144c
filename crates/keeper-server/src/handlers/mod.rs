pub mod admin;
pub mod data;
pub mod meta;

#[cfg(test)]
pub mod test_helpers;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use keeper_core::error::KeeperError;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/Version.json", get(admin::version_json))
        .route("/Version", get(admin::version_text))
        .route("/Stats.json", get(admin::stats_json))
        .route("/File/List.json", get(meta::file_list))
        .route("/Data/Hash_Array.json", get(data::get_hash_array))
        .route("/Data/{hash}", get(data::get_block))
        .route("/Meta.json", post(meta::post_meta))
        .route("/Hash_Array.json", post(data::post_hash_array))
        .route("/Data.json", post(data::post_data))
        .route("/Data_Array.json", post(data::post_data_array))
        .fallback(unknown_url)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Echo for URLs the protocol does not know: JSON error envelope for `.json`
/// requests, plain text otherwise. Both flavours are counted.
async fn unknown_url(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let stats = &state.inner.stats;
    let is_json = uri.path().ends_with(".json");
    if method == Method::GET {
        stats.bump(&stats.get_requests);
        if is_json {
            stats.bump(&stats.get_unknown_json);
        } else {
            stats.bump(&stats.get_unknown_txt);
        }
    } else if method == Method::POST {
        stats.bump(&stats.post_requests);
        stats.bump(&stats.post_unknown);
    } else {
        stats.bump(&stats.unknown_requests);
    }

    if is_json {
        ApiError::NotFound(format!("URL not found: {}", uri.path())).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            format!("Error: invalid url: {}\n", uri.path()),
        )
            .into_response()
    }
}

/// Decode a JSON request body; an empty or unparseable body is a 400.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty request body".into()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Run a storage operation on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, KeeperError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}
