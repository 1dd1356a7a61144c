use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use keeper_core::query::{parse_date_window, ListQuery};
use keeper_core::record::HostedVersion;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::{parse_json, run_blocking};
use crate::state::AppState;

/// POST /Meta.json — answer the needed-blocks list for the file's digests,
/// then enqueue the record for the metadata writer. The enqueue is the
/// acknowledgement; durability is asynchronous.
pub async fn post_meta(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.post_requests);
    stats.bump(&stats.post_meta);
    stats.add(&stats.meta_bytes, body.len() as u64);

    let hosted: HostedVersion = parse_json(&body)?;
    if hosted.hostname.is_empty() {
        return Err(ApiError::BadRequest("missing hostname".into()));
    }

    stats.bump(&stats.files_saved);
    stats.add(&stats.total_bytes, hosted.meta.size);
    tracing::debug!(host = %hosted.hostname, file = %hosted.meta.name, "received metadata");

    let needed = if hosted.data_sent {
        Vec::new()
    } else {
        let backend = Arc::clone(&state.inner.backend);
        let ids = hosted.meta.hash_list.clone();
        run_blocking(move || backend.needed(&ids)).await?
    };

    state
        .inner
        .dispatcher
        .submit_metadata(hosted.hostname, hosted.meta);

    Ok(Json(json!({ "hash_list": needed })))
}

/// Query arguments of GET /File/List.json. `filename` and the date arguments
/// are base64-encoded; `latest` and `reduced` are true exactly for `True`.
/// `uid`, `gid`, `owner` and `group` are collected but not filtered on.
#[derive(Debug, Default, Deserialize)]
pub struct FileListParams {
    pub hostname: Option<String>,
    pub filename: Option<String>,
    pub date: Option<String>,
    pub afterdate: Option<String>,
    pub beforedate: Option<String>,
    pub latest: Option<String>,
    pub reduced: Option<String>,
    pub uid: Option<String>,
    pub gid: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

/// GET /File/List.json — matching file-version records for one host.
pub async fn file_list(
    State(state): State<AppState>,
    Query(params): Query<FileListParams>,
) -> Result<Json<Value>, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_file_list);

    let hostname = params
        .hostname
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing hostname argument".into()))?;

    let pattern = match &params.filename {
        Some(encoded) => decode_argument(encoded)?,
        None => String::new(),
    };
    let mut query = ListQuery::new(&pattern)?;
    if let Some(date) = &params.date {
        query.date = Some(parse_date_window(&decode_argument(date)?)?);
    }
    if let Some(after) = &params.afterdate {
        query.afterdate = Some(parse_date_window(&decode_argument(after)?)?.start);
    }
    if let Some(before) = &params.beforedate {
        query.beforedate = Some(parse_date_window(&decode_argument(before)?)?.end);
    }
    query.latest = params.latest.as_deref() == Some("True");
    query.reduced = params.reduced.as_deref() == Some("True");

    tracing::debug!(
        host = %hostname,
        filter = %pattern,
        latest = query.latest,
        reduced = query.reduced,
        uid = ?params.uid,
        gid = ?params.gid,
        owner = ?params.owner,
        group = ?params.group,
        "file list query"
    );

    let backend = Arc::clone(&state.inner.backend);
    let records = run_blocking(move || backend.list_files(&hostname, &query)).await?;
    Ok(Json(json!({ "file_list": records })))
}

fn decode_argument(value: &str) -> Result<String, ApiError> {
    let bytes = BASE64
        .decode(value.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("bad base64 argument: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
