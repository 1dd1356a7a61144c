use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use keeper_core::block_id::BlockId;
use keeper_core::error::KeeperError;
use keeper_core::record::BlockRecord;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::{parse_json, run_blocking};
use crate::state::AppState;

/// Header carrying the digest list for `GET /Data/Hash_Array.json`.
pub const HASH_ARRAY_HEADER: &str = "X-Get-Hash-Array";

#[derive(Deserialize)]
struct HashListRequest {
    hash_list: Vec<BlockId>,
}

#[derive(Deserialize)]
struct DataArrayRequest {
    data_array: Vec<BlockRecord>,
}

/// GET /Data/{hexdigest}.json — fetch one block with its descriptor.
pub async fn get_block(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BlockRecord>, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_data_hash);

    let hex = name
        .strip_suffix(".json")
        .ok_or_else(|| ApiError::NotFound(format!("URL not found: /Data/{name}")))?;
    let id = BlockId::from_hex(hex)?;

    let backend = Arc::clone(&state.inner.backend);
    let block = run_blocking(move || backend.get_block(&id)).await?;
    Ok(Json(block))
}

/// GET /Data/Hash_Array.json — concatenated uncompressed payloads for the
/// digests named in the `X-Get-Hash-Array` header. Digests the store does not
/// hold are skipped; the answer is one uncompressed block object hashed over
/// the concatenation.
pub async fn get_hash_array(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BlockRecord>, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_data_hash_array);

    let header = headers
        .get(HASH_ARRAY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {HASH_ARRAY_HEADER} header")))?;

    let mut ids = Vec::new();
    for item in header.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        ids.push(BlockId::from_base64(item)?);
    }

    let backend = Arc::clone(&state.inner.backend);
    let concatenated = run_blocking(move || {
        let mut buf = Vec::new();
        for id in &ids {
            let block = match backend.get_block(id) {
                Ok(block) => block,
                Err(KeeperError::BlockNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            match block.uncompressed() {
                Ok(bytes) => buf.extend_from_slice(&bytes),
                Err(e) => {
                    tracing::warn!(hash = %id, error = %e, "skipping block that failed to inflate");
                }
            }
        }
        Ok(buf)
    })
    .await?;

    Ok(Json(BlockRecord::from_plain(concatenated)))
}

/// POST /Data.json — enqueue one block for the block writer.
pub async fn post_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.post_requests);
    stats.bump(&stats.post_data);

    let mut block: BlockRecord = parse_json(&body)?;
    block.validate()?;
    stats.add(&stats.dedup_bytes, block.size);
    tracing::debug!(hash = %block.hash, size = block.size, "received block data");

    state.inner.dispatcher.submit_block(block);
    Ok("Ok!")
}

/// POST /Data_Array.json — enqueue a batch of blocks.
pub async fn post_data_array(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.post_requests);
    stats.bump(&stats.post_data_array);

    let request: DataArrayRequest = parse_json(&body)?;
    for mut block in request.data_array {
        block.validate()?;
        stats.add(&stats.dedup_bytes, block.size);
        state.inner.dispatcher.submit_block(block);
    }
    Ok("Ok!")
}

/// POST /Hash_Array.json — pure needed-blocks query, no side effects.
pub async fn post_hash_array(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let stats = &state.inner.stats;
    stats.bump(&stats.post_requests);
    stats.bump(&stats.post_hash_array);

    let request: HashListRequest = parse_json(&body)?;
    let backend = Arc::clone(&state.inner.backend);
    let needed = run_blocking(move || backend.needed(&request.hash_list)).await?;
    Ok(Json(json!({ "hash_list": needed })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use keeper_core::backend::Backend;
    use keeper_core::block_id::BlockId;
    use keeper_core::record::BlockRecord;
    use serde_json::json;

    use super::super::test_helpers::*;

    #[tokio::test]
    async fn post_then_get_round_trip() {
        let (router, backend) = setup_app();
        let block = BlockRecord::from_plain(b"block payload".to_vec());

        let resp = post_json(
            router.clone(),
            "/Data.json",
            serde_json::to_value(&block).unwrap(),
        )
        .await;
        assert_status(&resp, StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"Ok!");

        wait_for_block(&backend, &block.hash).await;

        let url = format!("/Data/{}.json", block.hash.to_hex());
        let resp = get(router, &url).await;
        assert_status(&resp, StatusCode::OK);
        let body = body_json(resp).await;
        let got: BlockRecord = serde_json::from_value(body).unwrap();
        assert_eq!(got.data, block.data);
        assert_eq!(got.hash, block.hash);
    }

    #[tokio::test]
    async fn get_unknown_digest_is_404() {
        let (router, _backend) = setup_app();
        let id = BlockId::compute(b"never stored");
        let resp = get(router, &format!("/Data/{}.json", id.to_hex())).await;
        assert_status(&resp, StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], 404);
    }

    #[tokio::test]
    async fn get_bad_digest_is_400() {
        let (router, _backend) = setup_app();
        // wrong length
        let resp = get(router.clone(), "/Data/abcd.json").await;
        assert_status(&resp, StatusCode::BAD_REQUEST);
        // non-hex
        let resp = get(router, &format!("/Data/{}.json", "zz".repeat(32))).await;
        assert_status(&resp, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_data_rejects_empty_body_and_size_mismatch() {
        let (router, _backend) = setup_app();

        let resp = post_raw(router.clone(), "/Data.json", Vec::new()).await;
        assert_status(&resp, StatusCode::BAD_REQUEST);

        let mut block = BlockRecord::from_plain(b"abc".to_vec());
        block.size = 999;
        let resp = post_json(
            router,
            "/Data.json",
            serde_json::to_value(&block).unwrap(),
        )
        .await;
        assert_status(&resp, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn hash_array_reports_only_missing_digests() {
        let (router, backend) = setup_app();
        let stored = BlockRecord::from_plain(b"already here".to_vec());
        backend.store_block(&stored).unwrap();
        let missing = BlockId::compute(b"still missing");

        let resp = post_json(
            router,
            "/Hash_Array.json",
            json!({ "hash_list": [stored.hash, missing, missing, stored.hash] }),
        )
        .await;
        assert_status(&resp, StatusCode::OK);
        let body = body_json(resp).await;
        let needed = body["hash_list"].as_array().unwrap();
        assert_eq!(needed.len(), 1);
        assert_eq!(needed[0], missing.to_base64());
    }

    #[tokio::test]
    async fn data_array_enqueues_every_block() {
        let (router, backend) = setup_app();
        let b1 = BlockRecord::from_plain(b"one".to_vec());
        let b2 = BlockRecord::from_plain(b"two".to_vec());

        let resp = post_json(
            router,
            "/Data_Array.json",
            json!({ "data_array": [&b1, &b2] }),
        )
        .await;
        assert_status(&resp, StatusCode::OK);

        wait_for_block(&backend, &b1.hash).await;
        wait_for_block(&backend, &b2.hash).await;
    }

    #[tokio::test]
    async fn get_hash_array_concatenates_payloads() {
        let (router, backend) = setup_app();
        let b1 = BlockRecord::from_plain(b"first ".to_vec());
        let b2 = BlockRecord::from_plain(b"second".to_vec());
        backend.store_block(&b1).unwrap();
        backend.store_block(&b2).unwrap();
        let missing = BlockId::compute(b"skipped");

        let header = format!(
            "{}, {}, {}",
            b1.hash.to_base64(),
            missing.to_base64(),
            b2.hash.to_base64()
        );
        let resp = get_with_header(router, "/Data/Hash_Array.json", super::HASH_ARRAY_HEADER, &header).await;
        assert_status(&resp, StatusCode::OK);
        let body = body_json(resp).await;
        let got: BlockRecord = serde_json::from_value(body).unwrap();
        assert_eq!(got.uncompressed().unwrap(), b"first second");
        assert_eq!(got.hash, BlockId::compute(b"first second"));
    }

    #[tokio::test]
    async fn get_hash_array_without_header_is_400() {
        let (router, _backend) = setup_app();
        let resp = get(router, "/Data/Hash_Array.json").await;
        assert_status(&resp, StatusCode::BAD_REQUEST);
    }
}
