use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const SERVER_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const SERVER_LICENSE: &str = env!("CARGO_PKG_LICENSE");
/// Release date of the running version, reported alongside it.
const SERVER_DATE: &str = "2026-06-18";

/// GET /Version.json
pub async fn version_json(State(state): State<AppState>) -> Json<Value> {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_version_json);
    Json(json!({
        "name": SERVER_NAME,
        "date": SERVER_DATE,
        "version": SERVER_VERSION,
        "authors": SERVER_AUTHORS,
        "license": SERVER_LICENSE,
    }))
}

/// GET /Version — plain text banner.
pub async fn version_text(State(state): State<AppState>) -> String {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_version_txt);
    format!(
        "{SERVER_NAME} version {SERVER_VERSION} ({SERVER_DATE})\nAuthors: {SERVER_AUTHORS}\nLicense: {SERVER_LICENSE}\n"
    )
}

/// GET /Stats.json — request counters and stored-volume gauges.
pub async fn stats_json(State(state): State<AppState>) -> Json<Value> {
    let stats = &state.inner.stats;
    stats.bump(&stats.get_requests);
    stats.bump(&stats.get_stats);
    Json(stats.snapshot())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::super::test_helpers::*;

    #[tokio::test]
    async fn version_json_reports_crate_metadata() {
        let (router, _backend) = setup_app();
        let resp = get(router, "/Version.json").await;
        assert_status(&resp, StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["name"], "keeper-server");
        assert!(body["version"].is_string());
        assert!(body["license"].is_string());
    }

    #[tokio::test]
    async fn version_text_is_plain() {
        let (router, _backend) = setup_app();
        let resp = get(router, "/Version").await;
        assert_status(&resp, StatusCode::OK);
        let content_type = resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(text.contains("keeper-server version"));
    }

    #[tokio::test]
    async fn stats_count_requests() {
        let (router, _backend) = setup_app();
        get(router.clone(), "/Version.json").await;
        get(router.clone(), "/no/such/url").await;

        let resp = get(router, "/Stats.json").await;
        let body = body_json(resp).await;
        assert_eq!(body["Requests"]["GET"]["/Version.json"], 1);
        assert_eq!(body["Requests"]["GET"]["/unknown"], 1);
        // The stats request itself is counted too.
        assert_eq!(body["Requests"]["GET"]["/Stats.json"], 1);
        assert_eq!(body["Requests"]["Total requests"], 3);
    }

    #[tokio::test]
    async fn unknown_json_url_gets_error_envelope() {
        let (router, _backend) = setup_app();
        let resp = get(router, "/Bogus.json").await;
        assert_status(&resp, StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], 404);
    }
}
