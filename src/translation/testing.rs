//! Fake Google Translation endpoint for tests.
//!
//! Accepts the bearer token `test-token`, answers "Hello world" to `es` with
//! "Hola mundo", prefixes anything else with `{target}:` and rejects the
//! target `xx` with a 400.

use crate::utils::AppConfig;
use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;

pub(crate) async fn fake_google() -> String {
    async fn translate(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer test-token" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": {"code": 401, "message": "Request had invalid authentication credentials."}})),
            );
        }
        if body["target"] == "xx" {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": {"code": 400, "message": "Invalid Value"}})),
            );
        }
        assert_eq!(body["format"], "text");
        let q = body["q"][0].as_str().unwrap_or_default();
        let translated = match (q, body["target"].as_str()) {
            ("Hello world", Some("es")) => "Hola mundo".to_string(),
            (q, Some(t)) => format!("{}:{}", t, q),
            _ => String::new(),
        };
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": {"translations": [{"translatedText": translated, "detectedSourceLanguage": "en"}]}
            })),
        )
    }

    let app = Router::new().route("/language/translate/v2", post(translate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}/language/translate/v2", addr)
}

pub(crate) fn config_for(endpoint: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.endpoint = endpoint;
    config
}
