//! Helpers shared by the integration tests: a stand-in for the Google
//! Translation endpoint and the sample diagram.

#![allow(dead_code)]

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use vsdx_translator::AppConfig;

pub const TOKEN: &str = "integration-token";

/// Texts the fake endpoint has been asked to translate, in order.
#[derive(Clone, Default)]
pub struct Requests(Arc<Mutex<Vec<String>>>);

impl Requests {
    pub fn texts(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeGoogle {
    pub endpoint: String,
    pub requests: Requests,
}

/// Serves `POST /language/translate/v2`. Text is answered as
/// `{target}:{text}`; text containing `FAIL` gets a 403 like an exhausted
/// quota.
pub async fn fake_google() -> FakeGoogle {
    async fn translate(
        State(requests): State<Requests>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false);
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"code": 401, "message": "Invalid Credentials"}})),
            );
        }

        let text = body["q"][0].as_str().unwrap_or_default().to_string();
        let target = body["target"].as_str().unwrap_or_default().to_string();
        requests.0.lock().unwrap().push(text.clone());

        if text.contains("FAIL") {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": {"code": 403, "message": "Daily Limit Exceeded"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({"data": {"translations": [{"translatedText": format!("{}:{}", target, text)}]}})),
        )
    }

    let requests = Requests::default();
    let app = Router::new()
        .route("/language/translate/v2", post(translate))
        .with_state(requests.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    FakeGoogle {
        endpoint: format!("http://{}/language/translate/v2", addr),
        requests,
    }
}

pub fn config_for(fake: &FakeGoogle) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.endpoint = fake.endpoint.clone();
    config
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Two pages, a group, a connector without text and an embedded image.
pub fn network_diagram() -> Vec<u8> {
    std::fs::read(fixture_path("network.vsdx")).unwrap()
}

/// Shape texts of the sample diagram in traversal order.
pub const NETWORK_TEXTS: [&str; 5] = [
    "Web server",
    "Primary database",
    "Read replica",
    "Traffic & load",
    "Deployment notes",
];
