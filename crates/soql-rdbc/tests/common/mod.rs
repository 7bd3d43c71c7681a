//! Scripted HTTP collaborator shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use soql_rdbc::error::{Error, Result};
use soql_rdbc::http::{HttpClient, HttpRequest, HttpResponse, API_VERSION_KEY};
use soql_rdbc::soql::SoqlConnection;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const API_VERSION: &str = "v59.0";

/// Replays queued responses and records every request
#[derive(Default)]
pub struct MockHttpClient {
    version: Option<String>,
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            version: Some(API_VERSION.to_string()),
            ..Self::default()
        })
    }

    pub fn without_version() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(HttpResponse::new(status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::transport("no scripted response"))
    }

    fn config(&self, key: &str) -> Option<String> {
        if key == API_VERSION_KEY {
            return self.version.clone();
        }
        None
    }
}

/// Route adapter logs to the test output; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn connection(mock: &Arc<MockHttpClient>) -> SoqlConnection {
    init_tracing();
    SoqlConnection::new(mock.clone())
}

pub fn record(value: serde_json::Value) -> soql_rdbc::types::Record {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
