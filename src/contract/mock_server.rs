//! Consumer side: a stand-in provider that serves the expected responses.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use super::{
    error::ContractError,
    matching::{ActualRequest, Mismatch, match_request},
    pact::{Interaction, MatchingRules, Pact, PactRequest, PactResponse},
    pattern::Pattern,
};

#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: String,
    path: Pattern,
    query: Option<String>,
    headers: Vec<(String, Pattern)>,
    body: Option<Pattern>,
}

impl RequestSpec {
    pub fn new(method: &str, path: impl Into<Pattern>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<Pattern>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<Pattern>) -> Self {
        Self::new("POST", path)
    }

    pub fn put(path: impl Into<Pattern>) -> Self {
        Self::new("PUT", path)
    }

    pub fn delete(path: impl Into<Pattern>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Pattern>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON body; also records the `Content-Type` header unless one was given.
    pub fn json_body(mut self, body: impl Into<Pattern>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn build(self) -> PactRequest {
        let mut rules = MatchingRules::default();
        self.path.collect_rules("$.path", &mut rules);

        let mut headers = collect_headers(&self.headers, &mut rules);
        if self.body.is_some() && !has_header(&headers, "content-type") {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        let body = self.body.map(|body| {
            body.collect_rules("$.body", &mut rules);
            body.example()
        });

        PactRequest {
            method: self.method,
            path: self.path.example_string(),
            query: self.query,
            headers,
            body,
            matching_rules: rules,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseSpec {
    status: u16,
    headers: Vec<(String, Pattern)>,
    body: Option<Pattern>,
}

impl ResponseSpec {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Pattern>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_body(mut self, body: impl Into<Pattern>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn build(self) -> PactResponse {
        let mut rules = MatchingRules::default();
        let headers = collect_headers(&self.headers, &mut rules);

        let body = self.body.map(|body| {
            body.collect_rules("$.body", &mut rules);
            body.example()
        });

        PactResponse {
            status: self.status,
            headers,
            body,
            matching_rules: rules,
        }
    }
}

fn collect_headers(
    headers: &[(String, Pattern)],
    rules: &mut MatchingRules,
) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, pattern)| {
            pattern.collect_rules(&format!("$.headers.{}", name), rules);
            (name.clone(), pattern.example_string())
        })
        .collect()
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

/// One expected request/response pair under construction.
#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    description: String,
    provider_state: Option<String>,
    request: RequestSpec,
    response: ResponseSpec,
}

impl InteractionBuilder {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            request: RequestSpec::get("/"),
            response: ResponseSpec::status(200),
        }
    }

    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_state = Some(state.into());
        self
    }

    pub fn with_request(mut self, request: RequestSpec) -> Self {
        self.request = request;
        self
    }

    pub fn will_respond_with(mut self, response: ResponseSpec) -> Self {
        self.response = response;
        self
    }

    fn build(self) -> Interaction {
        Interaction {
            description: self.description,
            provider_state: self.provider_state,
            request: self.request.build(),
            response: self.response.build(),
        }
    }
}

pub struct PactBuilder {
    pact: Pact,
}

impl PactBuilder {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            pact: Pact::new(consumer, provider),
        }
    }

    pub fn interaction(
        mut self,
        description: impl Into<String>,
        build: impl FnOnce(InteractionBuilder) -> InteractionBuilder,
    ) -> Self {
        let interaction = build(InteractionBuilder::new(description)).build();
        self.pact.interactions.push(interaction);
        self
    }

    pub fn build(&self) -> Pact {
        self.pact.clone()
    }

    pub async fn start_mock_server(self) -> Result<MockServer, ContractError> {
        MockServer::start(self.pact).await
    }
}

struct MockState {
    interactions: Vec<Interaction>,
    hits: Mutex<Vec<usize>>,
    unexpected: Mutex<Vec<String>>,
}

/// A running mock provider. Shuts down when dropped.
pub struct MockServer {
    addr: SocketAddr,
    pact: Pact,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    pub async fn start(pact: Pact) -> Result<Self, ContractError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(ContractError::MockServer)?;
        let addr = listener.local_addr().map_err(ContractError::MockServer)?;

        let state = Arc::new(MockState {
            hits: Mutex::new(vec![0; pact.interactions.len()]),
            interactions: pact.interactions.clone(),
            unexpected: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle_request)
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("Mock provider stopped: {}", e);
            }
        });

        tracing::debug!(%addr, interactions = pact.interactions.len(), "Mock provider started");

        Ok(Self {
            addr,
            pact,
            state,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Fails if any interaction went unused or any request matched nothing.
    pub fn verify(&self) -> Result<(), ContractError> {
        let mut problems = Vec::new();

        {
            let hits = self.state.hits.lock().unwrap_or_else(|e| e.into_inner());
            for (interaction, count) in self.pact.interactions.iter().zip(hits.iter()) {
                if *count == 0 {
                    problems.push(format!(
                        "interaction '{}' was never exercised",
                        interaction.description
                    ));
                }
            }
        }

        let unexpected = self.state.unexpected.lock().unwrap_or_else(|e| e.into_inner());
        problems.extend(unexpected.iter().cloned());

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Unverified(problems))
        }
    }

    pub fn write_pact(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ContractError> {
        self.pact.write_to_dir(dir)
    }

    /// Verifies, writes the contract and stops the server.
    pub async fn finalize(mut self, dir: impl AsRef<Path>) -> Result<PathBuf, ContractError> {
        self.verify()?;
        let path = self.write_pact(dir)?;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        Ok(path)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn handle_request(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("unreadable body: {}", e)).into_response();
        }
    };

    let body = if bytes.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        )
    };

    let actual = ActualRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };

    let mut closest: Option<(&Interaction, Vec<Mismatch>)> = None;

    for (index, interaction) in state.interactions.iter().enumerate() {
        let mismatches = match_request(&interaction.request, &actual);
        if mismatches.is_empty() {
            if let Ok(mut hits) = state.hits.lock() {
                hits[index] += 1;
            }
            tracing::debug!(description = %interaction.description, "Mock provider matched request");
            return respond(&interaction.response);
        }
        if closest
            .as_ref()
            .is_none_or(|(_, best)| mismatches.len() < best.len())
        {
            closest = Some((interaction, mismatches));
        }
    }

    let summary = match &closest {
        Some((interaction, mismatches)) => format!(
            "unexpected request {} {}; closest interaction '{}': {}",
            actual.method,
            actual.path,
            interaction.description,
            mismatches
                .iter()
                .map(Mismatch::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        None => format!("unexpected request {} {}", actual.method, actual.path),
    };

    tracing::warn!("{}", summary);
    if let Ok(mut unexpected) = state.unexpected.lock() {
        unexpected.push(summary.clone());
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": summary })),
    )
        .into_response()
}

fn respond(expected: &PactResponse) -> Response {
    let status = StatusCode::from_u16(expected.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match &expected.body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;

    for (name, value) in &expected.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }

    if expected.body.is_some() && !response.headers().contains_key(header::CONTENT_TYPE)
    {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    response
}
