//! Provider side: replays recorded interactions against a running provider.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use reqwest::{Method, header::CONTENT_TYPE};
use serde_json::{Map, Value};

use super::{
    error::ContractError,
    matching::{ActualResponse, Mismatch, match_response},
    pact::{Interaction, Pact},
};
use crate::models::{ProviderStateRequest, StateAction};

#[derive(Debug, Clone)]
pub struct InteractionResult {
    pub description: String,
    pub provider_state: Option<String>,
    pub mismatches: Vec<Mismatch>,
    /// Set when the interaction could not be replayed at all.
    pub error: Option<String>,
}

impl InteractionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub provider: String,
    pub results: Vec<InteractionResult>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(InteractionResult::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|result| !result.is_success())
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verifying provider '{}'", self.provider)?;
        for result in &self.results {
            let state = result
                .provider_state
                .as_deref()
                .map(|state| format!(" given '{}'", state))
                .unwrap_or_default();
            let outcome = if result.is_success() { "OK" } else { "FAILED" };
            writeln!(f, "  {}{} ... {}", result.description, state, outcome)?;

            if let Some(error) = &result.error {
                writeln!(f, "    error: {}", error)?;
            }
            for mismatch in &result.mismatches {
                writeln!(f, "    {}", mismatch)?;
            }
        }
        Ok(())
    }
}

pub struct Verifier {
    provider: String,
    base_url: String,
    provider_state_url: Option<String>,
    sources: Vec<PathBuf>,
    pacts: Vec<Pact>,
    request_headers: BTreeMap<String, String>,
    http: reqwest::Client,
}

impl Verifier {
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider_state_url: None,
            sources: Vec::new(),
            pacts: Vec::new(),
            request_headers: BTreeMap::new(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_file_source(mut self, path: impl AsRef<Path>) -> Self {
        self.sources.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_pact(mut self, pact: Pact) -> Self {
        self.pacts.push(pact);
        self
    }

    pub fn with_provider_state_url(mut self, url: impl Into<String>) -> Self {
        self.provider_state_url = Some(url.into());
        self
    }

    /// Added to every replayed request, replacing a recorded header of the same name.
    pub fn with_request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    pub async fn verify(&self) -> Result<VerificationReport, ContractError> {
        let mut pacts = self.pacts.clone();
        for source in &self.sources {
            pacts.push(Pact::load(source)?);
        }

        if pacts.is_empty() {
            return Err(ContractError::NoSources);
        }

        let mut results = Vec::new();
        for pact in &pacts {
            if pact.provider.name != self.provider {
                return Err(ContractError::ProviderMismatch {
                    expected: self.provider.clone(),
                    found: pact.provider.name.clone(),
                });
            }

            tracing::info!(
                consumer = %pact.consumer.name,
                interactions = pact.interactions.len(),
                "Verifying contract"
            );

            for interaction in &pact.interactions {
                results.push(self.verify_interaction(interaction).await?);
            }
        }

        let report = VerificationReport {
            provider: self.provider.clone(),
            results,
        };

        if report.is_success() {
            tracing::info!("Provider honours all contracts");
        } else {
            tracing::warn!("{}", report);
        }

        Ok(report)
    }

    async fn verify_interaction(
        &self,
        interaction: &Interaction,
    ) -> Result<InteractionResult, ContractError> {
        let mut result = InteractionResult {
            description: interaction.description.clone(),
            provider_state: interaction.provider_state.clone(),
            mismatches: Vec::new(),
            error: None,
        };

        if let Some(state) = &interaction.provider_state {
            if let Err(error) = self.change_state(state, StateAction::Setup).await {
                result.error = Some(format!("provider state setup failed: {}", error));
                return Ok(result);
            }
        }

        match self.replay(interaction).await? {
            Ok(actual) => result.mismatches = match_response(&interaction.response, &actual),
            Err(error) => result.error = Some(error),
        }

        if let Some(state) = &interaction.provider_state {
            if let Err(error) = self.change_state(state, StateAction::Teardown).await {
                tracing::warn!(state = %state, "Provider state teardown failed: {}", error);
            }
        }

        Ok(result)
    }

    async fn change_state(&self, state: &str, action: StateAction) -> Result<(), String> {
        let Some(url) = &self.provider_state_url else {
            return Ok(());
        };

        let body = ProviderStateRequest {
            state: state.to_string(),
            params: Some(Map::new()),
            action,
        };

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("state endpoint answered {}", response.status()))
        }
    }

    /// Outer error: the recorded request is unusable. Inner error: the request failed in flight.
    async fn replay(
        &self,
        interaction: &Interaction,
    ) -> Result<Result<ActualResponse, String>, ContractError> {
        let request = &interaction.request;
        let invalid = |reason: String| ContractError::InvalidInteraction {
            description: interaction.description.clone(),
            reason,
        };

        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| invalid(e.to_string()))?;

        let mut url = format!("{}{}", self.base_url, request.path);
        if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        let mut headers = request.headers.clone();
        for (name, value) in &self.request_headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self.http.request(method, &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body.to_string());
        }

        tracing::debug!(description = %interaction.description, %url, "Replaying interaction");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Err(format!("request failed: {}", e))),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Err(format!("failed to read response body: {}", e))),
        };

        let body = if bytes.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }),
            )
        };

        Ok(Ok(ActualResponse {
            status,
            headers,
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::contract::{
        mock_server::{PactBuilder, RequestSpec, ResponseSpec},
        pattern::like,
    };

    #[tokio::test]
    async fn empty_verifier_has_no_sources() {
        let err = Verifier::new("api", "http://127.0.0.1:1").verify().await.unwrap_err();
        assert!(matches!(err, ContractError::NoSources));
    }

    #[tokio::test]
    async fn rejects_contracts_for_other_providers() {
        let pact = PactBuilder::new("app", "someone-else").build();
        let err = Verifier::new("api", "http://127.0.0.1:1")
            .with_pact(pact)
            .verify()
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::ProviderMismatch { .. }));
    }

    #[tokio::test]
    async fn verifies_against_a_live_provider() {
        let provider = PactBuilder::new("app", "api")
            .interaction("greeting", |i| {
                i.with_request(RequestSpec::get("/hello"))
                    .will_respond_with(
                        ResponseSpec::status(200).json_body(json!({"message": "hi", "count": 3})),
                    )
            })
            .start_mock_server()
            .await
            .unwrap();

        let matching = PactBuilder::new("app", "api")
            .interaction("greeting", |i| {
                i.with_request(RequestSpec::get("/hello")).will_respond_with(
                    ResponseSpec::status(200)
                        .json_body(crate::contract::pattern::Pattern::object([(
                            "message",
                            like(json!("hello")),
                        )])),
                )
            })
            .build();

        let report = Verifier::new("api", provider.url())
            .with_pact(matching)
            .verify()
            .await
            .unwrap();
        assert!(report.is_success(), "{}", report);

        let strict = PactBuilder::new("app", "api")
            .interaction("greeting", |i| {
                i.with_request(RequestSpec::get("/hello"))
                    .will_respond_with(ResponseSpec::status(201).json_body(json!({"message": "hello"})))
            })
            .build();

        let report = Verifier::new("api", provider.url())
            .with_pact(strict)
            .verify()
            .await
            .unwrap();
        let failure = report.failures().next().unwrap();
        let paths: Vec<&str> = failure.mismatches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$.status", "$.body.message"]);
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_interaction_error() {
        let pact = PactBuilder::new("app", "api")
            .interaction("anything", |i| i.with_request(RequestSpec::get("/")))
            .build();

        let report = Verifier::new("api", "http://127.0.0.1:1")
            .with_pact(pact)
            .verify()
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(report.results[0].error.is_some());
    }
}
