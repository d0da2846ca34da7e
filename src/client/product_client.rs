use reqwest::{RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{AuthResponse, LoginRequest, Product, ProductRequest};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5280";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// HTTP client for the product catalog API.
#[derive(Debug, Clone)]
pub struct ProductClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ProductClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            http: reqwest::Client::new(),
            base_url,
            token: None,
        }
    }

    /// Reads the base URL from `API_BASE_URL`, the way the frontend reads its build-time env.
    pub fn from_env() -> Self {
        Self::new(std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Logs in and keeps the token for subsequent calls.
    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(self.url("/api/login"))
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let auth: AuthResponse = expect_json(response, StatusCode::OK).await?;
        self.token = Some(auth.token.clone());

        Ok(auth.token)
    }

    pub async fn list_products(&self) -> ClientResult<Vec<Product>> {
        let response = self.request(self.http.get(self.url("/api/products"))).send().await?;

        expect_json(response, StatusCode::OK).await
    }

    pub async fn get_product(&self, id: i64) -> ClientResult<Option<Product>> {
        let response = self
            .request(self.http.get(self.url(&format!("/api/products/{}", id))))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        expect_json(response, StatusCode::OK).await.map(Some)
    }

    pub async fn create_product(&self, product: &ProductRequest) -> ClientResult<Product> {
        let response = self
            .request(self.http.post(self.url("/api/products")))
            .json(product)
            .send()
            .await?;

        expect_json(response, StatusCode::CREATED).await
    }

    pub async fn update_product(
        &self,
        id: i64,
        product: &ProductRequest,
    ) -> ClientResult<Option<Product>> {
        let response = self
            .request(self.http.put(self.url(&format!("/api/products/{}", id))))
            .json(product)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        expect_json(response, StatusCode::OK).await.map(Some)
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete_product(&self, id: i64) -> ClientResult<bool> {
        let response = self
            .request(self.http.delete(self.url(&format!("/api/products/{}", id))))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(response).await),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(header::ACCEPT, "application/json");

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn expect_json<T: DeserializeOwned>(
    response: Response,
    expected: StatusCode,
) -> ClientResult<T> {
    if response.status() != expected {
        return Err(unexpected(response).await);
    }

    Ok(response.json().await?)
}

async fn unexpected(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    ClientError::UnexpectedStatus { status, body }
}
