mod common;

use anyhow::Result;
use common::{TestServer, authenticated_config};
use contract_testing_api::{
    client::{ClientError, ProductClient},
    config::AppConfig,
    models::ProductRequest,
    services::auth_service::{DEMO_EMAIL, DEMO_PASSWORD},
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

fn lamp() -> ProductRequest {
    ProductRequest {
        name: "Lamp".to_string(),
        description: "A desk lamp".to_string(),
        price: Decimal::new(1999, 2),
    }
}

#[tokio::test]
async fn health_reports_true() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let http = reqwest::Client::new();

    let health = http.get(server.url("/health")).send().await?;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.json::<Value>().await?, json!(true));

    let ready = http.get(server.url("/health/ready")).send().await?;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.json::<Value>().await?["database"], "connected");
    Ok(())
}

#[tokio::test]
async fn crud_round_trip() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let client = ProductClient::new(server.url.clone());

    assert!(client.list_products().await?.is_empty());

    let created = client.create_product(&lamp()).await?;
    assert_eq!(created.name, "Lamp");
    assert_eq!(created.price, Decimal::new(1999, 2));

    let fetched = client.get_product(created.id).await?;
    assert_eq!(fetched.as_ref(), Some(&created));

    let mut renamed = lamp();
    renamed.name = "Floor lamp".to_string();
    renamed.price = Decimal::new(4250, 2);
    let updated = client.update_product(created.id, &renamed).await?.unwrap();
    assert_eq!(updated.name, "Floor lamp");
    assert_eq!(updated.price, Decimal::new(4250, 2));

    assert_eq!(client.list_products().await?, vec![updated]);

    assert!(client.delete_product(created.id).await?);
    assert!(!client.delete_product(created.id).await?);
    assert!(client.get_product(created.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn create_returns_location_header() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;

    let response = reqwest::Client::new()
        .post(server.url("/api/products"))
        .json(&lamp())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str()?.to_string();
    let body: Value = response.json().await?;
    assert_eq!(location, format!("/api/products/{}", body["id"]));
    Ok(())
}

#[tokio::test]
async fn missing_products_are_problem_details() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;

    let response = reqwest::Client::new()
        .get(server.url("/api/products/999"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
    let problem: Value = response.json().await?;
    assert_eq!(problem["status"], 404);
    assert_eq!(problem["title"], "Not Found");
    Ok(())
}

#[tokio::test]
async fn invalid_products_are_rejected() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;

    let response = reqwest::Client::new()
        .post(server.url("/api/products"))
        .json(&json!({"name": "", "description": "A desk lamp", "price": 1}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

async fn assert_bad_request(response: reqwest::Response) -> Result<Value> {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
    let problem: Value = response.json().await?;
    assert_eq!(problem["status"], 400);
    Ok(problem)
}

#[tokio::test]
async fn malformed_bodies_are_problem_details() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let http = reqwest::Client::new();

    let missing_price = http
        .post(server.url("/api/products"))
        .json(&json!({"name": "Lamp", "description": "A desk lamp"}))
        .send()
        .await?;
    let problem = assert_bad_request(missing_price).await?;
    assert!(problem["detail"].as_str().unwrap_or_default().contains("price"));

    let broken_login = http
        .post(server.url("/api/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_bad_request(broken_login).await?;

    let broken_state = http
        .post(server.url("/provider-states"))
        .json(&json!({"params": {}}))
        .send()
        .await?;
    assert_bad_request(broken_state).await?;
    Ok(())
}

#[tokio::test]
async fn non_numeric_ids_are_problem_details() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;

    let response = reqwest::Client::new()
        .get(server.url("/api/products/abc"))
        .send()
        .await?;

    assert_bad_request(response).await?;
    Ok(())
}

#[tokio::test]
async fn updates_with_invalid_bodies_are_rejected() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let client = ProductClient::new(server.url.clone());
    let created = client.create_product(&lamp()).await?;
    let http = reqwest::Client::new();
    let url = server.url(&format!("/api/products/{}", created.id));

    let empty_name = http
        .put(&url)
        .json(&json!({"name": "  ", "description": "A desk lamp", "price": 1}))
        .send()
        .await?;
    assert_bad_request(empty_name).await?;

    let negative_price = http
        .put(&url)
        .json(&json!({"name": "Lamp", "description": "A desk lamp", "price": -1}))
        .send()
        .await?;
    assert_bad_request(negative_price).await?;

    assert_eq!(client.get_product(created.id).await?, Some(created));
    Ok(())
}

#[tokio::test]
async fn large_prices_are_exact_or_rejected() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let http = reqwest::Client::new();

    let largest = http
        .post(server.url("/api/products"))
        .json(&json!({"name": "Yacht", "description": "A big one", "price": 9999999999999.99}))
        .send()
        .await?;
    assert_eq!(largest.status(), StatusCode::CREATED);
    assert_eq!(largest.json::<Value>().await?["price"], json!(9999999999999.99));

    let too_large = http
        .post(server.url("/api/products"))
        .json(&json!({"name": "Yacht", "description": "A big one", "price": 1234567890123456.99}))
        .send()
        .await?;
    assert_bad_request(too_large).await?;
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;

    let response = reqwest::Client::new().get(server.url("/nope")).send().await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn login_issues_token_and_rejects_bad_credentials() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let mut client = ProductClient::new(server.url.clone());

    let token = client.login(DEMO_EMAIL, DEMO_PASSWORD).await?;
    assert_eq!(token.split('.').count(), 3);

    let rejected = client.login(DEMO_EMAIL, "wrong").await;
    assert!(matches!(rejected, Err(ClientError::Unauthorized)));
    Ok(())
}

#[tokio::test]
async fn authenticated_variant_requires_bearer_token() -> Result<()> {
    let server = TestServer::spawn(authenticated_config()).await?;
    let http = reqwest::Client::new();

    let anonymous = http.get(server.url("/api/products")).send().await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let garbage = http
        .get(server.url("/api/products"))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);

    let mut client = ProductClient::new(server.url.clone());
    client.login(DEMO_EMAIL, DEMO_PASSWORD).await?;
    assert!(client.list_products().await?.is_empty());

    let health = http.get(server.url("/health")).send().await?;
    assert_eq!(health.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn provider_states_seed_fixture_data() -> Result<()> {
    let server = TestServer::spawn(AppConfig::for_tests()).await?;
    let http = reqwest::Client::new();
    let client = ProductClient::new(server.url.clone());

    let response = http
        .post(server.url("/provider-states"))
        .json(&json!({"state": "products exist", "params": {}}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await?, json!("products exist"));
    assert_eq!(client.list_products().await?.len(), 5);

    http.post(server.url("/provider-states"))
        .json(&json!({"state": "product with id 42 exists"}))
        .send()
        .await?;
    assert!(client.get_product(42).await?.is_some());
    assert_eq!(client.list_products().await?.len(), 6);

    let unknown = http
        .post(server.url("/provider-states"))
        .json(&json!({"state": "the moon is full"}))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn provider_states_are_not_mounted_by_default() -> Result<()> {
    let mut config = AppConfig::for_tests();
    config.server.provider_states_enabled = false;
    let server = TestServer::spawn(config).await?;

    let response = reqwest::Client::new()
        .post(server.url("/provider-states"))
        .json(&json!({"state": "products exist"}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
