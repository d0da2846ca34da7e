#![allow(dead_code)]

use anyhow::Result;
use contract_testing_api::{app, config::AppConfig};
use tokio::{net::TcpListener, sync::oneshot};

pub const CONSUMER: &str = "contract-testing-app";
pub const PROVIDER: &str = "contract-testing-api";

/// Real router on an ephemeral port, backed by a fresh in-memory database.
pub struct TestServer {
    pub url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(config: AppConfig) -> Result<Self> {
        let app = app::build(&config).await?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn authenticated_config() -> AppConfig {
    let mut config = AppConfig::for_tests();
    config.auth.enabled = true;
    config
}

pub fn pact_dir() -> std::path::PathBuf {
    std::env::var("PACT_OUTPUT_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("pacts"))
}
