//! Third-party services managed elsewhere. Only health can be observed.

use async_trait::async_trait;
use orbit_service::Service;
use orbit_types::{PlatformKind, ServiceKind};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::platform::{OperationOutcome, Platform, PlatformContext};

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// External platform
pub struct ExternalPlatform {
    client: reqwest::Client,
}

impl ExternalPlatform {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ExternalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for ExternalPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::External
    }

    fn classify(&self, _service: &Service) -> ServiceKind {
        ServiceKind::ExternalApi
    }

    async fn check(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        let Some(url) = service.health_url() else {
            return Ok(OperationOutcome::failed(format!(
                "no health URL configured for {}",
                service.name()
            )));
        };
        let timeout = ctx.timeout(DEFAULT_TIMEOUT_SECS);
        debug!(%url, ?timeout, "probing external service");

        let response = match self
            .client
            .get(&url)
            .timeout(timeout.max(Duration::from_millis(1)))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(OperationOutcome::failed(format!("{} unreachable: {}", url, e))
                    .with_data(json!({
                        "running": false,
                        "healthy": false,
                        "status": "unreachable",
                        "endpoint": url,
                    })))
            }
        };

        let status = response.status();
        let data = json!({
            "running": true,
            "healthy": status.is_success(),
            "status": status.to_string(),
            "endpoint": url,
        });
        if status.is_success() {
            Ok(OperationOutcome::ok(data))
        } else {
            Ok(OperationOutcome::failed(format!("{} returned {}", url, status)).with_data(data))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_service::ServiceFactory;
    use orbit_types::{CommandKind, ConfigMap, InvocationConfig, ServiceTarget};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn service(endpoint: &str) -> Service {
        ServiceFactory::standard()
            .build(
                &ServiceTarget::new("payments", PlatformKind::External)
                    .with_config("endpoint", endpoint)
                    .with_config("health_path", "/healthz"),
                &ConfigMap::new(),
                &InvocationConfig::default(),
            )
            .unwrap()
    }

    /// Serve one canned HTTP response
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_healthy_endpoint() {
        let endpoint = serve_once("200 OK").await;
        let outcome = ExternalPlatform::new()
            .check(&service(&endpoint), &PlatformContext::new("local"))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data["healthy"], true);
        assert_eq!(outcome.data["endpoint"], format!("{}/healthz", endpoint));
    }

    #[tokio::test]
    async fn test_unhealthy_endpoint() {
        let endpoint = serve_once("503 Service Unavailable").await;
        let outcome = ExternalPlatform::new()
            .check(&service(&endpoint), &PlatformContext::new("local"))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.data["running"], true);
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_not_a_fault() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let outcome = ExternalPlatform::new()
            .check(&service(&endpoint), &PlatformContext::new("local"))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.data["running"], false);
    }

    #[tokio::test]
    async fn test_lifecycle_ops_are_unsupported() {
        let platform = ExternalPlatform::new();
        let svc = service("https://pay.example.com");
        assert_eq!(platform.classify(&svc), ServiceKind::ExternalApi);

        let outcome = platform.start(&svc, &PlatformContext::new("local")).await.unwrap();
        assert_eq!(
            outcome.error.as_deref(),
            Some(format!("{} is not supported on external", CommandKind::Start).as_str())
        );
    }
}
