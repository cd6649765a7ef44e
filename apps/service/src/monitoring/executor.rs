use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::checker::{HttpChecker, describe_error};
use super::types::ProbeOutcome;
use crate::config::ProbeSettings;
use crate::models::TargetDefinition;

/// Performs one probe of a target.
///
/// Implementations never fail: every problem is reported through the
/// returned outcome. They must not touch shared state; the scheduler routes
/// the outcome to the result store.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn probe(&self, target: &TargetDefinition) -> ProbeOutcome;
}

/// Monitoring executor - probes targets over HTTP(S)
pub struct MonitoringExecutor {
    checker: HttpChecker,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self { checker: HttpChecker::new(timeout, user_agent)? })
    }

    pub fn from_settings(settings: &ProbeSettings) -> Result<Self, reqwest::Error> {
        Self::new(settings.timeout(), &settings.user_agent)
    }
}

#[async_trait]
impl Executor for MonitoringExecutor {
    async fn probe(&self, target: &TargetDefinition) -> ProbeOutcome {
        let Ok(url) = Url::parse(target.url.trim()) else {
            warn!(target_id = %target.id, name = %target.name, url = %target.url, "Invalid URL, probe skipped");
            return ProbeOutcome::invalid_url();
        };

        debug!(target_id = %target.id, name = %target.name, method = %target.method, %url, "Probe started");
        let start = Instant::now();
        let result = self.checker.send(target, url).await;
        let elapsed = start.elapsed();

        match result {
            Ok((status, bytes)) => {
                debug!(
                    target_id = %target.id,
                    status_code = status.as_u16(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    bytes,
                    "Probe received response"
                );
                ProbeOutcome::from_status(elapsed, status.as_u16())
            }
            Err(e) => {
                let message = describe_error(&e);
                debug!(
                    target_id = %target.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %message,
                    "Probe failed"
                );
                ProbeOutcome::transport_failure(elapsed, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::INVALID_URL_MESSAGE;
    use mockito::Matcher;
    use std::io::Write;

    fn executor() -> MonitoringExecutor {
        MonitoringExecutor::new(Duration::from_secs(5), "pieping-test").unwrap()
    }

    #[tokio::test]
    async fn test_http_check_success_records_latency() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(120));
                w.write_all(b"ok")
            })
            .create_async()
            .await;

        let target = TargetDefinition::new("ok", format!("{}/ok", server.url()), 60.0);
        let outcome = executor().probe(&target).await;

        mock.assert_async().await;
        assert!(outcome.success);
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.error_message, None);
        assert!(outcome.response_time_seconds >= 0.12, "{}", outcome.response_time_seconds);
        assert!(outcome.response_time_seconds < 5.0);
    }

    #[tokio::test]
    async fn test_http_check_non_2xx_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/down").with_status(503).create_async().await;

        let target = TargetDefinition::new("down", format!("{}/down", server.url()), 60.0);
        let outcome = executor().probe(&target).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, 503);
        assert_eq!(outcome.error_message.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/submit")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("name=pie&count=3")
            .with_status(201)
            .create_async()
            .await;

        let target = TargetDefinition::new("form", format!("{}/submit", server.url()), 60.0)
            .with_post_body("name=pie&count=3");
        let outcome = executor().probe(&target).await;

        mock.assert_async().await;
        assert!(outcome.success);
        assert_eq!(outcome.status_code, 201);
    }

    #[tokio::test]
    async fn test_post_without_body_sends_no_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ping")
            .match_header("content-type", Matcher::Missing)
            .with_status(200)
            .create_async()
            .await;

        let target = TargetDefinition::new("ping", format!("{}/ping", server.url()), 60.0)
            .with_post_body("");
        let outcome = executor().probe(&target).await;

        mock.assert_async().await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let target = TargetDefinition::new("broken", "not a url", 60.0);
        let outcome = executor().probe(&target).await;

        mock.assert_async().await;
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, 0);
        assert_eq!(outcome.response_time_seconds, 0.0);
        assert_eq!(outcome.error_message.as_deref(), Some(INVALID_URL_MESSAGE));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Bind then drop a listener to get a port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = TargetDefinition::new("closed", format!("http://127.0.0.1:{port}/"), 60.0);
        let outcome = executor().probe(&target).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, 0);
        assert!(outcome.error_message.is_some_and(|m| !m.is_empty()));
    }

    /// HTTPS server on localhost with a freshly generated self-signed
    /// certificate. Answers every request with `200 ok`.
    async fn self_signed_server() -> u16 {
        use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    // Clients that reject the certificate fail the handshake here
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match tls.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = tls
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                        .await;
                    let _ = tls.shutdown().await;
                });
            }
        });

        port
    }

    #[tokio::test]
    async fn test_self_signed_certificate_is_accepted() {
        let port = self_signed_server().await;
        let url = format!("https://localhost:{port}/health");

        let target = TargetDefinition::new("self-signed", url.clone(), 60.0);
        let outcome = executor().probe(&target).await;
        assert!(outcome.success, "unexpected failure: {:?}", outcome.error_message);
        assert_eq!(outcome.status_code, 200);

        // The same endpoint is rejected by a verifying client
        let strict = reqwest::Client::builder().build().unwrap();
        assert!(strict.get(&url).send().await.is_err());
    }
}
