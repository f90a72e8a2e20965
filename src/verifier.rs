//! Client for the remote face verification service.
//!
//! The verifier is an opaque HTTP service: it receives one JPEG snapshot
//! and answers whether it recognized a registered face, and whose. This
//! module only talks to it; identity matching happens on the other side.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Name the service reports when it suspects a photo or screen replay.
pub const SPOOF_NAME: &str = "Spoof Suspected";

/// Verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Base URL of the service (default: http://localhost:8000)
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts after a network error or 5xx response
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl VerifierConfig {
    /// Create a configuration for the given base URL with default limits.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Get the verification endpoint URL.
    pub fn verify_url(&self) -> String {
        format!("{}/verify", self.base_url.trim_end_matches('/'))
    }
}

/// Verifier client error types.
#[derive(Debug)]
pub enum VerifierError {
    /// Configuration or local input error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON deserialization error
    Serialization(String),
}

impl VerifierError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VerifierError::Network(_) => true,
            VerifierError::Server { status, .. } => *status >= 500,
            VerifierError::Config(_) | VerifierError::Serialization(_) => false,
        }
    }
}

impl std::fmt::Display for VerifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifierError::Config(msg) => write!(f, "Verifier config error: {msg}"),
            VerifierError::Network(msg) => write!(f, "Verifier network error: {msg}"),
            VerifierError::Server { status, message } => {
                write!(f, "Verifier server error ({status}): {message}")
            }
            VerifierError::Serialization(msg) => write!(f, "Verifier response error: {msg}"),
        }
    }
}

impl std::error::Error for VerifierError {}

/// Raw response of the verification endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of a verification against an expected user.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// The recognized face belongs to the expected user
    Verified { name: String, score: Option<f64> },
    /// A registered face was recognized, but it is someone else
    IdentityMismatch { name: String },
    /// The service suspects a photo or screen instead of a live face
    SpoofSuspected,
    /// No registered face was recognized
    NoMatch { reason: Option<String> },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified { .. })
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Verified { name, score } => match score {
                Some(score) => write!(f, "verified as {name} (score {score:.2})"),
                None => write!(f, "verified as {name}"),
            },
            Verification::IdentityMismatch { name } => {
                write!(f, "identity mismatch: recognized {name}")
            }
            Verification::SpoofSuspected => write!(f, "spoof suspected"),
            Verification::NoMatch { reason } => match reason {
                Some(reason) => write!(f, "no match: {reason}"),
                None => write!(f, "no match"),
            },
        }
    }
}

/// Case-insensitive containment in either direction. Empty names never
/// match.
pub fn names_match(recognized: &str, expected: &str) -> bool {
    let recognized = recognized.trim().to_lowercase();
    let expected = expected.trim().to_lowercase();
    if recognized.is_empty() || expected.is_empty() {
        return false;
    }
    recognized.contains(&expected) || expected.contains(&recognized)
}

impl VerifyResponse {
    /// Interpret the response for `expected_user`.
    pub fn verdict(&self, expected_user: &str) -> Verification {
        if self.name == SPOOF_NAME {
            return Verification::SpoofSuspected;
        }
        if !self.is_match {
            return Verification::NoMatch {
                reason: self.error.clone(),
            };
        }
        if names_match(&self.name, expected_user) {
            Verification::Verified {
                name: self.name.clone(),
                score: self.score,
            }
        } else {
            Verification::IdentityMismatch {
                name: self.name.clone(),
            }
        }
    }
}

/// Async client for the verification service.
pub struct VerifierClient {
    config: VerifierConfig,
    client: reqwest::Client,
}

impl VerifierClient {
    /// Create a new verifier client.
    pub fn new(config: VerifierConfig) -> Result<Self, VerifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifierError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a JPEG snapshot against `expected_user`, retrying transient
    /// failures.
    pub async fn verify(
        &self,
        image: Vec<u8>,
        expected_user: &str,
    ) -> Result<Verification, VerifierError> {
        let mut attempt = 0;
        loop {
            match self.send_once(image.clone()).await {
                Ok(response) => return Ok(response.verdict(expected_user)),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, "Verification attempt failed, retrying: {e}");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read a JPEG file and verify it.
    pub async fn verify_file(
        &self,
        path: &Path,
        expected_user: &str,
    ) -> Result<Verification, VerifierError> {
        let image = tokio::fs::read(path)
            .await
            .map_err(|e| VerifierError::Config(format!("Failed to read {path:?}: {e}")))?;
        self.verify(image, expected_user).await
    }

    async fn send_once(&self, image: Vec<u8>) -> Result<VerifyResponse, VerifierError> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("capture.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| VerifierError::Config(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.config.verify_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| VerifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VerifierError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| VerifierError::Serialization(e.to_string()))
    }
}

/// Blocking verifier client for use in synchronous contexts.
pub struct BlockingVerifierClient {
    inner: VerifierClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingVerifierClient {
    /// Create a new blocking verifier client.
    pub fn new(config: VerifierConfig) -> Result<Self, VerifierError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VerifierError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: VerifierClient::new(config)?,
            runtime,
        })
    }

    /// Verify a JPEG file against `expected_user`.
    pub fn verify_file(
        &self,
        path: &Path,
        expected_user: &str,
    ) -> Result<Verification, VerifierError> {
        self.runtime
            .block_on(self.inner.verify_file(path, expected_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(is_match: bool, name: &str) -> VerifyResponse {
        VerifyResponse {
            is_match,
            name: name.to_string(),
            score: Some(0.91),
            error: None,
        }
    }

    #[test]
    fn test_verify_url() {
        assert_eq!(
            VerifierConfig::new("http://127.0.0.1:8000/").verify_url(),
            "http://127.0.0.1:8000/verify"
        );
        let config = VerifierConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_names_match_either_direction() {
        assert!(names_match("Budi Santoso", "budi"));
        assert!(names_match("budi", "BUDI SANTOSO"));
        assert!(!names_match("Siti", "Budi"));
        assert!(!names_match("", "Budi"));
    }

    #[test]
    fn test_verdicts() {
        assert!(response(true, "Budi Santoso").verdict("budi").is_verified());
        assert_eq!(
            response(true, "Siti").verdict("budi"),
            Verification::IdentityMismatch {
                name: "Siti".to_string()
            }
        );
        assert_eq!(
            response(true, SPOOF_NAME).verdict("budi"),
            Verification::SpoofSuspected
        );
        assert_eq!(
            response(false, SPOOF_NAME).verdict("budi"),
            Verification::SpoofSuspected
        );
        assert!(matches!(
            response(false, "Unknown").verdict("budi"),
            Verification::NoMatch { .. }
        ));
    }

    #[test]
    fn test_response_parsing() {
        let parsed: VerifyResponse =
            serde_json::from_str(r#"{"match": false, "name": "Unknown", "error": "no face"}"#)
                .unwrap();
        assert!(!parsed.is_match);
        assert_eq!(parsed.score, None);
        assert_eq!(
            parsed.verdict("budi"),
            Verification::NoMatch {
                reason: Some("no face".to_string())
            }
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VerifierError::Network("reset".to_string()).is_retryable());
        assert!(VerifierError::Server {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!VerifierError::Server {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!VerifierError::Serialization("bad".to_string()).is_retryable());
    }

    mod retries {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use std::time::Instant;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        const MATCH_BODY: &str = r#"{"match": true, "name": "Budi Santoso", "score": 0.93}"#;

        /// Read one request, headers and body, so the reply is not reset.
        async fn read_request(stream: &mut TcpStream) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);

                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok());
                let done = match content_length {
                    Some(len) => buf.len() - end - 4 >= len,
                    None => buf.ends_with(b"0\r\n\r\n"),
                };
                if done {
                    return;
                }
            }
        }

        /// Answer the n-th request with `statuses[n]`, repeating the last one.
        async fn stub_service(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();

            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let status = statuses.get(n).or(statuses.last()).copied().unwrap_or(200);
                    read_request(&mut stream).await;

                    let body = if status == 200 { MATCH_BODY } else { "unavailable" };
                    let reply = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            });

            (format!("http://{addr}"), hits)
        }

        fn client(base_url: String) -> VerifierClient {
            VerifierClient::new(VerifierConfig {
                retry_backoff: Duration::from_millis(20),
                ..VerifierConfig::new(base_url)
            })
            .unwrap()
        }

        #[tokio::test]
        async fn test_persistent_5xx_retries_then_fails() {
            let (url, hits) = stub_service(vec![503]).await;
            let started = Instant::now();

            let result = client(url).verify(vec![0xFF, 0xD8], "budi").await;

            assert!(matches!(result, Err(VerifierError::Server { status: 503, .. })));
            assert_eq!(hits.load(Ordering::SeqCst), 3);
            // Linear backoff: 20 ms, then 40 ms
            assert!(started.elapsed() >= Duration::from_millis(60));
        }

        #[tokio::test]
        async fn test_4xx_is_not_retried() {
            let (url, hits) = stub_service(vec![400]).await;

            let result = client(url).verify(vec![0xFF, 0xD8], "budi").await;

            assert!(matches!(result, Err(VerifierError::Server { status: 400, .. })));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_recovers_after_one_5xx() {
            let (url, hits) = stub_service(vec![503, 200]).await;

            let result = client(url).verify(vec![0xFF, 0xD8], "budi").await;

            assert_eq!(
                result.unwrap(),
                Verification::Verified {
                    name: "Budi Santoso".to_string(),
                    score: Some(0.93),
                }
            );
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn test_network_errors_are_retried() {
            // Bind then drop to get a port nothing listens on
            let addr = TcpListener::bind("127.0.0.1:0")
                .await
                .unwrap()
                .local_addr()
                .unwrap();

            let result = client(format!("http://{addr}"))
                .verify(vec![0xFF, 0xD8], "budi")
                .await;

            assert!(matches!(result, Err(VerifierError::Network(_))));
        }
    }
}
