//! Upload client abstraction and the reqwest-backed implementation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::config::UploadConfig;
use super::error::UploadError;
use super::types::{LocationBody, UploadOutcome};

/// User-Agent sent with every upload.
const USER_AGENT: &str = concat!("geobeacon/", env!("CARGO_PKG_VERSION"));

/// Base delay for exponential backoff between attempts.
const BACKOFF_BASE_MS: u64 = 100;

/// Trait for posting positions to the remote endpoint.
///
/// Implementations perform their own bounded retry and always resolve to an
/// [`UploadOutcome`]; they never fail the caller.
pub trait UploadClient: Send + Sync + 'static {
    /// Post `body` to `path`, making at most `retry_count` extra attempts.
    fn post(
        &self,
        path: &str,
        body: &LocationBody,
        retry_count: u32,
    ) -> impl Future<Output = UploadOutcome> + Send;
}

/// Upload client using reqwest with JSON bodies and optional basic auth.
#[derive(Clone)]
pub struct HttpUploadClient {
    client: reqwest::Client,
    config: UploadConfig,
}

impl HttpUploadClient {
    /// Creates a new client for the configured endpoint.
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        reqwest::Url::parse(&config.base_url)
            .map_err(|_| UploadError::InvalidUrl(config.base_url.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UploadError::ClientBuild(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Full URL for `path`.
    pub fn endpoint(&self, path: &str) -> Result<reqwest::Url, UploadError> {
        let joined = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        reqwest::Url::parse(&joined).map_err(|_| UploadError::InvalidUrl(joined))
    }

    async fn attempt(&self, url: &reqwest::Url, body: &LocationBody) -> Result<Option<Vec<u8>>, UploadError> {
        let mut request = self.client.post(url.clone()).json(body);
        if self.config.has_credentials() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let response = request.send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "Upload request failed"
            );
            UploadError::from_reqwest(&e)
        })?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Upload response received");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UploadError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        trace!(url = %url, bytes = bytes.len(), "Upload response body read");
        Ok((!bytes.is_empty()).then(|| bytes.to_vec()))
    }
}

impl UploadClient for HttpUploadClient {
    async fn post(&self, path: &str, body: &LocationBody, retry_count: u32) -> UploadOutcome {
        let url = match self.endpoint(path) {
            Ok(url) => url,
            Err(e) => return UploadOutcome::failed(e),
        };

        let mut last_error = None;

        for attempt in 0..=retry_count {
            match self.attempt(&url, body).await {
                Ok(payload) => {
                    debug!(url = %url, attempt, lat = body.lat, lng = body.lng, "Position uploaded");
                    return UploadOutcome::succeeded(payload);
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(url = %url, attempt, retryable, error = %e, "Upload attempt failed");
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }

            // Exponential backoff before retry
            if attempt < retry_count {
                let delay = BACKOFF_BASE_MS << attempt.min(10);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        UploadOutcome::failed(last_error.unwrap_or_else(|| UploadError::Http {
            message: "no attempt made".to_string(),
            timeout: false,
        }))
    }
}

/// Client that acknowledges every upload without network I/O.
#[derive(Debug, Default)]
pub struct DryRunUploadClient {
    posted: AtomicU64,
}

impl DryRunUploadClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uploads acknowledged so far.
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }
}

impl UploadClient for DryRunUploadClient {
    async fn post(&self, path: &str, body: &LocationBody, _retry_count: u32) -> UploadOutcome {
        self.posted.fetch_add(1, Ordering::Relaxed);
        debug!(path, lat = body.lat, lng = body.lng, "Dry run: upload skipped");
        UploadOutcome::succeeded(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Reads one HTTP request and returns (head, body).
    async fn read_request(stream: &mut tokio::net::TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                let body = &buf[split + 4..];
                if body.len() >= content_length {
                    return (head, String::from_utf8_lossy(body).into_owned());
                }
            }
        }
        (String::from_utf8_lossy(&buf).into_owned(), String::new())
    }

    /// Serves the given status lines in order, one per connection, and
    /// records each request.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<tokio::sync::Mutex<Vec<(String, String)>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                seen_clone.lock().await.push(request);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        (format!("http://{}/api/", addr), seen)
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = HttpUploadClient::new(UploadConfig::new("http://example.com/api/")).unwrap();
        assert_eq!(
            client.endpoint("location").unwrap().as_str(),
            "http://example.com/api/location"
        );
        assert_eq!(
            client.endpoint("/location").unwrap().as_str(),
            "http://example.com/api/location"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpUploadClient::new(UploadConfig::new("not a url"));
        assert!(matches!(result, Err(UploadError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_post_sends_json_and_basic_auth() {
        let (base, seen) = serve(vec![(200, "stored")]).await;
        let config = UploadConfig::new(base).with_credentials("user", "secret");
        let client = HttpUploadClient::new(config).unwrap();

        let outcome = client.post("location", &LocationBody::new(10.0014, 20.0), 2).await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.payload_text().as_deref(), Some("stored"));

        let requests = seen.lock().await;
        assert_eq!(requests.len(), 1);
        let (head, body) = &requests[0];
        assert!(head.starts_with("POST /api/location"));
        // base64("user:secret")
        assert!(head.contains("dXNlcjpzZWNyZXQ="), "{}", head);
        assert_eq!(body, r#"{"lat":10.0014,"lng":20.0}"#);
    }

    #[tokio::test]
    async fn test_post_without_credentials_omits_auth() {
        let (base, seen) = serve(vec![(200, "")]).await;
        let client = HttpUploadClient::new(UploadConfig::new(base)).unwrap();

        let outcome = client.post("location", &LocationBody::new(1.0, 2.0), 0).await;

        assert!(outcome.success);
        assert!(outcome.payload.is_none());
        let requests = seen.lock().await;
        assert!(!requests[0].0.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn test_post_retries_server_errors() {
        let (base, seen) = serve(vec![(503, "busy"), (500, "oops"), (200, "ok")]).await;
        let client = HttpUploadClient::new(UploadConfig::new(base)).unwrap();

        let outcome = client.post("location", &LocationBody::new(1.0, 2.0), 2).await;

        assert!(outcome.success);
        assert_eq!(seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_post_gives_up_after_retry_budget() {
        let (base, seen) = serve(vec![(503, "a"), (503, "b"), (503, "c")]).await;
        let client = HttpUploadClient::new(UploadConfig::new(base)).unwrap();

        let outcome = client.post("location", &LocationBody::new(1.0, 2.0), 2).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error,
            Some(UploadError::Status {
                status: 503,
                body: "c".into()
            })
        );
        assert_eq!(seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_post_does_not_retry_client_errors() {
        let (base, seen) = serve(vec![(401, "denied"), (200, "ok")]).await;
        let client = HttpUploadClient::new(UploadConfig::new(base)).unwrap();

        let outcome = client.post("location", &LocationBody::new(1.0, 2.0), 2).await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(UploadError::Status { status: 401, .. })
        ));
        assert_eq!(seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_counts_posts() {
        let client = DryRunUploadClient::new();
        let outcome = client.post("location", &LocationBody::new(1.0, 2.0), 2).await;

        assert!(outcome.success);
        assert_eq!(client.posted(), 1);
    }
}
