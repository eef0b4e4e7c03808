//! remove.bg API client
//!
//! Issues exactly one multipart request per call and classifies whatever
//! happens into a [`ProcessingOutcome`]. Classification order:
//!
//! 1. time budget exceeded -> `Timeout`
//! 2. connection or transfer failure -> `TransportError`
//! 3. non-2xx status -> `ApiError` (structured body, else a raw excerpt)
//! 4. 2xx without an image content type -> `UnexpectedContent`
//! 5. 2xx image -> `Success`, whatever the image subtype
//!
//! Anything not covered above becomes `InternalError`.

use crate::config::{BotConfig, OutputSize};
use crate::error::{BotError, Result};
use crate::outcome::{
    essence, image_content_type_for_name, is_image_content_type, truncate_excerpt, ProcessingOutcome,
    EXCERPT_MAX_CHARS,
};
use crate::tracing_config::spans;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Output format requested from the API
pub const OUTPUT_FORMAT: &str = "png";

/// Content type the API is expected to answer with
pub const EXPECTED_CONTENT_TYPE: &str = "image/png";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image_file";

/// Removes backgrounds from encoded images
///
/// Implementations report every failure through the returned outcome and
/// never return early with an error.
#[async_trait]
pub trait BackgroundRemover: Send + Sync + 'static {
    async fn process(&self, image: Vec<u8>, file_name: &str) -> ProcessingOutcome;
}

/// Error document returned by the API on failure
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// HTTP client for the remove.bg endpoint
#[derive(Debug, Clone)]
pub struct BackgroundRemovalClient {
    http: Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
    output_size: OutputSize,
}

impl BackgroundRemovalClient {
    /// Create a client from the bot configuration
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: &BotConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(10)))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BotError::Http)?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
            output_size: config.output_size,
        })
    }

    /// Time budget of one call
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, image: Vec<u8>, file_name: &str) -> reqwest::Result<ProcessingOutcome> {
        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(upload_mime_type(file_name))?;
        let form = Form::new()
            .part(IMAGE_FIELD, part)
            .text("size", self.output_size.as_str())
            .text("format", OUTPUT_FORMAT);

        let response = self
            .http
            .post(&self.api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        debug!(
            status = status.as_u16(),
            content_type = content_type.as_deref().unwrap_or("<none>"),
            bytes = body.len(),
            "Processing API responded"
        );

        Ok(classify_response(status, content_type.as_deref(), &body))
    }
}

#[async_trait]
impl BackgroundRemover for BackgroundRemovalClient {
    async fn process(&self, image: Vec<u8>, file_name: &str) -> ProcessingOutcome {
        let span = spans::external_call(file_name, image.len(), self.timeout);

        async {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.timeout, self.send(image, file_name)).await {
                Err(_elapsed) => ProcessingOutcome::Timeout,
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => classify_request_error(&e),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                ProcessingOutcome::Success { bytes, content_type } => info!(
                    elapsed_ms,
                    output_bytes = bytes.len(),
                    content_type = %content_type,
                    "Background removed"
                ),
                other => warn!(elapsed_ms, outcome = %other.kind(), detail = ?other, "Processing call failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }
}

/// Content type declared for the uploaded part
fn upload_mime_type(file_name: &str) -> &'static str {
    image_content_type_for_name(file_name).unwrap_or("application/octet-stream")
}

/// Map a failed request to an outcome
fn classify_request_error(error: &reqwest::Error) -> ProcessingOutcome {
    if error.is_timeout() {
        ProcessingOutcome::Timeout
    } else if error.is_connect()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
        || error.is_redirect()
    {
        ProcessingOutcome::TransportError {
            cause: error.to_string(),
        }
    } else {
        ProcessingOutcome::InternalError {
            cause: error.to_string(),
        }
    }
}

/// Map a complete HTTP response to an outcome
#[must_use]
pub fn classify_response(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> ProcessingOutcome {
    if !status.is_success() {
        return classify_api_error(status, body);
    }

    match content_type {
        Some(declared) if is_image_content_type(declared) && !body.is_empty() => {
            let content_type = essence(declared);
            if content_type != EXPECTED_CONTENT_TYPE {
                debug!(content_type = %content_type, "API returned a different image type than requested");
            }
            ProcessingOutcome::Success {
                bytes: body.to_vec(),
                content_type,
            }
        },
        _ => ProcessingOutcome::UnexpectedContent {
            raw_prefix: truncate_excerpt(&String::from_utf8_lossy(body), EXCERPT_MAX_CHARS),
        },
    }
}

fn classify_api_error(status: StatusCode, body: &[u8]) -> ProcessingOutcome {
    let fallback_title = status.canonical_reason().unwrap_or("HTTP error").to_string();

    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        if let Some(entry) = parsed
            .errors
            .into_iter()
            .find(|e| e.title.is_some() || e.detail.is_some())
        {
            if let Some(code) = &entry.code {
                debug!(code = %code, "API error code");
            }
            return ProcessingOutcome::ApiError {
                status_code: status.as_u16(),
                title: entry.title.unwrap_or(fallback_title),
                detail: entry
                    .detail
                    .map(|d| truncate_excerpt(&d, EXCERPT_MAX_CHARS))
                    .unwrap_or_default(),
            };
        }
    }

    ProcessingOutcome::ApiError {
        status_code: status.as_u16(),
        title: fallback_title,
        detail: truncate_excerpt(&String::from_utf8_lossy(body), EXCERPT_MAX_CHARS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    const IMAGE: &[u8] = b"fake-jpeg-bytes";

    fn client_for(url: String, timeout: Duration) -> BackgroundRemovalClient {
        let mut config = BotConfig::builder()
            .bot_token("123:abc")
            .api_key("secret-key")
            .api_url(url)
            .build()
            .unwrap();
        config.request_timeout = timeout;
        BackgroundRemovalClient::new(&config).unwrap()
    }

    // Over the wire

    /// The mock only matches a request carrying the key header and all
    /// multipart fields, so a Success proves the request shape.
    #[tokio::test]
    async fn test_png_response_is_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1.0/removebg")
                    .header("x-api-key", "secret-key")
                    .body_contains("name=\"image_file\"; filename=\"cat.jpg\"")
                    .body_contains("name=\"size\"")
                    .body_contains("name=\"format\"")
                    .body_contains("fake-jpeg-bytes");
                then.status(200)
                    .header("content-type", "image/png")
                    .body(b"\x89PNG-result".to_vec());
            })
            .await;

        let client = client_for(server.url("/v1.0/removebg"), Duration::from_secs(5));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        assert_eq!(
            outcome,
            ProcessingOutcome::Success {
                bytes: b"\x89PNG-result".to_vec(),
                content_type: "image/png".to_string(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_text_body_with_200_is_unexpected_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .header("content-type", "text/plain")
                    .body("maintenance mode, try later");
            })
            .await;

        let client = client_for(server.url("/removebg"), Duration::from_secs(5));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        assert_eq!(
            outcome,
            ProcessingOutcome::UnexpectedContent {
                raw_prefix: "maintenance mode, try later".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_structured_error_body_is_api_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"errors":[{"title":"Insufficient credits","detail":"no credits left"}]}"#);
            })
            .await;

        let client = client_for(server.url("/removebg"), Duration::from_secs(5));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        assert_eq!(
            outcome,
            ProcessingOutcome::ApiError {
                status_code: 400,
                title: "Insufficient credits".to_string(),
                detail: "no credits left".to_string(),
            }
        );
        let message = outcome.failure_message().unwrap();
        assert!(message.contains("Insufficient credits"));
        assert!(message.contains("no credits left"));
        assert_eq!(mock.hits_async().await, 1, "failures are never retried");
    }

    #[tokio::test]
    async fn test_plain_text_error_falls_back_to_excerpt() {
        let long_body = "upstream exploded ".repeat(40);
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(502).body(long_body.clone());
            })
            .await;

        let client = client_for(server.url("/removebg"), Duration::from_secs(5));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        match outcome {
            ProcessingOutcome::ApiError {
                status_code,
                title,
                detail,
            } => {
                assert_eq!(status_code, 502);
                assert_eq!(title, "Bad Gateway");
                assert!(detail.starts_with("upstream exploded"));
                assert!(detail.ends_with('…'));
                assert_eq!(detail.chars().count(), EXCERPT_MAX_CHARS + 1);
            },
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_api_is_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .header("content-type", "image/png")
                    .body(b"late".to_vec())
                    .delay(Duration::from_secs(3));
            })
            .await;

        let client = client_for(server.url("/removebg"), Duration::from_millis(300));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        assert_eq!(outcome, ProcessingOutcome::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        // Bind a listener, capture its port, then drop it so connections are refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = client_for(format!("http://127.0.0.1:{}/removebg", port), Duration::from_secs(5));
        let outcome = client.process(IMAGE.to_vec(), "cat.jpg").await;

        assert!(
            matches!(outcome, ProcessingOutcome::TransportError { .. }),
            "expected TransportError, got {:?}",
            outcome
        );
    }

    // Classification without a server

    #[test]
    fn test_other_image_types_are_still_success() {
        let outcome = classify_response(StatusCode::OK, Some("image/webp; charset=binary"), b"RIFF");
        assert_eq!(
            outcome,
            ProcessingOutcome::Success {
                bytes: b"RIFF".to_vec(),
                content_type: "image/webp".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_content_type_is_unexpected_content() {
        let outcome = classify_response(StatusCode::OK, None, b"???");
        assert_eq!(
            outcome,
            ProcessingOutcome::UnexpectedContent {
                raw_prefix: "???".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_image_body_is_unexpected_content() {
        let outcome = classify_response(StatusCode::OK, Some("image/png"), b"");
        assert!(matches!(outcome, ProcessingOutcome::UnexpectedContent { .. }));
    }

    #[test]
    fn test_status_is_checked_before_content_type() {
        let outcome = classify_response(StatusCode::PAYMENT_REQUIRED, Some("image/png"), b"\x89PNG");
        assert!(matches!(
            outcome,
            ProcessingOutcome::ApiError { status_code: 402, .. }
        ));
    }

    #[test]
    fn test_empty_errors_array_uses_status_reason() {
        let outcome = classify_response(StatusCode::FORBIDDEN, Some("application/json"), br#"{"errors":[]}"#);
        assert_eq!(
            outcome,
            ProcessingOutcome::ApiError {
                status_code: 403,
                title: "Forbidden".to_string(),
                detail: r#"{"errors":[]}"#.to_string(),
            }
        );
    }

    #[test]
    fn test_error_without_detail_keeps_title() {
        let outcome = classify_response(
            StatusCode::BAD_REQUEST,
            Some("application/json"),
            br#"{"errors":[{"title":"Could not identify foreground in image","code":"unknown_foreground"}]}"#,
        );
        assert_eq!(
            outcome,
            ProcessingOutcome::ApiError {
                status_code: 400,
                title: "Could not identify foreground in image".to_string(),
                detail: String::new(),
            }
        );
    }

    #[test]
    fn test_upload_mime_types() {
        assert_eq!(upload_mime_type("cat.JPG"), "image/jpeg");
        assert_eq!(upload_mime_type("cat.webp"), "image/webp");
        assert_eq!(upload_mime_type("scan.TIFF"), "image/tiff");
        assert_eq!(upload_mime_type("cat"), "application/octet-stream");
    }
}
