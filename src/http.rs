//! HTTP client for the calibration and content backends
//!
//! One `reqwest::Client` serves both. Any non-2xx status is a failure whose
//! message is the response body, so whatever the backend says ends up in
//! front of the user.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calibration::{CalibrationBackend, CalibrationError};
use crate::fetch::{ContentBackend, FetchError};

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; the body is the message
    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct QuestionsRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExplainRequest<'a> {
    prompt: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExplainResponse {
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Serialize)]
struct FollowUpRequest<'a> {
    prompt: &'a str,
    question: &'a str,
    explanation: &'a str,
}

#[derive(Debug, Deserialize)]
struct FollowUpResponse {
    #[serde(default)]
    followups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    #[serde(default)]
    ok: bool,
}

/// Backend client rooted at a base URL such as `http://127.0.0.1:8000`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "backend responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(path, status = status.as_u16(), "backend call failed");
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ContentBackend for HttpBackend {
    async fn questions(&self, prompt: &str) -> Result<Vec<String>, FetchError> {
        let resp: QuestionsResponse = self
            .post("/get-educational-questions", Some(&QuestionsRequest { prompt }))
            .await?;
        Ok(resp.questions)
    }

    async fn explanation(&self, prompt: &str, question: &str) -> Result<String, FetchError> {
        let resp: ExplainResponse = self
            .post("/get-educational-explanation", Some(&ExplainRequest { prompt, question }))
            .await?;
        Ok(resp.explanation)
    }

    async fn followups(
        &self,
        prompt: &str,
        question: &str,
        explanation: &str,
    ) -> Result<Vec<String>, FetchError> {
        let body = FollowUpRequest {
            prompt,
            question,
            explanation,
        };
        let resp: FollowUpResponse = self.post("/get-followup-questions", Some(&body)).await?;
        Ok(resp.followups)
    }
}

#[async_trait]
impl CalibrationBackend for HttpBackend {
    async fn reset(&self) -> Result<(), CalibrationError> {
        let _: serde_json::Value = self.post::<(), _>("/gaze/calibrate/reset", None).await?;
        Ok(())
    }

    async fn capture(&self) -> Result<bool, CalibrationError> {
        let resp: CaptureResponse = self.post::<(), _>("/gaze/calibrate/capture", None).await?;
        Ok(resp.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response, returning the base URL and the raw request
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // read headers, then the declared body length
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let len = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= split + 4 + len || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                concat!(
                    "HTTP/1.1 {}\r\n",
                    "content-type: application/json\r\n",
                    "content-length: {}\r\n",
                    "connection: close\r\n\r\n{}"
                ),
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_explanation_request_and_response() {
        let body = r#"{"explanation":"  Because gravity.  "}"#;
        let (base, server) = serve_once("200 OK", body).await;
        let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();

        let text = backend.explanation("physics", "Why do apples fall?").await.unwrap();
        assert_eq!(text, "  Because gravity.  ");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /get-educational-explanation"));
        assert!(request.contains(r#""question":"Why do apples fall?""#));
        assert!(request.contains(r#""prompt":"physics""#));
    }

    #[tokio::test]
    async fn test_error_status_body_becomes_message() {
        let (base, _server) = serve_once("400 Bad Request", r#"{"detail":"Error: quota"}"#).await;
        let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();

        let err = backend.questions("anything").await.unwrap_err();
        assert_eq!(err.to_string(), r#"{"detail":"Error: quota"}"#);
    }

    #[tokio::test]
    async fn test_capture_reports_ok_flag() {
        let (base, server) = serve_once("200 OK", r#"{"ok":false}"#).await;
        let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();

        assert!(!backend.capture().await.unwrap());
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /gaze/calibrate/capture"));
    }

    #[tokio::test]
    async fn test_reset_accepts_empty_object() {
        let (base, _server) = serve_once("200 OK", "{}").await;
        let backend = HttpBackend::new(&format!("{}/", base), Duration::from_secs(5)).unwrap();
        backend.reset().await.unwrap();
    }
}
