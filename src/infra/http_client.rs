use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport with a bounded per-request timeout.
pub struct ReqwestHttp {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl ReqwestHttp {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("banks_etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::Extraction(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout_secs })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> EtlError {
        if e.is_timeout() {
            EtlError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            EtlError::Extraction(format!("GET {} failed: {}", url, e))
        }
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| self.classify(url, e))?.to_vec();
        debug!("GET {} -> {} ({} bytes, {})", url, status, bytes.len(), content_type);
        Ok(HttpGetResult { status, bytes, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_an_extraction_error() {
        let http = ReqwestHttp::new(2).unwrap();
        // Port 9 on localhost is not expected to serve HTTP
        let err = http.get("http://127.0.0.1:9/").await.unwrap_err();
        assert_eq!(err.category(), "ExtractionError");
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without ever answering
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let http = ReqwestHttp::new(1).unwrap();
        let url = format!("http://{}/", addr);
        let err = http.get(&url).await.unwrap_err();
        server.abort();

        match &err {
            EtlError::Timeout { url: timed_out, secs } => {
                assert_eq!(timed_out, &url);
                assert_eq!(*secs, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(err.category(), "ExtractionError");
    }
}
