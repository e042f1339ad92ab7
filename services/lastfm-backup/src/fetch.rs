//!
//! src/fetch.rs  Andrew Belles  Oct 18th, 2026
//!
//! Defines methods for hitting the last.fm history endpoints and
//! returning unparsed pages, handling retries, etc.
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::{HttpConfig, LastFmConfig};
use crate::errors::BackupError;
use crate::retry::RetryPolicy;
use crate::types::{ScrobbleType, Username};

/// last.fm error codes that mean "try again later": operation failed,
/// service offline, temporarily unavailable, rate limit exceeded
const TRANSIENT_API_CODES: [i64; 4] = [8, 11, 16, 29];

/// A paged, newest first listing of one user's history
#[async_trait]
pub trait PagedSource: Send + Sync {
    /// Fetch page `page` (1 based) as raw json
    async fn fetch_page(&self, username: &Username, kind: ScrobbleType, page: u32)
        -> Result<Value, BackupError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, BackupError> {
    client_helper(http)
        .default_headers(headers)
        .user_agent(http.user_agent.as_str())
        .build()
        .map_err(|e| BackupError::Http(format!("build client: {e}")))
}

/// Maps an `{"error": code, "message": ...}` body onto our taxonomy
pub fn api_error(body: &Value) -> Option<BackupError> {
    let code = body.get("error")?.as_i64()?;
    let message = body.get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    let text = format!("last.fm error {code}: {message}");

    if TRANSIENT_API_CODES.contains(&code) {
        Some(BackupError::Http(text))
    } else {
        Some(BackupError::Api(text))
    }
}

#[derive(Clone, Debug)]
pub struct LastFmClient {
    pub http: Client,
    pub cfg: LastFmConfig,
    api_key: String,
    retryable_statuses: Vec<u16>,
    retry: RetryPolicy
}

impl LastFmClient {
    pub fn new(http_cfg: &HttpConfig, last_cfg: &LastFmConfig) ->
        Result<Self, BackupError> {
        let api_key = last_cfg.api_key.clone().ok_or_else(|| {
            BackupError::Config("LASTFM_API_KEY was not set".to_string())
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json")
        );
        let http = client_with_headers(http_cfg, headers)?;

        Ok( Self {
            http,
            cfg: last_cfg.clone(),
            api_key,
            retryable_statuses: http_cfg.retry.retryable_statuses.clone(),
            retry: RetryPolicy::from_config(&http_cfg.retry)
        })
    }

    /// GET /?method=user.get{recent,loved}tracks&user=...&page=...&limit=200
    pub fn history_page(&self, username: &str, kind: ScrobbleType, page: u32) ->
        RequestBuilder {
        let limit = self.cfg.page_limit.to_string();
        let page  = page.to_string();
        self.http.get(self.cfg.base_url.clone()).query(&[
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("method", kind.method()),
            ("page", page.as_str()),
            ("user", username),
        ])
    }

    /// One attempt, classifying the outcome for the retry policy
    async fn get_json(&self, request: RequestBuilder) -> Result<Value, BackupError> {
        let resp = request.send().await?;
        let status = resp.status();

        if status.is_success() {
            // a body that is not json is malformed, not a network fault
            let text = resp.text().await?;
            let body = serde_json::from_str::<Value>(&text)?;
            return match api_error(&body) {
                Some(e) => Err(e),
                None => Ok(body)
            };
        }

        if self.retryable_statuses.contains(&status.as_u16()) {
            return Err(BackupError::Http(format!("status {status}")));
        }

        // last.fm reports bad users etc. as 4xx with a json error body
        let text = resp.text().await.unwrap_or_default();
        let from_body = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| api_error(&v));
        Err(from_body.unwrap_or_else(|| Self::status_error(status)))
    }

    fn status_error(status: StatusCode) -> BackupError {
        if status.is_server_error() {
            BackupError::Http(format!("status {status}"))
        } else {
            BackupError::Api(format!("status {status}"))
        }
    }
}

#[async_trait]
impl PagedSource for LastFmClient {
    async fn fetch_page(&self, username: &Username, kind: ScrobbleType, page: u32)
        -> Result<Value, BackupError> {
        debug!(user = %username, kind = %kind, page, "lastfm.page");
        self.retry.run("lastfm.page", || {
            self.get_json(self.history_page(username.as_str(), kind, page))
        }).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    use super::*;
    use crate::config;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    #[test]
    fn api_error_codes_are_classified() {
        let offline = json!({"error": 11, "message": "Service Offline"});
        assert!(matches!(api_error(&offline), Some(BackupError::Http(_))));

        let no_user = json!({"error": 6, "message": "User not found"});
        match api_error(&no_user) {
            Some(BackupError::Api(msg)) => assert!(msg.contains("User not found")),
            other => panic!("unexpected {other:?}")
        }

        assert!(api_error(&json!({"recenttracks": {}})).is_none());
    }

    #[test]
    fn client_requires_api_key() {
        let http = HttpConfig::default();
        let lastfm = LastFmConfig {
            api_key: None,
            base_url: url::Url::parse(config::LASTFM_BASE_URL).unwrap(),
            page_limit: config::LASTFM_PAGE_LIMIT
        };
        assert!(matches!(
            LastFmClient::new(&http, &lastfm),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn page_request_carries_query() {
        let http = HttpConfig::default();
        let lastfm = LastFmConfig {
            api_key: Some("k3y".into()),
            base_url: url::Url::parse(config::LASTFM_BASE_URL).unwrap(),
            page_limit: config::LASTFM_PAGE_LIMIT
        };
        let client = LastFmClient::new(&http, &lastfm).unwrap();
        let request = client.history_page("alice", ScrobbleType::Loved, 3)
            .build()
            .unwrap();

        let query = request.url().query().unwrap_or_default().to_string();
        for part in [
            "api_key=k3y", "format=json", "limit=200",
            "method=user.getlovedtracks", "page=3", "user=alice"
        ] {
            assert!(query.contains(part), "{part} missing from {query}");
        }
    }

    /// Serves the canned `(status, body)` replies in order, repeating the
    /// last one, and counts the requests it answered
    async fn local_server(replies: Vec<(u16, &'static str)>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = replies[n.min(replies.len() - 1)];

                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(k) => request.extend_from_slice(&buf[..k])
                    }
                }

                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        (base, hits)
    }

    fn local_client(base_url: Url, retries: usize) -> LastFmClient {
        let mut http = HttpConfig::default();
        http.retry.schedule = vec![Duration::ZERO; retries];
        let lastfm = LastFmConfig {
            api_key: Some("k3y".into()),
            base_url,
            page_limit: config::LASTFM_PAGE_LIMIT
        };
        LastFmClient::new(&http, &lastfm).unwrap()
    }

    async fn fetch_once(client: &LastFmClient) -> Result<Value, BackupError> {
        let user = Username::parse("alice")?;
        client.fetch_page(&user, ScrobbleType::Recent, 1).await
    }

    const PAGE: &str = r#"{"recenttracks": {"track": [], "@attr": {"totalPages": "1"}}}"#;

    #[tokio::test]
    async fn non_json_body_is_malformed_and_not_retried() {
        let (base, hits) = local_server(vec![(200, "<html>not json</html>")]).await;
        let client = local_client(base, 6);

        let out = fetch_once(&client).await;
        assert!(matches!(out, Err(BackupError::Malformed(_))), "{out:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limits_and_server_errors_are_retried() {
        let (base, hits) = local_server(vec![(429, ""), (503, ""), (200, PAGE)]).await;
        let client = local_client(base, 6);

        let page = fetch_once(&client).await.unwrap();
        assert!(page.get("recenttracks").is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let (base, hits) = local_server(vec![(500, "")]).await;
        let client = local_client(base, 2);
        assert!(matches!(fetch_once(&client).await, Err(BackupError::Http(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let (base, hits) = local_server(vec![(404, "gone")]).await;
        let client = local_client(base, 6);
        match fetch_once(&client).await {
            Err(BackupError::Api(msg)) => assert!(msg.contains("404"), "{msg}"),
            other => panic!("unexpected {other:?}")
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let (base, hits) = local_server(vec![
            (400, r#"{"error": 6, "message": "User not found"}"#)
        ]).await;
        let client = local_client(base, 6);
        match fetch_once(&client).await {
            Err(BackupError::Api(msg)) => assert!(msg.contains("User not found"), "{msg}"),
            other => panic!("unexpected {other:?}")
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_api_codes_are_retried() {
        let (base, hits) = local_server(vec![
            (200, r#"{"error": 29, "message": "Rate limit exceeded"}"#),
            (200, PAGE)
        ]).await;
        let client = local_client(base, 6);

        assert!(fetch_once(&client).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[allow(dead_code)]
    async fn lastfm_page_testbench() -> Result<(), BackupError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let client = LastFmClient::new(&cfgs.http, &cfgs.lastfm)?;
        let user = Username::parse("rj")?;

        let page = client.fetch_page(&user, ScrobbleType::Recent, 1).await?;
        println!("page: {}", serde_json::to_string_pretty(&page)?);
        assert!(page.get("recenttracks").is_some());

        Ok(())
    }
}
