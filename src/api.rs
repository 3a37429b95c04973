//! Server seam.
//!
//! The controller only talks to the server through [`InboxApi`]; the badge
//! poller through [`UnreadCountSource`]. [`HttpInboxApi`] implements both
//! over reqwest against the JSON endpoints.

use std::future::Future;

use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::messages::MessagesPayload;
use crate::retry::{RetryPolicy, with_retry};
use crate::threads::{ThreadId, ThreadsPayload};

/// Form fields of a mutation POST.
pub type Form = Vec<(String, String)>;

pub trait InboxApi {
    /// `GET <threads><query>`
    fn fetch_threads(&self, query: &str) -> impl Future<Output = Result<ThreadsPayload>> + Send;

    /// `GET <messages>/<id>/json/`
    fn fetch_messages(
        &self,
        thread: ThreadId,
    ) -> impl Future<Output = Result<MessagesPayload>> + Send;

    /// POST a form. `url` is either absolute or relative to the server.
    fn post_form(&self, url: &str, form: Form) -> impl Future<Output = Result<()>> + Send;

    /// Threads endpoint path, used to build mutation URLs.
    fn threads_url(&self) -> String;
}

pub trait UnreadCountSource {
    fn unread_count(&self) -> impl Future<Output = Result<u64>> + Send;
}

#[derive(Deserialize)]
struct UnreadCountResponse {
    #[serde(default)]
    unread_count: u64,
}

/// reqwest implementation of the server seam.
#[derive(Clone)]
pub struct HttpInboxApi {
    client: Client,
    base_url: String,
    threads_path: String,
    messages_path: String,
    unread_path: String,
    retry: RetryPolicy,
}

impl HttpInboxApi {
    pub fn new(server: &ServerConfig, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &server.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| Error::Config(format!("invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(server.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: server.base_url.trim_end_matches('/').to_string(),
            threads_path: server.threads_path.clone(),
            messages_path: server.messages_path.clone(),
            unread_path: server.unread_path.clone(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl InboxApi for HttpInboxApi {
    async fn fetch_threads(&self, query: &str) -> Result<ThreadsPayload> {
        let url = format!("{}{}", self.url(&self.threads_path), query);
        tracing::debug!("GET {}", url);
        with_retry(&self.retry, "Thread list fetch", || self.get_json(&url)).await
    }

    async fn fetch_messages(&self, thread: ThreadId) -> Result<MessagesPayload> {
        let url = format!(
            "{}/{}/json/",
            self.url(&self.messages_path).trim_end_matches('/'),
            thread
        );
        tracing::debug!("GET {}", url);
        with_retry(&self.retry, "Thread detail fetch", || self.get_json(&url)).await
    }

    async fn post_form(&self, url: &str, form: Form) -> Result<()> {
        let url = self.url(url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }

    fn threads_url(&self) -> String {
        self.threads_path.clone()
    }
}

impl UnreadCountSource for HttpInboxApi {
    async fn unread_count(&self) -> Result<u64> {
        let url = self.url(&self.unread_path);
        let response: UnreadCountResponse =
            with_retry(&self.retry, "Unread count fetch", || self.get_json(&url)).await?;
        Ok(response.unread_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpInboxApi {
        let server = ServerConfig {
            base_url: base.to_string(),
            ..ServerConfig::default()
        };
        HttpInboxApi::new(&server, RetryPolicy::none()).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = api("https://connect.example.org/");
        assert_eq!(
            api.url("/messages/json/threads/"),
            "https://connect.example.org/messages/json/threads/"
        );
        assert_eq!(
            api.url("https://other.example.org/flag/"),
            "https://other.example.org/flag/"
        );
        assert_eq!(api.threads_url(), "/messages/json/threads/");
    }

    #[test]
    fn test_invalid_cookie_is_config_error() {
        let server = ServerConfig {
            session_cookie: Some("bad\nvalue".to_string()),
            ..ServerConfig::default()
        };
        let err = HttpInboxApi::new(&server, RetryPolicy::none())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unread_count_payload() {
        let parsed: UnreadCountResponse =
            serde_json::from_str(r#"{"success": true, "errors": [], "unread_count": 12}"#)
                .unwrap();
        assert_eq!(parsed.unread_count, 12);
    }
}
