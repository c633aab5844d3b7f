//! REST client for the notification endpoints.
//!
//! Requests carry the auth token as a bearer header. Error responses are
//! mapped to [`Error::Api`] using the server's `detail` message when one is
//! present.

use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

use crate::notifications::{Notification, NotificationStats};
use crate::{Error, Result};

pub struct NotificationsApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl NotificationsApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint path such as `/notifications/stats`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /notifications?page=&limit=`
    pub async fn list(&self, page: u32, limit: u32) -> Result<Vec<Notification>> {
        let path = format!("/notifications?page={}&limit={}", page, limit);
        let body: Value = self.execute(self.request(Method::GET, &path)).await?.json().await?;
        parse_list(body)
    }

    /// `GET /notifications/stats`
    pub async fn stats(&self) -> Result<NotificationStats> {
        let resp = self
            .execute(self.request(Method::GET, "/notifications/stats"))
            .await?;
        Ok(resp.json().await?)
    }

    /// `POST /notifications/{id}/read`
    pub async fn mark_read(&self, id: i64) -> Result<()> {
        let path = format!("/notifications/{}/read", id);
        self.execute(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    /// `POST /notifications/read-all`
    pub async fn mark_all_read(&self) -> Result<()> {
        self.execute(self.request(Method::POST, "/notifications/read-all"))
            .await?;
        Ok(())
    }

    /// `POST /notifications/{id}/dismiss`
    pub async fn dismiss(&self, id: i64) -> Result<()> {
        let path = format!("/notifications/{}/dismiss", id);
        self.execute(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    /// `POST /notifications/dismiss-all`
    pub async fn dismiss_all(&self) -> Result<()> {
        self.execute(self.request(Method::POST, "/notifications/dismiss-all"))
            .await?;
        Ok(())
    }

    /// `DELETE /notifications/{id}`
    pub async fn delete(&self, id: i64) -> Result<()> {
        let path = format!("/notifications/{}", id);
        self.execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => {
                tracing::warn!(path, "no access token for request");
                builder
            }
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let err = error_from_body(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), error = %err, "notification API request failed");
        Err(err)
    }
}

/// Accept either a bare array or a paginated `{"items": [...]}` object.
pub fn parse_list(body: Value) -> Result<Vec<Notification>> {
    match body {
        Value::Array(_) => Ok(serde_json::from_value(body)?),
        Value::Object(mut map) => match map.remove("items") {
            Some(items @ Value::Array(_)) => Ok(serde_json::from_value(items)?),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

/// Build an [`Error::Api`] from a non-2xx response body.
pub fn error_from_body(status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status));
    Error::Api { status, detail }
}
