//! HTTP client wrapper for the clinic REST API

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult, E2eResult};

/// Thin authenticated JSON client.
///
/// One attempt per call: no retries, no caching. Callers decide what a
/// given status code means for their step.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Option<Duration>) -> E2eResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Perform one request and return the parsed JSON body.
    ///
    /// Non-2xx responses become [`ApiError::Http`]; transport failures
    /// become [`ApiError::Network`]. An empty body parses as `null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> ApiResult<Value> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method.clone(), &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| network_error(&method, path, &e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| network_error(&method, path, &e))?;

        debug!("{} {} -> {}", method, path, status);

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                method: method.to_string(),
                path: path.to_string(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ApiError::Validation(format!("{} {}: response is not valid JSON: {}", method, path, e))
        })?;
        Ok(unwrap_envelope(value))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> ApiResult<Value> {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B, token: Option<&str>) -> ApiResult<Value> {
        self.request(Method::POST, path, Some(to_body(body)?), token).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B, token: Option<&str>) -> ApiResult<Value> {
        self.request(Method::PATCH, path, Some(to_body(body)?), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> ApiResult<Value> {
        self.request(Method::DELETE, path, None, token).await
    }
}

fn to_body<B: Serialize>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::Validation(format!("request body could not be serialized: {}", e)))
}

fn network_error(method: &Method, path: &str, e: &reqwest::Error) -> ApiError {
    let cause = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ApiError::Network(format!("{} {} {}: {}", method, path, cause, e))
}

/// Strip the `{ statusCode, message, data }` envelope some endpoints use
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map)
            if map.contains_key("data")
                && (map.contains_key("statusCode") || map.contains_key("success")) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_join() {
        let client = ApiClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/api/v1/auth/login"), "http://localhost:8080/api/v1/auth/login");
        assert_eq!(client.url("api/v1/services"), "http://localhost:8080/api/v1/services");
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let wrapped = json!({ "statusCode": 200, "message": "OK", "data": { "planCode": "P1" } });
        assert_eq!(unwrap_envelope(wrapped), json!({ "planCode": "P1" }));

        let plain = json!({ "data": [1, 2], "total": 2 });
        assert_eq!(unwrap_envelope(plain.clone()), plain);
    }

    #[tokio::test]
    async fn test_connection_refused_has_no_status() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = ApiClient::new(&format!("http://127.0.0.1:{}", port), Some(Duration::from_secs(2))).unwrap();

        let err = client.get("/api/v1/services", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.status(), None);
    }
}
