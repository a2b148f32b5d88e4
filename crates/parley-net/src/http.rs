//! REST client with a uniform result shape.
//!
//! Every call resolves to `Ok(data)` or a typed [`ApiError`]; transport
//! failures never escape as raw `reqwest` errors. The backend wraps payloads
//! in an [`Envelope`] and this module unwraps it.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parley_shared::models::Envelope;

use crate::error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Body placeholder for calls that send none.
pub const NO_BODY: Option<&()> = None;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Stateless client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::GET, path, &[], NO_BODY, token).await
    }

    /// GET with URL-encoded query parameters.
    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::GET, path, query, NO_BODY, token).await
    }

    /// Body-less POST carrying its arguments in the query string.
    pub async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::POST, path, query, NO_BODY, token).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::POST, path, &[], body, token).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::PUT, path, &[], body, token).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::PATCH, path, &[], body, token).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        self.send(Method::DELETE, path, &[], NO_BODY, token).await
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        token: Option<&str>,
    ) -> ApiResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, endpoint = %path, error = %e, "API request got no response");
                return Err(if e.is_builder() {
                    ApiError::Unknown
                } else {
                    ApiError::Unreachable
                });
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if status.is_success() => {
                warn!(%method, endpoint = %path, error = %e, "Failed to read response body");
                return Err(ApiError::Decode(e.to_string()));
            }
            Err(_) => String::new(),
        };

        if !status.is_success() {
            let message = rejection_message(status, &text);
            warn!(
                %method,
                endpoint = %path,
                status = status.as_u16(),
                message = %message,
                "API request rejected"
            );
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(%method, endpoint = %path, status = status.as_u16(), "API request succeeded");

        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str::<Envelope<T>>(&text)
            .map(|envelope| envelope.data)
            .map_err(|e| {
                warn!(%method, endpoint = %path, error = %e, "Undecodable response body");
                ApiError::Decode(e.to_string())
            })
    }
}

/// Unwrap data the caller cannot do without.
pub fn require<T>(data: Option<T>) -> ApiResult<T> {
    data.ok_or(ApiError::MissingData)
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::constants::MSG_UNREACHABLE;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_unwraps_envelope_and_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/things"))
            .and(header("Authorization", "tok-123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": [1, 2]})),
            )
            .mount(&server)
            .await;

        let data: Option<Vec<i32>> = client(&server)
            .get("/v1/things", Some("tok-123"))
            .await
            .unwrap();
        assert_eq!(data, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/echo"))
            .and(body_json(json!({"name": "x"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let data: Option<serde_json::Value> = client(&server)
            .post("/v1/echo", Some(&json!({"name": "x"})), None)
            .await
            .unwrap();
        assert_eq!(data, None);
    }

    #[tokio::test]
    async fn test_query_parameters_are_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/find"))
            .and(query_param("keyword", "a b&c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "ok"})))
            .mount(&server)
            .await;

        let data: Option<String> = client(&server)
            .get_query("/v1/find", &[("keyword", "a b&c")], None)
            .await
            .unwrap();
        assert_eq!(data.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_server_message_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"success": false, "message": "Already friends"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .put::<(), _>("/v1/x", NO_BODY, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 409,
                message: "Already friends".into()
            }
        );
        assert_eq!(err.to_string(), "Already friends");
    }

    #[tokio::test]
    async fn test_status_fallback_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .delete::<()>("/v1/x", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_status_fallback_with_blank_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "  "})))
            .mount(&server)
            .await;

        let err = client(&server)
            .patch::<(), _>("/v1/x", NO_BODY, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let api = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = api.get::<()>("/v1/x", None).await.unwrap_err();
        assert_eq!(err, ApiError::Unreachable);
        assert_eq!(err.to_string(), MSG_UNREACHABLE);
    }

    #[tokio::test]
    async fn test_empty_and_garbled_success_bodies() {
        let server = MockServer::start().await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let api = client(&server);
        assert_eq!(api.get::<i32>("/empty", None).await.unwrap(), None);
        assert!(matches!(
            api.get::<i32>("/garbled", None).await,
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::new("http://host/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://host");
    }
}
