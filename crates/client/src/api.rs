//! HTTP client wrapper for the storefront REST API.
//!
//! Attaches the session's bearer token, issues exactly one attempt per call,
//! and unwraps the `{success, data | error}` envelope into a `Result`.
//! Nothing is retried here; callers decide what a failure means.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use storefront_sync_core::api::ApiEnvelope;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Longest body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// Percent-encode an ID for use as a path segment.
#[must_use]
pub fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Client for the storefront REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and the token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("has_token", &self.has_token())
            .finish()
    }
}

impl ApiClient {
    /// Create a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("storefront-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    /// Replace the bearer token attached to subsequent requests.
    pub fn set_token(&self, token: Option<SecretString>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Whether a bearer token is currently held.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn bearer(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Validation(format!("invalid endpoint '{path}': {e}")))
    }

    /// `GET path`, returning the envelope's data.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure, a non-success status or
    /// envelope, or an undecodable body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request::<(), T>(Method::GET, path, None).await
    }

    /// `POST path` with a JSON body, returning the envelope's data.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// `PUT path` with a JSON body, returning the envelope's data.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// `DELETE path`, returning the envelope's data.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request::<(), T>(Method::DELETE, path, None).await
    }

    /// Issue a request whose response carries no data.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let (status, text) = self.execute(method, path, body).await?;
        decode::<serde_json::Value>(status, &text).map(|_| ())
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, text) = self.execute(method, path, body).await?;
        decode::<T>(status, &text)?.ok_or_else(|| ClientError::Server {
            status: status.as_u16(),
            message: "response is missing data".to_string(),
        })
    }

    #[instrument(skip(self, body))]
    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut request = self.inner.client.request(method, url);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = %status, bytes = text.len(), "API response");
        Ok((status, text))
    }
}

/// Map a status and body onto the envelope's data or a `ClientError`.
fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<Option<T>, ClientError> {
    let envelope = serde_json::from_str::<ApiEnvelope<T>>(text);

    if !status.is_success() {
        let message = envelope
            .ok()
            .and_then(|e| e.error_text().map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        let code = status.as_u16();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(message));
        }
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Storefront API returned server error"
            );
            return Err(ClientError::Server {
                status: code,
                message,
            });
        }
        return Err(ClientError::Client {
            status: code,
            message,
        });
    }

    let envelope = envelope.inspect_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
            "Failed to parse storefront API response"
        );
    })?;

    if !envelope.success {
        return Err(ClientError::Client {
            status: status.as_u16(),
            message: envelope
                .error_text()
                .unwrap_or("request was not successful")
                .to_string(),
        });
    }

    Ok(envelope.data)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ClientConfig::with_api_url(&server.url("/api"), "/tmp/unused").unwrap();
        ApiClient::new(&config).unwrap()
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Pong {
        pong: bool,
    }

    #[test]
    fn test_decode_success() {
        let data: Option<Pong> =
            decode(StatusCode::OK, r#"{"success":true,"data":{"pong":true}}"#).unwrap();
        assert_eq!(data, Some(Pong { pong: true }));
    }

    #[test]
    fn test_decode_unsuccessful_envelope_is_client_error() {
        let err = decode::<Pong>(StatusCode::OK, r#"{"success":false,"error":"Coupon expired"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Client { status: 200, ref message } if message == "Coupon expired"));
    }

    #[test]
    fn test_decode_status_mapping() {
        assert!(matches!(
            decode::<Pong>(StatusCode::UNAUTHORIZED, r#"{"success":false,"message":"jwt expired"}"#),
            Err(ClientError::Unauthorized(m)) if m == "jwt expired"
        ));
        assert!(matches!(
            decode::<Pong>(StatusCode::BAD_REQUEST, "<html>oops</html>"),
            Err(ClientError::Client { status: 400, ref message }) if message == "Bad Request"
        ));
        assert!(matches!(
            decode::<Pong>(StatusCode::BAD_GATEWAY, ""),
            Err(ClientError::Server { status: 502, .. })
        ));
    }

    #[test]
    fn test_decode_garbage_with_ok_status_is_parse_error() {
        assert!(matches!(
            decode::<Pong>(StatusCode::OK, "not json"),
            Err(ClientError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/auth/me")
                .header("authorization", "Bearer tok_123");
            then.status(200).json_body(json!({"success": true, "data": {"pong": true}}));
        });

        let client = client_for(&server);
        client.set_token(Some(SecretString::from("tok_123")));
        let pong: Pong = client.get("/auth/me").await.unwrap();

        assert!(pong.pong);
        mock.assert();
    }

    #[tokio::test]
    async fn test_no_token_no_header() {
        let server = MockServer::start();
        let with_auth = server.mock(|when, then| {
            when.method(GET).path("/api/cart").header_exists("authorization");
            then.status(500);
        });
        let without_auth = server.mock(|when, then| {
            when.method(GET).path("/api/cart");
            then.status(200).json_body(json!({"success": true, "data": {"pong": false}}));
        });

        let client = client_for(&server);
        let pong: Pong = client.get("cart").await.unwrap();

        assert!(!pong.pong);
        assert_eq!(with_auth.calls(), 0);
        without_auth.assert();
    }

    #[tokio::test]
    async fn test_single_attempt_on_server_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/cart/sync");
            then.status(503).json_body(json!({"success": false, "error": "maintenance"}));
        });

        let client = client_for(&server);
        let err = client
            .post::<_, Pong>("cart/sync", &json!({"items": []}))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Server { status: 503, .. }));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_send_accepts_missing_data() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(200).json_body(json!({"success": true, "message": "Logged out"}));
        });

        let client = client_for(&server);
        client
            .send::<()>(reqwest::Method::POST, "auth/logout", None)
            .await
            .unwrap();
        mock.assert();
    }

    #[test]
    fn test_segment_encodes_reserved_characters() {
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
