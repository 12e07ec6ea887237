//! # Supabase
//!
//! A thin HTTP client for a Supabase project. [`SupabaseClient`] knows the
//! project URL, the keys, and how Supabase reports errors; the port
//! implementations live in [`postgrest`] (tables) and [`storage`] (buckets).
//! `auth-adapters` reuses the client for GoTrue.

pub mod postgrest;
pub mod storage;

use std::time::Duration;

use domains::{BackendError, BackendResult};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use postgrest::SupabaseStore;

#[derive(Clone)]
pub struct SupabaseClient {
    http:        reqwest::Client,
    base_url:    String,
    anon_key:    SecretString,
    service_key: SecretString,
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        anon_key: SecretString,
        service_key: SecretString,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::new(format!("http client: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), anon_key, service_key })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A request authorized with the service-role key.
    pub fn service(&self, method: Method, path: &str) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", key)
            .bearer_auth(key)
    }

    /// A request authorized with the public anon key.
    pub fn anon(&self, method: Method, path: &str) -> RequestBuilder {
        let key = self.anon_key.expose_secret();
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", key)
            .bearer_auth(key)
    }

    /// Sends and decodes a JSON body, turning non-2xx answers into [`BackendError`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::new(format!("unexpected response body: {e}")))
    }

    /// Sends and discards the body.
    pub async fn send_empty(&self, request: RequestBuilder) -> BackendResult<()> {
        self.send(request).await.map(|_| ())
    }

    pub async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "supabase request failed");
            BackendError::new(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = error_from_body(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), message = %err.message, code = ?err.code, "supabase error response");
        Err(err)
    }
}

/// PostgREST, GoTrue and Storage all answer errors with JSON, but each
/// names the fields differently.
pub fn error_from_body(status: u16, body: &str) -> BackendError {
    let json: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let message = ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|k| json.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| if body.is_empty() { format!("HTTP {status}") } else { body.to_string() });

    let code = ["error_code", "code", "statusCode"]
        .iter()
        .find_map(|k| match json.get(*k) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            // OAuth-style body: `error` is the code, `error_description` the text.
            json.get("error_description")
                .and(json.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    BackendError { message, code }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_errors_keep_their_code() {
        let err = error_from_body(
            409,
            r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint"}"#,
        );
        assert_eq!(err.message, "duplicate key value violates unique constraint");
        assert_eq!(err.code.as_deref(), Some("23505"));
    }

    #[test]
    fn gotrue_and_storage_shapes() {
        let err = error_from_body(422, r#"{"code":422,"error_code":"email_exists","msg":"already registered"}"#);
        assert_eq!(err.message, "already registered");
        assert_eq!(err.code.as_deref(), Some("email_exists"));

        let err = error_from_body(400, r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#);
        assert_eq!(err.message, "The resource already exists");
        assert_eq!(err.code.as_deref(), Some("409"));
    }

    #[test]
    fn refused_password_grants_carry_a_credential_code() {
        let err = error_from_body(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(err.message, "Invalid login credentials");
        assert!(err.is_credential_rejection());

        let err = error_from_body(400, r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#);
        assert!(err.is_credential_rejection());

        let err = error_from_body(500, r#"{"error":"upstream timeout"}"#);
        assert_eq!(err.code, None);
        assert!(!err.is_credential_rejection());
    }

    #[test]
    fn non_json_bodies() {
        assert_eq!(error_from_body(502, "").message, "HTTP 502");
        assert_eq!(error_from_body(502, "Bad Gateway").message, "Bad Gateway");
    }
}
