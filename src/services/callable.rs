// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTPS callable-function client for the remote procedures.
//!
//! Wire protocol: `POST {base_url}/{function}` with a JSON body
//! `{"data": <request>}`; replies carry either `{"result": <payload>}` or
//! `{"error": {"status", "message"}}`.

use crate::error::{Result, SyncError};
use crate::remote::{
    BootstrapSettingsRequest, CallOutcome, GenerateRequest, RemoteProcedures, SettingsUpdate,
    SubmitResponseRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Callable function names.
pub mod functions {
    pub const BOOTSTRAP_SETTINGS: &str = "bootstrapSettings";
    pub const GENERATE_TODAY: &str = "generateToday";
    pub const SUBMIT_RESPONSE: &str = "submitResponse";
    pub const UPDATE_SETTINGS: &str = "updateSettings";
}

#[derive(Serialize)]
struct CallableRequest<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Deserialize)]
struct CallableReply {
    result: Option<Value>,
    error: Option<CallableErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CallableErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Callable-function client.
#[derive(Clone)]
pub struct CallableClient {
    http: reqwest::Client,
    base_url: String,
    id_token: Option<String>,
    timeout: Duration,
}

impl CallableClient {
    /// Create a client for the functions deployed under `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Remote(format!("failed building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            id_token: None,
            timeout,
        })
    }

    /// Attach the signed-in user's ID token to every call.
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    /// Invoke a callable function.
    async fn call<T: Serialize + Sync>(&self, function: &str, data: &T) -> Result<CallOutcome> {
        let url = format!("{}/{}", self.base_url, function);

        let mut request = self.http.post(&url).json(&CallableRequest { data });
        if let Some(token) = &self.id_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!(function, timeout = ?self.timeout, "Callable function timed out");
                SyncError::Timeout(self.timeout)
            } else {
                SyncError::Remote(format!("{} request failed: {}", function, e))
            }
        })?;

        let status = response.status();
        let reply: CallableReply = match response.json().await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => return Err(SyncError::Timeout(self.timeout)),
            Err(e) if status.is_success() => {
                return Err(SyncError::Remote(format!(
                    "{} returned malformed JSON: {}",
                    function, e
                )))
            }
            Err(_) => return Err(SyncError::Remote(format!("{} failed: HTTP {}", function, status))),
        };

        if let Some(error) = reply.error {
            tracing::warn!(
                function,
                status = %error.status,
                message = %error.message,
                "Callable function returned an error"
            );
            return Err(SyncError::Remote(format!(
                "{} failed ({}): {}",
                function, error.status, error.message
            )));
        }

        let result = reply
            .result
            .ok_or_else(|| SyncError::Remote(format!("{} returned no result", function)))?;

        Ok(CallOutcome::from_result(result))
    }
}

#[async_trait]
impl RemoteProcedures for CallableClient {
    async fn bootstrap_settings(&self, request: &BootstrapSettingsRequest) -> Result<CallOutcome> {
        self.call(functions::BOOTSTRAP_SETTINGS, request).await
    }

    async fn generate_today(&self, request: &GenerateRequest) -> Result<CallOutcome> {
        self.call(functions::GENERATE_TODAY, request).await
    }

    async fn submit_response(&self, request: &SubmitResponseRequest) -> Result<CallOutcome> {
        self.call(functions::SUBMIT_RESPONSE, request).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<CallOutcome> {
        self.call(functions::UPDATE_SETTINGS, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_uses_camel_case() {
        let request = GenerateRequest {
            couple_id: "alice_bob".to_string(),
            user_id: "alice".to_string(),
            day_index: 4,
            timezone: "Europe/Paris".to_string(),
        };
        let body = serde_json::to_value(CallableRequest { data: &request }).unwrap();
        assert_eq!(
            body,
            json!({"data": {"coupleId": "alice_bob", "userId": "alice", "dayIndex": 4, "timezone": "Europe/Paris"}})
        );
    }

    #[test]
    fn test_outcome_treats_missing_success_as_failure() {
        let outcome = CallOutcome::from_result(json!({"message": "quota exceeded"}));
        assert!(!outcome.success);
        assert_eq!(outcome.failure_message(), "quota exceeded");

        let outcome = CallOutcome::from_result(json!({"success": true, "item": {}}));
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_unresponsive_server_reports_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever replying.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let timeout = Duration::from_millis(50);
        let client = CallableClient::new(format!("http://{}", addr), timeout).unwrap();
        let request = GenerateRequest {
            couple_id: "alice_bob".to_string(),
            user_id: "alice".to_string(),
            day_index: 2,
            timezone: "UTC".to_string(),
        };

        let err = client.generate_today(&request).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(t) if t == timeout), "got {:?}", err);
        assert!(err.is_retryable());

        server.abort();
    }
}
