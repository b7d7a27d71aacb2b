//! HTTP utilities for ARM REST API calls
//!
//! Every exchange is mirrored to the `azrm::http` tracing target. Dumping
//! falls back to a one-line summary when a body cannot be rendered and never
//! fails the call it instruments.

use crate::error::{ProviderError, Result};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Identifying string attached to every outbound call
pub const USER_AGENT: &str = concat!("azrm/", env!("CARGO_PKG_VERSION"));

/// Per-request correlation header understood by ARM
pub const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// JSON keys whose values never reach the log
const SENSITIVE_KEYS: &[&str] = &["administratorLoginPassword", "password", "value"];

/// Maximum length of error body to keep (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate and strip control characters from a body for error messages
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// A fully read API response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON (an empty body is `null`)
    pub fn json_value(&self) -> Result<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-success status into `ProviderError::Api`, pulling the
    /// ARM `{"error": {"code", "message"}}` envelope when present
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let text = String::from_utf8_lossy(&self.body);
        let envelope: Option<Value> = serde_json::from_slice(&self.body).ok();
        let error = envelope.as_ref().and_then(|v| v.get("error"));

        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .map(str::to_string);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(sanitize_for_log)
            .unwrap_or_else(|| sanitize_for_log(&text));

        tracing::error!("API error: {} - {}", self.status, message);

        Err(ProviderError::Api {
            status: self.status.as_u16(),
            code,
            message,
        })
    }
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Transport)?;

        Ok(Self { client })
    }

    /// Send one request and read the whole response. Non-success statuses
    /// are returned as-is; callers decide what a 404 means.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let mut builder = self
            .client
            .request(method, url)
            .header(CLIENT_REQUEST_ID, uuid::Uuid::new_v4().to_string());

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let request = builder.build()?;
        log_request(&request);

        let method = request.method().clone();
        let url = request.url().clone();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(target: "azrm::http", "Request to {} completed with no response", url);
                return Err(err.into());
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        let response = ApiResponse {
            status,
            headers,
            body,
        };
        log_response(&method, &url, &response);

        Ok(response)
    }
}

fn log_request(request: &Request) {
    if !tracing::enabled!(target: "azrm::http", tracing::Level::DEBUG) {
        return;
    }
    match dump_request(request) {
        Some(dump) => tracing::debug!(target: "azrm::http", "ARM Request: \n{}\n", dump),
        None => tracing::debug!(
            target: "azrm::http",
            "ARM Request: {} to {}",
            request.method(),
            request.url()
        ),
    }
}

fn log_response(method: &Method, url: &reqwest::Url, response: &ApiResponse) {
    if !tracing::enabled!(target: "azrm::http", tracing::Level::DEBUG) {
        return;
    }
    match dump_response(response) {
        Some(dump) => tracing::debug!(
            target: "azrm::http",
            "ARM Response for {} {}: \n{}\n",
            method,
            url,
            dump
        ),
        None => tracing::debug!(
            target: "azrm::http",
            "ARM Response: {} for {}",
            response.status,
            url
        ),
    }
}

/// Wire-format dump of a request, or `None` when the body is not
/// representable (streamed or not UTF-8)
pub fn dump_request(request: &Request) -> Option<String> {
    let body = match request.body() {
        Some(body) => std::str::from_utf8(body.as_bytes()?).ok()?,
        None => "",
    };

    let mut out = format!("{} {} HTTP/1.1\r\n", request.method(), request.url());
    write_headers(&mut out, request.headers());
    out.push_str("\r\n");
    out.push_str(&mask_sensitive(body));
    Some(out)
}

/// Wire-format dump of a response, or `None` for a non-UTF-8 body
pub fn dump_response(response: &ApiResponse) -> Option<String> {
    let body = std::str::from_utf8(&response.body).ok()?;

    let mut out = format!("HTTP/1.1 {}\r\n", response.status);
    write_headers(&mut out, &response.headers);
    out.push_str("\r\n");
    out.push_str(&mask_sensitive(body));
    Some(out)
}

/// Mask sensitive values in a JSON body; anything else passes through
fn mask_sensitive(body: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    if !mask_value(&mut value) {
        return body.to_string();
    }
    value.to_string()
}

fn mask_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut masked = false;
            for (key, v) in map.iter_mut() {
                if SENSITIVE_KEYS.contains(&key.as_str()) && !v.is_null() {
                    *v = Value::String("[redacted]".to_string());
                    masked = true;
                } else {
                    masked |= mask_value(v);
                }
            }
            masked
        }
        Value::Array(items) => items.iter_mut().fold(false, |acc, v| mask_value(v) | acc),
        _ => false,
    }
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if name == AUTHORIZATION {
            "[redacted]"
        } else {
            value.to_str().unwrap_or("[binary]")
        };
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
}

/// Format an ARM API error for display
pub fn format_arm_error(error: &ProviderError) -> String {
    match error.root() {
        ProviderError::Api { status: 401, .. } => {
            "Authentication failed. Check the service principal credentials.".to_string()
        }
        ProviderError::Api { status: 403, .. } => {
            "Permission denied. Check the service principal's role assignments.".to_string()
        }
        ProviderError::Api { status: 404, .. } => "Resource not found.".to_string(),
        ProviderError::Api { status: 409, .. } => {
            "Resource conflict. The resource may already exist or be in use.".to_string()
        }
        ProviderError::Api { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        ProviderError::Api { status, .. } if *status >= 500 => {
            "Azure service temporarily unavailable. Please try again.".to_string()
        }
        _ => error.to_string(),
    }
}
