//! Long-running operations
//!
//! ARM answers mutating calls with a pending status and a URL to poll. The
//! poller walks {Submitted, Polling, Done, Failed} until a terminal state,
//! racing every wait against the session's cancellation token.

use super::client::ServiceClient;
use super::http::ApiResponse;
use crate::error::{ProviderError, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
pub const LOCATION: &str = "location";
pub const RETRY_AFTER: &str = "retry-after";

/// Status of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed { code: String, message: String },
}

impl OperationStatus {
    /// Map an ARM status / provisioning state string
    pub fn from_state(state: &str, error: Option<&Value>) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" | "canceled" | "cancelled" => {
                let code = error
                    .and_then(|e| e.get("code"))
                    .and_then(|c| c.as_str())
                    .unwrap_or(state)
                    .to_string();
                let message = error
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("the operation did not complete")
                    .to_string();
                Self::Failed { code, message }
            }
            "inprogress" | "accepted" | "creating" | "updating" | "deleting" | "running" => {
                Self::Running
            }
            other => {
                tracing::warn!("Unknown operation status: {}", other);
                Self::Running
            }
        }
    }
}

/// Where the next poll goes
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollTarget {
    /// `Azure-AsyncOperation` status monitor; body carries `status`
    AsyncOperation(String),
    /// `Location` monitor; 202 while running
    Location(String),
    /// The resource itself; body carries `properties.provisioningState`
    Resource(String),
}

#[derive(Debug)]
enum PollState {
    Submitted(ApiResponse),
    Polling(PollTarget),
    Done(Option<Value>),
    Failed(ProviderError),
}

/// A submitted long-running operation
pub struct LongRunningOperation<'a> {
    client: &'a ServiceClient,
    resource_url: String,
    method: Method,
    state: PollState,
    interval: Duration,
    next_wait: Duration,
    polls: u32,
}

impl<'a> LongRunningOperation<'a> {
    /// Wrap the initial response of a PUT/PATCH/POST/DELETE against `resource_url`
    pub fn new(
        client: &'a ServiceClient,
        method: Method,
        resource_url: &str,
        initial: ApiResponse,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            resource_url: resource_url.to_string(),
            method,
            state: PollState::Submitted(initial),
            interval,
            next_wait: interval,
            polls: 0,
        }
    }

    /// Block until the operation reaches a terminal state. Returns the final
    /// body when the remote API supplied one.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<Option<Value>> {
        loop {
            let state = std::mem::replace(&mut self.state, PollState::Done(None));
            self.state = match state {
                PollState::Submitted(initial) => self.classify(initial)?,
                PollState::Polling(target) => {
                    // The in-flight request is dropped along with the sleep
                    let next = tokio::select! {
                        _ = cancel.cancelled() => None,
                        next = self.step(target) => Some(next),
                    };
                    match next {
                        Some(next) => next?,
                        None => {
                            tracing::info!("Wait for {} {} cancelled", self.method, self.resource_url);
                            return Err(ProviderError::Cancelled);
                        }
                    }
                }
                PollState::Done(body) => {
                    tracing::debug!(
                        "{} {} completed after {} polls",
                        self.method,
                        self.resource_url,
                        self.polls
                    );
                    return Ok(body);
                }
                PollState::Failed(err) => return Err(err),
            };
        }
    }

    /// Decide what the initial response asks us to do
    fn classify(&mut self, initial: ApiResponse) -> Result<PollState> {
        self.update_retry_after(&initial);

        if let Some(url) = initial.header(AZURE_ASYNC_OPERATION) {
            return Ok(PollState::Polling(PollTarget::AsyncOperation(url.to_string())));
        }
        if let Some(url) = initial.header(LOCATION) {
            if initial.status == StatusCode::ACCEPTED || initial.status == StatusCode::CREATED {
                return Ok(PollState::Polling(PollTarget::Location(url.to_string())));
            }
        }

        let body = initial.json_value()?;
        match provisioning_state(&body) {
            Some(state) => match OperationStatus::from_state(state, body.get("error")) {
                OperationStatus::Succeeded => Ok(PollState::Done(Some(body))),
                OperationStatus::Failed { code, message } => {
                    Ok(PollState::Failed(ProviderError::RemoteOperation { code, message }))
                }
                OperationStatus::Running => {
                    Ok(PollState::Polling(PollTarget::Resource(self.resource_url.clone())))
                }
            },
            None if initial.status == StatusCode::ACCEPTED => {
                Ok(PollState::Polling(PollTarget::Resource(self.resource_url.clone())))
            }
            None if body.is_null() => Ok(PollState::Done(None)),
            None => Ok(PollState::Done(Some(body))),
        }
    }

    async fn poll(&mut self, target: PollTarget) -> Result<PollState> {
        self.polls += 1;

        match target {
            PollTarget::AsyncOperation(url) => {
                let response = self.client.get(&url).await?;
                self.update_retry_after(&response);
                let body = response.json_value()?;
                let status = body
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("InProgress");
                Ok(match OperationStatus::from_state(status, body.get("error")) {
                    OperationStatus::Succeeded => PollState::Done(None),
                    OperationStatus::Failed { code, message } => {
                        PollState::Failed(ProviderError::RemoteOperation { code, message })
                    }
                    OperationStatus::Running => PollState::Polling(PollTarget::AsyncOperation(url)),
                })
            }
            PollTarget::Location(url) => {
                let response = self.client.send(Method::GET, &url, None).await?;
                // A deleted resource answers its own URL with 404
                if response.status == StatusCode::NOT_FOUND && self.method == Method::DELETE {
                    return Ok(PollState::Done(None));
                }
                let response = response.error_for_status()?;
                self.update_retry_after(&response);
                if response.status == StatusCode::ACCEPTED {
                    return Ok(PollState::Polling(PollTarget::Location(url)));
                }
                let body = response.json_value()?;
                Ok(PollState::Done((!body.is_null()).then_some(body)))
            }
            PollTarget::Resource(url) => {
                let response = self.client.send(Method::GET, &url, None).await?;
                if response.status == StatusCode::NOT_FOUND && self.method == Method::DELETE {
                    return Ok(PollState::Done(None));
                }
                let response = response.error_for_status()?;
                self.update_retry_after(&response);
                if response.status == StatusCode::ACCEPTED {
                    return Ok(PollState::Polling(PollTarget::Resource(url)));
                }

                let body = response.json_value()?;
                let state = provisioning_state(&body).unwrap_or("Succeeded");
                Ok(match OperationStatus::from_state(state, body.get("error")) {
                    OperationStatus::Failed { code, message } => {
                        PollState::Failed(ProviderError::RemoteOperation { code, message })
                    }
                    // A delete is finished only once the resource is gone
                    _ if self.method == Method::DELETE => {
                        PollState::Polling(PollTarget::Resource(url))
                    }
                    OperationStatus::Succeeded => PollState::Done(Some(body)),
                    OperationStatus::Running => PollState::Polling(PollTarget::Resource(url)),
                })
            }
        }
    }

    /// Wait out the poll interval, then poll once
    async fn step(&mut self, target: PollTarget) -> Result<PollState> {
        let wait = std::mem::replace(&mut self.next_wait, self.interval);
        tokio::time::sleep(wait).await;
        self.poll(target).await
    }

    fn update_retry_after(&mut self, response: &ApiResponse) {
        if let Some(secs) = response
            .header(RETRY_AFTER)
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.next_wait = Duration::from_secs(secs);
        }
    }
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")
        .and_then(|p| p.get("provisioningState"))
        .and_then(|s| s.as_str())
}

/// Submit-and-wait helper used by adapters
pub async fn wait_for_completion(
    client: &ServiceClient,
    method: Method,
    url: &str,
    initial: ApiResponse,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Option<Value>> {
    if cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }
    LongRunningOperation::new(client, method, url, initial, interval)
        .wait(cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(OperationStatus::from_state("Succeeded", None), OperationStatus::Succeeded);
        assert_eq!(OperationStatus::from_state("InProgress", None), OperationStatus::Running);
        assert_eq!(OperationStatus::from_state("Creating", None), OperationStatus::Running);

        let error = serde_json::json!({"code": "InternalServerError", "message": "boom"});
        assert_eq!(
            OperationStatus::from_state("Failed", Some(&error)),
            OperationStatus::Failed {
                code: "InternalServerError".to_string(),
                message: "boom".to_string()
            }
        );
        assert!(matches!(
            OperationStatus::from_state("Canceled", None),
            OperationStatus::Failed { .. }
        ));
    }

    #[test]
    fn test_provisioning_state() {
        let body = serde_json::json!({"properties": {"provisioningState": "Updating"}});
        assert_eq!(provisioning_state(&body), Some("Updating"));
        assert_eq!(provisioning_state(&serde_json::json!({})), None);
    }
}
