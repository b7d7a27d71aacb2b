//! Integration tests for the ARM HTTP client using wiremock
//!
//! These tests verify the service client behavior against mocked endpoints,
//! ensuring proper handling of various response codes and edge cases.

mod common;

use azrm::arm::http::format_arm_error;
use azrm::arm::registry::ServiceFamily;
use azrm::error::ProviderError;
use common::{provider_path, registry, TOKEN};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test module for service client integration tests
mod service_client_tests {
    use super::*;

    fn vm_path() -> String {
        provider_path("rg", "Microsoft.Compute", "virtualMachines/vm1")
    }

    /// Test successful GET request returns parsed JSON
    #[tokio::test]
    async fn test_get_success_returns_json() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("GET"))
            .and(path(vm_path()))
            .and(query_param("api-version", "2017-03-30"))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm1",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1");
        let body = client.get(&url).await.unwrap().json_value().unwrap();

        assert_eq!(body["name"], "vm1");
        assert_eq!(body["properties"]["provisioningState"], "Succeeded");
    }

    /// Test 403 response carries the ARM error envelope
    #[tokio::test]
    async fn test_403_returns_api_error() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("GET"))
            .and(path(vm_path()))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "AuthorizationFailed",
                    "message": "The client does not have authorization to perform action"
                }
            })))
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1");
        let err = client.get(&url).await.unwrap_err();

        match &err {
            ProviderError::Api { status, code, message } => {
                assert_eq!(*status, 403);
                assert_eq!(code.as_deref(), Some("AuthorizationFailed"));
                assert!(message.contains("does not have authorization"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_not_found());
        assert!(format_arm_error(&err).contains("Permission denied"));
    }

    /// Test 404 response for non-existent resources
    #[tokio::test]
    async fn test_404_returns_not_found() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("GET"))
            .and(path(vm_path()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceNotFound", "message": "not found"}
            })))
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1");
        let err = client.get(&url).await.unwrap_err();
        assert!(err.is_not_found());
    }

    /// Test POST with JSON body
    #[tokio::test]
    async fn test_post_with_body() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/restart", vm_path())))
            .and(body_json(json!({"reason": "maintenance"})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1/restart");
        let response = client
            .post(&url, Some(&json!({"reason": "maintenance"})))
            .await
            .unwrap();
        assert_eq!(response.status.as_u16(), 202);
    }

    /// Test empty response body reads as null
    #[tokio::test]
    async fn test_empty_response() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("DELETE"))
            .and(path(vm_path()))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1");
        let response = client.delete(&url).await.unwrap();
        assert!(response.json_value().unwrap().is_null());
    }

    /// Test rate limit response with a non-JSON body
    #[tokio::test]
    async fn test_rate_limit_429() {
        let server = MockServer::start().await;
        let registry = registry(&server).await;

        Mock::given(method("GET"))
            .and(path(vm_path()))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "30")
                    .set_body_string("Too Many Requests"),
            )
            .mount(&server)
            .await;

        let client = registry.client(ServiceFamily::Compute).unwrap();
        let url = client.provider_url("rg", "Microsoft.Compute", "virtualMachines/vm1");
        let err = client.get(&url).await.unwrap_err();

        match err {
            ProviderError::Api { status, code, message } => {
                assert_eq!(status, 429);
                assert!(code.is_none());
                assert_eq!(message, "Too Many Requests");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
