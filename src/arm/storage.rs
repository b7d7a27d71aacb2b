//! Storage account helpers
//!
//! Data-plane storage clients are keyed by an account access key rather than
//! a bearer token, so they are derived on demand from the management API.

use super::registry::{ClientRegistry, ServiceFamily};
use crate::error::{ProviderError, Result, StepExt};
use reqwest::{Method, StatusCode};
use serde::Deserialize;

/// Storage data-plane services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageService {
    Blob,
    File,
    Queue,
    Table,
}

impl StorageService {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::File => "file",
            Self::Queue => "queue",
            Self::Table => "table",
        }
    }
}

/// Data-plane endpoint of a storage account, e.g.
/// `https://account.blob.core.windows.net/`
pub fn storage_endpoint(registry: &ClientRegistry, account: &str, service: StorageService) -> String {
    format!(
        "https://{}.{}.{}/",
        account,
        service.as_str(),
        registry.environment().storage_endpoint_suffix
    )
}

#[derive(Deserialize)]
struct AccountKeys {
    #[serde(default)]
    keys: Option<Vec<AccountKey>>,
}

#[derive(Deserialize)]
struct AccountKey {
    #[serde(default)]
    value: Option<String>,
}

/// First access key of a storage account. `Ok(None)` means the account
/// does not exist.
pub async fn storage_account_key(
    registry: &ClientRegistry,
    resource_group: &str,
    account: &str,
) -> Result<Option<String>> {
    let client = registry.client(ServiceFamily::Storage)?;
    let url = client.provider_url(
        resource_group,
        "Microsoft.Storage",
        &format!("storageAccounts/{}/listKeys", urlencoding::encode(account)),
    );

    let response = client.send(Method::POST, &url, None).await?;
    if response.status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    // Anything else is assumed transient; the account may still exist
    let response = response
        .error_for_status()
        .step(|| format!("retrieving keys for storage account {:?}", account))?;

    let keys: AccountKeys = response.json()?;
    keys.keys
        .unwrap_or_default()
        .into_iter()
        .find_map(|k| k.value)
        .map(Some)
        .ok_or_else(|| {
            ProviderError::InconsistentState(format!(
                "nil key returned for storage account {:?}",
                account
            ))
        })
}
