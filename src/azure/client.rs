//! ARM Client
//!
//! The concrete [`ProviderApi`] over HTTPS. Request shapes (api-version,
//! extra query, list vs. POST action) come from the resource registry.

use super::http::ArmHttpClient;
use crate::error::ProviderError;
use crate::resource::registry::{get_collection, RequestMethod};
use crate::resource::{get_kind, CollectionScope, ProviderApi, RawKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Upper bound on `nextLink` pages followed for one listing
const MAX_PAGES: usize = 1000;

#[derive(Clone)]
pub struct ArmClient {
    http: ArmHttpClient,
    endpoint: Url,
    token: String,
}

impl ArmClient {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProviderError::Decode(format!("invalid ARM endpoint '{}': {}", endpoint, e)))?;
        Ok(Self {
            http: ArmHttpClient::new(timeout)?,
            endpoint,
            token: token.to_string(),
        })
    }

    /// Build a request URL for an ARM path
    pub fn url(&self, path: &str, api_version: &str, query: &BTreeMap<String, String>) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(path);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", api_version);
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Collect every `value` item across `nextLink` pages. `None` when the
    /// first page is not found.
    async fn list_pages(&self, first: Url) -> Result<Option<Vec<Value>>, ProviderError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let Some(page) = self.http.get(url.as_str(), &self.token).await? else {
                if pages == 0 {
                    return Ok(None);
                }
                break;
            };
            pages += 1;

            match page.get("value") {
                Some(Value::Array(values)) => items.extend(values.iter().cloned()),
                Some(_) => return Err(ProviderError::Decode("'value' is not an array".to_string())),
                None => {}
            }

            if let Some(link) = page.get("nextLink").and_then(|v| v.as_str()) {
                if pages >= MAX_PAGES {
                    tracing::warn!("Stopping pagination after {} pages", pages);
                    break;
                }
                let url = Url::parse(link)
                    .map_err(|e| ProviderError::Decode(format!("invalid nextLink: {}", e)))?;
                next = Some(url);
            }
        }

        tracing::debug!("Listed {} items over {} pages", items.len(), pages);
        Ok(Some(items))
    }
}

#[async_trait]
impl ProviderApi for ArmClient {
    async fn fetch_by_id(&self, kind: RawKind, id: &str) -> Result<Option<Value>, ProviderError> {
        let def = get_kind(kind)
            .ok_or_else(|| ProviderError::Decode(format!("no request definition for {}", kind)))?;
        let path = format!("{}{}", id, def.suffix.as_deref().unwrap_or_default());
        let url = self.url(&path, &def.api_version, &def.query);

        match def.method {
            RequestMethod::Get => self.http.get(url.as_str(), &self.token).await,
            RequestMethod::List => Ok(self.list_pages(url).await?.map(Value::Array)),
            RequestMethod::Post => self.http.post(url.as_str(), &self.token, None).await,
        }
    }

    async fn list_collection(&self, scope: &CollectionScope) -> Result<Vec<Value>, ProviderError> {
        let def = get_collection(scope.name())
            .ok_or_else(|| ProviderError::Decode(format!("no collection definition for {}", scope.name())))?;
        let path = match scope {
            CollectionScope::VmSizes {
                subscription,
                location,
            } => def
                .path
                .replace("{subscription}", &urlencoding::encode(subscription))
                .replace("{location}", &urlencoding::encode(location)),
            CollectionScope::Images { subscription } => def
                .path
                .replace("{subscription}", &urlencoding::encode(subscription)),
        };
        let url = self.url(&path, &def.api_version, &BTreeMap::new());
        Ok(self.list_pages(url).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_carries_api_version_and_query() {
        let client = ArmClient::new(DEFAULT_ENDPOINT, "token", Duration::from_secs(5)).unwrap();
        let mut query = BTreeMap::new();
        query.insert("$expand".to_string(), "instanceView".to_string());
        let url = client.url(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1",
            "2023-03-01",
            &query,
        );
        assert_eq!(url.host_str(), Some("management.azure.com"));
        assert!(url.path().ends_with("/virtualMachines/vm1"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("api-version".to_string(), "2023-03-01".to_string())));
        assert!(pairs.contains(&("$expand".to_string(), "instanceView".to_string())));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(ArmClient::new("not a url", "t", Duration::from_secs(1)).is_err());
    }
}
