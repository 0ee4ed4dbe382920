//! Inventory backed by the platform's REST API (`/api/v2/hosts/`).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::page::HostPage;
use super::{DEFAULT_INVENTORY_TIMEOUT, InventoryClient};
use crate::error::{InventoryResult, InventoryUnavailable};
use crate::types::{HostRecord, NewHost};

const HOSTS_PATH: &str = "api/v2/hosts/";
const DEFAULT_PAGE_SIZE: u32 = 200;

/// Stop following `next` links after this many pages; a platform that keeps
/// paginating past it is misbehaving.
const MAX_PAGES: usize = 1_000;

#[derive(Clone)]
pub struct AwxApiConfig {
    pub endpoint: Url,
    pub token: String,
    /// Accept self-signed or otherwise invalid TLS certificates.
    pub insecure: bool,
    /// Upper bound for a whole operation, pagination included.
    pub timeout: Duration,
    pub page_size: u32,
}

impl AwxApiConfig {
    pub fn new(endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            endpoint,
            token: token.into(),
            insecure: false,
            timeout: DEFAULT_INVENTORY_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for AwxApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwxApiConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"********")
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// The REST client could not be built from its configuration.
#[derive(Error, Debug)]
pub enum AwxApiSetupError {
    #[error("endpoint {endpoint} cannot locate the hosts API: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct CreateHostBody<'a> {
    name: &'a str,
    inventory: u64,
    variables: &'a str,
}

#[derive(Debug, Clone)]
pub struct AwxApiInventory {
    client: Client,
    config: AwxApiConfig,
    hosts_url: Url,
}

impl AwxApiInventory {
    pub fn new(mut config: AwxApiConfig) -> Result<Self, AwxApiSetupError> {
        // `Url::join` drops the last path segment unless it ends in '/'.
        if !config.endpoint.path().ends_with('/') {
            let path = format!("{}/", config.endpoint.path());
            config.endpoint.set_path(&path);
        }
        let hosts_url = config.endpoint.join(HOSTS_PATH).map_err(|source| {
            AwxApiSetupError::Endpoint {
                endpoint: config.endpoint.to_string(),
                source,
            }
        })?;

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("registrar/", env!("CARGO_PKG_VERSION")));
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            hosts_url,
        })
    }

    async fn fetch_all(&self) -> InventoryResult<Vec<HostRecord>> {
        let mut url = self.hosts_url.clone();
        url.query_pairs_mut()
            .append_pair("page_size", &self.config.page_size.to_string());

        let mut hosts = Vec::new();
        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&url).await?;
            let next = page.next.clone();
            hosts.extend(page.into_hosts());

            match next.filter(|next| !next.is_empty()) {
                Some(next) => {
                    // `next` is usually a server-relative path.
                    url = self.config.endpoint.join(&next).map_err(|err| {
                        InventoryUnavailable::new(format!(
                            "invalid next page link {next:?}: {err}"
                        ))
                    })?;
                }
                None => return Ok(hosts),
            }
        }

        Err(InventoryUnavailable::new(format!(
            "host list exceeded {MAX_PAGES} pages"
        )))
    }

    async fn fetch_page(&self, url: &Url) -> InventoryResult<HostPage> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|err| {
                InventoryUnavailable::new(format!("host list request failed: {err}"))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
        {
            return Err(InventoryUnavailable::new(format!(
                "host list rejected credentials ({status})"
            )));
        }
        if !status.is_success() {
            return Err(InventoryUnavailable::new(format!(
                "host list returned {status}"
            )));
        }

        let body = response.bytes().await.map_err(|err| {
            InventoryUnavailable::new(format!("host list body unreadable: {err}"))
        })?;
        HostPage::parse(&body)
    }
}

#[async_trait]
impl InventoryClient for AwxApiInventory {
    async fn list_hosts(&self) -> InventoryResult<Vec<HostRecord>> {
        let hosts =
            match tokio::time::timeout(self.config.timeout, self.fetch_all())
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(InventoryUnavailable::timeout(
                        "host list",
                        self.config.timeout,
                    ));
                }
            };
        debug!(hosts = hosts.len(), "listed inventory hosts via api");
        Ok(hosts)
    }

    async fn create_host(&self, host: &NewHost) -> bool {
        let variables = match host.variables.to_payload() {
            Ok(variables) => variables,
            Err(err) => {
                warn!(host = %host.name, error = %err, "could not encode host variables");
                return false;
            }
        };
        let body = CreateHostBody {
            name: &host.name,
            inventory: host.inventory_id,
            variables: &variables,
        };

        let response = match self
            .client
            .post(self.hosts_url.clone())
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(host = %host.name, error = %err, "api host create request failed");
                return false;
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(host = %host.name, %status, "created inventory host via api");
            return true;
        }

        let detail = response.text().await.unwrap_or_default();
        warn!(
            host = %host.name,
            %status,
            detail = %detail.trim(),
            "api host create rejected"
        );
        false
    }
}
