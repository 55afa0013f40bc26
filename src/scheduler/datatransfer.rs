//! BigQuery Data Transfer v1 REST client for scheduled queries

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::{ScheduledQueries, TransferConfig, SCHEDULED_QUERY_SOURCE};
use crate::error::{google_error_message, OpsError};
use crate::warehouse::Credentials;

const DATA_TRANSFER_API: &str = "https://bigquerydatatransfer.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferConfigList {
    #[serde(default)]
    transfer_configs: Vec<TransferConfig>,
    next_page_token: Option<String>,
}

pub struct DataTransferClient {
    http: Client,
    base_url: String,
    /// `projects/{project}/locations/{location}`
    parent: String,
    credentials: Credentials,
}

impl DataTransferClient {
    pub fn new(project_id: &str, location: &str, credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ecops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: DATA_TRANSFER_API.to_string(),
            parent: format!("projects/{}/locations/{}", project_id, location),
            credentials,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/transferConfigs", self.base_url, self.parent)
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OpsError::Scheduler {
            status: status.as_u16(),
            message: google_error_message(&body),
        }
        .into());
    }
    response
        .json()
        .await
        .context("Failed to parse Data Transfer response")
}

#[async_trait]
impl ScheduledQueries for DataTransferClient {
    async fn list(&self) -> Result<Vec<TransferConfig>> {
        let mut configs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("dataSourceIds", SCHEDULED_QUERY_SOURCE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let url = Url::parse_with_params(&self.collection_url(), &query)
                .context("Invalid transferConfigs URL")?;
            debug!("GET {}", url);
            let response = self
                .http
                .get(url)
                .bearer_auth(self.credentials.access_token())
                .send()
                .await
                .context("Failed to list scheduled queries")?;
            let page: TransferConfigList = parse_response(response).await?;
            configs.extend(page.transfer_configs);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(configs)
    }

    async fn create(&self, config: &TransferConfig) -> Result<TransferConfig> {
        let url = self.collection_url();
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.credentials.access_token())
            .json(config)
            .send()
            .await
            .context("Failed to create scheduled query")?;
        parse_response(response).await
    }

    async fn update(
        &self,
        name: &str,
        config: &TransferConfig,
        update_mask: &[&'static str],
    ) -> Result<TransferConfig> {
        let url = Url::parse_with_params(
            &format!("{}/{}", self.base_url, name),
            &[("updateMask", update_mask.join(","))],
        )
        .context("Invalid transferConfig URL")?;
        debug!("PATCH {}", url);
        let response = self
            .http
            .patch(url)
            .bearer_auth(self.credentials.access_token())
            .json(config)
            .send()
            .await
            .context("Failed to update scheduled query")?;
        parse_response(response).await
    }
}
