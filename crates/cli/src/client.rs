//! Linode Kubernetes Engine API client

use anyhow::{Context, Result};
use async_trait::async_trait;
use capdash_lib::{Account, ClusterSummary, InventoryProvider, NodePool};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Upper bound on pages followed for one listing
const MAX_PAGES: u32 = 100;

/// API client for the LKE endpoints
pub struct LinodeClient {
    client: Client,
    base_url: Url,
}

impl LinodeClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make an authenticated GET request
    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str, page: u32) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("page", page)])
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Follow `page`/`pages` until every item of a listing is read
    async fn get_all<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let response: Page<T> = self.get(path, token, page).await?;
            debug!(path = %path, page = response.page, pages = response.pages, "Fetched page");
            items.extend(response.data);
            if response.page >= response.pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

#[async_trait]
impl InventoryProvider for LinodeClient {
    async fn list_clusters(&self, account: &Account) -> Result<Vec<ClusterSummary>> {
        let clusters: Vec<LkeCluster> = self.get_all("lke/clusters", account.token()).await?;
        Ok(clusters.into_iter().map(ClusterSummary::from).collect())
    }

    async fn list_pools(&self, account: &Account, cluster_id: &str) -> Result<Vec<NodePool>> {
        let path = format!("lke/clusters/{}/pools", cluster_id);
        let pools: Vec<LkePool> = self.get_all(&path, account.token()).await?;
        Ok(pools
            .into_iter()
            .map(|p| NodePool::new(p.instance_type, p.count))
            .collect())
    }
}

// API response types

#[derive(Debug, Clone, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "first_page")]
    pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct LkeCluster {
    id: u64,
    label: String,
    region: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created: Option<String>,
}

impl From<LkeCluster> for ClusterSummary {
    fn from(cluster: LkeCluster) -> Self {
        ClusterSummary {
            id: cluster.id.to_string(),
            label: cluster.label,
            region: cluster.region,
            status: cluster.status,
            created: cluster.created,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LkePool {
    #[serde(rename = "type")]
    instance_type: String,
    count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use capdash_lib::{AccountDirectory, NameNormalizer};
    use mockito::Matcher;

    fn account() -> Account {
        let directory = AccountDirectory::from_entries(&NameNormalizer::default(), [("acme", "tok")]);
        directory.accounts()[0].clone()
    }

    fn client(server: &mockito::Server) -> LinodeClient {
        LinodeClient::new(&format!("{}/v4/", server.url()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_list_clusters_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v4/lke/clusters")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":1,"label":"a","region":"ap-west","status":"ready","created":"2025-01-01T00:00:00"}],"page":1,"pages":2,"results":2}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v4/lke/clusters")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"data":[{"id":2,"label":"b","region":"gb-lon"}],"page":2,"pages":2}"#)
            .create_async()
            .await;

        let clusters = client(&server).list_clusters(&account()).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "1");
        assert_eq!(clusters[0].region, "ap-west");
        assert_eq!(clusters[1].label, "b");
        assert!(clusters[1].created.is_none());
    }

    #[tokio::test]
    async fn test_list_pools() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/lke/clusters/42/pools")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":7,"type":"g6-dedicated-8","count":3,"nodes":[]},{"id":8,"type":"g6-dedicated-4","count":5}],"page":1,"pages":1}"#,
            )
            .create_async()
            .await;

        let pools = client(&server).list_pools(&account(), "42").await.unwrap();
        assert_eq!(
            pools,
            vec![NodePool::new("g6-dedicated-8", 3), NodePool::new("g6-dedicated-4", 5)]
        );
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/lke/clusters")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"errors":[{"reason":"Invalid Token"}]}"#)
            .create_async()
            .await;

        let err = client(&server).list_clusters(&account()).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
