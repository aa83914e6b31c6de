use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::error::FetchError;
use crate::client::traits::MarketApi;
use crate::filters::request::SearchRequest;
use crate::models::{LocationNode, OptionItem, OptionKind, SearchPage};

pub(crate) const USER_AGENT: &str = "room-scout/0.1";

/// Marketplace backend spoken to over HTTP/JSON
pub struct RestMarketApi {
    client: Client,
    base_url: String,
}

impl RestMarketApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        error_for_status(&response)?;
        response.json().await.map_err(transport_error)
    }
}

#[async_trait]
impl MarketApi for RestMarketApi {
    async fn fetch_regions(&self) -> Result<Vec<LocationNode>, FetchError> {
        self.get_json(&self.url("/api/address/regions")).await
    }

    async fn fetch_subregions(&self, region_code: &str) -> Result<Vec<LocationNode>, FetchError> {
        self.get_json(&self.url(&format!("/api/address/regions/{region_code}/subregions")))
            .await
    }

    async fn fetch_localities(
        &self,
        subregion_code: &str,
    ) -> Result<Vec<LocationNode>, FetchError> {
        self.get_json(&self.url(&format!(
            "/api/address/subregions/{subregion_code}/localities"
        )))
        .await
    }

    async fn fetch_options(&self, kind: OptionKind) -> Result<Vec<OptionItem>, FetchError> {
        self.get_json(&self.url(&format!("/api/options/{}", kind.as_str())))
            .await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, FetchError> {
        let url = self.url("/api/rooms/search");
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .query(request)
            .send()
            .await
            .map_err(transport_error)?;
        error_for_status(&response)?;
        response.json().await.map_err(transport_error)
    }

    fn source_name(&self) -> &'static str {
        "rest"
    }
}

/// Maps a reqwest failure onto the retry classification
pub(crate) fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_decode() {
        return FetchError::Decode {
            message: error.to_string(),
        };
    }
    if error.is_timeout() {
        return FetchError::transient("request timed out");
    }
    FetchError::transient(error.to_string())
}

/// Classifies a non-success status before the body is consumed
pub(crate) fn error_for_status(response: &Response) -> Result<(), FetchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        return Err(FetchError::RateLimited { retry_after_secs });
    }
    if status.is_client_error() {
        return Err(FetchError::client(
            status.as_u16(),
            status.canonical_reason().unwrap_or("request rejected"),
        ));
    }
    if !status.is_success() {
        return Err(FetchError::transient(format!("server returned {status}")));
    }
    Ok(())
}
