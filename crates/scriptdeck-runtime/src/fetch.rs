// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Retrieval of remote module source text

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

/// Source of remote module text
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    /// Fetch the source text at `url`
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP fetcher backed by reqwest
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher using the timeout and user agent of `config`
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RuntimeError::Engine(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching module source");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RuntimeError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::fetch(url, format!("HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RuntimeError::fetch(url, e))?;
        debug!("Fetched {} bytes", text.len());
        Ok(text)
    }
}
