// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Retrieval backends. The Fetcher only knows the `Retriever` trait; plain
//! HTTP is the built-in backend, a rendering backend can be plugged in the
//! same way.

use crate::models::fetch::{RetrieveError, RetrievedPage};
use crate::models::proxy::ProxyChoice;
use crate::services::extractor::binary_text;
use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Fetch one URL and return its final location and body
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        url: &str,
        proxy: &ProxyChoice,
        user_agent: &str,
    ) -> Result<RetrievedPage, RetrieveError>;
}

/// Plain HTTP backend built on reqwest.
/// Keeps one client per proxy address so connection pools are reused.
pub struct HttpRetriever {
    timeout: Duration,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpRetriever {
    pub fn new(timeout: Duration) -> Result<Self, RetrieveError> {
        Ok(Self {
            timeout,
            direct: build_client(timeout, None)?,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: &ProxyChoice) -> Result<Client, RetrieveError> {
        let ProxyChoice::UseProxy(entry) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self
            .proxied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(&entry.address) {
            return Ok(client.clone());
        }
        let client = build_client(self.timeout, Some(&entry.address))?;
        clients.insert(entry.address.clone(), client.clone());
        Ok(client)
    }
}

fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, RetrieveError> {
    let mut builder = Client::builder().timeout(timeout);
    builder = match proxy {
        Some(address) => {
            let proxy = Proxy::all(address)
                .map_err(|e| RetrieveError::Network(format!("invalid proxy: {}", e)))?;
            builder.proxy(proxy)
        }
        // Direct means direct, even when HTTP_PROXY is set
        None => builder.no_proxy(),
    };
    builder
        .build()
        .map_err(|e| RetrieveError::Network(format!("failed to build HTTP client: {}", e)))
}

fn map_reqwest_error(error: reqwest::Error) -> RetrieveError {
    if error.is_timeout() {
        RetrieveError::Timeout
    } else {
        RetrieveError::Network(error.to_string())
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(
        &self,
        url: &str,
        proxy: &ProxyChoice,
        user_agent: &str,
    ) -> Result<RetrievedPage, RetrieveError> {
        let client = self.client_for(proxy)?;
        let response = client
            .get(url)
            .header("User-Agent", user_agent)
            .header("Accept-Language", "it-IT,it;q=0.9,en;q=0.5")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RetrieveError::Blocked(status.as_u16()));
        }
        if !status.is_success() {
            return Err(RetrieveError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let is_pdf = bytes.starts_with(b"%PDF")
            || content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"));

        debug!(url = %final_url, bytes = bytes.len(), is_pdf, "Retrieved page");

        let (body, content_type) = if is_pdf {
            (binary_text(&bytes), Some("application/pdf".to_string()))
        } else {
            (String::from_utf8_lossy(&bytes).into_owned(), content_type)
        };

        Ok(RetrievedPage {
            final_url,
            body,
            content_type,
        })
    }
}
