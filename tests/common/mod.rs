// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tender_scout::models::fetch::{RetrieveError, RetrievedPage};
use tender_scout::models::proxy::ProxyChoice;
use tender_scout::{CrawlConfig, Retriever};

/// In-memory site: fixed HTML per URL, 404 for everything else
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticSite {
    async fn retrieve(
        &self,
        url: &str,
        _proxy: &ProxyChoice,
        _user_agent: &str,
    ) -> Result<RetrievedPage, RetrieveError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(html) => Ok(RetrievedPage {
                final_url: url.to_string(),
                body: html.clone(),
                content_type: Some("text/html; charset=utf-8".to_string()),
            }),
            None => Err(RetrieveError::Status(404)),
        }
    }
}

/// Config without waits, for fast tests
pub fn quick_config() -> CrawlConfig {
    CrawlConfig {
        max_retries: 1,
        retry_backoff_min: Duration::ZERO,
        retry_backoff_max: Duration::ZERO,
        base_delay: Duration::ZERO,
        jitter: Duration::ZERO,
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Page whose anchors all have long enough text to count as listing items
pub fn link_page(paths: &[String]) -> String {
    let links: String = paths
        .iter()
        .map(|p| format!("<li><a href=\"{}\">Documento pubblicato {}</a></li>\n", p, p))
        .collect();
    format!("<html><head><title>Elenco</title></head><body><ul>{}</ul></body></html>", links)
}
