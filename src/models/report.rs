// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::config::ConfigError;
use crate::models::proxy::ProxyReport;
use crate::models::record::ResultRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Progress events emitted while crawling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// A URL was dequeued and is about to be fetched
    PageVisited {
        site: String,
        visited: usize,
        max_pages: usize,
        url: String,
    },
    ResultFound {
        site: String,
        url: String,
    },
    SiteFinished {
        site: String,
        results: usize,
    },
}

/// Summary of a single site crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteOutcome {
    pub site: String,
    pub records: Vec<ResultRecord>,
    pub pages_visited: usize,
    pub pages_failed: usize,
}

/// Everything a run hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub records: Vec<ResultRecord>,
    pub sites_completed: usize,
    pub sites_failed: usize,
    pub pages_visited: usize,
    pub proxy_stats: Vec<ProxyReport>,
}

/// Errors that end a site crawl or a whole run.
/// Per-page fetch failures never surface as `CrawlError`.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid site URL '{url}': {reason}")]
    InvalidSite { url: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}
