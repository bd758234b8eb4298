// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use std::time::Duration;
use thiserror::Error;

/// Raw output of a retrieval backend
#[derive(Debug, Clone)]
pub struct RetrievedPage {
    /// URL after redirects
    pub final_url: String,
    /// Markup, or extracted text for binary documents
    pub body: String,
    pub content_type: Option<String>,
}

/// Why a retrieval backend could not produce a page
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("request timed out")]
    Timeout,

    #[error("request blocked with HTTP status {0}")]
    Blocked(u16),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

/// A page successfully fetched by the Fetcher
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String,
    pub body: String,
    pub content_type: Option<String>,
    /// Proxy used for the successful attempt
    pub proxy: Option<usize>,
}

impl FetchedPage {
    /// Whether the body holds text extracted from a PDF rather than markup
    pub fn is_pdf_document(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
            .unwrap_or(false)
    }
}

/// Closed set of fetch failures. None of them is fatal to a crawl run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("anti-bot page detected ({signature})")]
    AntiBotDetected { signature: String },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("giving up on {url} after {attempts} attempts")]
    MaxRetriesExceeded {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::RobotsDisallowed { .. } => "robots_disallowed",
            FetchError::Timeout(_) => "timeout",
            FetchError::AntiBotDetected { .. } => "anti_bot_detected",
            FetchError::NetworkError(_) => "network_error",
            FetchError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
        }
    }
}

/// Outcome of one `Fetcher::fetch` call
pub type FetchResult = Result<FetchedPage, FetchError>;
