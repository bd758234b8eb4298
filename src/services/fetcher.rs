// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Resilient page retrieval: robots check, proxy rotation, browser identity
//! rotation, anti-bot detection and bounded retries.

use crate::models::config::CrawlConfig;
use crate::models::fetch::{FetchError, FetchResult, FetchedPage, RetrieveError, RetrievedPage};
use crate::models::proxy::ProxyChoice;
use crate::services::filters::normalize_url;
use crate::services::proxy_pool::ProxyPool;
use crate::services::retriever::Retriever;
use crate::services::robots::RobotsCache;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Browser identities rotated per attempt
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Lower-case phrases that mark a challenge or block page
pub const ANTI_BOT_SIGNATURES: &[&str] = &["access denied", "blocked", "captcha", "cloudflare"];

pub struct Fetcher {
    retriever: Arc<dyn Retriever>,
    pool: Arc<ProxyPool>,
    config: Arc<CrawlConfig>,
    robots: RobotsCache,
}

impl Fetcher {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        pool: Arc<ProxyPool>,
        config: Arc<CrawlConfig>,
    ) -> Self {
        let robots = RobotsCache::new(&config.robots_user_agent, retriever.clone(), config.timeout);
        Self {
            retriever,
            pool,
            config,
            robots,
        }
    }

    /// Fetch with the configured retry count
    pub async fn fetch_default(&self, url: &str) -> FetchResult {
        self.fetch(url, self.config.max_retries).await
    }

    /// Fetch `url`, trying up to `max_retries` times (at least once).
    ///
    /// Robots and URL errors are returned immediately. Retrieval failures are
    /// retried with a randomized backoff that grows with the attempt number.
    pub async fn fetch(&self, url: &str, max_retries: u32) -> FetchResult {
        let normalized = normalize_url(url);
        let parsed = parse_target(url, &normalized)?;

        if self.config.respect_robots && !self.robots.is_allowed(&parsed).await {
            debug!(url = %normalized, "Disallowed by robots.txt");
            return Err(FetchError::RobotsDisallowed { url: normalized });
        }

        let attempts = max_retries.max(1);
        let mut last = FetchError::NetworkError("no attempt made".to_string());

        for attempt in 1..=attempts {
            let proxy = if self.config.use_proxies {
                self.pool.next()
            } else {
                ProxyChoice::NoProxy
            };

            match self.attempt(&normalized, &proxy).await {
                Ok(page) => {
                    if let Some(id) = proxy.id() {
                        self.pool.report_success(id);
                    }
                    return Ok(FetchedPage {
                        requested_url: normalized,
                        final_url: page.final_url,
                        body: page.body,
                        content_type: page.content_type,
                        proxy: proxy.id(),
                    });
                }
                Err(e) => {
                    if let Some(id) = proxy.id() {
                        self.pool.report_failure(id);
                    }
                    warn!(
                        url = %normalized,
                        attempt,
                        attempts,
                        kind = e.kind(),
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last = e;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            url: normalized,
            attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, url: &str, proxy: &ProxyChoice) -> Result<RetrievedPage, FetchError> {
        let user_agent = random_user_agent();
        let retrieval = self.retriever.retrieve(url, proxy, user_agent);

        let page = match tokio::time::timeout(self.config.timeout, retrieval).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(map_retrieve_error(e, self.config.timeout)),
            Err(_) => return Err(FetchError::Timeout(self.config.timeout)),
        };

        // PDF text is document content, not a challenge page
        let is_pdf = page
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/pdf"));
        if !is_pdf {
            if let Some(signature) = anti_bot_signature(&page.body) {
                return Err(FetchError::AntiBotDetected {
                    signature: signature.to_string(),
                });
            }
        }

        Ok(page)
    }

    /// `uniform(min, max) * attempt`
    fn backoff(&self, attempt: u32) -> Duration {
        let min = self.config.retry_backoff_min.as_secs_f64();
        let max = self.config.retry_backoff_max.as_secs_f64();
        let base = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(base * f64::from(attempt))
    }
}

fn parse_target(raw: &str, normalized: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = Url::parse(normalized).map_err(|e| invalid(e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(parsed)
}

pub(crate) fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// First signature found in `body`, case-insensitive
pub fn anti_bot_signature(body: &str) -> Option<&'static str> {
    let lowered = body.to_lowercase();
    ANTI_BOT_SIGNATURES
        .iter()
        .copied()
        .find(|signature| lowered.contains(signature))
}

fn map_retrieve_error(error: RetrieveError, timeout: Duration) -> FetchError {
    match error {
        RetrieveError::Timeout => FetchError::Timeout(timeout),
        RetrieveError::Blocked(status) => FetchError::AntiBotDetected {
            signature: format!("HTTP {}", status),
        },
        RetrieveError::Status(status) => FetchError::NetworkError(format!("HTTP status {}", status)),
        RetrieveError::Network(message) => FetchError::NetworkError(message),
    }
}
