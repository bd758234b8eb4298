// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! robots.txt checks with one cached rule set per origin.

use crate::models::proxy::ProxyChoice;
use crate::services::fetcher::random_user_agent;
use crate::services::retriever::Retriever;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use texting_robots::{get_robots_url, Robot};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Per-origin robots.txt cache.
///
/// `user_agent` only selects the rules group; the file itself is requested
/// with a browser identity.
///
/// Any failure (unreachable file, bad status, unparseable rules) is cached as
/// "no rules", which permits crawling.
pub struct RobotsCache {
    user_agent: String,
    retriever: Arc<dyn Retriever>,
    timeout: Duration,
    entries: RwLock<HashMap<String, Option<Arc<Robot>>>>,
}

impl RobotsCache {
    pub fn new(user_agent: &str, retriever: Arc<dyn Retriever>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            retriever,
            timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let cached = self.entries.read().await.get(&origin).cloned();
        let robot = match cached {
            Some(robot) => robot,
            None => {
                // Two concurrent misses may both fetch; the second insert wins
                let robot = self.load(url.as_str()).await;
                self.entries
                    .write()
                    .await
                    .insert(origin, robot.clone());
                robot
            }
        };

        match robot {
            Some(robot) => robot.allowed(url.as_str()),
            None => true,
        }
    }

    async fn load(&self, url: &str) -> Option<Arc<Robot>> {
        let robots_url = get_robots_url(url).ok()?;
        let retrieval = self
            .retriever
            .retrieve(&robots_url, &ProxyChoice::NoProxy, random_user_agent());

        let page = match tokio::time::timeout(self.timeout, retrieval).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                debug!(url = %robots_url, error = %e, "robots.txt unavailable, allowing all");
                return None;
            }
            Err(_) => {
                debug!(url = %robots_url, "robots.txt timed out, allowing all");
                return None;
            }
        };

        match Robot::new(&self.user_agent, page.body.as_bytes()) {
            Ok(robot) => Some(Arc::new(robot)),
            Err(e) => {
                debug!(url = %robots_url, error = %e, "robots.txt unparseable, allowing all");
                None
            }
        }
    }
}
