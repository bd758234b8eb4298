// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Runs one site crawler per seed site with bounded parallelism.

use crate::models::config::CrawlConfig;
use crate::models::report::{CrawlError, CrawlEvent, CrawlReport, SiteOutcome};
use crate::services::fetcher::Fetcher;
use crate::services::filters::PageFilter;
use crate::services::proxy_pool::ProxyPool;
use crate::services::retriever::Retriever;
use crate::services::site_crawler::SiteCrawler;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct Orchestrator {
    config: Arc<CrawlConfig>,
    filter: Arc<PageFilter>,
    pool: Arc<ProxyPool>,
    fetcher: Arc<Fetcher>,
    progress: Option<UnboundedSender<CrawlEvent>>,
}

impl Orchestrator {
    /// Validate `config` and wire the shared proxy pool and fetcher.
    /// Configuration problems surface here, before any site is contacted.
    pub fn new(config: CrawlConfig, retriever: Arc<dyn Retriever>) -> Result<Self, CrawlError> {
        config.validate()?;
        let filter = Arc::new(PageFilter::from_config(&config)?);
        let pool = Arc::new(ProxyPool::new(config.active_proxies()));
        let config = Arc::new(config);
        let fetcher = Arc::new(Fetcher::new(retriever, pool.clone(), config.clone()));

        Ok(Self {
            config,
            filter,
            pool,
            fetcher,
            progress: None,
        })
    }

    pub fn with_progress(mut self, sender: UnboundedSender<CrawlEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Crawl every site and merge the results.
    ///
    /// A site that fails entirely is logged and counted; records from the
    /// other sites are still returned. Records are grouped in seed order.
    pub async fn run(&self, sites: &[String]) -> Result<CrawlReport, CrawlError> {
        let run_id = Uuid::now_v7();
        let span = info_span!("run", %run_id);
        self.run_sites(run_id, sites).instrument(span).await
    }

    async fn run_sites(&self, run_id: Uuid, sites: &[String]) -> Result<CrawlReport, CrawlError> {
        info!(
            sites = sites.len(),
            max_concurrent = self.config.max_concurrent,
            proxies = self.pool.len(),
            "Starting crawl run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, site) in sites.iter().enumerate() {
            let crawler = self.site_crawler();
            let semaphore = semaphore.clone();
            let site = site.clone();
            tasks.spawn(
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => crawler.crawl(&site).await,
                        Err(e) => Err(CrawlError::Internal(e.to_string())),
                    };
                    (index, site, result)
                }
                .in_current_span(),
            );
        }

        let mut outcomes: Vec<Option<SiteOutcome>> = vec![None; sites.len()];
        let mut sites_failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(outcome))) => outcomes[index] = Some(outcome),
                Ok((_, site, Err(e))) => {
                    warn!(site = %site, error = %e, "Site crawl failed");
                    sites_failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Site crawl task aborted");
                    sites_failed += 1;
                }
            }
        }

        let completed: Vec<SiteOutcome> = outcomes.into_iter().flatten().collect();
        let report = CrawlReport {
            run_id,
            sites_completed: completed.len(),
            sites_failed,
            pages_visited: completed.iter().map(|o| o.pages_visited).sum(),
            records: completed.into_iter().flat_map(|o| o.records).collect(),
            proxy_stats: self.pool.report(),
        };

        for proxy in &report.proxy_stats {
            info!(
                proxy = proxy.id,
                address = %proxy.address,
                success = proxy.stats.success_count,
                failure = proxy.stats.failure_count,
                "Proxy stats"
            );
        }
        info!(
            records = report.records.len(),
            completed = report.sites_completed,
            failed = report.sites_failed,
            pages = report.pages_visited,
            "Crawl run finished"
        );

        Ok(report)
    }

    fn site_crawler(&self) -> SiteCrawler {
        let crawler = SiteCrawler::new(
            self.fetcher.clone(),
            self.config.clone(),
            self.filter.clone(),
        );
        match &self.progress {
            Some(sender) => crawler.with_progress(sender.clone()),
            None => crawler,
        }
    }
}
