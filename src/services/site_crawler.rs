// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Breadth-first crawl of a single site.
//!
//! Pages are fetched one at a time in FIFO order. A page with enough harvested
//! links is a listing and only feeds the frontier; anything else is content and
//! is run through the page filters.

use crate::models::config::CrawlConfig;
use crate::models::fetch::FetchedPage;
use crate::models::record::{ListingItem, PageClassification, ResultRecord};
use crate::models::report::{CrawlError, CrawlEvent, SiteOutcome};
use crate::services::extractor::{
    analyze_html, clean_text, date_hint, extract_fields, parse_date, portal_type_guess, snippet,
};
use crate::services::fetcher::Fetcher;
use crate::services::filters::{
    is_pdf, looks_like_binary, normalize_url, same_domain, strip_fragment, FilterOutcome,
    PageFilter,
};
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, info_span, Instrument};
use url::Url;

/// Harvested link count at which a page counts as a listing
pub const LISTING_THRESHOLD: usize = 8;
/// Most links enqueued from a single listing page
pub const MAX_LISTING_LINKS: usize = 100;
/// Characters of page text kept in a record
pub const SNIPPET_CHARS: usize = 400;

/// Listing when at least `LISTING_THRESHOLD` items were harvested
pub fn classify(items: Vec<ListingItem>) -> PageClassification {
    if items.len() >= LISTING_THRESHOLD {
        PageClassification::Listing(items)
    } else {
        PageClassification::Content
    }
}

/// Text-level view of a fetched page, independent of its format
struct PageContent {
    title: String,
    text: String,
    date_raw: String,
    classification: PageClassification,
    pdf_links: Vec<String>,
}

impl PageContent {
    fn from_fetched(page: &FetchedPage) -> Self {
        if page.is_pdf_document() {
            let text = clean_text(&page.body);
            return Self {
                title: document_name(&page.final_url),
                date_raw: date_hint(&text).unwrap_or_default(),
                text,
                classification: PageClassification::Content,
                pdf_links: Vec::new(),
            };
        }

        let view = analyze_html(&page.body, &page.final_url);
        Self {
            title: view.title,
            text: view.text,
            date_raw: view.date_raw,
            classification: classify(view.listing_items),
            pdf_links: view.pdf_links,
        }
    }
}

/// Last path segment, used as the title of a PDF document
fn document_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| url.to_string())
}

/// Frontier and visited set of one crawl
struct Frontier {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    fn seeded(root: &Url, seed_paths: &[String]) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
        };
        frontier.push(root.as_str());
        for path in seed_paths {
            if let Ok(url) = root.join(path) {
                frontier.push(url.as_str());
            }
        }
        frontier
    }

    /// Queue `url` unless it was already visited or is still waiting
    fn push(&mut self, url: &str) -> bool {
        if self.visited.contains(url) || self.queued.contains(url) {
            return false;
        }
        self.queued.insert(url.to_string());
        self.queue.push_back(url.to_string());
        true
    }

    fn pop(&mut self) -> Option<String> {
        let url = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }
}

pub struct SiteCrawler {
    fetcher: Arc<Fetcher>,
    config: Arc<CrawlConfig>,
    filter: Arc<PageFilter>,
    progress: Option<UnboundedSender<CrawlEvent>>,
}

impl SiteCrawler {
    pub fn new(fetcher: Arc<Fetcher>, config: Arc<CrawlConfig>, filter: Arc<PageFilter>) -> Self {
        Self {
            fetcher,
            config,
            filter,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: UnboundedSender<CrawlEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Crawl `site` until the frontier is empty or the page budget is spent
    pub async fn crawl(&self, site: &str) -> Result<SiteOutcome, CrawlError> {
        let normalized = normalize_url(site);
        let invalid = |reason: String| CrawlError::InvalidSite {
            url: site.to_string(),
            reason,
        };
        let root = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        if root.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        let root = strip_fragment(root);

        let span = info_span!("site", site = %root);
        self.crawl_root(root).instrument(span).await
    }

    async fn crawl_root(&self, root: Url) -> Result<SiteOutcome, CrawlError> {
        let site = root.to_string();
        let mut frontier = Frontier::seeded(&root, &self.config.seed_paths);
        let mut outcome = SiteOutcome {
            site: site.clone(),
            records: Vec::new(),
            pages_visited: 0,
            pages_failed: 0,
        };

        info!("Starting crawl");

        while frontier.visited.len() < self.config.max_pages {
            let Some(next) = frontier.pop() else {
                break;
            };
            let Some(url) = self.admit(&site, &next, &frontier.visited) else {
                continue;
            };

            frontier.visited.insert(url.clone());
            outcome.pages_visited = frontier.visited.len();
            self.emit(CrawlEvent::PageVisited {
                site: site.clone(),
                visited: frontier.visited.len(),
                max_pages: self.config.max_pages,
                url: url.clone(),
            });

            match self.fetcher.fetch_default(&url).await {
                Ok(page) => {
                    if let Some(record) = self.process_page(&site, &url, &page, &mut frontier) {
                        self.emit(CrawlEvent::ResultFound {
                            site: site.clone(),
                            url: record.url.clone(),
                        });
                        outcome.records.push(record);
                    }
                }
                Err(e) => {
                    debug!(url = %url, kind = e.kind(), error = %e, "Dropping page");
                    outcome.pages_failed += 1;
                }
            }

            if !frontier.queue.is_empty() && frontier.visited.len() < self.config.max_pages {
                tokio::time::sleep(self.page_delay()).await;
            }
        }

        info!(
            visited = outcome.pages_visited,
            failed = outcome.pages_failed,
            results = outcome.records.len(),
            "Finished crawl"
        );
        self.emit(CrawlEvent::SiteFinished {
            site,
            results: outcome.records.len(),
        });
        Ok(outcome)
    }

    /// Visited-set key for `raw`, or `None` when the URL must be skipped
    fn admit(&self, site: &str, raw: &str, visited: &HashSet<String>) -> Option<String> {
        self.crawlable(site, raw).filter(|url| !visited.contains(url))
    }

    /// Fragment-free form of `raw` when the domain and file-type rules allow it
    fn crawlable(&self, site: &str, raw: &str) -> Option<String> {
        let url = strip_fragment(Url::parse(raw).ok()?).to_string();
        if self.config.same_domain_only && !same_domain(site, &url) {
            return None;
        }
        if looks_like_binary(&url) || (is_pdf(&url) && !self.config.follow_pdfs) {
            return None;
        }
        Some(url)
    }

    fn process_page(
        &self,
        site: &str,
        url: &str,
        page: &FetchedPage,
        frontier: &mut Frontier,
    ) -> Option<ResultRecord> {
        let content = PageContent::from_fetched(page);

        if let PageClassification::Listing(items) = &content.classification {
            let links: Vec<&str> = items.iter().map(|item| item.url.as_str()).collect();
            let added = self.enqueue(site, &links, MAX_LISTING_LINKS, frontier);
            debug!(url, items = items.len(), added, "Listing page");
            return None;
        }

        let related = if self.config.follow_pdfs {
            let links: Vec<&str> = content
                .pdf_links
                .iter()
                .map(String::as_str)
                .filter(|link| same_domain(site, link))
                .collect();
            self.enqueue(site, &links, links.len(), frontier);
            links.into_iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let date = parse_date(&content.date_raw);
        let matched_keywords = match self.filter.evaluate(&content.text, date) {
            FilterOutcome::Accepted { matched_keywords } => matched_keywords,
            FilterOutcome::Rejected(reason) => {
                debug!(url, ?reason, "Content page filtered out");
                return None;
            }
        };

        let fields = extract_fields(&content.text);
        Some(ResultRecord {
            source_site: site.to_string(),
            portal_type: portal_type_guess(url, &content.text),
            url: url.to_string(),
            title: content.title,
            normalized_date: date
                .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or(content.date_raw),
            matched_keywords,
            text_snippet: snippet(&content.text, SNIPPET_CHARS),
            tender_code: fields.tender_code,
            project_code: fields.project_code,
            amount_raw: fields.amount_raw,
            related_document_urls: related,
            proxy_used: page.proxy,
        })
    }

    /// Enqueue up to `cap` crawlable links that are neither visited nor already
    /// queued, without exceeding the remaining budget. Returns how many were added.
    fn enqueue(&self, site: &str, links: &[&str], cap: usize, frontier: &mut Frontier) -> usize {
        let remaining = self
            .config
            .max_pages
            .saturating_sub(frontier.visited.len());
        let limit = cap.min(remaining);

        let mut added = 0;
        for link in links {
            if added >= limit {
                break;
            }
            let Some(url) = self.crawlable(site, link) else {
                continue;
            };
            if frontier.push(&url) {
                added += 1;
            }
        }
        added
    }

    /// `base_delay + uniform(0, jitter)`
    fn page_delay(&self) -> Duration {
        let jitter = self.config.jitter.as_secs_f64();
        let extra = if jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..=jitter)
        } else {
            0.0
        };
        self.config.base_delay + Duration::from_secs_f64(extra)
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(sender) = &self.progress {
            // A dropped receiver only means nobody is watching
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::proxy_pool::ProxyPool;
    use crate::services::retriever::testing::{ScriptedRetriever, Step};

    const ROOT: &str = "https://comune.example.it/";

    fn config() -> CrawlConfig {
        CrawlConfig {
            respect_robots: false,
            max_retries: 1,
            retry_backoff_min: Duration::ZERO,
            retry_backoff_max: Duration::ZERO,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            seed_paths: Vec::new(),
            ..Default::default()
        }
    }

    fn crawler(retriever: Arc<ScriptedRetriever>, config: CrawlConfig) -> SiteCrawler {
        let config = Arc::new(config);
        let filter = Arc::new(PageFilter::from_config(&config).unwrap());
        let fetcher = Arc::new(Fetcher::new(
            retriever,
            Arc::new(ProxyPool::new(&[])),
            config.clone(),
        ));
        SiteCrawler::new(fetcher, config, filter)
    }

    fn listing(paths: &[String]) -> String {
        let links: String = paths
            .iter()
            .map(|p| format!(r#"<li><a href="{p}">Avviso pubblico numero {p}</a></li>"#))
            .collect();
        format!("<html><body><ul>{links}</ul></body></html>")
    }

    fn numbered(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/{prefix}/{i}")).collect()
    }

    #[test]
    fn test_listing_threshold_boundary() {
        let items = |n: usize| {
            (0..n)
                .map(|i| ListingItem {
                    url: format!("https://comune.example.it/{i}"),
                    title: format!("Voce {i}"),
                    date_hint: None,
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(classify(items(7)), PageClassification::Content);
        assert!(matches!(
            classify(items(8)),
            PageClassification::Listing(ref list) if list.len() == 8
        ));
    }

    #[test]
    fn test_document_name_uses_last_segment() {
        assert_eq!(
            document_name("https://comune.example.it/docs/bando-2024.pdf"),
            "bando-2024.pdf"
        );
        assert_eq!(document_name("https://comune.example.it/"), "https://comune.example.it/");
    }

    #[tokio::test]
    async fn test_page_budget_bounds_dequeues() {
        let mut retriever = ScriptedRetriever::new().html(ROOT, &listing(&numbered("atti", 30)));
        for path in numbered("atti", 30) {
            let url = format!("https://comune.example.it{path}");
            retriever = retriever.html(&url, &listing(&numbered(&path[1..], 10)));
        }
        let retriever = Arc::new(retriever);
        let crawler = crawler(
            retriever.clone(),
            CrawlConfig {
                max_pages: 5,
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        assert_eq!(outcome.pages_visited, 5);
        assert_eq!(retriever.requested().len(), 5);
    }

    #[tokio::test]
    async fn test_skipped_pdf_links_do_not_spend_budget() {
        let mut paths = vec!["/docs/0.pdf".to_string(), "/docs/1.pdf".to_string()];
        paths.extend(numbered("atti", 6));
        let retriever = Arc::new(ScriptedRetriever::new().html(ROOT, &listing(&paths)));
        let crawler = crawler(
            retriever.clone(),
            CrawlConfig {
                follow_pdfs: false,
                max_pages: 3,
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        assert_eq!(outcome.pages_visited, 3);
        assert_eq!(
            retriever.requested(),
            vec![
                ROOT.to_string(),
                "https://comune.example.it/atti/0".to_string(),
                "https://comune.example.it/atti/1".to_string(),
            ]
        );
    }

    #[test]
    fn test_pending_links_are_not_queued_twice() {
        let root = Url::parse(ROOT).unwrap();
        let mut frontier = Frontier::seeded(&root, &["/".to_string(), "/bandi".to_string()]);
        assert_eq!(frontier.queue.len(), 2);

        assert!(!frontier.push("https://comune.example.it/bandi"));
        assert!(frontier.push("https://comune.example.it/avvisi"));
        assert!(!frontier.push("https://comune.example.it/avvisi"));

        assert_eq!(frontier.pop().as_deref(), Some(ROOT));
        frontier.visited.insert(ROOT.to_string());
        assert!(!frontier.push(ROOT));
        assert_eq!(frontier.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_seven_links_is_content_eight_is_listing() {
        let retriever = Arc::new(
            ScriptedRetriever::new()
                .html(ROOT, &listing(&numbered("sette", 7)))
                .html("https://comune.example.it/otto", &listing(&numbered("otto", 8))),
        );

        let crawler_seven = crawler(retriever.clone(), config());
        let outcome = crawler_seven.crawl(ROOT).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.pages_visited, 1);

        let crawler_eight = crawler(retriever.clone(), config());
        let outcome = crawler_eight
            .crawl("https://comune.example.it/otto")
            .await
            .unwrap();
        assert!(outcome.records.is_empty());
        // listing page plus its eight links
        assert_eq!(outcome.pages_visited, 9);
    }

    #[tokio::test]
    async fn test_failed_page_is_dropped_and_crawl_continues() {
        let retriever = Arc::new(
            ScriptedRetriever::new()
                .html(ROOT, &listing(&numbered("atti", 8)))
                .route("https://comune.example.it/atti/0", vec![Step::Network])
                .html(
                    "https://comune.example.it/atti/1",
                    "<html><title>Bando</title><body>Bando di gara CIG: ABCDE12345</body></html>",
                ),
        );
        let crawler = crawler(
            retriever.clone(),
            CrawlConfig {
                include_keywords: vec!["bando".to_string()],
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        // /atti/2../atti/7 answer 404
        assert_eq!(outcome.pages_failed, 7);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.url, "https://comune.example.it/atti/1");
        assert_eq!(record.tender_code, "ABCDE12345");
        assert_eq!(record.matched_keywords, vec!["bando".to_string()]);
        assert_eq!(record.source_site, ROOT);
    }

    #[tokio::test]
    async fn test_off_domain_and_binary_links_skipped() {
        let body = r##"<html><body>
            <a href="https://altro.example.it/bando-di-gara">Bando di gara su altro sito</a>
            <a href="/immagini/logo-del-comune.png">Logo del comune di esempio</a>
            <a href="#contenuto-principale">Vai al contenuto principale</a>
        </body></html>"##;
        let retriever = Arc::new(ScriptedRetriever::new().html(ROOT, body));
        let crawler = crawler(
            retriever.clone(),
            CrawlConfig {
                seed_paths: vec![
                    "https://altro.example.it/albo".to_string(),
                    "/logo.png".to_string(),
                ],
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        assert_eq!(retriever.requested(), vec![ROOT.to_string()]);
        assert_eq!(outcome.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_pdf_links_harvested_and_evaluated() {
        let page = r#"<html><head><title>Determina</title></head><body>
            Affidamento del servizio mensa.
            <a href="/docs/determina-42.pdf">Determina</a>
        </body></html>"#;
        let retriever = Arc::new(
            ScriptedRetriever::new()
                .html(ROOT, page)
                .route(
                    "https://comune.example.it/docs/determina-42.pdf",
                    vec![Step::Pdf(
                        "Determina 42 del 05/03/2024 affidamento importo 12.500,00 euro".to_string(),
                    )],
                ),
        );
        let crawler = crawler(
            retriever,
            CrawlConfig {
                include_keywords: vec!["affidamento".to_string()],
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(
            outcome.records[0].related_document_urls,
            vec!["https://comune.example.it/docs/determina-42.pdf".to_string()]
        );
        let pdf = &outcome.records[1];
        assert_eq!(pdf.title, "determina-42.pdf");
        assert_eq!(pdf.normalized_date, "2024-03-05T00:00:00");
        assert_eq!(pdf.amount_raw, "12.500,00");
    }

    #[tokio::test]
    async fn test_pdfs_skipped_when_not_followed() {
        let page = r#"<html><body>Affidamento. <a href="/docs/determina-42.pdf">Determina</a></body></html>"#;
        let retriever = Arc::new(ScriptedRetriever::new().html(ROOT, page));
        let crawler = crawler(
            retriever.clone(),
            CrawlConfig {
                follow_pdfs: false,
                ..config()
            },
        );

        let outcome = crawler.crawl(ROOT).await.unwrap();

        assert_eq!(retriever.requested(), vec![ROOT.to_string()]);
        assert!(outcome.records[0].related_document_urls.is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_emitted() {
        let retriever = Arc::new(ScriptedRetriever::new().html(ROOT, "<p>Avviso</p>"));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let crawler = crawler(retriever, config()).with_progress(tx);

        crawler.crawl("comune.example.it").await.unwrap();
        drop(crawler);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                CrawlEvent::PageVisited {
                    site: ROOT.to_string(),
                    visited: 1,
                    max_pages: 50,
                    url: ROOT.to_string(),
                },
                CrawlEvent::ResultFound {
                    site: ROOT.to_string(),
                    url: ROOT.to_string(),
                },
                CrawlEvent::SiteFinished {
                    site: ROOT.to_string(),
                    results: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_site_rejected() {
        let crawler = crawler(Arc::new(ScriptedRetriever::new()), config());
        assert!(matches!(
            crawler.crawl("http://").await,
            Err(CrawlError::InvalidSite { .. })
        ));
    }
}
