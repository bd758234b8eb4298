// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! URL policy checks and page inclusion filters.

use crate::models::config::{ConfigError, CrawlConfig};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use url::Url;

/// Extensions never worth fetching. PDFs are deliberately absent:
/// whether they are followed is a crawl setting.
pub const BINARY_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp", ".css", ".js", ".zip",
    ".rar", ".7z", ".gz", ".tar", ".mp4", ".mp3", ".avi", ".mov", ".wav", ".woff", ".woff2",
    ".ttf",
];

/// Prepend `https://` when the URL has no scheme
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Exact host equality. `www.comune.it` and `comune.it` are different hosts.
pub fn same_domain(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.host_str().is_some() && a.host_str() == b.host_str(),
        _ => false,
    }
}

fn path_lowercase(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_lowercase())
}

/// Whether the URL path ends with a known binary extension
pub fn looks_like_binary(url: &str) -> bool {
    path_lowercase(url)
        .map(|path| BINARY_EXTENSIONS.iter().any(|ext| path.ends_with(ext)))
        .unwrap_or(false)
}

pub fn is_pdf(url: &str) -> bool {
    path_lowercase(url)
        .map(|path| path.ends_with(".pdf"))
        .unwrap_or(false)
}

/// Outcome of the keyword check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub accepted: bool,
    /// Include terms found in the text, in include-list order
    pub matched: Vec<String>,
}

/// Case-insensitive substring matching.
///
/// With a non-empty include list at least one term must be present. Pages that
/// survive the include check are rejected when any exclude term is present.
pub fn keyword_filter(text: &str, include: &[String], exclude: &[String]) -> KeywordMatch {
    let haystack = text.to_lowercase();
    let contains = |term: &String| {
        let term = term.trim().to_lowercase();
        !term.is_empty() && haystack.contains(&term)
    };

    let matched: Vec<String> = include.iter().filter(|t| contains(*t)).cloned().collect();
    if !include.is_empty() && matched.is_empty() {
        return KeywordMatch {
            accepted: false,
            matched: Vec::new(),
        };
    }

    if exclude.iter().any(|t| contains(t)) {
        return KeywordMatch {
            accepted: false,
            matched,
        };
    }

    KeywordMatch {
        accepted: true,
        matched,
    }
}

/// Inclusive date-range check.
/// Undated pages pass only when no bound is set, unless `keep_undated` is on.
pub fn in_date_range(
    date: Option<NaiveDateTime>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    keep_undated: bool,
) -> bool {
    let Some(date) = date else {
        return keep_undated || (from.is_none() && to.is_none());
    };
    let day = date.date();
    if from.is_some_and(|from| day < from) {
        return false;
    }
    if to.is_some_and(|to| day > to) {
        return false;
    }
    true
}

/// Why a content page was not turned into a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Keywords,
    Regex,
    DateRange,
}

/// Result of running a content page through every filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Accepted { matched_keywords: Vec<String> },
    Rejected(Rejection),
}

/// Keyword, regex and date filters compiled from a `CrawlConfig`
#[derive(Debug, Clone)]
pub struct PageFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    regex: Option<Regex>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    keep_undated: bool,
}

impl PageFilter {
    pub fn from_config(config: &CrawlConfig) -> Result<Self, ConfigError> {
        let (date_from, date_to) = config.date_bounds()?;
        Ok(Self {
            include: config.include_keywords.clone(),
            exclude: config.exclude_keywords.clone(),
            regex: config.compiled_regex()?,
            date_from,
            date_to,
            keep_undated: config.keep_undated,
        })
    }

    pub fn evaluate(&self, text: &str, date: Option<NaiveDateTime>) -> FilterOutcome {
        let keywords = keyword_filter(text, &self.include, &self.exclude);
        if !keywords.accepted {
            return FilterOutcome::Rejected(Rejection::Keywords);
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(text) {
                return FilterOutcome::Rejected(Rejection::Regex);
            }
        }
        if !in_date_range(date, self.date_from, self.date_to, self.keep_undated) {
            return FilterOutcome::Rejected(Rejection::DateRange);
        }
        FilterOutcome::Accepted {
            matched_keywords: keywords.matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("comune.example.it"), "https://comune.example.it");
        assert_eq!(normalize_url(" http://a.it/x "), "http://a.it/x");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn test_same_domain_is_exact() {
        assert!(same_domain("https://a.it/x", "http://a.it/y?z=1"));
        assert!(!same_domain("https://www.a.it/", "https://a.it/"));
        assert!(!same_domain("https://a.it/", "not a url"));
    }

    #[test]
    fn test_looks_like_binary() {
        assert!(looks_like_binary("https://a.it/img/LOGO.PNG"));
        assert!(looks_like_binary("https://a.it/archivio.zip?v=2"));
        assert!(!looks_like_binary("https://a.it/bando.pdf"));
        assert!(!looks_like_binary("https://a.it/pagina.html"));
        assert!(!looks_like_binary("https://a.it/?file=x.jpg"));
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("https://a.it/docs/Bando.PDF"));
        assert!(!is_pdf("https://a.it/pdf/elenco"));
    }

    #[test]
    fn test_keyword_exclude_wins_after_include() {
        let result = keyword_filter(
            "Bando di gara, nessuna rettifica",
            &terms(&["bando"]),
            &terms(&["rettifica"]),
        );
        assert!(!result.accepted);
    }

    #[test]
    fn test_keyword_no_include_constraint() {
        let result = keyword_filter("Bando di gara", &[], &terms(&["rettifica"]));
        assert!(result.accepted);
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_keyword_include_missing_rejects() {
        let result = keyword_filter("Avviso pubblico", &terms(&["bando"]), &[]);
        assert_eq!(
            result,
            KeywordMatch {
                accepted: false,
                matched: vec![]
            }
        );
    }

    #[test]
    fn test_keyword_matches_keep_include_order() {
        let result = keyword_filter(
            "Incarico e AFFIDAMENTO diretto",
            &terms(&["affidamento", "bando", "incarico"]),
            &[],
        );
        assert!(result.accepted);
        assert_eq!(result.matched, terms(&["affidamento", "incarico"]));
    }

    #[test]
    fn test_date_range_undated() {
        assert!(in_date_range(None, None, None, false));
        assert!(!in_date_range(None, Some(date(2024, 1, 1)), None, false));
        assert!(!in_date_range(None, None, Some(date(2024, 1, 1)), false));
        assert!(in_date_range(None, Some(date(2024, 1, 1)), None, true));
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let from = Some(date(2024, 1, 1));
        let to = Some(date(2024, 1, 31));
        let at = |d: NaiveDate| Some(d.and_hms_opt(15, 0, 0).unwrap());

        assert!(in_date_range(at(date(2024, 1, 1)), from, to, false));
        assert!(in_date_range(at(date(2024, 1, 31)), from, to, false));
        assert!(!in_date_range(at(date(2023, 12, 31)), from, to, false));
        assert!(!in_date_range(at(date(2024, 2, 1)), from, to, false));
    }

    #[test]
    fn test_page_filter_applies_all_filters() {
        let config = CrawlConfig {
            include_keywords: terms(&["bando"]),
            regex_pattern: Some(r"CIG\s*\w{10}".to_string()),
            date_from: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        let filter = PageFilter::from_config(&config).unwrap();
        let recent = NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0));

        assert_eq!(
            filter.evaluate("Bando CIG 1234567890", recent),
            FilterOutcome::Accepted {
                matched_keywords: terms(&["bando"])
            }
        );
        assert_eq!(
            filter.evaluate("Avviso CIG 1234567890", recent),
            FilterOutcome::Rejected(Rejection::Keywords)
        );
        assert_eq!(
            filter.evaluate("Bando senza codice", recent),
            FilterOutcome::Rejected(Rejection::Regex)
        );
        assert_eq!(
            filter.evaluate("Bando CIG 1234567890", None),
            FilterOutcome::Rejected(Rejection::DateRange)
        );
    }
}
