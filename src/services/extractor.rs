// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Text and field extraction from fetched pages.
//!
//! Everything here is synchronous and deterministic. Parsed documents
//! (`scraper::Html`) never leave this module, so callers can hold the
//! results across await points.

use crate::models::record::{ExtractedFields, ListingItem, PortalType};
use crate::services::filters::{is_pdf, looks_like_binary, strip_fragment};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Anchors with shorter visible text are treated as navigation chrome
pub const MIN_LINK_TEXT_CHARS: usize = 12;

/// Hint phrases per portal category, in tie-break order
const PORTAL_HINTS: &[(PortalType, &[&str])] = &[
    (
        PortalType::AlboPretorio,
        &["albo pretorio", "albo online", "atti"],
    ),
    (
        PortalType::Trasparenza,
        &["amministrazione trasparente", "trasparenza"],
    ),
    (
        PortalType::Gare,
        &["gare", "bandi", "avvisi", "affidamenti"],
    ),
    (PortalType::News, &["news", "notizie", "comunicati"]),
];

/// Structured date locations, by priority
const DATE_LOCATIONS: &[(&str, &str)] = &[
    (r#"meta[property="article:published_time"]"#, "content"),
    (r#"meta[property="article:modified_time"]"#, "content"),
    (r#"meta[name="date"]"#, "content"),
    ("time[datetime]", "datetime"),
];

const MONTHS: &[(&str, u32)] = &[
    ("gennaio", 1),
    ("gen", 1),
    ("january", 1),
    ("jan", 1),
    ("febbraio", 2),
    ("feb", 2),
    ("february", 2),
    ("marzo", 3),
    ("mar", 3),
    ("march", 3),
    ("aprile", 4),
    ("apr", 4),
    ("april", 4),
    ("maggio", 5),
    ("mag", 5),
    ("may", 5),
    ("giugno", 6),
    ("giu", 6),
    ("june", 6),
    ("jun", 6),
    ("luglio", 7),
    ("lug", 7),
    ("july", 7),
    ("jul", 7),
    ("agosto", 8),
    ("ago", 8),
    ("august", 8),
    ("aug", 8),
    ("settembre", 9),
    ("set", 9),
    ("september", 9),
    ("sep", 9),
    ("sept", 9),
    ("ottobre", 10),
    ("ott", 10),
    ("october", 10),
    ("oct", 10),
    ("novembre", 11),
    ("nov", 11),
    ("november", 11),
    ("dicembre", 12),
    ("dic", 12),
    ("december", 12),
    ("dec", 12),
];

static RE_DATE_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})\b").unwrap());
static RE_DAY_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{2,4})\b").unwrap());
static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static RE_DAY_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:°|º)?\s+([[:alpha:]]{3,9})\.?\s+(\d{4})\b").unwrap()
});
static RE_MONTH_NAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([[:alpha:]]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})\b").unwrap()
});
static RE_CIG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCIG\b[:\s]*([A-Z0-9]{10})\b").unwrap());
static RE_CUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCUP\b[:\s]*([A-Z0-9]{15})\b").unwrap());
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:€|\beuro?\b)\s?(\d[\d.,]*\d|\d)|(\d[\d.,]*\d|\d)\s?(?:€|\beuro?\b)",
    )
    .unwrap()
});

static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static SEL_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static SEL_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Everything the site crawler needs from one HTML page, parsed once
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub title: String,
    /// Visible text with whitespace collapsed
    pub text: String,
    /// Raw date string, empty when none was found
    pub date_raw: String,
    pub listing_items: Vec<ListingItem>,
    pub pdf_links: Vec<String>,
}

/// Parse `html` once and pull out title, text, date and links
pub fn analyze_html(html: &str, base_url: &str) -> PageView {
    let document = Html::parse_document(html);
    let text = visible_text(&document);

    PageView {
        title: document_title(&document),
        date_raw: document_date(&document, &text),
        listing_items: document_listing_items(&document, base_url),
        pdf_links: document_pdf_links(&document, base_url),
        text,
    }
}

/// Collapse every whitespace run to a single space and trim
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Guess the portal section from hint phrases in the URL and the page text.
/// Ties go to the category declared first; no hint at all gives `Generic`.
pub fn portal_type_guess(url: &str, text: &str) -> PortalType {
    let url_words: String = url
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '/') { ' ' } else { c })
        .collect();
    let haystack = format!("{} {} {}", url, url_words, text).to_lowercase();

    let mut best = PortalType::Generic;
    let mut best_score = 0;
    for (portal, hints) in PORTAL_HINTS {
        let score = hints.iter().filter(|h| haystack.contains(*h)).count();
        if score > best_score {
            best = *portal;
            best_score = score;
        }
    }
    best
}

/// Raw publication date of a page, or an empty string
pub fn extract_date(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = visible_text(&document);
    document_date(&document, &text)
}

/// Lenient, day-first date parsing. Returns `None` for anything unparseable.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    parse_date_in_text(raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_date_in_text(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = RE_ISO_DATE.captures(text) {
        let date = ymd(&caps[1], &caps[2], &caps[3]);
        if date.is_some() {
            return date;
        }
    }

    for caps in RE_DAY_FIRST.captures_iter(text) {
        let Some(year) = full_year(&caps[3]) else {
            continue;
        };
        // Day first; fall back to month first when that is not a valid date
        let date = ymd(&year.to_string(), &caps[2], &caps[1])
            .or_else(|| ymd(&year.to_string(), &caps[1], &caps[2]));
        if date.is_some() {
            return date;
        }
    }

    for caps in RE_DAY_MONTH_NAME.captures_iter(text) {
        if let Some(month) = month_number(&caps[2]) {
            if let Some(date) = ymd(&caps[3], &month.to_string(), &caps[1]) {
                return Some(date);
            }
        }
    }

    for caps in RE_MONTH_NAME_DAY.captures_iter(text) {
        if let Some(month) = month_number(&caps[1]) {
            if let Some(date) = ymd(&caps[3], &month.to_string(), &caps[2]) {
                return Some(date);
            }
        }
    }

    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn full_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    match year.len() {
        2 => Some(2000 + value),
        4 => Some(value),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// Pull CIG, CUP and the first euro amount out of page text
pub fn extract_fields(text: &str) -> ExtractedFields {
    let tender_code = RE_CIG
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let project_code = RE_CUP
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let amount_raw = RE_AMOUNT
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    ExtractedFields {
        tender_code,
        project_code,
        amount_raw,
    }
}

/// Harvest document links: first link of every table row, then every anchor
/// with enough visible text. Results are absolute, fragment-free and unique.
pub fn extract_listing_items(html: &str, base_url: &str) -> Vec<ListingItem> {
    document_listing_items(&Html::parse_document(html), base_url)
}

/// Same-site candidates for PDF documents linked from the page
pub fn extract_pdf_links(html: &str, base_url: &str) -> Vec<String> {
    document_pdf_links(&Html::parse_document(html), base_url)
}

/// Printable text runs from a binary body such as a PDF
pub fn binary_text(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let mut runs = Vec::new();
    let mut current = String::new();

    for c in decoded.chars() {
        if c == '\u{FFFD}' || (c.is_control() && !c.is_whitespace()) {
            push_run(&mut runs, &mut current);
        } else {
            current.push(c);
        }
    }
    push_run(&mut runs, &mut current);

    clean_text(&runs.join(" "))
}

fn push_run(runs: &mut Vec<String>, current: &mut String) {
    if current.chars().filter(|c| !c.is_whitespace()).count() >= 4 {
        runs.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Text of the page outside script, style and noscript elements
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let content = fragment.trim();
        if !content.is_empty() {
            text.push(' ');
            text.push_str(content);
        }
    }

    clean_text(&text)
}

/// `<title>`, falling back to the first `<h1>`
pub fn document_title(document: &Html) -> String {
    for selector in [&*SEL_TITLE, &*SEL_H1] {
        if let Some(element) = document.select(selector).next() {
            let title = element_text(&element);
            if !title.is_empty() {
                return title;
            }
        }
    }
    String::new()
}

fn document_date(document: &Html, text: &str) -> String {
    for (css, attr) in DATE_LOCATIONS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let value = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(value) = value {
            return value.to_string();
        }
    }

    date_hint(text).unwrap_or_default()
}

/// First `DD/MM/YYYY`-like substring in `text`
pub fn date_hint(text: &str) -> Option<String> {
    RE_DATE_HINT.captures(text).map(|c| c[1].to_string())
}

fn document_listing_items(document: &Html, base_url: &str) -> Vec<ListingItem> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();

    for row in document.select(&SEL_ROW) {
        let Some(link) = row.select(&SEL_LINK).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        candidates.push((href, element_text(&link), date_hint(&element_text(&row))));
    }

    for link in document.select(&SEL_LINK) {
        let title = element_text(&link);
        if title.chars().count() < MIN_LINK_TEXT_CHARS {
            continue;
        }
        if let Some(href) = link.value().attr("href") {
            candidates.push((href, title, None));
        }
    }

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (href, title, date_hint) in candidates {
        let Some(url) = resolve_link(&base, href) else {
            continue;
        };
        if looks_like_binary(&url) || !seen.insert(url.clone()) {
            continue;
        }
        items.push(ListingItem {
            url,
            title,
            date_hint,
        });
    }
    items
}

fn document_pdf_links(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&SEL_LINK)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .filter(|url| is_pdf(url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Resolve `href` against `base`; only http(s) targets survive
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    Some(strip_fragment(resolved).to_string())
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}
