// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};

/// Coarse category of a public-administration web section.
/// Variant order is the tie-break order used by `portal_type_guess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalType {
    /// Online bulletin board ("albo pretorio")
    AlboPretorio,
    /// "Amministrazione trasparente" section
    Trasparenza,
    /// Tenders and calls section
    Gare,
    News,
    Generic,
}

impl PortalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortalType::AlboPretorio => "albo_pretorio",
            PortalType::Trasparenza => "trasparenza",
            PortalType::Gare => "gare",
            PortalType::News => "news",
            PortalType::Generic => "generic",
        }
    }
}

impl std::fmt::Display for PortalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link harvested from a page that looks like a list of documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Absolute URL without fragment
    pub url: String,
    pub title: String,
    /// Date-like text found in the same table row, if any
    pub date_hint: Option<String>,
}

/// How a fetched page is treated by the site crawler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageClassification {
    /// Navigation hub: its links are followed, the page itself is not a result
    Listing(Vec<ListingItem>),
    /// Evaluated against the filters
    Content,
}

/// Procurement identifiers pulled out of page text. Empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// CIG, the 10-character tender code
    pub tender_code: String,
    /// CUP, the 15-character project code
    pub project_code: String,
    /// Amount next to a euro sign, as written in the page
    pub amount_raw: String,
}

/// One matching document found during a crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub source_site: String,
    pub portal_type: PortalType,
    pub url: String,
    pub title: String,
    /// ISO-8601 date when parseable, otherwise the raw date text
    pub normalized_date: String,
    pub matched_keywords: Vec<String>,
    pub text_snippet: String,
    pub tender_code: String,
    pub project_code: String,
    pub amount_raw: String,
    pub related_document_urls: Vec<String>,
    pub proxy_used: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_type_serializes_snake_case() {
        let json = serde_json::to_string(&PortalType::AlboPretorio).unwrap();
        assert_eq!(json, "\"albo_pretorio\"");
        assert_eq!(PortalType::Generic.to_string(), "generic");
    }
}
