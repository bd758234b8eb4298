// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Crawler for Italian public-sector portals ("albo pretorio",
//! "amministrazione trasparente", "bandi di gara") that finds procurement
//! notices and extracts CIG, CUP, amounts and dates.

pub mod models;
pub mod services;

pub use models::config::{ConfigError, CrawlConfig};
pub use models::record::ResultRecord;
pub use models::report::{CrawlError, CrawlEvent, CrawlReport};
pub use services::orchestrator::Orchestrator;
pub use services::retriever::{HttpRetriever, Retriever};
