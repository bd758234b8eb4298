// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured proxy, identified by its position in the proxy list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub id: usize,
    pub address: String,
}

/// Proxy selected for a single retrieval attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyChoice {
    /// Connect directly
    NoProxy,
    /// Route the request through this proxy
    UseProxy(ProxyEntry),
}

impl ProxyChoice {
    /// Identity of the chosen proxy, `None` for direct connections
    pub fn id(&self) -> Option<usize> {
        match self {
            ProxyChoice::NoProxy => None,
            ProxyChoice::UseProxy(entry) => Some(entry.id),
        }
    }
}

/// Health counters kept for every proxy during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Stats row reported at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyReport {
    pub id: usize,
    /// Address with credentials redacted
    pub address: String,
    #[serde(flatten)]
    pub stats: ProxyStats,
}
