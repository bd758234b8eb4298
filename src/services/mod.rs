// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod extractor;
pub mod fetcher;
pub mod filters;
pub mod logging;
pub mod orchestrator;
pub mod proxy_pool;
pub mod retriever;
pub mod robots;
pub mod site_crawler;
