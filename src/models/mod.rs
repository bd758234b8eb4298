// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod config;
pub mod fetch;
pub mod proxy;
pub mod record;
pub mod report;
