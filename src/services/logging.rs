// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Logging setup and redaction of sensitive values.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "tender_scout=debug"
    } else {
        "tender_scout=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Redact a proxy address for logging.
/// Keeps scheme, host and port, hides credentials: "http://***@proxy:8080"
pub fn redact_proxy_address(address: &str) -> String {
    match url::Url::parse(address) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("***");
            let port = parsed
                .port()
                .map(|p| format!(":{}", p))
                .unwrap_or_default();
            if parsed.username().is_empty() && parsed.password().is_none() {
                format!("{}://{}{}", parsed.scheme(), host, port)
            } else {
                format!("{}://***@{}{}", parsed.scheme(), host, port)
            }
        }
        // Unparseable address, redact completely
        Err(_) => "***".to_string(),
    }
}
