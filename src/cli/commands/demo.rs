//! Implementation of the `rsc-cache demo` command.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DeferredValue};
use crate::domain::ports::ConnectionState;
use crate::services::{Cache, DiagnosticsSnapshot, LinearBackoff};

/// Arguments of `rsc-cache demo`.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of routes to render and cache
    #[arg(long, default_value_t = 3)]
    pub keys: usize,

    /// Simulated render time per route, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub delay_ms: u64,

    /// Observer endpoint (overrides the configured one)
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Result of a demo run.
#[derive(Debug, Serialize)]
pub struct DemoOutput {
    /// Endpoint the cache mirrored to.
    pub endpoint: String,
    /// Link state when the run ended.
    pub connection: ConnectionState,
    /// Cached keys, sorted.
    pub entries: Vec<String>,
    /// Lookups that found the in-flight value.
    pub dedup_hits: usize,
    /// Mirror counters at the end of the run.
    pub diagnostics: DiagnosticsSnapshot,
}

impl CommandOutput for DemoOutput {
    fn to_human(&self) -> String {
        let d = &self.diagnostics;
        let mut lines = vec![
            format!("Mirror endpoint: {} ({})", self.endpoint, self.connection),
            format!("Cached entries: {}", self.entries.join(", ")),
            format!("Lookups served from cache: {}", self.dedup_hits),
            format!(
                "Snapshots sent: {}, dropped (retries exhausted): {}, dropped (closed): {}",
                d.messages_sent, d.sends_exhausted, d.sends_dropped_closed
            ),
        ];
        if d.missing_keys + d.malformed_messages + d.ignored_messages > 0 {
            lines.push(format!(
                "Inbound: {} missing keys, {} malformed, {} ignored",
                d.missing_keys, d.malformed_messages, d.ignored_messages
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Cache a few slow renders, wait for them to be mirrored and print a summary.
pub async fn execute(args: DemoArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut mirror = config.mirror.clone();
    if let Some(endpoint) = args.endpoint {
        mirror.endpoint = endpoint;
    }

    let cache: Cache<serde_json::Value> = Cache::connect(&mirror);
    let delay = Duration::from_millis(args.delay_ms);

    let mut pending = Vec::with_capacity(args.keys);
    let mut dedup_hits = 0;
    for index in 0..args.keys {
        let route = format!("/page/{index}");
        let value = cache.get_or_insert_with(&route, || {
            let route = route.clone();
            DeferredValue::spawn(async move {
                tokio::time::sleep(delay).await;
                json!({ "route": route, "renderedAt": Utc::now().to_rfc3339() })
            })
        });

        // A second request for the same route shares the in-flight render.
        if cache.get(&route).is_some_and(|cached| cached.ptr_eq(&value)) {
            dedup_hits += 1;
        }
        pending.push(value);
    }

    for value in &pending {
        value.wait().await;
    }
    info!(routes = args.keys, "All routes rendered");

    // Each publish may wait out its full retry budget before giving up.
    let backoff = LinearBackoff::from_config(&mirror);
    let budget: Duration = (0..mirror.max_retries).map(|n| backoff.delay_for(n)).sum();
    let expected = u64::try_from(args.keys).unwrap_or(u64::MAX);
    let _ = tokio::time::timeout(budget + Duration::from_secs(1), async {
        loop {
            let d = cache.diagnostics();
            if d.messages_sent + d.sends_exhausted + d.sends_dropped_closed >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    let result = DemoOutput {
        endpoint: mirror.endpoint.clone(),
        connection: cache.connection_state(),
        entries: cache.keys(),
        dedup_hits,
        diagnostics: cache.diagnostics(),
    };
    cache.shutdown();

    output(&result, json_mode);
    Ok(())
}
