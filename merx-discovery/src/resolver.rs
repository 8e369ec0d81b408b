//! Capability discovery across candidate supplier endpoints.
//!
//! Lookups fan out concurrently under a per-call timeout and a global
//! deadline. A candidate that errors, times out, lacks the capability, or
//! serves a malformed profile is skipped; no single failure aborts the
//! batch. Results are unordered; ranking is the caller's concern.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};

use merx_shared::DISCOVERY_PATH;

use crate::profile::DiscoveryProfile;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Budget for one candidate's profile fetch.
    pub per_call_timeout: Duration,
    /// Deadline for the whole batch; stragglers past it are discarded.
    pub global_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(2),
            global_timeout: Duration::from_secs(5),
        }
    }
}

/// One viable supplier for an item, as advertised by its profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierQuote {
    /// Discovery URL the profile was fetched from.
    pub discovery_url: String,
    /// Transport endpoint of the required capability.
    pub api_endpoint: String,
    /// Unit price in minor currency units.
    pub unit_price: i64,
    pub in_stock: bool,
}

pub struct SupplierDiscoveryResolver {
    http: reqwest::Client,
    config: ResolverConfig,
}

impl SupplierDiscoveryResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.per_call_timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { http, config }
    }

    /// Query every candidate for `capability` and `item_id`, returning the
    /// quotes that settled before the global deadline.
    pub async fn discover(
        &self,
        candidates: &[String],
        capability: &str,
        item_id: &str,
    ) -> Vec<SupplierQuote> {
        let mut lookups: FuturesUnordered<_> = candidates
            .iter()
            .map(|base| self.probe(base, capability, item_id))
            .collect();

        let mut quotes = Vec::new();
        let deadline = tokio::time::sleep(self.config.global_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!(
                        settled = quotes.len(),
                        total = candidates.len(),
                        "discovery deadline elapsed, discarding stragglers"
                    );
                    break;
                }
                next = lookups.next() => match next {
                    Some(Some(quote)) => quotes.push(quote),
                    Some(None) => {}
                    None => break,
                },
            }
        }
        quotes
    }

    async fn probe(
        &self,
        base_url: &str,
        capability: &str,
        item_id: &str,
    ) -> Option<SupplierQuote> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), DISCOVERY_PATH);
        tracing::debug!(%url, "fetching discovery profile");

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(%url, %err, "supplier unreachable, skipping");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(%url, status = %response.status(), "discovery rejected, skipping");
            return None;
        }

        let profile: DiscoveryProfile = match response.json().await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%url, %err, "malformed discovery profile, skipping");
                return None;
            }
        };

        let api_endpoint = profile.capability_endpoint(capability)?.to_string();
        let entry = profile.inventory.get(item_id)?;

        Some(SupplierQuote {
            discovery_url: base_url.to_string(),
            api_endpoint,
            unit_price: entry.price,
            in_stock: entry.in_stock,
        })
    }
}
