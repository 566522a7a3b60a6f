//! MX provider resolution over DNS-over-HTTPS.
//!
//! Lookups go through the JSON flavour of DoH (`application/dns-json`),
//! rotating across the configured servers. Results are classified into a
//! coarse provider label and cached for the life of the process.

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// DNS record type number for MX answers
const MX_RECORD_TYPE: u64 = 15;

/// Coarse classification of a domain's mail infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MxProvider {
    Google,
    Microsoft,
    Yahoo,
    Zoho,
    ProtonMail,
    Other,
    NoMxRecords,
    Error,
    Unknown,
}

impl MxProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            MxProvider::Google => "Google",
            MxProvider::Microsoft => "Microsoft",
            MxProvider::Yahoo => "Yahoo",
            MxProvider::Zoho => "Zoho",
            MxProvider::ProtonMail => "ProtonMail",
            MxProvider::Other => "Other",
            MxProvider::NoMxRecords => "No MX records",
            MxProvider::Error => "Error",
            MxProvider::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MxProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider families matched by substring against MX hosts, first match wins.
const PROVIDER_MARKERS: &[(MxProvider, &[&str])] = &[
    (MxProvider::Google, &["google", "gmail"]),
    (MxProvider::Microsoft, &["outlook", "microsoft", "hotmail", "office365"]),
    (MxProvider::Yahoo, &["yahoo"]),
    (MxProvider::Zoho, &["zoho"]),
    (MxProvider::ProtonMail, &["protonmail"]),
];

/// Classify a domain from its MX target hosts.
pub fn classify_mx_hosts<S: AsRef<str>>(hosts: &[S]) -> MxProvider {
    if hosts.is_empty() {
        return MxProvider::NoMxRecords;
    }

    let lowered: Vec<String> = hosts.iter().map(|h| h.as_ref().to_lowercase()).collect();

    PROVIDER_MARKERS
        .iter()
        .find(|(_, markers)| {
            lowered
                .iter()
                .any(|host| markers.iter().any(|m| host.contains(m)))
        })
        .map(|(provider, _)| *provider)
        .unwrap_or(MxProvider::Other)
}

/// Host part of an MX answer `data` field (`"10 aspmx.l.google.com."`).
fn mx_target_host(data: &str) -> Option<String> {
    let host = data.split_whitespace().last()?.trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_string())
}

/// Process-wide MX result cache.
///
/// Cloning yields another handle to the same map. Each key is written once;
/// later writes for the same domain are ignored.
#[derive(Debug, Clone, Default)]
pub struct MxCache {
    entries: Arc<RwLock<HashMap<String, MxProvider>>>,
}

impl MxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str) -> Option<MxProvider> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(domain).copied()
    }

    /// Store `provider` unless the domain already has an entry. Returns the
    /// value that ends up cached.
    pub fn insert_if_absent(&self, domain: &str, provider: MxProvider) -> MxProvider {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *entries.entry(domain.to_string()).or_insert(provider)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// DNS over HTTPS server configuration (runtime loaded from config)
#[derive(Debug, Clone)]
struct DohServer {
    url: String,
    name: String,
    timeout_secs: u64,
}

/// MX resolver backed by a rotating pool of DoH servers
pub struct MxResolver {
    doh_servers: Vec<DohServer>,
    current_doh_index: AtomicUsize,
    client: reqwest::Client,
    cache: MxCache,
    batch_size: usize,
    batch_delay: Duration,
}

impl MxResolver {
    /// Create a resolver from configuration, sharing `cache`
    pub fn from_config(config: &AppConfig, cache: MxCache) -> Result<Self> {
        let doh_servers = config
            .dns
            .doh_servers
            .iter()
            .map(|s| DohServer {
                url: s.url.clone(),
                name: s.name.clone(),
                timeout_secs: s.timeout_secs,
            })
            .collect();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.request_timeout_secs))
            .user_agent(&config.http.user_agent)
            .build()
            .context("Failed to create HTTP client for DoH")?;

        Ok(Self {
            doh_servers,
            current_doh_index: AtomicUsize::new(0),
            client,
            cache,
            batch_size: config.mx.batch_size.max(1),
            batch_delay: Duration::from_millis(config.mx.batch_delay_ms),
        })
    }

    /// Create a resolver against explicit DoH endpoint URLs.
    ///
    /// Used to point lookups at a local or mocked resolver:
    /// ```ignore
    /// let mock_server = wiremock::MockServer::start().await;
    /// let resolver = MxResolver::with_servers(vec![format!("{}/resolve", mock_server.uri())], MxCache::new())?;
    /// ```
    pub fn with_servers(urls: Vec<String>, cache: MxCache) -> Result<Self> {
        let doh_servers = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| DohServer {
                url,
                name: format!("DoH Server {}", i + 1),
                timeout_secs: 5,
            })
            .collect();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("leadcleaner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client for DoH")?;

        Ok(Self {
            doh_servers,
            current_doh_index: AtomicUsize::new(0),
            client,
            cache,
            batch_size: 30,
            batch_delay: Duration::ZERO,
        })
    }

    /// Override the number of domains resolved per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Configured batch size for [`MxResolver::batch_resolve`]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn cache(&self) -> &MxCache {
        &self.cache
    }

    /// Get the next DoH server in rotation
    fn next_doh_server(&self) -> Option<&DohServer> {
        if self.doh_servers.is_empty() {
            return None;
        }
        let index = self.current_doh_index.fetch_add(1, Ordering::Relaxed) % self.doh_servers.len();
        Some(&self.doh_servers[index])
    }

    /// Perform DNS over HTTPS lookup for MX records
    async fn doh_mx_lookup(&self, domain: &str, server: &DohServer) -> Result<Vec<String>> {
        debug!("DoH MX lookup for {} using {}", domain, server.name);

        let query_params = [("name", domain), ("type", "MX")];

        let response = self
            .client
            .get(&server.url)
            .query(&query_params)
            .header("Accept", "application/dns-json")
            .timeout(Duration::from_secs(server.timeout_secs))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let mut hosts = Vec::new();

        if let Some(answers) = response["Answer"].as_array() {
            for answer in answers {
                if answer["type"].as_u64() == Some(MX_RECORD_TYPE) {
                    if let Some(host) = answer["data"].as_str().and_then(mx_target_host) {
                        hosts.push(host);
                    }
                }
            }
        }

        debug!("DoH found {} MX hosts for {} via {}", hosts.len(), domain, server.name);
        Ok(hosts)
    }

    /// MX target hosts for `domain`, uncached
    pub async fn lookup_mx_hosts(&self, domain: &str) -> Result<Vec<String>> {
        let server = self
            .next_doh_server()
            .context("No DoH servers configured")?;
        self.doh_mx_lookup(domain, server)
            .await
            .with_context(|| format!("MX lookup for {} via {} failed", domain, server.name))
    }

    /// Provider label for `domain`.
    ///
    /// Failures come back as [`MxProvider::Error`] rather than an `Err`; the
    /// label is cached like any other result.
    pub async fn resolve(&self, domain: &str) -> MxProvider {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return MxProvider::Unknown;
        }

        if let Some(cached) = self.cache.get(&domain) {
            return cached;
        }

        let provider = match self.lookup_mx_hosts(&domain).await {
            Ok(hosts) => classify_mx_hosts(&hosts),
            Err(e) => {
                warn!("{:#}", e);
                MxProvider::Error
            }
        };

        self.cache.insert_if_absent(&domain, provider)
    }

    /// Resolve many domains with bounded concurrency.
    ///
    /// Domains are trimmed, lowercased and deduplicated. Cache hits are
    /// answered directly; misses are resolved `batch_size` at a time with a
    /// pause between batches. `on_progress(done, total)` runs after each
    /// batch, where `total` counts cache misses.
    pub async fn batch_resolve<I, S, F>(
        &self,
        domains: I,
        batch_size: usize,
        mut on_progress: F,
    ) -> HashMap<String, MxProvider>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(usize, usize),
    {
        let mut seen = HashSet::new();
        let unique: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty() && seen.insert(d.clone()))
            .collect();

        let mut results = HashMap::with_capacity(unique.len());
        let mut misses = Vec::new();
        for domain in unique {
            match self.cache.get(&domain) {
                Some(provider) => {
                    results.insert(domain, provider);
                }
                None => misses.push(domain),
            }
        }

        if misses.is_empty() {
            debug!("All {} domains answered from MX cache", results.len());
            return results;
        }

        info!(
            "Resolving MX records for {} uncached domains ({} cached)",
            misses.len(),
            results.len()
        );

        let total = misses.len();
        let batch_size = batch_size.max(1);
        let batches: Vec<&[String]> = misses.chunks(batch_size).collect();
        let mut processed = 0;

        for (i, batch) in batches.iter().enumerate() {
            let resolved = join_all(batch.iter().map(|d| self.resolve(d))).await;
            for (domain, provider) in batch.iter().zip(resolved) {
                results.insert(domain.clone(), provider);
            }

            processed += batch.len();
            on_progress(processed, total);

            if i + 1 < batches.len() && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_providers() {
        assert_eq!(classify_mx_hosts(&["aspmx.l.google.com"]), MxProvider::Google);
        assert_eq!(classify_mx_hosts(&["alt1.gmail-smtp-in.l.google.com"]), MxProvider::Google);
        assert_eq!(
            classify_mx_hosts(&["acme-io.mail.protection.outlook.com"]),
            MxProvider::Microsoft
        );
        assert_eq!(classify_mx_hosts(&["mta5.am0.yahoodns.net"]), MxProvider::Yahoo);
        assert_eq!(classify_mx_hosts(&["mx.zoho.eu"]), MxProvider::Zoho);
        assert_eq!(classify_mx_hosts(&["mail.protonmail.ch"]), MxProvider::ProtonMail);
        assert_eq!(classify_mx_hosts(&["mx1.fastmail.com"]), MxProvider::Other);
    }

    #[test]
    fn test_classify_is_case_insensitive_and_ordered() {
        assert_eq!(classify_mx_hosts(&["ASPMX.L.GOOGLE.COM"]), MxProvider::Google);
        // Google outranks Microsoft when both appear
        assert_eq!(
            classify_mx_hosts(&["x.outlook.com", "aspmx.l.google.com"]),
            MxProvider::Google
        );
    }

    #[test]
    fn test_classify_empty_is_no_mx() {
        assert_eq!(classify_mx_hosts::<&str>(&[]), MxProvider::NoMxRecords);
    }

    #[test]
    fn test_provider_labels() {
        assert_eq!(MxProvider::NoMxRecords.to_string(), "No MX records");
        assert_eq!(MxProvider::ProtonMail.as_str(), "ProtonMail");
    }

    #[test]
    fn test_mx_target_host() {
        assert_eq!(mx_target_host("10 aspmx.l.google.com."), Some("aspmx.l.google.com".to_string()));
        assert_eq!(mx_target_host("mx.example.com"), Some("mx.example.com".to_string()));
        assert_eq!(mx_target_host("0 ."), None);
        assert_eq!(mx_target_host(""), None);
    }

    #[test]
    fn test_cache_is_write_once_and_shared() {
        let cache = MxCache::new();
        let handle = cache.clone();
        assert_eq!(cache.insert_if_absent("acme.io", MxProvider::Error), MxProvider::Error);
        assert_eq!(handle.insert_if_absent("acme.io", MxProvider::Google), MxProvider::Error);
        assert_eq!(handle.get("acme.io"), Some(MxProvider::Error));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_domain_is_unknown_without_lookup() {
        let resolver = MxResolver::with_servers(vec![], MxCache::new()).unwrap();
        assert_eq!(resolver.resolve("  ").await, MxProvider::Unknown);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cached_domains_skip_network() {
        let cache = MxCache::new();
        cache.insert_if_absent("acme.io", MxProvider::Zoho);
        // No servers configured: any network attempt would produce Error
        let resolver = MxResolver::with_servers(vec![], cache).unwrap();

        assert_eq!(resolver.resolve("ACME.io ").await, MxProvider::Zoho);

        let mut calls = 0;
        let results = resolver
            .batch_resolve(vec!["acme.io", "Acme.io", ""], 10, |_, _| calls += 1)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results["acme.io"], MxProvider::Zoho);
        assert_eq!(calls, 0);
    }
}
