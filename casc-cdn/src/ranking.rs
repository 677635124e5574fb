//! Latency-ordered CDN host selection.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::client::CdnClient;
use crate::error::{Error, Result};

/// CDN base URLs ordered fastest-first, each already carrying the serving
/// path (`https://host/path/`).
#[derive(Debug, Clone)]
pub struct RankedHosts {
    urls: Vec<String>,
}

impl RankedHosts {
    /// Build from pre-ranked base URLs. Used directly by tests; production
    /// code goes through [`CdnClient::rank_hosts`].
    pub fn from_urls(urls: Vec<String>) -> Self {
        Self { urls }
    }

    /// The fastest host.
    pub fn primary(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl CdnClient {
    /// Probe every host in the whitespace-separated `hosts` list and rank
    /// the survivors by round-trip time. Hosts that never answer are
    /// dropped permanently from this ranking.
    pub async fn rank_hosts(&self, hosts: &str, path: &str) -> Result<RankedHosts> {
        let probes = hosts.split_whitespace().map(|host| {
            let base = format!("https://{host}/");
            async move {
                match self.ping(&base).await {
                    Ok(latency) => Some((base, latency)),
                    Err(e) => {
                        warn!(host, "dropping unreachable CDN host: {e}");
                        None
                    }
                }
            }
        });

        let mut reachable: Vec<(String, std::time::Duration)> =
            join_all(probes).await.into_iter().flatten().collect();
        if reachable.is_empty() {
            return Err(Error::NoReachableHosts);
        }
        reachable.sort_by_key(|(_, latency)| *latency);

        let urls = reachable
            .into_iter()
            .map(|(base, _)| format!("{base}{path}/"))
            .collect();
        let ranked = RankedHosts { urls };
        debug!(primary = ranked.primary(), hosts = ranked.len(), "ranked CDN hosts");
        Ok(ranked)
    }

    /// GET `suffix` from the ranked hosts in order, returning the first
    /// success or the last failure.
    pub async fn get_with_fallback(&self, hosts: &RankedHosts, suffix: &str) -> Result<Vec<u8>> {
        let mut last_err = Error::NoReachableHosts;
        for base in hosts.urls() {
            match self.get(&format!("{base}{suffix}")).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!(%base, suffix, "CDN fetch failed, trying next host: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Ranged GET with the same fallback policy as [`get_with_fallback`].
    ///
    /// [`get_with_fallback`]: CdnClient::get_with_fallback
    pub async fn get_range_with_fallback(
        &self,
        hosts: &RankedHosts,
        suffix: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>> {
        let mut last_err = Error::NoReachableHosts;
        for base in hosts.urls() {
            match self.get_range(&format!("{base}{suffix}"), offset, length).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!(%base, suffix, "ranged CDN fetch failed, trying next host: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_host_accessors() {
        let hosts = RankedHosts::from_urls(vec![
            "https://fast.example/tpr/wow/".to_string(),
            "https://slow.example/tpr/wow/".to_string(),
        ]);
        assert_eq!(hosts.primary(), Some("https://fast.example/tpr/wow/"));
        assert_eq!(hosts.len(), 2);

        let empty = RankedHosts::from_urls(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.primary(), None);
    }
}
