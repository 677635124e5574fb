//! HTTP client with the timeouts the patch pipeline expects.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Hard ceiling for transfers.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
/// Hard ceiling for latency probes.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared HTTP client. Cloning is cheap; all clones pool connections.
#[derive(Debug, Clone)]
pub struct CdnClient {
    transfer: reqwest::Client,
    probe: reqwest::Client,
}

impl CdnClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            transfer: reqwest::Client::builder()
                .timeout(TRANSFER_TIMEOUT)
                .build()?,
            probe: reqwest::Client::builder().timeout(PING_TIMEOUT).build()?,
        })
    }

    /// Plain GET. Any non-2xx response is an error carrying the status.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        trace!(url, "GET");
        let response = self.transfer.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Ranged GET using inclusive byte ranges. Both 206 and a plain 2xx
    /// (servers that ignore the header) are accepted.
    pub async fn get_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        trace!(url, offset, length, "GET range");
        let mut request = self.transfer.get(url);
        if let Some(range) = range_header(offset, length) {
            request = request.header(reqwest::header::RANGE, range);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() != 206 && !status.is_success() {
            return Err(Error::Status {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// HEAD probe returning wall-clock latency. Any answered request
    /// counts as reachable, whatever the status.
    pub async fn ping(&self, url: &str) -> Result<Duration> {
        let start = Instant::now();
        self.probe.head(url).send().await?;
        let elapsed = start.elapsed();
        debug!(url, ?elapsed, "pinged host");
        Ok(elapsed)
    }
}

/// `Range` header value for `[offset, offset + length)`, or `None` when the
/// request is for the whole resource.
fn range_header(offset: u64, length: u64) -> Option<String> {
    if length > 0 {
        Some(format!("bytes={}-{}", offset, offset + length - 1))
    } else if offset > 0 {
        Some(format!("bytes={offset}-"))
    } else {
        None
    }
}

/// CDN path fragment for a hex key: `"abcdef..."` → `"ab/cd/abcdef..."`.
/// Keys too short to shard pass through unchanged.
pub fn format_cdn_key(key: &str) -> String {
    if key.len() < 4 {
        return key.to_string();
    }
    format!("{}/{}/{}", &key[..2], &key[2..4], key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_is_inclusive() {
        assert_eq!(range_header(0, 100).as_deref(), Some("bytes=0-99"));
        assert_eq!(range_header(4096, 10).as_deref(), Some("bytes=4096-4105"));
        assert_eq!(range_header(512, 0).as_deref(), Some("bytes=512-"));
        assert_eq!(range_header(0, 0), None);
    }

    #[test]
    fn cdn_key_sharding() {
        assert_eq!(
            format_cdn_key("abcdef0123456789"),
            "ab/cd/abcdef0123456789"
        );
        assert_eq!(format_cdn_key("ab"), "ab");
    }
}
