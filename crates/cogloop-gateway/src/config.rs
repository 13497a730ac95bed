use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway-wide tunables. Per-provider retry counts live on `ProviderConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Cached results older than this are ignored and evicted.
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub history_capacity: usize,
    /// Backoff after failed attempt n is `min(base * 2^n, cap)`.
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Samples kept per quality metric for the statistics snapshot.
    pub quality_window: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30 * 60,
            cache_capacity: 256,
            history_capacity: 500,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 10_000,
            quality_window: 100,
        }
    }
}

impl GatewayConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor).min(self.backoff_cap_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.backoff(0), Duration::from_millis(1_000));
        assert_eq!(cfg.backoff(1), Duration::from_millis(2_000));
        assert_eq!(cfg.backoff(3), Duration::from_millis(8_000));
        assert_eq!(cfg.backoff(4), Duration::from_millis(10_000));
        assert_eq!(cfg.backoff(63), Duration::from_millis(10_000));
    }
}
