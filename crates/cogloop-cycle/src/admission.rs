//! Admission gating. The orchestrator asks an [`EnergyBudget`] before a cycle
//! and before each stage.

use crate::config::EnergyConfig;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Wait granularity for [`EnergyPool::wait_until_available`].
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[async_trait]
pub trait EnergyBudget: Send + Sync {
    async fn is_sufficient(&self, amount: f64) -> bool;

    /// Deduct `amount` if available. Returns false and deducts nothing otherwise.
    async fn consume(&self, amount: f64) -> bool;

    /// Resolves once `amount` could be consumed. Returns false immediately
    /// when the budget can never reach `amount`.
    async fn wait_until_available(&self, amount: f64) -> bool;

    /// Current level in [0, 1] of capacity, injected into prompts.
    async fn level(&self) -> f64;
}

struct PoolState {
    energy: f64,
    refreshed: Instant,
}

/// Energy reservoir that refills linearly with time.
pub struct EnergyPool {
    capacity: f64,
    regen_per_sec: f64,
    state: Mutex<PoolState>,
}

impl EnergyPool {
    pub fn new(capacity: f64, initial: f64, regen_per_sec: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            capacity,
            regen_per_sec: regen_per_sec.max(0.0),
            state: Mutex::new(PoolState {
                energy: initial.clamp(0.0, capacity),
                refreshed: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &EnergyConfig) -> Self {
        Self::new(config.capacity, config.initial, config.regen_per_sec)
    }

    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refresh(&mut state);
        state.energy
    }

    fn refresh(&self, state: &mut PoolState) {
        let elapsed = state.refreshed.elapsed().as_secs_f64();
        state.energy = (state.energy + elapsed * self.regen_per_sec).min(self.capacity);
        state.refreshed = Instant::now();
    }
}

#[async_trait]
impl EnergyBudget for EnergyPool {
    async fn is_sufficient(&self, amount: f64) -> bool {
        self.available().await >= amount
    }

    async fn consume(&self, amount: f64) -> bool {
        let mut state = self.state.lock().await;
        self.refresh(&mut state);
        if state.energy < amount {
            debug!(needed = amount, available = state.energy, "Energy insufficient");
            return false;
        }
        state.energy -= amount;
        true
    }

    async fn wait_until_available(&self, amount: f64) -> bool {
        loop {
            let missing = amount - self.available().await;
            if missing <= 0.0 {
                return true;
            }
            if self.regen_per_sec <= 0.0 || amount > self.capacity {
                warn!(
                    needed = amount,
                    capacity = self.capacity,
                    regen_per_sec = self.regen_per_sec,
                    "Energy budget can never be met"
                );
                return false;
            }
            let wait = Duration::try_from_secs_f64(missing / self.regen_per_sec)
                .unwrap_or(POLL_INTERVAL * 8)
                .min(POLL_INTERVAL * 8);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    async fn level(&self) -> f64 {
        if self.capacity <= 0.0 {
            return 0.0;
        }
        self.available().await / self.capacity
    }
}

/// Budget that admits everything.
pub struct Unmetered;

#[async_trait]
impl EnergyBudget for Unmetered {
    async fn is_sufficient(&self, _amount: f64) -> bool {
        true
    }

    async fn consume(&self, _amount: f64) -> bool {
        true
    }

    async fn wait_until_available(&self, _amount: f64) -> bool {
        true
    }

    async fn level(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_deducts_only_when_sufficient() {
        let pool = EnergyPool::new(10.0, 10.0, 0.0);
        assert!(pool.consume(6.0).await);
        assert!(!pool.consume(6.0).await);
        assert!(pool.is_sufficient(4.0).await);
        assert!((pool.available().await - 4.0).abs() < 1e-9);
        assert!((pool.level().await - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn regenerates_up_to_capacity() {
        let pool = EnergyPool::new(10.0, 0.0, 1000.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.available().await, 10.0);
    }

    #[tokio::test]
    async fn wait_until_available_resolves_after_regen() {
        let pool = EnergyPool::new(10.0, 0.0, 500.0);
        let ready = tokio::time::timeout(Duration::from_secs(2), pool.wait_until_available(5.0))
            .await
            .unwrap();
        assert!(ready);
        assert!(pool.consume(5.0).await);
    }

    #[tokio::test]
    async fn unreachable_amount_returns_instead_of_waiting() {
        let over_capacity = EnergyPool::new(10.0, 0.0, 500.0);
        let ready = tokio::time::timeout(Duration::from_secs(1), over_capacity.wait_until_available(50.0))
            .await
            .unwrap();
        assert!(!ready);

        let no_regen = EnergyPool::new(10.0, 2.0, 0.0);
        let ready = tokio::time::timeout(Duration::from_secs(1), no_regen.wait_until_available(5.0))
            .await
            .unwrap();
        assert!(!ready);
    }

    #[tokio::test]
    async fn tiny_regen_rate_does_not_overflow_the_wait() {
        let pool = EnergyPool::new(10.0, 0.0, 1e-300);
        // The first sleep is capped; the wait never resolves within the timeout.
        let waited = tokio::time::timeout(Duration::from_millis(50), pool.wait_until_available(5.0)).await;
        assert!(waited.is_err());
    }
}
