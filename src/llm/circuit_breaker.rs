// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Circuit Breaker for the LLM Provider
//!
//! Protects the pipeline against cascading failures when the LLM provider is
//! unavailable. An open circuit makes intelligence calls fail immediately
//! with [`LlmError::CircuitOpen`], which the classifier and ranker fallback
//! chains treat like any other provider failure.
//!
//! ## States
//!
//! - **Closed**: normal operation, requests pass through
//! - **Open**: circuit is tripped, requests fail immediately
//! - **HalfOpen**: probing whether the provider has recovered

use super::provider::LlmError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long to wait before probing recovery (half-open state)
    pub cooldown: Duration,
    /// Consecutive half-open successes required to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Circuit is tripped, requests fail immediately
    Open,
    /// Probing whether the provider has recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

/// Thread-safe circuit breaker guarding a named collaborator.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<RwLock<BreakerInner>>,
    collaborator: String,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig, collaborator: String) -> Self {
        Self {
            config,
            inner: Arc::new(RwLock::new(BreakerInner::default())),
            collaborator,
        }
    }

    /// Gets the current state of the circuit breaker.
    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    /// Admits a request or rejects it with [`LlmError::CircuitOpen`].
    ///
    /// Handles the open → half-open transition once the cooldown elapses.
    pub async fn try_acquire(&self) -> Result<(), LlmError> {
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.cooldown {
                    info!(
                        collaborator = %self.collaborator,
                        "Circuit breaker transitioning to half-open after cooldown"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    debug!(
                        collaborator = %self.collaborator,
                        remaining_secs = (self.config.cooldown - elapsed).as_secs(),
                        "Circuit breaker open, rejecting call"
                    );
                    Err(LlmError::CircuitOpen(self.collaborator.clone()))
                }
            }
        }
    }

    /// Records a successful request.
    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    info!(
                        collaborator = %self.collaborator,
                        "Circuit breaker closing after recovery"
                    );
                    *inner = BreakerInner::default();
                }
            }
            CircuitState::Open => {
                warn!(
                    collaborator = %self.collaborator,
                    "Unexpected success recorded while circuit is open"
                );
            }
        }
    }

    /// Records a failed request.
    ///
    /// In closed state, consecutive failures may open the circuit; any
    /// half-open failure reopens it.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        collaborator = %self.collaborator,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opening after threshold exceeded"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    collaborator = %self.collaborator,
                    "Circuit breaker reopening after failure in half-open state"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(100), // Short for tests
            success_threshold: 2,
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(test_config(), "llm".to_string())
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let breaker = breaker();
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_opens_after_failures() {
        let breaker = breaker();

        for _ in 0..3 {
            assert!(breaker.try_acquire().await.is_ok());
            breaker.record_failure().await;
        }

        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(matches!(
            breaker.try_acquire().await,
            Err(LlmError::CircuitOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker();

        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;

        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_after_cooldown() {
        let breaker = breaker();

        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(breaker.try_acquire().await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_closes_after_successes_in_half_open() {
        let breaker = breaker();

        for _ in 0..3 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(breaker.try_acquire().await.is_ok());

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reopens_on_failure_in_half_open() {
        let breaker = breaker();

        for _ in 0..3 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(breaker.try_acquire().await.is_ok());

        breaker.record_success().await;
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(30));
        assert_eq!(config.success_threshold, 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
