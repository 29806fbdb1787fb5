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

//! # Retry Mechanism for Collaborator Calls
//!
//! Stage-level retry with linearly increasing backoff (`delay = attempt ×
//! base`). Transient failures (network issues, rate limits, server errors)
//! are retried; non-recoverable errors fail fast. The loop stops retrying as
//! soon as the workflow's cancellation token fires.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,
    /// Base delay unit; attempt N waits N × base (milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Creates a new RetryConfig with custom values
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Calculates the delay before retry number `attempt` (1-indexed):
    /// linear in the attempt number, clamped at the maximum.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay_ms.saturating_mul(attempt as u64);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Executes an async operation with retry and linear backoff.
///
/// # Arguments
///
/// * `operation` - An async closure returning `Result<T, E>`
/// * `config` - Retry configuration (max retries, delays)
/// * `is_retryable` - Decides whether an error is worth another attempt
/// * `cancel` - Workflow cancellation token; a cancelled token stops the
///   loop and returns the last error
pub async fn with_retry<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    cancel: &CancellationToken,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    debug!(error = %error, "Non-retryable error, failing immediately");
                    return Err(error);
                }

                if attempt >= config.max_retries {
                    warn!(
                        attempt = attempt,
                        max_retries = config.max_retries,
                        error = %error,
                        "Max retries exceeded"
                    );
                    return Err(error);
                }

                if cancel.is_cancelled() {
                    debug!(error = %error, "Cancelled during retry loop");
                    return Err(error);
                }

                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after transient error"
                );

                sleep(delay).await;
            }
        }
    }
}
