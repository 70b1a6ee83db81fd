//! Bounded exponential-backoff delivery.
//!
//! Every failed attempt is retried until `max_retries` is exhausted, after
//! which the payload is dropped. Nothing here returns an error: the outcome is
//! a [`Delivery`] value the caller can log or ignore.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;

/// Lifecycle of one record or batch on its way to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Sending,
    RetryScheduled,
    Succeeded,
    Dropped,
}

impl DeliveryState {
    /// `Succeeded` and `Dropped` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Succeeded | DeliveryState::Dropped)
    }
}

/// Terminal outcome of a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// The backend accepted the payload; carries the parsed response body.
    Delivered { response: Value, attempts: u32 },
    /// Every attempt failed and the payload was discarded.
    Dropped { attempts: u32, last_error: String },
}

impl Delivery {
    pub fn state(&self) -> DeliveryState {
        match self {
            Delivery::Delivered { .. } => DeliveryState::Succeeded,
            Delivery::Dropped { .. } => DeliveryState::Dropped,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Delivery::Delivered { attempts, .. } | Delivery::Dropped { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }

    /// The response body, if delivered.
    pub fn response(&self) -> Option<&Value> {
        match self {
            Delivery::Delivered { response, .. } => Some(response),
            Delivery::Dropped { .. } => None,
        }
    }
}

/// Retry schedule: `max_retries` retries after the first attempt, waiting
/// `retry_delay * 2^attempt` before each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Run `f` until it succeeds or the policy is exhausted.
///
/// `label` names the payload in log events ("trace", "batch").
pub async fn deliver_with_backoff<F, Fut>(
    policy: RetryPolicy,
    label: &str,
    silent: bool,
    mut f: F,
) -> Delivery
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, TransportError>>,
{
    let mut attempt = 0u32;

    loop {
        tracing::trace!(payload = label, attempt, state = ?DeliveryState::Sending);

        match f().await {
            Ok(response) => {
                if !silent {
                    tracing::info!(payload = label, attempts = attempt + 1, "Trace payload delivered");
                }
                return Delivery::Delivered {
                    response,
                    attempts: attempt + 1,
                };
            }
            Err(e) => {
                if !silent {
                    tracing::warn!(
                        payload = label,
                        attempt = attempt + 1,
                        error = %e,
                        "Failed to send trace payload"
                    );
                }

                if attempt >= policy.max_retries {
                    tracing::error!(
                        payload = label,
                        attempts = attempt + 1,
                        "Max retries reached, dropping trace payload"
                    );
                    return Delivery::Dropped {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    };
                }

                let backoff = policy.delay_for(attempt);
                if !silent {
                    tracing::debug!(
                        payload = label,
                        backoff_ms = backoff.as_millis() as u64,
                        state = ?DeliveryState::RetryScheduled,
                        "Retrying"
                    );
                }
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
