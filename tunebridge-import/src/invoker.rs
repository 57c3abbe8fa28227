//! Rate-limited invoker for destination API calls
//!
//! Every outbound call — search and mutation alike — goes through
//! `RateLimitedInvoker::invoke`, which paces requests against a shared
//! per-run budget and retries retryable failures up to a bounded attempt
//! count. Exhausting the budget surfaces a classified error; the caller
//! records the single record as Failed rather than aborting the run.
//! Authorization rejections are never retried and propagate as run-fatal.

use crate::catalog::{CallError, CallResult};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tunebridge_common::config::InvokerConfig;
use tunebridge_common::{Error, Result};

/// Ceiling for any single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct RateLimitedInvoker {
    limiter: DefaultDirectRateLimiter,
    config: InvokerConfig,
}

impl RateLimitedInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        let per_second =
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Self { limiter, config }
    }

    /// Invoke one destination call with pacing and bounded retry
    ///
    /// `what` names the call for logs and error messages. `op` is called
    /// once per attempt; it must build a fresh request future each time.
    pub async fn invoke<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.limiter.until_ready().await;

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(call = what, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(CallError::Unauthorized(message)) => {
                    tracing::error!(call = what, %message, "Authorization rejected");
                    return Err(Error::Authorization(message));
                }
                Err(CallError::Rejected(message)) => {
                    tracing::warn!(call = what, %message, "Request rejected by destination");
                    return Err(Error::MutationRejected(message));
                }
                Err(CallError::RateLimited { retry_after }) => {
                    if attempt >= self.config.max_attempts {
                        return Err(Error::RateLimitExceeded(format!(
                            "{} still rate-limited after {} attempts",
                            what, attempt
                        )));
                    }
                    // Prefer the service-specified delay over our own
                    // schedule
                    let delay = retry_after.unwrap_or_else(|| self.exponential_delay(attempt));
                    tracing::warn!(
                        call = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, waiting before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(CallError::Transient(message)) => {
                    if attempt >= self.config.max_attempts {
                        return Err(Error::TransientCallFailed(format!(
                            "{}: {} (after {} attempts)",
                            what, message, attempt
                        )));
                    }
                    let delay = self.jittered_delay(attempt);
                    tracing::warn!(
                        call = what,
                        attempt,
                        %message,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Exponential backoff: base * 2^(attempt-1), capped
    fn exponential_delay(&self, attempt: u32) -> Duration {
        let shift = (attempt - 1).min(10);
        let millis = self.config.base_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(millis).min(MAX_BACKOFF)
    }

    /// Exponential backoff with up to +50% random jitter, so parallel
    /// runs against the same service do not retry in lockstep
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.exponential_delay(attempt);
        let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
        (base + Duration::from_millis(jitter)).min(MAX_BACKOFF)
    }
}
