//! Bounded retry for idempotent reads.
//!
//! Only errors whose `RecoveryAction` is `Retry` (`StorageUnavailable`) are
//! retried. Writes (redeem, consume) never go through here: after an ambiguous
//! failure the caller has to re-check state before trying again.

use std::thread;

use tracing::warn;

use tiergate_core::config::RetryConfig;
use tiergate_core::errors::{RecoveryAction, TierGateResult};

pub fn with_retry<T, F>(config: &RetryConfig, operation: &'static str, mut f: F) -> TierGateResult<T>
where
    F: FnMut() -> TierGateResult<T>,
{
    let mut attempt: u32 = 1;
    loop {
        match f() {
            Err(e)
                if RecoveryAction::for_error(&e) == RecoveryAction::Retry
                    && attempt < config.max_attempts =>
            {
                let delay = config.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "storage unavailable, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}
