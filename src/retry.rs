//! Bounded retry with adaptive backoff for rate-limited lookups.
//!
//! Wraps a single verification call. Only explicit rate-limit signals are
//! retried; transport and decode failures collapse to
//! [`LookupResult::Unresolvable`] on first occurrence, and every other
//! outcome is returned unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;
use crate::provider::LookupResult;

/// Maximum number of retries after the initial attempt. A lookup is invoked
/// at most `MAX_RETRIES + 1` times per record.
pub const MAX_RETRIES: u32 = 8;

/// Runs `operation` until it produces a non-rate-limited outcome or the
/// retry budget is exhausted.
///
/// Between rate-limited attempts the current task suspends for the
/// provider's suggested reset hint when present (a hint of 0 is honored
/// as-is), otherwise for `2^attempt` seconds, in both cases clamped to
/// `ceiling`. The wait suspends only this record's processing — nothing else
/// is blocked.
///
/// Exhausting the budget is not an error: the last rate-limited result is
/// returned unchanged so the caller can surface the stalled record.
pub async fn verify_with_retry<F, Fut>(
    operation: F,
    rate_limit_status: &str,
    ceiling: Duration,
) -> LookupResult
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<LookupResult, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let result = match operation().await {
            Ok(result) => result,
            Err(e) => {
                // Transport failures are not retried. The output keeps the
                // plain sentinel; the log keeps the cause.
                warn!("Lookup failed, treating as unresolvable: {}", e);
                return LookupResult::Unresolvable;
            }
        };

        match result {
            LookupResult::RateLimited {
                ref status,
                retry_after_secs,
            } if status == rate_limit_status && attempt < MAX_RETRIES => {
                let wait = retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| Duration::from_secs(1u64 << attempt))
                    .min(ceiling);

                info!(
                    "Rate limited on attempt {}/{}, waiting {:?} before retry",
                    attempt + 1,
                    MAX_RETRIES + 1,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }

            // Corrected, unresolvable, or a rate limit that outlived the
            // retry budget.
            other => return other,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    const STATUS: &str = "RATE_LIMIT_EXCEEDED";
    const CEILING: Duration = Duration::from_secs(300);

    fn rate_limited(retry_after_secs: Option<u64>) -> LookupResult {
        LookupResult::RateLimited {
            status: STATUS.to_string(),
            retry_after_secs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(LookupResult::Corrected("123 E Main St, Columbus, 43215".into())) }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(
            result,
            LookupResult::Corrected("123 E Main St, Columbus, 43215".into())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result = verify_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(LookupResult::Unresolvable) }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(result, LookupResult::Unresolvable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_collapses_without_retry_or_wait() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::ConnectionFailed("refused".into())) }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(result, LookupResult::Unresolvable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_with_exponential_backoff() {
        let attempt_times = std::sync::Mutex::new(Vec::new());
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                attempt_times
                    .lock()
                    .unwrap()
                    .push(start.elapsed().as_secs());
                async { Ok(rate_limited(None)) }
            },
            STATUS,
            CEILING,
        )
        .await;

        // MAX_RETRIES + 1 invocations, then the last result surfaces as-is.
        assert_eq!(result, rate_limited(None));

        // Successive waits follow 1, 2, 4, ... 2^7 seconds, none reaching
        // the ceiling.
        assert_eq!(
            *attempt_times.lock().unwrap(),
            vec![0, 1, 3, 7, 15, 31, 63, 127, 255]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(255));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_clamped_to_ceiling() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(rate_limited(None)) }
            },
            STATUS,
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES + 1);
        assert_eq!(result, rate_limited(None));

        // 1 + 2 + 4 + 8, then clamped to 10 for the remaining four waits.
        assert_eq!(start.elapsed(), Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_hint_preferred_over_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(rate_limited(Some(7)))
                    } else {
                        Ok(LookupResult::Corrected("ok".into()))
                    }
                }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(result, LookupResult::Corrected("ok".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The exact hint, not the exponential fallback (which would be 1s).
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_hint_honored_as_is() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(rate_limited(Some(0)))
                    } else {
                        Ok(LookupResult::Corrected("ok".into()))
                    }
                }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(result, LookupResult::Corrected("ok".into()));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_clamped_to_ceiling() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = verify_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(rate_limited(Some(1000)))
                    } else {
                        Ok(LookupResult::Corrected("ok".into()))
                    }
                }
            },
            STATUS,
            CEILING,
        )
        .await;

        assert_eq!(result, LookupResult::Corrected("ok".into()));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_rate_limit_status_returned_unchanged() {
        let calls = AtomicU32::new(0);

        let result = verify_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(LookupResult::RateLimited {
                        status: "SOME_OTHER_STATUS".to_string(),
                        retry_after_secs: Some(5),
                    })
                }
            },
            STATUS,
            CEILING,
        )
        .await;

        // Not this provider's rate-limit signal, so no retry is spent on it.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result,
            LookupResult::RateLimited {
                status: "SOME_OTHER_STATUS".to_string(),
                retry_after_secs: Some(5),
            }
        );
    }
}
