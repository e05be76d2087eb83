//! Address verification provider abstraction.
//!
//! Each provider adapter performs a single verification round-trip and
//! classifies the raw service response into a [`LookupResult`]. Retry and
//! backoff decisions live in [`crate::retry`] — adapters never retry
//! internally.

pub mod byteplant;

pub use byteplant::Byteplant;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// LookupResult
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single address verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The service matched the input to a real address; the payload is the
    /// corrected, formatted address.
    Corrected(String),

    /// The service could not match the input to a real address. Transport and
    /// decode failures also collapse into this sentinel once they cross into
    /// output.
    Unresolvable,

    /// The service temporarily refused the request. Carries the provider's
    /// identifying status code and its optional reset hint.
    RateLimited {
        status: String,
        retry_after_secs: Option<u64>,
    },
}

impl fmt::Display for LookupResult {
    /// The textual form used verbatim in output lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupResult::Corrected(address) => f.write_str(address),
            LookupResult::Unresolvable => f.write_str("Unresolvable"),
            LookupResult::RateLimited {
                status,
                retry_after_secs,
            } => match retry_after_secs {
                Some(secs) => write!(f, "{} (retry in {}s)", status, secs),
                None => f.write_str(status),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Capability contract for address verification services.
///
/// The active provider is constructed once per run and shared read-only
/// across all records, so implementations must not mutate state beyond
/// reading their held credential.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Performs exactly one verification round-trip for the given record
    /// fields and classifies the response per the provider's own status
    /// vocabulary.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure. Implementations must
    /// not retry internally.
    async fn lookup(
        &self,
        street: &str,
        city: &str,
        postal_code: &str,
    ) -> Result<LookupResult, AppError>;

    /// The status code this provider uses to mark a rate-limit condition,
    /// so the retry controller can recognize it without providers being
    /// coupled to each other.
    fn rate_limit_status(&self) -> &'static str;

    /// The longest wait this provider's rate-limit window can require.
    ///
    /// Caps both provider-suggested waits and computed backoff so a single
    /// record never blocks unreasonably long.
    fn rate_limit_ceiling(&self) -> Duration;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrected_displays_the_address() {
        let result = LookupResult::Corrected("123 E Main St, Columbus, 43215".into());
        assert_eq!(result.to_string(), "123 E Main St, Columbus, 43215");
    }

    #[test]
    fn unresolvable_displays_the_marker() {
        assert_eq!(LookupResult::Unresolvable.to_string(), "Unresolvable");
    }

    #[test]
    fn rate_limited_displays_status_and_hint() {
        let result = LookupResult::RateLimited {
            status: "RATE_LIMIT_EXCEEDED".into(),
            retry_after_secs: Some(30),
        };
        assert_eq!(result.to_string(), "RATE_LIMIT_EXCEEDED (retry in 30s)");

        let result = LookupResult::RateLimited {
            status: "RATE_LIMIT_EXCEEDED".into(),
            retry_after_secs: None,
        };
        assert_eq!(result.to_string(), "RATE_LIMIT_EXCEEDED");
    }
}
