//! Byteplant address-validator.net provider adapter.
//!
//! Talks to the `/api/verify` endpoint with a GET request per lookup. Key
//! points:
//!
//! - **One round-trip per lookup** — retry policy lives in [`crate::retry`]
//! - **Secure credential handling** via `secrecy::SecretString`
//! - **Safe logging** that only ever includes the URL path — the query
//!   string carries the API key

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::error::AppError;
use crate::provider::{LookupResult, Provider};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Production endpoint for Byteplant address verification.
const VERIFY_URL: &str = "https://api.address-validator.net/api/verify";

/// User agent string for all verification requests.
const CLIENT_USER_AGENT: &str = "address-validator/0.1.0";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// All lookups are scoped to US addresses.
const COUNTRY_CODE: &str = "US";

/// Byteplant's rate window is five minutes; no reset hint can exceed it.
const RATE_LIMIT_CEILING_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Status Vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// Response status values defined by the Byteplant API.
mod status {
    pub const VALID: &str = "VALID";
    pub const SUSPECT: &str = "SUSPECT";
    pub const INVALID: &str = "INVALID";
    pub const DELAYED: &str = "DELAYED";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const API_KEY_INVALID: &str = "API_KEY_INVALID_OR_DEPLETED";
    pub const RESTRICTED: &str = "RESTRICTED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match Byteplant JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Mirrors the `/api/verify` response body. Byteplant uses all-lowercase
/// field names.
#[derive(Debug, Deserialize)]
struct WireVerifyResponse {
    status: String,
    /// Corrected house number. Present when `status` indicates success.
    streetnumber: Option<String>,
    /// Corrected street name. Present when `status` indicates success.
    street: Option<String>,
    /// Corrected city. Present when `status` indicates success.
    city: Option<String>,
    /// Corrected postal code. Present when `status` indicates success.
    postalcode: Option<String>,
    /// Seconds until the rate window resets. Present on rate-limit responses.
    ratelimit_seconds: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Byteplant
// ─────────────────────────────────────────────────────────────────────────────

/// Provider adapter for the Byteplant address verification service.
pub struct Byteplant {
    /// The underlying HTTP client.
    http: reqwest::Client,
    /// Verification endpoint; overridable for tests and regional endpoints.
    base_url: Url,
    /// API key (wrapped for security).
    api_key: SecretString,
}

impl Byteplant {
    /// Creates a new adapter holding the given API key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(api_key: SecretString) -> Result<Self, AppError> {
        let http = build_http_client()?;
        let base_url = Url::parse(VERIFY_URL)
            .map_err(|_| AppError::Internal("Invalid verification endpoint URL".to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Overrides the verification endpoint.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Builds the verify URL with all query parameters attached.
    fn build_verify_url(&self, street: &str, city: &str, postal_code: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("APIKey", self.api_key.expose_secret())
            .append_pair("StreetAddress", street)
            .append_pair("City", city)
            .append_pair("PostalCode", postal_code)
            .append_pair("CountryCode", COUNTRY_CODE);
        url
    }
}

#[async_trait]
impl Provider for Byteplant {
    async fn lookup(
        &self,
        street: &str,
        city: &str,
        postal_code: &str,
    ) -> Result<LookupResult, AppError> {
        let url = self.build_verify_url(street, city, postal_code);

        let start = Instant::now();
        let result = self.http.get(url.clone()).send().await;
        let duration_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(response) => {
                info!(
                    "[BYTEPLANT] GET {} {} {}ms",
                    url.path(),
                    response.status().as_u16(),
                    duration_ms
                );
                response
            }
            Err(_) => {
                // Never surface the raw reqwest error — it can embed the full
                // URL, which carries the API key.
                info!("[BYTEPLANT] GET {} FAILED {}ms", url.path(), duration_ms);
                return Err(AppError::ConnectionFailed(
                    "Connection to verification service failed".to_string(),
                ));
            }
        };

        // Byteplant signals everything, rate limiting included, in the body
        // of a 200 response. Anything else is a hard failure.
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(AppError::MalformedResponse(format!(
                "HTTP {} - {}",
                http_status.as_u16(),
                http_status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let data: WireVerifyResponse = response.json().await.map_err(|e| {
            AppError::MalformedResponse(format!("Failed to parse verification response: {}", e))
        })?;

        classify(data)
    }

    fn rate_limit_status(&self) -> &'static str {
        status::RATE_LIMIT_EXCEEDED
    }

    fn rate_limit_ceiling(&self) -> Duration {
        Duration::from_secs(RATE_LIMIT_CEILING_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Classifies a decoded response per the Byteplant status vocabulary.
fn classify(data: WireVerifyResponse) -> Result<LookupResult, AppError> {
    match data.status.as_str() {
        status::VALID | status::SUSPECT => {
            match (data.streetnumber, data.street, data.city, data.postalcode) {
                (Some(number), Some(street), Some(city), Some(postal)) => Ok(
                    LookupResult::Corrected(format!("{} {}, {}, {}", number, street, city, postal)),
                ),
                _ => Err(AppError::MalformedResponse(
                    "Verified response is missing corrected address fields".to_string(),
                )),
            }
        }

        status::RATE_LIMIT_EXCEEDED => Ok(LookupResult::RateLimited {
            status: data.status,
            retry_after_secs: data.ratelimit_seconds,
        }),

        // Credential and account problems are terminal for this run; keep
        // them visible in the logs even though the output collapses them.
        status::API_KEY_INVALID | status::RESTRICTED => {
            warn!("[BYTEPLANT] Lookup rejected: {}", data.status);
            Ok(LookupResult::Unresolvable)
        }

        status::INVALID | status::DELAYED | status::INTERNAL_ERROR => {
            Ok(LookupResult::Unresolvable)
        }

        other => {
            warn!("[BYTEPLANT] Unrecognized response status: {}", other);
            Ok(LookupResult::Unresolvable)
        }
    }
}

/// Builds the configured HTTP client.
fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
