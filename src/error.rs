use thiserror::Error;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Missing required argument: --file must be specified when using --input=csv")]
    FileArgMissing,

    #[error("Invalid argument: --file can not used when using --input=stdin")]
    FileArgForbidden,

    #[error("Environment variable {0} not set")]
    ApiKeyEnvVarNotSet(String),

    // ── Provider ──────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    // ── I/O ───────────────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}
