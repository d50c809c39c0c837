//! Error types for the parity engine
//!
//! Only fatal conditions live here. A missing element, a value mismatch or
//! a stuck transition is recorded as a failing `ValidationResult` instead.

use thiserror::Error;
use uiparity_common::ImplementationId;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] uiparity_common::Error),

    #[error("Navigation to {url} failed for {implementation} after {attempts} attempt(s): {reason}")]
    Navigation {
        implementation: ImplementationId,
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Browser operation '{op}' failed: {reason}")]
    Browser { op: String, reason: String },

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
