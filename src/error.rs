//! Unified error handling for the downloader.
//!
//! One error type covers the filter engine, the session/token layer, the HTTP
//! client and the file store. HTTP status codes are classified into the
//! categories the service is known to return.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for downloader operations.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// A radius filter needs a reference coordinate and none could be derived
    #[error("No reference coordinate available: {reason}")]
    NoReferenceAvailable { reason: String },

    /// A coordinate argument could not be parsed
    #[error("Invalid coordinate '{input}': {message}")]
    InvalidCoordinate { input: String, message: String },

    /// Radius is negative or not a number
    #[error("Invalid radius {radius_km} km: expected a finite, non-negative number")]
    InvalidRadius { radius_km: f64 },

    /// Login/token problem (401, 403, missing or expired tokens)
    #[error("Authentication issue: {message}")]
    Authentication { message: String },

    /// Token directory or token file could not be read
    #[error("Token store error at {}: {message}", path.display())]
    TokenStore { path: PathBuf, message: String },

    /// Service answered 429 and retries were exhausted
    #[error("Rate limit exceeded (429) - Please wait before making more requests")]
    RateLimited,

    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("Connection issue: {message}")]
    Connection { message: String },

    /// 5xx from the service
    #[error("Server error ({status_code}) - {message}")]
    Server { status_code: u16, message: String },

    /// Any other HTTP/API error
    #[error("{}", http_message(*status_code, message))]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// File system error
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Response body or token file is not the JSON we expect
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn http_message(status_code: Option<u16>, message: &str) -> String {
    match status_code {
        Some(code) => format!("HTTP error ({}): {}", code, message),
        None => format!("HTTP error: {}", message),
    }
}

impl DownloaderError {
    /// Classify a non-success HTTP status returned by the service.
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            400 => DownloaderError::Http {
                message: "Endpoint not available (400 Bad Request) - Feature may not be enabled for your account".to_string(),
                status_code: Some(400),
            },
            401 => DownloaderError::Authentication {
                message: "Authentication required (401 Unauthorized) - Please re-authenticate"
                    .to_string(),
            },
            403 => DownloaderError::Authentication {
                message: "Access denied (403 Forbidden) - Account may not have permission"
                    .to_string(),
            },
            404 => DownloaderError::Http {
                message: "Endpoint not found (404) - Feature may have been moved or removed"
                    .to_string(),
                status_code: Some(404),
            },
            429 => DownloaderError::RateLimited,
            503 => DownloaderError::Server {
                status_code,
                message: "Garmin's servers are temporarily unavailable".to_string(),
            },
            500..=599 => DownloaderError::Server {
                status_code,
                message: "Garmin's servers are experiencing issues".to_string(),
            },
            _ => DownloaderError::Http {
                message: "Unexpected response status".to_string(),
                status_code: Some(status_code),
            },
        }
    }

    /// Whether the error ends a batch of requests: every further request
    /// with the same credentials would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DownloaderError::Authentication { .. } | DownloaderError::RateLimited
        )
    }
}

/// Result type alias for downloader operations.
pub type Result<T> = std::result::Result<T, DownloaderError>;

/// Extension trait for converting Option to DownloaderError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a no-reference error.
    fn ok_or_no_reference(self, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_reference(self, reason: &str) -> Result<T> {
        self.ok_or_else(|| DownloaderError::NoReferenceAvailable {
            reason: reason.to_string(),
        })
    }
}
