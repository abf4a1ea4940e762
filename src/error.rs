//! Error types for the screenshot workflow

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a screenshot
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed cookie header
    #[error("Failed to parse cookie header: {0}")]
    ParseError(String),

    /// Navigation to the target URL failed
    #[error("Navigation failed: {0}")]
    NavigationError(String),

    /// The readiness selector never appeared
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Querying the page layout metrics failed
    #[error("Layout query failed: {0}")]
    LayoutQueryError(String),

    /// The remote capture call failed
    #[error("Screenshot capture failed: {0}")]
    CaptureError(String),

    /// Writing the captured image failed
    #[error("Failed to write screenshot: {0}")]
    PersistenceError(String),

    /// Failed to launch or attach to the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The run was cancelled from outside
    #[error("Capture cancelled")]
    Cancelled,

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
