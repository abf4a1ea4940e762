//! tss: take a screenshot
//!
//! Drives a headless browser to render a web page and capture it as an
//! image, optionally injecting session cookies and controlling the capture
//! viewport.
//!
//! # Features
//!
//! - **Cookie injection**: a raw `Cookie:` header is split into cookies that
//!   are set on the target host before navigation
//! - **Readiness gating**: capture starts only once a CSS selector matches
//! - **Sized or full-page capture**: pin the width and/or height, or let the
//!   browser capture the whole scrollable page
//! - **CDP Backend** (default feature `cdp`): Chrome DevTools Protocol via
//!   headless Chrome
//!
//! The workflow only talks to the browser through the [`Session`] trait, so
//! it can be driven by any backend (or a recording fake in tests).
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tss::{CaptureConfig, ScreenshotRequest};
//! use tss::cdp::{CdpSession, LaunchConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let session = CdpSession::launch(&LaunchConfig::default(), &CaptureConfig::default())?;
//! let request = ScreenshotRequest {
//!     url: "https://example.com".to_string(),
//!     width: 1024,
//!     ..Default::default()
//! };
//! let png = tss::capture(&session, &request, &CaptureConfig::default(), &CancellationToken::new())?;
//! std::fs::write("example.png", png)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use std::str::FromStr;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod cookie;
pub mod layout;
pub mod navigate;
pub mod workflow;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly facade (worker-thread backed, cancellable)
pub mod async_api;

pub use async_api::Shooter;
pub use capture::CaptureStrategy;
pub use cookie::{CookieMap, CookieOutcome};
pub use layout::{CaptureRectangle, ContentBox, LayoutMetrics};
pub use navigate::DEFAULT_READY_SELECTOR;
pub use workflow::capture;

/// One screenshot to take
///
/// Built by the caller (usually the CLI) and consumed once by
/// [`workflow::capture`].
///
/// # Examples
///
/// ```
/// let req = tss::ScreenshotRequest::default();
/// assert_eq!(req.ready_selector, "body");
/// assert_eq!((req.width, req.height), (0, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    /// Page to capture
    pub url: String,
    /// Raw cookie header (`name=value; ...`), empty for none
    pub cookie_header: String,
    /// CSS selector that must match before capturing
    pub ready_selector: String,
    /// Requested width in pixels, 0 for the natural width
    pub width: u32,
    /// Requested height in pixels, 0 for the natural height
    pub height: u32,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            cookie_header: String::new(),
            ready_selector: DEFAULT_READY_SELECTOR.to_string(),
            width: 0,
            height: 0,
        }
    }
}

impl ScreenshotRequest {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::ConfigError("a target URL is required".into()));
        }
        Ok(())
    }
}

/// Configuration for a capture run
///
/// The defaults match the command line tool: a 30 second deadline for the
/// page to become ready and a lossless PNG at maximum quality.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Deadline for navigation plus readiness, in milliseconds
    pub timeout_ms: u64,
    /// How often the readiness selector is polled, in milliseconds
    pub poll_interval_ms: u64,
    /// Encoding of the captured image
    pub format: ImageFormat,
    /// Quality 0..=100 (ignored by the browser for PNG)
    pub quality: u8,
    /// Surface per-cookie failures and progress at a louder log level
    pub debug: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            poll_interval_ms: 100,
            format: ImageFormat::Png,
            quality: 100,
            debug: false,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout must be greater than zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::ConfigError("poll interval must be greater than zero".into()));
        }
        if self.quality > 100 {
            return Err(Error::ConfigError(format!("quality {} is outside 0..=100", self.quality)));
        }
        Ok(())
    }
}

/// Image encoding requested from the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Whether the browser honours a quality setting for this format
    pub fn is_lossy(&self) -> bool {
        !matches!(self, ImageFormat::Png)
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(Error::ConfigError(format!("unsupported image format {:?}", other))),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Parameters for setting a cookie
#[derive(Debug, Clone, PartialEq)]
pub struct CookieParam {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Seconds since the Unix epoch
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
}

/// Screen orientation reported to the page during emulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOrientation {
    PortraitPrimary,
}

impl ScreenOrientation {
    /// Protocol name of the orientation type
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenOrientation::PortraitPrimary => "portraitPrimary",
        }
    }

    /// Rotation angle in degrees
    pub fn angle(&self) -> u32 {
        match self {
            ScreenOrientation::PortraitPrimary => 0,
        }
    }
}

/// Device metrics forced on the page for a sized capture
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetrics {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
    pub orientation: ScreenOrientation,
}

/// What to capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureParams {
    pub format: ImageFormat,
    pub quality: u8,
    /// Region to clip to; `None` captures the full scrollable page
    pub clip: Option<CaptureRectangle>,
}

/// Fails with [`Error::Cancelled`] once `cancel` has fired.
pub(crate) fn checkpoint(cancel: &tokio_util::sync::CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// The browser capabilities the capture workflow relies on
///
/// A session is used by one capture at a time. Backends map their own
/// failures onto [`Error`]; the workflow re-tags anything that is not
/// already a stage error.
pub trait Session {
    /// Set one cookie in the browser's cookie store
    fn set_cookie(&self, cookie: &CookieParam) -> Result<()>;

    /// Navigate the page to `url` and wait for the navigation to commit
    fn navigate(&self, url: &str) -> Result<()>;

    /// Whether an element matching `selector` currently exists
    fn selector_present(&self, selector: &str) -> Result<bool>;

    /// Content size of the rendered page
    fn layout_metrics(&self) -> Result<LayoutMetrics>;

    /// Override the device metrics used for layout
    fn emulate_device(&self, metrics: &DeviceMetrics) -> Result<()>;

    /// Capture the page and return the encoded image
    fn capture(&self, params: &CaptureParams) -> Result<Vec<u8>>;

    /// Release browser resources; the session is not used afterwards
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
