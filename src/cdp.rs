//! Chrome DevTools Protocol session implementation

use crate::layout::{ContentBox, LayoutMetrics};
use crate::{
    CaptureConfig, CaptureParams, CookieParam, DeviceMetrics, Error, ImageFormat, Result, Session, Viewport,
};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Network, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// Extra Chrome switches applied to every launch
const CHROME_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=site-per-process,TranslateUI,BlinkGenPropertyTrees",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--disable-gpu",
    "--mute-audio",
];

/// How the browser process is launched
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Hide scrollbars from captures
    pub hide_scrollbars: bool,
    /// Chrome's sandbox; off by default so the tool runs in containers
    pub sandbox: bool,
    /// Initial window size
    pub window: Viewport,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            hide_scrollbars: false,
            sandbox: false,
            window: Viewport::default(),
        }
    }
}

impl LaunchConfig {
    /// Command line switches passed to Chrome on top of headless_chrome's own
    pub fn chrome_args(&self) -> Vec<&'static str> {
        let mut args = CHROME_FLAGS.to_vec();
        if self.hide_scrollbars {
            args.push("--hide-scrollbars");
        }
        args
    }
}

/// A single-tab headless Chrome session (uses the `headless_chrome` crate)
///
/// Dropping the session terminates the browser process.
pub struct CdpSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl CdpSession {
    /// Launch Chrome and open the tab used for capturing.
    pub fn launch(launch: &LaunchConfig, config: &CaptureConfig) -> Result<Self> {
        let args = launch.chrome_args();
        let os_args: Vec<&OsStr> = args.iter().map(|a| OsStr::new(*a)).collect();
        let timeout = Duration::from_millis(config.timeout_ms);

        let launch_options = LaunchOptions::default_builder()
            .headless(launch.headless)
            .sandbox(launch.sandbox)
            .window_size(Some((launch.window.width, launch.window.height)))
            .idle_browser_timeout(timeout + Duration::from_secs(30))
            .args(os_args)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(timeout);

        debug!("Launched Chrome (headless: {}, sandbox: {})", launch.headless, launch.sandbox);
        Ok(Self { browser, tab })
    }

    fn natural_content(&self) -> Result<ContentBox> {
        Ok(self.layout_metrics()?.natural())
    }
}

impl Session for CdpSession {
    /// Close the tab; the browser process exits when the session is dropped.
    fn close(&self) -> Result<()> {
        self.tab
            .close(true)
            .map_err(|e| Error::CdpError(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }

    fn set_cookie(&self, cookie: &CookieParam) -> Result<()> {
        let params: Network::SetCookie = protocol_params(json!({
            "name": cookie.name,
            "value": cookie.value,
            "domain": cookie.domain,
            "path": cookie.path,
            "expires": cookie.expires,
            "httpOnly": cookie.http_only,
            "secure": cookie.secure,
        }))?;

        self.tab
            .call_method(params)
            .map_err(|e| Error::CdpError(format!("Failed to set cookie {:?}: {}", cookie.name, e)))?;
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::NavigationError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::NavigationError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn selector_present(&self, selector: &str) -> Result<bool> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| Error::Other(format!("Failed to quote selector: {}", e)))?;
        let script = format!(
            "(function(){{ try {{ return document.querySelector({}) !== null; }} catch (e) {{ return 'invalid selector: ' + e.message; }} }})()",
            quoted
        );

        let eval = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::NavigationError(format!("Readiness check failed: {}", e)))?;

        match eval.value {
            Some(Value::Bool(found)) => Ok(found),
            Some(Value::String(msg)) => Err(Error::NavigationError(msg)),
            other => Err(Error::NavigationError(format!("Unexpected readiness result: {:?}", other))),
        }
    }

    fn layout_metrics(&self) -> Result<LayoutMetrics> {
        let metrics = self
            .tab
            .call_method(Page::GetLayoutMetrics(None))
            .map_err(|e| Error::LayoutQueryError(format!("Page.getLayoutMetrics failed: {}", e)))?;

        // Read through JSON: older protocol revisions lack cssContentSize.
        let raw = serde_json::to_value(&metrics)
            .map_err(|e| Error::LayoutQueryError(format!("Unreadable layout metrics: {}", e)))?;
        let content_size = rect_from(&raw, "contentSize")
            .ok_or_else(|| Error::LayoutQueryError("layout metrics carry no contentSize".into()))?;

        Ok(LayoutMetrics {
            content_size,
            css_content_size: rect_from(&raw, "cssContentSize"),
        })
    }

    fn emulate_device(&self, metrics: &DeviceMetrics) -> Result<()> {
        let params: Emulation::SetDeviceMetricsOverride = protocol_params(json!({
            "width": metrics.width,
            "height": metrics.height,
            "deviceScaleFactor": metrics.device_scale_factor,
            "mobile": metrics.mobile,
            "screenOrientation": {
                "type": metrics.orientation.as_str(),
                "angle": metrics.orientation.angle(),
            },
        }))?;

        self.tab
            .call_method(params)
            .map_err(|e| Error::CaptureError(format!("Emulation.setDeviceMetricsOverride failed: {}", e)))?;
        Ok(())
    }

    fn capture(&self, params: &CaptureParams) -> Result<Vec<u8>> {
        // Full page: clip to the whole content box and let Chrome render past the viewport.
        let (clip, beyond_viewport) = match params.clip {
            Some(rect) => (json!({ "x": rect.x, "y": rect.y, "width": rect.width, "height": rect.height, "scale": rect.scale }), false),
            None => {
                let content = self.natural_content().map_err(|e| Error::CaptureError(e.to_string()))?;
                (json!({ "x": 0.0, "y": 0.0, "width": content.width.ceil(), "height": content.height.ceil(), "scale": 1.0 }), true)
            }
        };

        let mut request = json!({
            "format": format_name(params.format),
            "clip": clip,
            "fromSurface": true,
            "captureBeyondViewport": beyond_viewport,
        });
        if params.format.is_lossy() {
            request["quality"] = json!(params.quality);
        }
        let command: Page::CaptureScreenshot = protocol_params(request)?;

        let shot = self
            .tab
            .call_method(command)
            .map_err(|e| Error::CaptureError(format!("Page.captureScreenshot failed: {}", e)))?;

        base64::engine::general_purpose::STANDARD
            .decode(shot.data)
            .map_err(|e| Error::CaptureError(format!("Screenshot payload is not valid base64: {}", e)))
    }
}

/// Build a protocol command from its JSON form.
///
/// Optional fields left out of `value` deserialize to `None`, which keeps the
/// call sites independent of the protocol revision headless_chrome ships.
fn protocol_params<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::CdpError(format!("Invalid protocol parameters: {}", e)))
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Webp => "webp",
    }
}

fn rect_from(raw: &Value, key: &str) -> Option<ContentBox> {
    let rect = raw.get(key)?;
    let field = |name: &str| rect.get(name).and_then(Value::as_f64);
    Some(ContentBox {
        x: field("x").unwrap_or(0.0),
        y: field("y").unwrap_or(0.0),
        width: field("width")?,
        height: field("height")?,
    })
}
