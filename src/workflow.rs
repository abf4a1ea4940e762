//! The capture workflow: cookies, navigation, layout and capture in order

use crate::capture::{run_strategy, CaptureStrategy};
use crate::{checkpoint, cookie, navigate, CaptureConfig, Result, ScreenshotRequest, Session};
use log::{debug, info};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capture one screenshot for `request` using `session`.
///
/// Steps run strictly in order and the first failing step aborts the run
/// with its own error. Only per-cookie failures are tolerated. `cancel` is
/// checked before every step and while waiting for the page to be ready.
pub fn capture(
    session: &dyn Session,
    request: &ScreenshotRequest,
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    request.validate()?;
    config.validate()?;

    let cookies = cookie::parse_cookie_header(&request.cookie_header)?;
    let strategy = CaptureStrategy::select(request.width, request.height);
    if config.debug {
        info!("Capturing {} ({:?})", request.url, strategy);
    }

    checkpoint(cancel)?;
    let outcomes = cookie::inject_cookies(session, &request.url, &cookies)?;
    let failed = cookie::report_outcomes(&outcomes, config.debug);
    if !outcomes.is_empty() {
        debug!("Injected {}/{} cookie(s)", outcomes.len() - failed, outcomes.len());
    }

    checkpoint(cancel)?;
    navigate::navigate_and_wait(
        session,
        &request.url,
        &request.ready_selector,
        Duration::from_millis(config.timeout_ms),
        Duration::from_millis(config.poll_interval_ms),
        cancel,
    )?;

    checkpoint(cancel)?;
    let image = run_strategy(session, strategy, config.format, config.quality, cancel)?;

    checkpoint(cancel)?;
    Ok(image)
}
