//! Capture strategies and the screenshot encoder

use crate::layout::{self, CaptureRectangle};
use crate::{checkpoint, CaptureParams, DeviceMetrics, Error, ImageFormat, Result, ScreenOrientation, Session};
use log::debug;
use tokio_util::sync::CancellationToken;

/// How a request is captured, decided once before navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    /// Emulate a viewport of the resolved size and clip to it
    Sized { width: u32, height: u32 },
    /// Let the browser capture the whole scrollable page
    FullPage,
}

impl CaptureStrategy {
    /// Any positive requested dimension selects a sized capture.
    pub fn select(width: u32, height: u32) -> Self {
        if width > 0 || height > 0 {
            CaptureStrategy::Sized { width, height }
        } else {
            CaptureStrategy::FullPage
        }
    }

    pub fn is_full_page(&self) -> bool {
        matches!(self, CaptureStrategy::FullPage)
    }
}

/// Run the chosen strategy against an already loaded page.
///
/// `cancel` is checked between remote calls; a cancelled run issues no
/// further calls.
pub fn run_strategy(
    session: &dyn Session,
    strategy: CaptureStrategy,
    format: ImageFormat,
    quality: u8,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    match strategy {
        CaptureStrategy::Sized { width, height } => {
            let rect = layout::query_rectangle(session, width, height)?;
            checkpoint(cancel)?;
            sized_capture(session, &rect, format, quality, cancel)
        }
        CaptureStrategy::FullPage => encode(
            session,
            &CaptureParams {
                format,
                quality,
                clip: None,
            },
        ),
    }
}

/// Force the viewport to the rectangle's size, then capture a clip of it.
pub fn sized_capture(
    session: &dyn Session,
    rect: &CaptureRectangle,
    format: ImageFormat,
    quality: u8,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let (width, height) = rect.viewport_size();
    let metrics = DeviceMetrics {
        width,
        height,
        device_scale_factor: 1.0,
        mobile: false,
        orientation: ScreenOrientation::PortraitPrimary,
    };
    debug!("Emulating {}x{} viewport", width, height);
    session.emulate_device(&metrics).map_err(|e| match e {
        Error::CaptureError(_) | Error::Cancelled => e,
        other => Error::CaptureError(format!("Viewport emulation failed: {}", other)),
    })?;

    checkpoint(cancel)?;
    encode(
        session,
        &CaptureParams {
            format,
            quality,
            clip: Some(CaptureRectangle { scale: 1.0, ..*rect }),
        },
    )
}

/// Invoke the session's capture primitive and return the encoded image.
pub fn encode(session: &dyn Session, params: &CaptureParams) -> Result<Vec<u8>> {
    let data = session.capture(params).map_err(|e| match e {
        Error::CaptureError(_) | Error::Cancelled => e,
        other => Error::CaptureError(other.to_string()),
    })?;

    if data.is_empty() {
        return Err(Error::CaptureError("Browser returned an empty image".into()));
    }
    debug!("Captured {} bytes ({:?})", data.len(), params.format);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_zero_selects_full_page() {
        assert_eq!(CaptureStrategy::select(0, 0), CaptureStrategy::FullPage);
        assert!(CaptureStrategy::select(0, 0).is_full_page());
    }

    #[test]
    fn any_positive_dimension_selects_sized() {
        assert_eq!(CaptureStrategy::select(300, 0), CaptureStrategy::Sized { width: 300, height: 0 });
        assert_eq!(CaptureStrategy::select(0, 200), CaptureStrategy::Sized { width: 0, height: 200 });
        assert!(!CaptureStrategy::select(1, 1).is_full_page());
    }
}
