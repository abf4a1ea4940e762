//! Layout resolution for sized captures
//!
//! The page reports its natural content box; the caller may pin either axis.
//! Each axis is resolved on its own, so a caller can fix the width and let
//! the height follow the content (or the other way round).

use crate::{Error, Result, Session};
use log::debug;

/// A rectangle reported by the page, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Content sizes reported by a layout metrics query
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutMetrics {
    /// Raw layout content size
    pub content_size: ContentBox,
    /// Content size in CSS pixels, when the browser reports it
    pub css_content_size: Option<ContentBox>,
}

impl LayoutMetrics {
    /// The natural content box; the CSS size wins when present.
    pub fn natural(&self) -> ContentBox {
        self.css_content_size.unwrap_or(self.content_size)
    }
}

/// Region handed to the capture primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl CaptureRectangle {
    /// Whole-pixel viewport size that fully contains this rectangle
    pub fn viewport_size(&self) -> (u32, u32) {
        (ceil_px(self.width), ceil_px(self.height))
    }
}

/// Combine the natural content box with the requested dimensions.
///
/// A requested dimension of zero means "use the natural size" on that axis.
pub fn resolve_rectangle(metrics: &LayoutMetrics, width: u32, height: u32) -> CaptureRectangle {
    let natural = metrics.natural();
    CaptureRectangle {
        x: natural.x,
        y: natural.y,
        width: if width > 0 { f64::from(width) } else { natural.width },
        height: if height > 0 { f64::from(height) } else { natural.height },
        scale: 1.0,
    }
}

/// Query the session for layout metrics and resolve the capture rectangle.
pub fn query_rectangle(session: &dyn Session, width: u32, height: u32) -> Result<CaptureRectangle> {
    let metrics = session.layout_metrics().map_err(|e| match e {
        Error::LayoutQueryError(_) | Error::Cancelled => e,
        other => Error::LayoutQueryError(other.to_string()),
    })?;
    let rect = resolve_rectangle(&metrics, width, height);
    debug!(
        "Resolved capture rectangle {}x{} at ({}, {}) from natural {:?}",
        rect.width,
        rect.height,
        rect.x,
        rect.y,
        metrics.natural()
    );
    Ok(rect)
}

fn ceil_px(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.ceil().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(w: f64, h: f64) -> LayoutMetrics {
        LayoutMetrics {
            content_size: ContentBox { x: 0.0, y: 0.0, width: w, height: h },
            css_content_size: None,
        }
    }

    #[test]
    fn requested_width_pins_only_that_axis() {
        let rect = resolve_rectangle(&metrics(800.0, 600.0), 400, 0);
        assert_eq!(rect.width, 400.0);
        assert_eq!(rect.height, 600.0);
        assert_eq!(rect.scale, 1.0);
    }

    #[test]
    fn requested_height_pins_only_that_axis() {
        let rect = resolve_rectangle(&metrics(800.0, 600.0), 0, 250);
        assert_eq!((rect.width, rect.height), (800.0, 250.0));
    }

    #[test]
    fn css_content_size_wins_over_raw_size() {
        let mut m = metrics(1600.0, 1200.0);
        m.css_content_size = Some(ContentBox { x: 0.0, y: 8.0, width: 800.0, height: 600.0 });
        let rect = resolve_rectangle(&m, 0, 0);
        assert_eq!((rect.width, rect.height), (800.0, 600.0));
        assert_eq!(rect.y, 8.0);
    }

    #[test]
    fn viewport_size_rounds_up_fractional_pixels() {
        let rect = resolve_rectangle(&metrics(799.2, 600.0), 0, 0);
        assert_eq!(rect.viewport_size(), (800, 600));
        let empty = resolve_rectangle(&metrics(f64::NAN, -1.0), 0, 0);
        assert_eq!(empty.viewport_size(), (0, 0));
    }
}
