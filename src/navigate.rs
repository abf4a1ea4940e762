//! Navigation with readiness gating

use crate::{Error, Result, Session};
use log::debug;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Readiness selector used when the caller does not pick one
pub const DEFAULT_READY_SELECTOR: &str = "body";

/// Navigate to `url` and block until `selector` matches an element.
///
/// The deadline covers both the navigation and the readiness wait. The page
/// is polled every `poll` until the selector appears, the deadline passes
/// ([`Error::Timeout`]) or `cancel` fires ([`Error::Cancelled`]). A failed
/// navigation that returns after the deadline is also a timeout.
pub fn navigate_and_wait(
    session: &dyn Session,
    url: &str,
    selector: &str,
    timeout: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let started = Instant::now();
    let selector = if selector.trim().is_empty() { DEFAULT_READY_SELECTOR } else { selector };

    debug!("Navigating to {}", url);
    session.navigate(url).map_err(|e| match e {
        Error::Timeout(_) | Error::Cancelled => e,
        // Failures past the deadline are reported as timeouts.
        _ if started.elapsed() >= timeout => Error::Timeout(timeout.as_millis() as u64),
        Error::NavigationError(_) => e,
        other => Error::NavigationError(other.to_string()),
    })?;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if session.selector_present(selector)? {
            debug!("Selector {:?} ready after {:?}", selector, started.elapsed());
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
        std::thread::sleep(poll.min(timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureParams, CookieParam, DeviceMetrics, LayoutMetrics};
    use std::cell::Cell;

    struct Polled {
        ready_after: u32,
        polls: Cell<u32>,
        hung_navigation: Option<Duration>,
    }

    impl Polled {
        fn ready_after(ready_after: u32) -> Self {
            Polled { ready_after, polls: Cell::new(0), hung_navigation: None }
        }
    }

    impl Session for Polled {
        fn set_cookie(&self, _cookie: &CookieParam) -> Result<()> {
            Ok(())
        }
        fn navigate(&self, _url: &str) -> Result<()> {
            match self.hung_navigation {
                Some(delay) => {
                    std::thread::sleep(delay);
                    Err(Error::NavigationError("Wait for navigation failed: The event waited for never came".into()))
                }
                None => Ok(()),
            }
        }
        fn selector_present(&self, _selector: &str) -> Result<bool> {
            self.polls.set(self.polls.get() + 1);
            Ok(self.polls.get() > self.ready_after)
        }
        fn layout_metrics(&self) -> Result<LayoutMetrics> {
            Ok(LayoutMetrics::default())
        }
        fn emulate_device(&self, _metrics: &DeviceMetrics) -> Result<()> {
            Ok(())
        }
        fn capture(&self, _params: &CaptureParams) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn waits_until_selector_appears() {
        let s = Polled::ready_after(2);
        let token = CancellationToken::new();
        navigate_and_wait(&s, "https://a.test", "#app", Duration::from_secs(5), Duration::from_millis(1), &token)
            .unwrap();
        assert_eq!(s.polls.get(), 3);
    }

    #[test]
    fn times_out_when_selector_never_appears() {
        let s = Polled::ready_after(u32::MAX);
        let token = CancellationToken::new();
        let err = navigate_and_wait(&s, "https://a.test", "#never", Duration::from_millis(30), Duration::from_millis(5), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(30)));
    }

    #[test]
    fn observes_cancellation() {
        let s = Polled::ready_after(u32::MAX);
        let token = CancellationToken::new();
        token.cancel();
        let err = navigate_and_wait(&s, "https://a.test", "body", Duration::from_secs(5), Duration::from_millis(1), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(s.polls.get(), 0);
    }

    #[test]
    fn navigation_outliving_the_deadline_is_a_timeout() {
        let s = Polled { hung_navigation: Some(Duration::from_millis(60)), ..Polled::ready_after(0) };
        let token = CancellationToken::new();
        let err = navigate_and_wait(&s, "https://a.test", "body", Duration::from_millis(50), Duration::from_millis(1), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(50)), "got {:?}", err);
        assert_eq!(s.polls.get(), 0);
    }

    #[test]
    fn quick_navigation_failure_stays_a_navigation_error() {
        let s = Polled { hung_navigation: Some(Duration::from_millis(1)), ..Polled::ready_after(0) };
        let token = CancellationToken::new();
        let err = navigate_and_wait(&s, "https://a.test", "body", Duration::from_secs(5), Duration::from_millis(1), &token)
            .unwrap_err();
        assert!(matches!(err, Error::NavigationError(_)), "got {:?}", err);
    }
}
