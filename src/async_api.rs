#[cfg(feature = "cdp")]
use crate::cdp::{CdpSession, LaunchConfig};
use crate::{workflow, CaptureConfig, Error, Result, ScreenshotRequest, Session};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// How long a cancelled capture or a close waits for the worker to stop
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

enum Command {
    Capture(ScreenshotRequest, CancellationToken, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly screenshot taker backed by a dedicated worker thread.
///
/// The worker thread owns the synchronous session and runs one capture at a
/// time, so async callers never block the runtime and the browser is never
/// shared between concurrent captures.
#[derive(Clone)]
pub struct Shooter {
    cmd_tx: Sender<Command>,
    grace: Duration,
}

impl Shooter {
    /// Launch Chrome on a background thread.
    #[cfg(feature = "cdp")]
    pub async fn new(launch: LaunchConfig, config: CaptureConfig) -> Result<Self> {
        Self::spawn(move |config| CdpSession::launch(&launch, config), config).await
    }

    /// Open a session with `open` on a background thread and serve captures
    /// from it until closed or cancelled.
    pub async fn spawn<F, S>(open: F, config: CaptureConfig) -> Result<Self>
    where
        F: FnOnce(&CaptureConfig) -> Result<S> + Send + 'static,
        S: Session + 'static,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            let session = match open(&config) {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            // Signal successful creation (no-op when previous send returned Err)
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Capture(request, cancel, resp) => {
                        let res = workflow::capture(&session, &request, &config, &cancel);
                        let _ = resp.send(res);
                        if cancel.is_cancelled() {
                            debug!("Capture cancelled; shutting the browser down");
                            if let Err(e) = session.close() {
                                warn!("Failed to close browser: {}", e);
                            }
                            break;
                        }
                    }
                    Command::Close(resp) => {
                        let res = session.close();
                        let _ = resp.send(res);
                        break;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx, grace: SHUTDOWN_GRACE })
    }

    /// Bound how long cancellation and [`Shooter::close`] wait for the worker.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Capture a screenshot, honouring `cancel`.
    ///
    /// When `cancel` fires the worker is given the grace period to stop the
    /// browser before [`Error::Cancelled`] is returned.
    pub async fn capture(&self, request: ScreenshotRequest, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let (tx, mut rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Capture(request, cancel.clone(), tx))
            .map_err(|_| Error::Other("Browser worker has stopped".into()))?;

        tokio::select! {
            res = &mut rx => return res.map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?,
            _ = cancel.cancelled() => {}
        }

        match tokio::time::timeout(self.grace, rx).await {
            Ok(_) => debug!("Browser worker stopped after cancellation"),
            Err(_) => warn!("Browser worker did not stop within {:?}", self.grace),
        }
        Err(Error::Cancelled)
    }

    /// Shutdown the background worker and close the browser.
    ///
    /// A worker still busy past the grace period is left behind.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(tx)).is_err() {
            // Worker already exited (e.g. after a cancelled capture)
            return Ok(());
        }

        match tokio::time::timeout(self.grace, rx).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => {
                debug!("Browser worker exited before the close request");
                Ok(())
            }
            Err(_) => {
                warn!("Browser worker did not stop within {:?}", self.grace);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureParams, CookieParam, DeviceMetrics, LayoutMetrics};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    /// Session whose navigation blocks without looking at the token
    struct Stalled {
        navigation: Duration,
        closed: Arc<AtomicBool>,
    }

    impl Session for Stalled {
        fn set_cookie(&self, _cookie: &CookieParam) -> Result<()> {
            Ok(())
        }
        fn navigate(&self, _url: &str) -> Result<()> {
            thread::sleep(self.navigation);
            Ok(())
        }
        fn selector_present(&self, _selector: &str) -> Result<bool> {
            Ok(true)
        }
        fn layout_metrics(&self) -> Result<LayoutMetrics> {
            Ok(LayoutMetrics::default())
        }
        fn emulate_device(&self, _metrics: &DeviceMetrics) -> Result<()> {
            Ok(())
        }
        fn capture(&self, _params: &CaptureParams) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
        fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn stalled_shooter(navigation: Duration, closed: Arc<AtomicBool>) -> Shooter {
        Shooter::spawn(move |_| Ok(Stalled { navigation, closed }), CaptureConfig::default())
            .await
            .expect("spawn worker")
            .with_grace(Duration::from_millis(50))
    }

    fn request() -> ScreenshotRequest {
        ScreenshotRequest { url: "https://example.test".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn capture_and_close_round_trip() {
        let closed = Arc::new(AtomicBool::new(false));
        let shooter = stalled_shooter(Duration::ZERO, closed.clone()).await;

        let image = shooter.capture(request(), &CancellationToken::new()).await.unwrap();
        assert_eq!(image, vec![1, 2, 3]);
        shooter.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_capture_and_close_are_bounded_by_grace() {
        let shooter = stalled_shooter(Duration::from_secs(2), Arc::new(AtomicBool::new(false))).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = shooter.capture(request(), &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled), "got {:?}", err);

        // The worker is still stuck in navigation; close must not wait for it.
        shooter.close().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn failed_open_is_reported() {
        let res = Shooter::spawn(
            |_| -> Result<Stalled> { Err(Error::InitializationError("no browser".into())) },
            CaptureConfig::default(),
        )
        .await;
        assert!(matches!(res, Err(Error::InitializationError(_))));
    }
}
