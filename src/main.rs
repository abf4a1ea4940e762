use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tss::cdp::LaunchConfig;
use tss::{CaptureConfig, Error, ImageFormat, Result, ScreenshotRequest, Shooter, DEFAULT_READY_SELECTOR};

/// Take a screenshot of a web page with headless Chrome
#[derive(Parser, Debug)]
#[command(name = "tss", version, about)]
struct Args {
    /// URL to capture
    #[arg(long)]
    url: String,

    /// File holding a raw cookie header (`name=value; name2=value2`)
    #[arg(long)]
    cookie: Option<PathBuf>,

    /// Where to write the screenshot
    #[arg(long, default_value = "screenshot.png")]
    screenshot: PathBuf,

    /// Run Chrome with a visible window
    #[arg(long)]
    no_headless: bool,

    /// Hide scrollbars in the capture
    #[arg(long)]
    hide_scrollbars: bool,

    /// CSS selector that must be present before capturing
    #[arg(long, default_value = DEFAULT_READY_SELECTOR)]
    wait_selector: String,

    /// Capture width in pixels (0 = natural width)
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Capture height in pixels (0 = natural height)
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// Deadline for the page to become ready, in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout: u64,

    /// Image format: png, jpeg or webp
    #[arg(long, default_value = "png")]
    format: ImageFormat,

    /// Quality for lossy formats (0-100)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Verbose logging, including cookies the browser rejected
    #[arg(long)]
    debug: bool,
}

fn read_cookie(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read cookie file {}: {}", path.display(), e)))
}

/// Termination signals the CLI reacts to
#[cfg(unix)]
struct Signals {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        let install = |kind: SignalKind| {
            signal(kind).map_err(|e| Error::InitializationError(format!("Failed to install signal handler: {}", e)))
        };
        Ok(Self {
            hangup: install(SignalKind::hangup())?,
            interrupt: install(SignalKind::interrupt())?,
            terminate: install(SignalKind::terminate())?,
            quit: install(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> Result<()> {
        tokio::select! {
            _ = self.hangup.recv() => {}
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
            _ = self.quit.recv() => {}
        }
        Ok(())
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Signals)
    }

    async fn recv(&mut self) -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::InitializationError(format!("Failed to install signal handler: {}", e)))
    }
}

async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let cookie_header = match &args.cookie {
        Some(path) => read_cookie(path)?,
        None => String::new(),
    };

    let request = ScreenshotRequest {
        url: args.url.clone(),
        cookie_header,
        ready_selector: args.wait_selector.clone(),
        width: args.width,
        height: args.height,
    };
    request.validate()?;

    let config = CaptureConfig {
        timeout_ms: args.timeout,
        format: args.format,
        quality: args.quality,
        debug: args.debug,
        ..Default::default()
    };
    let launch = LaunchConfig {
        headless: !args.no_headless,
        hide_scrollbars: args.hide_scrollbars,
        ..Default::default()
    };

    let shooter = Shooter::new(launch, config).await?;
    let image = match shooter.capture(request, &cancel).await {
        Ok(image) => image,
        // The worker tears the browser down itself once cancelled.
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
            if let Err(close_err) = shooter.close().await {
                warn!("Failed to close browser: {}", close_err);
            }
            return Err(e);
        }
    };
    shooter.close().await?;

    std::fs::write(&args.screenshot, &image).map_err(|e| {
        Error::PersistenceError(format!("{}: {}", args.screenshot.display(), e))
    })?;
    info!("Wrote {} bytes to {}", image.len(), args.screenshot.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let cancel = CancellationToken::new();
    match Signals::install() {
        Ok(mut signals) => {
            let watcher = cancel.clone();
            tokio::spawn(async move {
                while signals.recv().await.is_ok() {
                    if watcher.is_cancelled() {
                        warn!("Received second termination signal; exiting without waiting for chrome");
                        std::process::exit(130);
                    }
                    info!("Received termination signal; stopping chrome");
                    watcher.cancel();
                }
            });
        }
        Err(e) => warn!("{}", e),
    }

    match run(args, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Cancelled) => {
            info!("Stopped chrome");
            ExitCode::from(130)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
