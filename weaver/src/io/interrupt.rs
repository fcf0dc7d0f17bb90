//! Cooperative cancellation wired to Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Exit status used when a second interrupt forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Shared flag the session polls between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if cancellation is requested.
    ///
    /// Returns true if the pause was cut short.
    pub fn pause(&self, duration: Duration) -> bool {
        let end = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= end {
                return false;
            }
            thread::sleep(PAUSE_SLICE.min(end - now));
        }
    }
}

/// Set `flag` on the first Ctrl-C; exit immediately on the second.
///
/// The listener runs on its own thread with a single-threaded tokio runtime,
/// leaving the session loop fully synchronous.
pub fn install_ctrl_c(flag: CancelFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    thread::Builder::new()
        .name("weaver-signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(err = %err, "ctrl-c listener failed");
                        return;
                    }
                    if flag.is_cancelled() {
                        warn!("second interrupt, exiting now");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                    info!("interrupt received, stopping after the current iteration");
                    flag.cancel();
                }
            });
        })
        .context("spawn signal thread")?;
    Ok(())
}
