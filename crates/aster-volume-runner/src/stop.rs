/*
[INPUT]:  OS shutdown signals and programmatic stop requests
[OUTPUT]: Cooperative cancellation checked at round boundaries
[POS]:    Lifecycle layer - stop controller for worker loops
[UPDATE]: When changing shutdown semantics
*/

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cooperative stop controller.
///
/// A tripped controller never resets; the worker finishes its in-flight
/// round, runs reconciliation and exits.
#[derive(Debug, Clone, Default)]
pub struct StopController {
    token: CancellationToken,
}

impl StopController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn trip(&self) {
        self.token.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Sleep for `duration`, waking early when a stop is requested.
    ///
    /// Sleeps in one-second slices so long between-round intervals do not
    /// delay shutdown.
    pub async fn interruptible_wait(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.is_stopping() {
                return;
            }
            let slice = remaining.min(Duration::from_secs(1));
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(slice) => {}
            }
            remaining = remaining.saturating_sub(slice);
        }
    }

    /// Install SIGINT/SIGTERM handlers that trip this controller.
    pub fn install_signal_handlers(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to install SIGINT handler");
                return;
            }
            info!("received SIGINT");
            token.cancel();
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let token = self.token.clone();
            tokio::spawn(async move {
                match signal(SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("received SIGTERM");
                        token.cancel();
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to install SIGTERM handler");
                    }
                }
            });
        }
    }
}
