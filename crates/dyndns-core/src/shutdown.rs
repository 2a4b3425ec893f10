//! Shutdown coordination
//!
//! [`ShutdownCoordinator`] turns the first qualifying OS signal into a
//! graceful stop request. It owns the cancellation token handed to the
//! monitor; there is no process-wide signal state.

use std::fmt;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// OS signals the coordinator listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP, logged and ignored
    Hangup,
}

impl ShutdownSignal {
    /// Whether this signal requests a stop
    pub fn requests_stop(self) -> bool {
        matches!(self, Self::Interrupt | Self::Terminate)
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
        };
        f.write_str(name)
    }
}

/// Delivers a single stop request to the monitor
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to components that must observe the stop request
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether a stop was already requested
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request a stop
    ///
    /// Never blocks, even if every observer has already exited. Repeated
    /// calls are no-ops.
    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            info!(reason, "Requesting graceful shutdown");
            self.token.cancel();
        }
    }

    /// Drive `work` to completion unless a stop is requested first
    ///
    /// Returns `None` if the stop won; `work` is dropped at that point.
    pub async fn run_until_stopped<F>(&self, work: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = work => Some(output),
        }
    }

    /// Forward the first stop-requesting signal from `signals`
    ///
    /// Every signal is logged; ones that do not request a stop are otherwise
    /// ignored. Returns the forwarded signal, or `None` if the stream ended
    /// first.
    pub async fn forward_first<S>(&self, signals: S) -> Option<ShutdownSignal>
    where
        S: Stream<Item = ShutdownSignal>,
    {
        tokio::pin!(signals);

        while let Some(signal) = signals.next().await {
            info!(signal = %signal, "Signal received");
            if signal.requests_stop() {
                self.trigger(&signal.to_string());
                return Some(signal);
            }
        }

        None
    }

    /// Listen for OS signals and forward the first stop request
    ///
    /// Intended to run on its own task for the life of the process.
    #[cfg(unix)]
    pub async fn listen(self) -> std::io::Result<Option<ShutdownSignal>> {
        use tokio::signal::unix::{SignalKind, signal};
        use tokio_stream::wrappers::SignalStream;

        let interrupt = SignalStream::new(signal(SignalKind::interrupt())?)
            .map(|()| ShutdownSignal::Interrupt);
        let terminate = SignalStream::new(signal(SignalKind::terminate())?)
            .map(|()| ShutdownSignal::Terminate);
        let hangup = SignalStream::new(signal(SignalKind::hangup())?)
            .map(|()| ShutdownSignal::Hangup);

        Ok(self
            .forward_first(interrupt.merge(terminate).merge(hangup))
            .await)
    }

    /// Listen for Ctrl-C and forward it as a stop request
    #[cfg(not(unix))]
    pub async fn listen(self) -> std::io::Result<Option<ShutdownSignal>> {
        tokio::signal::ctrl_c().await?;
        Ok(self
            .forward_first(tokio_stream::once(ShutdownSignal::Interrupt))
            .await)
    }
}
