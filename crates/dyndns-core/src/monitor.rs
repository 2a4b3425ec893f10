//! Public IP change monitor
//!
//! A polling loop that samples an [`IpSource`] on a fixed interval and emits
//! an [`IpChangeEvent`] for every transition away from the last known
//! address.
//!
//! ## States
//!
//! ```text
//!            tick: same IP / lookup error
//!               ┌──────────┐
//!               ▼          │
//!          ┌─────────┐─────┘           ┌─────────┐
//!   ──────►│ Running │──── cancel ────►│ Stopped │  (sender dropped)
//!          └─────────┘                 └─────────┘
//!               │  ▲
//!  tick: new IP │  │ event accepted → last_known = new IP
//!               ▼  │
//!             send event
//! ```
//!
//! The last known address lives only on this loop's stack. It changes only
//! after the channel accepted the event, so the emitted stream and the
//! observed state never diverge.

use crate::error::{Error, Result};
use crate::traits::{IpChangeEvent, IpSource};
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the monitor did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    /// Timer ticks handled
    pub ticks: u64,
    /// Ticks whose lookup failed
    pub failed_lookups: u64,
    /// Change events accepted by the channel
    pub events_emitted: u64,
    /// Last known address when the loop exited
    pub last_known: Option<Ipv4Addr>,
}

/// Polls an IP source and reports address transitions
pub struct IpChangeMonitor {
    source: Arc<dyn IpSource>,
    poll_interval: Duration,
    channel_capacity: usize,
}

impl IpChangeMonitor {
    /// Create a monitor sampling `source` every `poll_interval`
    ///
    /// # Errors
    ///
    /// `Error::Config` if `poll_interval` is zero.
    pub fn new(source: Arc<dyn IpSource>, poll_interval: Duration) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(Error::config("IP change monitor interval must be > 0"));
        }
        Ok(Self {
            source,
            poll_interval,
            channel_capacity: 1,
        })
    }

    /// Override the event channel capacity (minimum 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Spawn the loop on the current runtime
    ///
    /// Returns the task handle and the receiving end of the event channel.
    /// The channel closes when the loop stops.
    pub fn spawn(
        self,
        seed: Option<Ipv4Addr>,
        shutdown: CancellationToken,
    ) -> (JoinHandle<MonitorReport>, mpsc::Receiver<IpChangeEvent>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let handle = tokio::spawn(self.run(seed, tx, shutdown));
        (handle, rx)
    }

    /// Run the loop until `shutdown` is cancelled or the receiver goes away
    ///
    /// The first sample is taken one interval after the call. An in-flight
    /// lookup is allowed to finish before cancellation is observed.
    pub async fn run(
        self,
        seed: Option<Ipv4Addr>,
        events: mpsc::Sender<IpChangeEvent>,
        shutdown: CancellationToken,
    ) -> MonitorReport {
        let mut report = MonitorReport {
            last_known: seed,
            ..MonitorReport::default()
        };

        let started = Instant::now();
        let started_at = Utc::now();
        let mut ticker = tokio::time::interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            source = self.source.source_name(),
            interval = ?self.poll_interval,
            seed = ?seed,
            "Waiting for changes to the public IP"
        );

        loop {
            let tick = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Stop requested");
                    break;
                }
                tick = ticker.tick() => tick,
            };

            report.ticks += 1;
            let observed_at = tick_time(started_at, started, tick);

            let current = match self.source.current().await {
                Ok(ip) => ip,
                Err(e) if e.is_transient() => {
                    report.failed_lookups += 1;
                    warn!(
                        error = %e,
                        "Couldn't determine public IP. This could be a transient issue and is ignored"
                    );
                    continue;
                }
                Err(e) => {
                    report.failed_lookups += 1;
                    error!(
                        source = self.source.source_name(),
                        error = %e,
                        "IP source failed, retrying on the next tick"
                    );
                    continue;
                }
            };

            if report.last_known == Some(current) {
                continue;
            }

            let event = IpChangeEvent::at(observed_at, current, report.last_known);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(ip = %current, "Stop requested while handing off a change, dropping it");
                    break;
                }
                sent = events.send(event) => {
                    if sent.is_err() {
                        warn!("Change receiver dropped, stopping monitor");
                        break;
                    }
                }
            }

            report.events_emitted += 1;
            report.last_known = Some(current);
        }

        info!(
            ticks = report.ticks,
            failed_lookups = report.failed_lookups,
            events = report.events_emitted,
            "IP change monitor stopped"
        );
        report
    }
}

/// Wall-clock time of a tick, anchored at the monitor's start
fn tick_time(started_at: DateTime<Utc>, started: Instant, tick: Instant) -> DateTime<Utc> {
    let elapsed = tick.saturating_duration_since(started);
    chrono::Duration::from_std(elapsed)
        .map(|elapsed| started_at + elapsed)
        .unwrap_or(started_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource(Ipv4Addr, AtomicUsize);

    #[async_trait]
    impl IpSource for FixedSource {
        async fn current(&self) -> Result<Ipv4Addr> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick_samples_nothing() {
        let source = Arc::new(FixedSource(Ipv4Addr::new(1, 2, 3, 4), AtomicUsize::new(0)));
        let token = CancellationToken::new();
        token.cancel();

        let monitor = IpChangeMonitor::new(source.clone(), Duration::from_secs(4)).unwrap();
        let (handle, mut rx) = monitor.spawn(None, token);

        assert!(rx.recv().await.is_none());
        let report = handle.await.unwrap();
        assert_eq!(report.ticks, 0);
        assert_eq!(source.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_seed_reports_first_sample() {
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        let source = Arc::new(FixedSource(ip, AtomicUsize::new(0)));
        let token = CancellationToken::new();

        let monitor = IpChangeMonitor::new(source, Duration::from_secs(4)).unwrap();
        let (handle, mut rx) = monitor.spawn(None, token.clone());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.previous_ip, None);
        assert_eq!(event.new_ip, ip);

        token.cancel();
        assert!(rx.recv().await.is_none());
        let report = handle.await.unwrap();
        assert_eq!(report.events_emitted, 1);
        assert_eq!(report.last_known, Some(ip));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_stops_monitor() {
        let source = Arc::new(FixedSource(Ipv4Addr::new(1, 2, 3, 4), AtomicUsize::new(0)));
        let monitor = IpChangeMonitor::new(source, Duration::from_secs(4)).unwrap();
        let (handle, rx) = monitor.spawn(None, CancellationToken::new());
        drop(rx);

        let report = handle.await.unwrap();
        assert_eq!(report.events_emitted, 0);
        assert_eq!(report.last_known, None);
    }

    /// Alternates between two addresses on every call
    struct FlappingSource(AtomicUsize);

    #[async_trait]
    impl IpSource for FlappingSource {
        async fn current(&self) -> Result<Ipv4Addr> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Ipv4Addr::new(192, 0, 2, if n % 2 == 0 { 1 } else { 2 }))
        }

        fn source_name(&self) -> &'static str {
            "flapping"
        }
    }

    #[test]
    fn test_zero_interval_is_config_error() {
        let source = Arc::new(FixedSource(Ipv4Addr::new(1, 2, 3, 4), AtomicUsize::new(0)));
        let err = IpChangeMonitor::new(source, Duration::ZERO).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_timestamps_follow_ticks() {
        let source = Arc::new(FlappingSource(AtomicUsize::new(0)));
        let token = CancellationToken::new();

        let monitor = IpChangeMonitor::new(source, Duration::from_secs(4)).unwrap();
        let (handle, mut rx) = monitor.spawn(None, token.clone());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        token.cancel();
        while rx.recv().await.is_some() {}
        handle.await.unwrap();

        assert_eq!(second.timestamp - first.timestamp, chrono::Duration::seconds(4));
        assert_eq!(third.timestamp - second.timestamp, chrono::Duration::seconds(4));
        assert_eq!(second.previous_ip, Some(first.new_ip));
    }

    #[test]
    fn test_tick_time_is_anchored_at_start() {
        let started = Instant::now();
        let started_at = Utc::now();

        let later = tick_time(started_at, started, started + Duration::from_secs(8));
        assert_eq!(later - started_at, chrono::Duration::seconds(8));
        // a tick never lies before the anchor
        assert_eq!(tick_time(started_at, started + Duration::from_secs(1), started), started_at);
    }
}
