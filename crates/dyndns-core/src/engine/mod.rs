//! Core dyndns engine
//!
//! The DyndnsEngine is responsible for:
//! - Resolving the managed record at startup
//! - Reconciling DNS with the public address once
//! - Running the IP change monitor and the update dispatcher until shutdown
//!
//! ## Architecture
//!
//! ```text
//!                ┌─────────────┐
//!                │  IpSource   │
//!                └─────────────┘
//!                  │         │
//!          (once)  ▼         ▼  (every tick)
//!        ┌────────────┐   ┌────────────────┐   cancel   ┌─────────────────────┐
//!        │ Reconciler │   │ IpChangeMonitor│◄───────────│ ShutdownCoordinator │
//!        └────────────┘   └────────────────┘            └─────────────────────┘
//!               │                 │ IpChangeEvent
//!               │                 ▼
//!               │        ┌──────────────────┐
//!               │        │ UpdateDispatcher │
//!               │        └──────────────────┘
//!               ▼                 ▼
//!            ┌──────────────────────────┐
//!            │ DnsRecord → DnsBackend   │
//!            └──────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! 1. Reconciliation finishes before the monitor is spawned, so its upsert
//!    happens-before the first tick.
//! 2. The monitor is seeded with the address reconciliation fetched.
//! 3. Events reach the dispatcher in detection order.
//! 4. On shutdown the monitor drops its sender, the dispatcher drains and
//!    returns, and `run` joins the monitor.

use crate::config::DyndnsConfig;
use crate::dispatch::{DispatchSummary, UpdateDispatcher};
use crate::error::{Error, Result};
use crate::monitor::{IpChangeMonitor, MonitorReport};
use crate::reconcile::{Reconciliation, reconcile};
use crate::record::DnsRecord;
use crate::traits::{DnsBackend, IpSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything that happened during one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Startup reconciliation result
    pub reconciliation: Reconciliation,
    /// Monitor counters
    pub monitor: MonitorReport,
    /// Dispatcher counters
    pub dispatch: DispatchSummary,
}

/// Core dyndns engine
///
/// ## Lifecycle
///
/// 1. Create with [`DyndnsEngine::new()`] (resolves the hosted zone)
/// 2. Start with [`DyndnsEngine::run()`]
/// 3. Engine runs until the shutdown token is cancelled
pub struct DyndnsEngine {
    /// IP source shared by reconciler and monitor
    ip_source: Arc<dyn IpSource>,

    /// The managed record
    record: DnsRecord,

    /// Validated configuration
    config: DyndnsConfig,
}

impl std::fmt::Debug for DyndnsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DyndnsEngine")
            .field("ip_source", &self.ip_source.source_name())
            .field("record", &self.record)
            .field("config", &self.config)
            .finish()
    }
}

impl DyndnsEngine {
    /// Create a new engine
    ///
    /// # Errors
    ///
    /// - `Error::Config`: invalid configuration
    /// - `Error::ZoneNotFound`: the backend hosts no zone for the domain
    /// - Any backend error raised while resolving the zone
    pub async fn new(
        ip_source: Arc<dyn IpSource>,
        backend: Arc<dyn DnsBackend>,
        config: DyndnsConfig,
    ) -> Result<Self> {
        config.validate()?;

        let record = DnsRecord::resolve(&config.record, backend).await?;

        Ok(Self {
            ip_source,
            record,
            config,
        })
    }

    /// The managed record
    pub fn record(&self) -> &DnsRecord {
        &self.record
    }

    /// Run reconciliation, then monitor and dispatch until `shutdown` fires
    ///
    /// # Errors
    ///
    /// - `Error::AmbiguousRecord` under `AmbiguityPolicy::Fail`
    /// - `Error::Other` if the monitor task panicked
    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunReport> {
        let reconciliation = reconcile(
            self.ip_source.as_ref(),
            &self.record,
            self.config.reconcile.on_ambiguous,
        )
        .await?;

        let monitor = IpChangeMonitor::new(
            Arc::clone(&self.ip_source),
            Duration::from_secs(self.config.ip_source.interval_secs),
        )?
        .with_channel_capacity(self.config.engine.event_channel_capacity);

        let (monitor_handle, events) = monitor.spawn(reconciliation.seed, shutdown);

        let dispatch = UpdateDispatcher::new(self.record.clone()).run(events).await;

        let monitor = monitor_handle
            .await
            .map_err(|e| Error::Other(format!("IP change monitor task failed: {e}")))?;

        info!(
            fqdn = self.record.fqdn(),
            applied = dispatch.applied,
            failed = dispatch.failed,
            "Engine stopped"
        );

        Ok(RunReport {
            reconciliation,
            monitor,
            dispatch,
        })
    }
}
