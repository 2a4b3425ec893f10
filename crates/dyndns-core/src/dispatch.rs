//! Update dispatcher
//!
//! Drains the monitor's change events and pushes each new address to DNS.
//! A failed upsert is logged and never stops the loop.

use crate::record::DnsRecord;
use crate::traits::IpChangeEvent;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Counts of what the dispatcher did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Upserts that succeeded
    pub applied: u64,
    /// Upserts that failed
    pub failed: u64,
}

/// Consumes change events and upserts the record
#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    record: DnsRecord,
}

impl UpdateDispatcher {
    /// Create a dispatcher for `record`
    pub fn new(record: DnsRecord) -> Self {
        Self { record }
    }

    /// Consume events until the channel closes
    pub async fn run(&self, mut events: mpsc::Receiver<IpChangeEvent>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        while let Some(event) = events.recv().await {
            info!(
                fqdn = self.record.fqdn(),
                previous = ?event.previous_ip,
                ip = %event.new_ip,
                at = %event.timestamp,
                "IP change detected"
            );

            match self.record.upsert(event.new_ip).await {
                Ok(()) => {
                    summary.applied += 1;
                    info!(fqdn = self.record.fqdn(), ip = %event.new_ip, "Record updated");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        fqdn = self.record.fqdn(),
                        ip = %event.new_ip,
                        backend = self.record.backend_name(),
                        error = %e,
                        "Cannot upsert record"
                    );
                }
            }
        }

        summary
    }
}
