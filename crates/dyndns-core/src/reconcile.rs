//! Startup reconciliation
//!
//! Runs once before monitoring starts and brings DNS in line with the current
//! public address:
//!
//! ```text
//! fetch P ──fail──► skip (seed = None)
//!    │
//!    ▼
//! lookup D ──NotFound──────────► upsert(P)   (first registration)
//!    │     ──Ambiguous(first)──► D = first   (or fatal under AmbiguityPolicy::Fail)
//!    │     ──other error───────► upsert(P)
//!    ▼
//! D != P ──► upsert(P)
//! D == P ──► nothing
//! ```
//!
//! The seed handed to the monitor is P whenever P was fetched, whether or not
//! an upsert happened.

use crate::config::AmbiguityPolicy;
use crate::error::{Error, Result};
use crate::record::DnsRecord;
use crate::traits::IpSource;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

/// What reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The public address was unavailable; nothing was compared
    Skipped,
    /// DNS already pointed at the public address
    InSync,
    /// The record did not exist (or could not be read) and was created
    Created,
    /// The record pointed elsewhere and was updated
    Updated {
        /// The address DNS reported before the update
        previous: Ipv4Addr,
    },
    /// An upsert was needed but failed; monitoring proceeds anyway
    UpsertFailed,
}

/// Result of startup reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Seed for the monitor's last-known address
    pub seed: Option<Ipv4Addr>,
    /// What happened
    pub outcome: ReconcileOutcome,
}

/// Compare the live public address with DNS and upsert if they differ
///
/// # Errors
///
/// Only `Error::AmbiguousRecord` under [`AmbiguityPolicy::Fail`]. Every other
/// failure is logged and absorbed.
pub async fn reconcile(
    source: &dyn IpSource,
    record: &DnsRecord,
    policy: AmbiguityPolicy,
) -> Result<Reconciliation> {
    let public_ip = match source.current().await {
        Ok(ip) => ip,
        Err(e) => {
            warn!(
                source = source.source_name(),
                error = %e,
                "Couldn't determine public IP at startup, skipping reconciliation"
            );
            return Ok(Reconciliation {
                seed: None,
                outcome: ReconcileOutcome::Skipped,
            });
        }
    };
    debug!(ip = %public_ip, "Public IP at startup");

    let on_record = match record.lookup().await {
        Ok(ip) => Some(ip),
        Err(e @ Error::NotFound(_)) => {
            info!(
                fqdn = record.fqdn(),
                ip = %public_ip,
                error = %e,
                "Record does not exist and will be created pointing to the current public IP"
            );
            None
        }
        Err(Error::AmbiguousRecord { fqdn, first, count }) => {
            if policy == AmbiguityPolicy::Fail {
                error!(fqdn = %fqdn, count, "Multiple addresses on record, refusing to continue");
                return Err(Error::ambiguous(fqdn, first, count));
            }
            warn!(
                fqdn = %fqdn,
                count,
                first = %first,
                "Multiple addresses on record, comparing against the first one"
            );
            Some(first)
        }
        Err(e) => {
            warn!(
                fqdn = record.fqdn(),
                error = %e,
                "Couldn't read the current record, upserting the current public IP"
            );
            None
        }
    };

    if on_record == Some(public_ip) {
        info!(fqdn = record.fqdn(), ip = %public_ip, "Record is up to date");
        return Ok(Reconciliation {
            seed: Some(public_ip),
            outcome: ReconcileOutcome::InSync,
        });
    }

    if let Some(previous) = on_record {
        info!(
            fqdn = record.fqdn(),
            previous = %previous,
            ip = %public_ip,
            "Record resolves to a stale address, updating"
        );
    }

    let outcome = match record.upsert(public_ip).await {
        Ok(()) => match on_record {
            Some(previous) => ReconcileOutcome::Updated { previous },
            None => ReconcileOutcome::Created,
        },
        Err(e) => {
            error!(fqdn = record.fqdn(), ip = %public_ip, error = %e, "Startup upsert failed");
            ReconcileOutcome::UpsertFailed
        }
    };

    Ok(Reconciliation {
        seed: Some(public_ip),
        outcome,
    })
}
