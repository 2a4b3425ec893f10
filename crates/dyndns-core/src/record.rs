//! The managed DNS record
//!
//! A [`DnsRecord`] is built once at startup by resolving the hosted zone for
//! the configured domain. It is read-only afterwards and shared by the
//! reconciler and the dispatcher.

use crate::config::RecordConfig;
use crate::error::Result;
use crate::traits::DnsBackend;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info};

/// The single record this process keeps pointed at the public address
#[derive(Clone)]
pub struct DnsRecord {
    fqdn: String,
    zone_id: String,
    backend: Arc<dyn DnsBackend>,
}

impl fmt::Debug for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsRecord")
            .field("fqdn", &self.fqdn)
            .field("zone_id", &self.zone_id)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl DnsRecord {
    /// Resolve the hosted zone for `config.domain` and build the record
    ///
    /// # Errors
    ///
    /// `Error::ZoneNotFound` if the backend hosts no matching zone. This is
    /// fatal for the daemon: there is nothing to update.
    pub async fn resolve(config: &RecordConfig, backend: Arc<dyn DnsBackend>) -> Result<Self> {
        let domain = format!("{}.", config.domain.trim_end_matches('.'));
        debug!(domain = %domain, backend = backend.backend_name(), "Resolving hosted zone");

        let zone_id = backend.resolve_zone(&domain).await?;
        let fqdn = config.fqdn();

        info!(fqdn = %fqdn, zone_id = %zone_id, "Managing record");
        Ok(Self {
            fqdn,
            zone_id,
            backend,
        })
    }

    /// Fully-qualified name, with trailing dot
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Hosted zone identifier
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Name of the backend serving this record
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Look up the address currently on record
    pub async fn lookup(&self) -> Result<Ipv4Addr> {
        self.backend.lookup_record(&self.fqdn).await
    }

    /// Point the record at `ip`
    pub async fn upsert(&self, ip: Ipv4Addr) -> Result<()> {
        self.backend.upsert(&self.fqdn, &self.zone_id, ip).await
    }
}
