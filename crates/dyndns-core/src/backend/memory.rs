// # Memory DNS Backend
//
// In-memory implementation of DnsBackend.
//
// ## Purpose
//
// Behaves like a managed provider (hosted zones, record sets, upsert
// semantics) without talking to one. Useful for tests and for trying the
// daemon locally with `--backend memory`.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - The daemon's startup reconciliation will simply "create" the record again

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::dns_backend::{DnsBackend, RECORD_TTL_SECS};

/// A record set as stored by [`MemoryDnsBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Hosted zone the record belongs to
    pub zone_id: String,
    /// Addresses on record
    pub values: Vec<Ipv4Addr>,
    /// Advertised TTL
    pub ttl: u32,
}

#[derive(Debug, Default)]
struct Inner {
    /// Normalized domain → zone id
    zones: HashMap<String, String>,
    /// Normalized FQDN → record set
    records: HashMap<String, StoredRecord>,
}

/// In-memory DNS backend
///
/// Zones and records are kept in a HashMap protected by a RwLock. Clones
/// share the same storage.
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::backend::MemoryDnsBackend;
/// use dyndns_core::DnsBackend;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = MemoryDnsBackend::with_zone("example.com", "Z1");
///
///     let zone = backend.resolve_zone("example.com.").await?;
///     backend.upsert("home.example.com.", &zone, "1.2.3.4".parse()?).await?;
///
///     let ip = backend.lookup_record("home.example.com.").await?;
///     assert_eq!(ip, "1.2.3.4".parse::<std::net::Ipv4Addr>()?);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDnsBackend {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDnsBackend {
    /// Create a backend without any hosted zone
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend hosting a single zone
    pub fn with_zone(domain: &str, zone_id: impl Into<String>) -> Self {
        let mut inner = Inner::default();
        inner.zones.insert(normalize(domain), zone_id.into());
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Place a record set directly, bypassing upsert semantics
    ///
    /// This is how a zone with several `A` values for one name (an
    /// inconsistency `upsert` never produces) can be set up.
    pub async fn put_record(&self, fqdn: &str, zone_id: &str, values: Vec<Ipv4Addr>, ttl: u32) {
        let mut guard = self.inner.write().await;
        guard.records.insert(
            normalize(fqdn),
            StoredRecord {
                zone_id: zone_id.to_string(),
                values,
                ttl,
            },
        );
    }

    /// Get the stored record set for `fqdn`
    pub async fn record(&self, fqdn: &str) -> Option<StoredRecord> {
        self.inner.read().await.records.get(&normalize(fqdn)).cloned()
    }

    /// Get the number of record sets in the backend
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the backend holds no record sets
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

/// Lowercase and ensure exactly one trailing dot
fn normalize(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.').to_ascii_lowercase())
}

#[async_trait]
impl DnsBackend for MemoryDnsBackend {
    async fn resolve_zone(&self, domain: &str) -> Result<String, Error> {
        let guard = self.inner.read().await;
        guard
            .zones
            .get(&normalize(domain))
            .cloned()
            .ok_or_else(|| Error::zone_not_found(normalize(domain)))
    }

    async fn lookup_record(&self, fqdn: &str) -> Result<Ipv4Addr, Error> {
        let guard = self.inner.read().await;
        let record = guard
            .records
            .get(&normalize(fqdn))
            .ok_or_else(|| Error::not_found(format!("{fqdn} has no A record")))?;

        match record.values.as_slice() {
            [] => Err(Error::not_found(format!("{fqdn} has no A record"))),
            [ip] => Ok(*ip),
            [first, ..] => Err(Error::ambiguous(fqdn, *first, record.values.len())),
        }
    }

    async fn upsert(&self, fqdn: &str, zone_id: &str, ip: Ipv4Addr) -> Result<(), Error> {
        let mut guard = self.inner.write().await;

        if !guard.zones.values().any(|id| id == zone_id) {
            return Err(Error::backend(
                self.backend_name(),
                format!("cannot upsert {fqdn}: unknown hosted zone {zone_id}"),
            ));
        }

        guard.records.insert(
            normalize(fqdn),
            StoredRecord {
                zone_id: zone_id.to_string(),
                values: vec![ip],
                ttl: RECORD_TTL_SECS,
            },
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
