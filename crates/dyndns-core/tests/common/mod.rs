//! Test doubles and common utilities for contract tests
//!
//! These doubles are deterministic: the scripted source hands out a fixed
//! sequence of samples, and the counting backend records every call made
//! against an in-memory zone.

#![allow(dead_code)]

use async_trait::async_trait;
use dyndns_core::backend::MemoryDnsBackend;
use dyndns_core::traits::{DnsBackend, IpSource};
use dyndns_core::{DnsRecord, Error, RecordConfig, Result};
use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

pub const HOST: &str = "home";
pub const DOMAIN: &str = "example.com";
pub const FQDN: &str = "home.example.com.";
pub const ZONE_ID: &str = "Z0TEST";

/// Parse a dotted IPv4 literal
pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid IPv4 literal")
}

/// An IP source replaying a fixed script of samples
///
/// Once the script is exhausted the source cancels `exhausted` and fails
/// every further call. Handing `exhausted` to the monitor therefore stops it
/// right after the last scripted sample was evaluated (one extra failed
/// lookup is counted for the exhausting call).
pub struct ScriptedIpSource {
    script: std::sync::Mutex<VecDeque<Result<Ipv4Addr>>>,
    calls: Arc<AtomicUsize>,
    exhausted: CancellationToken,
}

impl ScriptedIpSource {
    pub fn new(script: Vec<Result<Ipv4Addr>>, exhausted: CancellationToken) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            exhausted,
        }
    }

    /// Script made only of successful samples
    pub fn ips(samples: &[Ipv4Addr], exhausted: CancellationToken) -> Self {
        Self::new(samples.iter().copied().map(Ok).collect(), exhausted)
    }

    /// Number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(sample) => sample,
            None => {
                self.exhausted.cancel();
                Err(Error::network("script exhausted"))
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// An IP source that always reports the same address
pub struct ConstantIpSource {
    ip: Ipv4Addr,
    calls: Arc<AtomicUsize>,
}

impl ConstantIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for ConstantIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "constant"
    }
}

/// A DnsBackend over an in-memory zone that tracks calls
pub struct CountingBackend {
    inner: MemoryDnsBackend,
    upserts: std::sync::Mutex<Vec<Ipv4Addr>>,
    lookup_count: AtomicUsize,
    failing_ips: std::sync::Mutex<HashSet<Ipv4Addr>>,
    fail_lookups: AtomicBool,
}

impl CountingBackend {
    /// Backend hosting the test zone
    pub fn new() -> Self {
        Self {
            inner: MemoryDnsBackend::with_zone(DOMAIN, ZONE_ID),
            upserts: std::sync::Mutex::new(Vec::new()),
            lookup_count: AtomicUsize::new(0),
            failing_ips: std::sync::Mutex::new(HashSet::new()),
            fail_lookups: AtomicBool::new(false),
        }
    }

    /// Backend whose record already holds `values`
    pub async fn with_record(values: Vec<Ipv4Addr>) -> Self {
        let backend = Self::new();
        backend.inner.put_record(FQDN, ZONE_ID, values, 300).await;
        backend
    }

    /// Make every upsert of `ip` fail
    pub fn fail_upserts_of(&self, ip: Ipv4Addr) {
        self.failing_ips.lock().unwrap().insert(ip);
    }

    /// Make lookups fail with a network error
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    /// Addresses passed to upsert(), in call order (failed calls included)
    pub fn upserts(&self) -> Vec<Ipv4Addr> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_count.load(Ordering::SeqCst)
    }

    /// Addresses currently on record
    pub async fn values(&self) -> Vec<Ipv4Addr> {
        self.inner
            .record(FQDN)
            .await
            .map(|record| record.values)
            .unwrap_or_default()
    }

    pub fn memory(&self) -> &MemoryDnsBackend {
        &self.inner
    }
}

#[async_trait]
impl DnsBackend for CountingBackend {
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        self.inner.resolve_zone(domain).await
    }

    async fn lookup_record(&self, fqdn: &str) -> Result<Ipv4Addr> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::network("resolver unreachable"));
        }
        self.inner.lookup_record(fqdn).await
    }

    async fn upsert(&self, fqdn: &str, zone_id: &str, ip: Ipv4Addr) -> Result<()> {
        self.upserts.lock().unwrap().push(ip);
        if self.failing_ips.lock().unwrap().contains(&ip) {
            return Err(Error::backend("counting", format!("cannot upsert {fqdn}: injected failure")));
        }
        self.inner.upsert(fqdn, zone_id, ip).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// Resolve the test record against `backend`
pub async fn test_record(backend: Arc<CountingBackend>) -> DnsRecord {
    DnsRecord::resolve(&RecordConfig::new(HOST, DOMAIN), backend)
        .await
        .expect("test zone resolves")
}

/// Configuration for the test record with a 4 second interval
pub fn test_config() -> dyndns_core::DyndnsConfig {
    dyndns_core::DyndnsConfig::new(HOST, DOMAIN)
}
