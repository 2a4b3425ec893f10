// # DNS Backend Implementations
//
// This module provides implementations of the DnsBackend trait that live in
// the core crate. Remote providers live in their own crates.

pub mod memory;

pub use memory::MemoryDnsBackend;
