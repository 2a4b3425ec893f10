// # dyndns-core
//
// Core library for the dyndns public-IP watcher.
//
// ## Architecture Overview
//
// This library keeps one DNS `A` record pointed at the host's public IPv4
// address:
// - **IpSource**: Trait for asking the current public address
// - **DnsBackend**: Trait for resolving zones and upserting records at a provider
// - **reconcile**: One-shot startup comparison of DNS against the public address
// - **IpChangeMonitor**: Polling loop emitting change events
// - **ShutdownCoordinator**: Turns the first OS interrupt into a stop request
// - **UpdateDispatcher**: Consumes change events and upserts the record
// - **DyndnsEngine**: Wires the above together
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and source implementations
// 2. **Single owner**: The last known address is owned by the monitor loop alone
// 3. **Contained failures**: Only startup errors are fatal; steady-state errors are logged
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod reconcile;
pub mod record;
pub mod shutdown;

// Re-export core types for convenience
pub use traits::{DnsBackend, IpChangeEvent, IpSource};
pub use backend::MemoryDnsBackend;
pub use config::{AmbiguityPolicy, DyndnsConfig, IpSourceConfig, RecordConfig};
pub use dispatch::{DispatchSummary, UpdateDispatcher};
pub use engine::{DyndnsEngine, RunReport};
pub use error::{Error, Result};
pub use monitor::{IpChangeMonitor, MonitorReport};
pub use reconcile::{ReconcileOutcome, Reconciliation, reconcile};
pub use record::DnsRecord;
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
