//! Unicast DNS-SD
//!
//! [DNS-based Service Discovery][RFC-6763] over ordinary unicast DNS: discover which domains to
//! browse and register in, browse service types and instances, resolve instances to endpoints,
//! and register services through [RFC-2136][RFC-2136] dynamic updates, optionally TSIG signed.
//!
//! Everything talks DNS through a [`DnsTransport`][transport::DnsTransport]: a UDP
//! [`ClientTransport`] for real name servers, or an [`InMemoryDns`] record store.
//!
//! [RFC-6763]: https://www.rfc-editor.org/rfc/rfc6763
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136
//!
#![warn(clippy::pedantic)]

pub mod browser;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod registrator;
pub mod service;
pub mod topology;
pub mod transport;
pub mod unregister;

pub use browser::Browser;
pub use config::{Config, SharedConfig};
pub use enumerator::DomainEnumerator;
pub use error::{Error, Result};
pub use registrator::Registrator;
pub use service::{ServiceData, ServiceName, ServiceType, Transport};
pub use topology::{LocalTopology, StaticTopology, SystemTopology};
pub use transport::{ClientTransport, DnsTransport, DynTransport, InMemoryDns};
pub use unregister::AutomaticUnregister;
