//! Browsing and registration domain enumeration.
//!
//! For each computer domain, the domains to browse and register in are published as PTR records
//! at well known names, see [RFC-6763 §11][RFC-6763-11]:
//!
//! | Query                          | Meaning                          |
//! |--------------------------------|----------------------------------|
//! | `b._dns-sd._udp.{domain}`      | domains recommended for browsing |
//! | `db._dns-sd._udp.{domain}`     | default browsing domain          |
//! | `r._dns-sd._udp.{domain}`      | domains recommended for registering |
//! | `dr._dns-sd._udp.{domain}`     | default registration domain      |
//! | `lb._dns-sd._udp.{domain}`     | legacy browsing domains          |
//!
//! E.g. with the zone:
//!
//! ```text
//! b._dns-sd._udp.example.com.  60 IN PTR example.com.
//! b._dns-sd._udp.example.com.  60 IN PTR lab.example.com.
//! db._dns-sd._udp.example.com. 60 IN PTR example.com.
//! ```
//!
//! [`DomainEnumerator::browsing_domains`] returns `example.com.` and `lab.example.com.`, while
//! [`DomainEnumerator::default_registering_domain`] returns `None`.
//!
//! [RFC-6763-11]: https://www.rfc-editor.org/rfc/rfc6763#section-11
use crate::error::Error;
use crate::topology::LocalTopology;
use crate::transport::DynTransport;
use lazy_static::lazy_static;
use std::str::FromStr;
use tracing::{debug, info};
use trust_dns_proto::rr::{Name, RecordType};

lazy_static! {
    static ref B_DNSSD_UDP: Name = Name::from_str("b._dns-sd._udp").unwrap();
    static ref DB_DNSSD_UDP: Name = Name::from_str("db._dns-sd._udp").unwrap();
    static ref R_DNSSD_UDP: Name = Name::from_str("r._dns-sd._udp").unwrap();
    static ref DR_DNSSD_UDP: Name = Name::from_str("dr._dns-sd._udp").unwrap();
    static ref LB_DNSSD_UDP: Name = Name::from_str("lb._dns-sd._udp").unwrap();
}

/// Finds the browsing and registration domains for a list of computer domains.
#[derive(Clone)]
pub struct DomainEnumerator {
    transport: DynTransport,
    computer_domains: Vec<Name>,
}

impl DomainEnumerator {
    #[must_use]
    pub fn new(transport: DynTransport, computer_domains: Vec<Name>) -> Self {
        info!(
            "created DNS-SD domain enumerator for computer domains: {}",
            join(&computer_domains)
        );
        DomainEnumerator {
            transport,
            computer_domains,
        }
    }

    /// Enumerate starting from the computer domains guessed by `topology`.
    #[must_use]
    pub fn from_topology(transport: DynTransport, topology: &dyn LocalTopology) -> Self {
        Self::new(transport, topology.computer_domains())
    }

    #[must_use]
    pub fn transport(&self) -> &DynTransport {
        &self.transport
    }

    #[must_use]
    pub fn computer_domains(&self) -> &[Name] {
        &self.computer_domains
    }

    /// All recommended browsing domains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`], [`Error::Transport`] or [`Error::ServerError`] if any of the
    /// queries fails.
    pub async fn browsing_domains(&self) -> Result<Vec<Name>, Error> {
        self.domains(&B_DNSSD_UDP).await
    }

    /// The default browsing domain, if any computer domain has one.
    ///
    /// # Errors
    ///
    /// See [`DomainEnumerator::browsing_domains`].
    pub async fn default_browsing_domain(&self) -> Result<Option<Name>, Error> {
        self.domain(&DB_DNSSD_UDP).await
    }

    /// All recommended registration domains.
    ///
    /// # Errors
    ///
    /// See [`DomainEnumerator::browsing_domains`].
    pub async fn registering_domains(&self) -> Result<Vec<Name>, Error> {
        self.domains(&R_DNSSD_UDP).await
    }

    /// The default registration domain, if any computer domain has one.
    ///
    /// # Errors
    ///
    /// See [`DomainEnumerator::browsing_domains`].
    pub async fn default_registering_domain(&self) -> Result<Option<Name>, Error> {
        self.domain(&DR_DNSSD_UDP).await
    }

    /// All legacy browsing domains.
    ///
    /// # Errors
    ///
    /// See [`DomainEnumerator::browsing_domains`].
    pub async fn legacy_browsing_domains(&self) -> Result<Vec<Name>, Error> {
        self.domains(&LB_DNSSD_UDP).await
    }

    /// PTR targets of `prefix` in every computer domain, in computer domain order.
    async fn domains(&self, prefix: &Name) -> Result<Vec<Name>, Error> {
        let mut results = Vec::new();
        for domain in &self.computer_domains {
            results.extend(self.lookup(prefix, domain).await?);
        }
        Ok(results)
    }

    /// The first PTR target of `prefix` in the first computer domain that has one.
    async fn domain(&self, prefix: &Name) -> Result<Option<Name>, Error> {
        for domain in &self.computer_domains {
            if let Some(first) = self.lookup(prefix, domain).await?.into_iter().next() {
                return Ok(Some(first));
            }
        }
        Ok(None)
    }

    async fn lookup(&self, prefix: &Name, domain: &Name) -> Result<Vec<Name>, Error> {
        let name = prefix.clone().append_domain(domain).map_err(Error::invalid)?;
        debug!("looking up domains at {name}");
        let lookup = self.transport.resolve(&name, RecordType::PTR).await?;
        Ok(lookup.checked(&name)?.ptr_targets())
    }
}

pub(crate) fn join(names: &[Name]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
