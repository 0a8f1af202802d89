//! DNS transport.
//!
//! Supports a generic interface for the two exchanges DNS-SD needs: single queries, and
//! [RFC-2136][RFC-2136] dynamic update transactions gated by prerequisites.
//!
//! Two implementations are provided, [`client::ClientTransport`] and [`memory::InMemoryDns`]. The
//! former talks to a name server over UDP, signing updates with TSIG when a
//! [`SigningKey`] is attached. The latter is an in-process record store that applies update
//! transactions atomically, for tests and loopback use.
//!
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136

use crate::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::rdata::{SRV, TXT};
use trust_dns_proto::rr::{Name, RData, RecordType};

pub mod client;
pub mod memory;

pub use client::ClientTransport;
pub use memory::InMemoryDns;

/// `DynTransport` is a type alias for a [`DnsTransport`] shared by the enumerator, browser and
/// registrator.
pub type DynTransport = Arc<dyn DnsTransport + Send + Sync>;

/// An async trait describing the DNS exchanges used by DNS-SD.
///
/// A response code is a successful outcome; only failing to obtain a response at all is an
/// `Err`, as [`Error::Timeout`] or [`Error::Transport`].
#[async_trait::async_trait]
pub trait DnsTransport {
    /// Send a query for `name` and `record_type`.
    async fn resolve(&self, name: &Name, record_type: RecordType) -> Result<Lookup, Error>;

    /// Submit an update transaction. The server applies all of it or none of it.
    async fn submit_update(&self, transaction: UpdateTransaction) -> Result<ResponseCode, Error>;

    /// A transport with the same settings that sends to `server` instead.
    fn at_server(&self, server: SocketAddr) -> DynTransport;
}

/// The response to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub response_code: ResponseCode,
    pub answers: Vec<RData>,
}

impl Lookup {
    #[must_use]
    pub fn new(response_code: ResponseCode, answers: Vec<RData>) -> Self {
        Lookup {
            response_code,
            answers,
        }
    }

    /// Whether the response is an answer at all: `NOERROR`, or `NXDOMAIN` meaning there are no
    /// records.
    #[must_use]
    pub fn is_answer(&self) -> bool {
        matches!(
            self.response_code,
            ResponseCode::NoError | ResponseCode::NXDomain
        )
    }

    /// Fail with [`Error::ServerError`] unless the response [is an answer][Lookup::is_answer].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] for any other response code.
    pub fn checked(self, name: &Name) -> Result<Self, Error> {
        if self.is_answer() {
            Ok(self)
        } else {
            Err(Error::ServerError {
                name: name.clone(),
                code: self.response_code,
            })
        }
    }

    #[must_use]
    pub fn ptr_targets(self) -> Vec<Name> {
        self.answers
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::PTR(target) => Some(target),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn srv_records(self) -> Vec<SRV> {
        self.answers
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::SRV(srv) => Some(srv),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn txt_records(self) -> Vec<TXT> {
        self.answers
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::TXT(txt) => Some(txt),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn addresses(self) -> Vec<IpAddr> {
        self.answers
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::A(ip) => Some(IpAddr::V4(ip)),
                RData::AAAA(ip) => Some(IpAddr::V6(ip)),
                _ => None,
            })
            .collect()
    }
}

/// An [RFC-2136 §2.4][RFC-2136-2.4] prerequisite.
///
/// [RFC-2136-2.4]: https://www.rfc-editor.org/rfc/rfc2136#section-2.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// At least one record of any type exists at the name. Fails with `NXDOMAIN`.
    NameInUse(Name),
    /// No record of any type exists at the name. Fails with `YXDOMAIN`.
    NameNotInUse(Name),
}

impl Prerequisite {
    #[must_use]
    pub fn name(&self) -> &Name {
        match self {
            Prerequisite::NameInUse(name) | Prerequisite::NameNotInUse(name) => name,
        }
    }
}

/// An [RFC-2136 §2.5][RFC-2136-2.5] update.
///
/// [RFC-2136-2.5]: https://www.rfc-editor.org/rfc/rfc2136#section-2.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Add a record to an RRset.
    Add { name: Name, ttl: u32, rdata: RData },
    /// Delete a single record from an RRset.
    Delete { name: Name, rdata: RData },
    /// Delete all RRsets at a name.
    DeleteAll(Name),
}

impl Update {
    #[must_use]
    pub fn name(&self) -> &Name {
        match self {
            Update::Add { name, .. } | Update::Delete { name, .. } | Update::DeleteAll(name) => {
                name
            }
        }
    }
}

/// A TSIG key attached verbatim to update transactions. The transport interprets it; the
/// DNS-SD layer never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub name: Name,
    pub algorithm: String,
    /// BASE64 encoded shared secret.
    pub key: String,
}

impl SigningKey {
    /// Build a signing key from optional parts. All parts absent disables signing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialSigningKey`] if some but not all parts are present, or
    /// [`Error::InvalidFormat`] if the key name can't be parsed.
    pub fn from_parts(
        name: Option<&str>,
        algorithm: Option<&str>,
        key: Option<&str>,
    ) -> Result<Option<Self>, Error> {
        match (name, algorithm, key) {
            (None, None, None) => Ok(None),
            (Some(name), Some(algorithm), Some(key)) => Ok(Some(SigningKey {
                name: name.parse().map_err(Error::invalid)?,
                algorithm: algorithm.to_string(),
                key: key.to_string(),
            })),
            _ => Err(Error::PartialSigningKey),
        }
    }
}

/// A set of prerequisites and updates submitted as one atomic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTransaction {
    pub zone: Name,
    pub prerequisites: Vec<Prerequisite>,
    pub updates: Vec<Update>,
    pub signing_key: Option<SigningKey>,
}

impl UpdateTransaction {
    #[must_use]
    pub fn new(zone: Name, signing_key: Option<SigningKey>) -> Self {
        UpdateTransaction {
            zone,
            prerequisites: Vec::new(),
            updates: Vec::new(),
            signing_key,
        }
    }

    #[must_use]
    pub fn require(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    #[must_use]
    pub fn update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lookup_checked() {
        let name = Name::from_str("b._dns-sd._udp.example.com.").unwrap();
        assert!(Lookup::new(ResponseCode::NXDomain, vec![])
            .checked(&name)
            .is_ok());
        assert!(matches!(
            Lookup::new(ResponseCode::ServFail, vec![]).checked(&name),
            Err(Error::ServerError {
                code: ResponseCode::ServFail,
                ..
            })
        ));
    }

    #[test]
    fn lookup_filters_by_rdata() {
        let target = Name::from_str("example.com.").unwrap();
        let lookup = Lookup::new(
            ResponseCode::NoError,
            vec![
                RData::PTR(target.clone()),
                RData::TXT(TXT::new(vec!["a=1".to_string()])),
            ],
        );
        assert_eq!(lookup.clone().ptr_targets(), vec![target]);
        assert_eq!(lookup.clone().txt_records().len(), 1);
        assert!(lookup.srv_records().is_empty());
    }

    #[test]
    fn signing_key_all_or_nothing() {
        assert_eq!(SigningKey::from_parts(None, None, None).unwrap(), None);
        let key = SigningKey::from_parts(Some("update-key."), Some("hmac-sha256"), Some("c2VjcmV0"))
            .unwrap()
            .unwrap();
        assert_eq!(key.algorithm, "hmac-sha256");
        assert!(matches!(
            SigningKey::from_parts(Some("update-key."), None, Some("c2VjcmV0")),
            Err(Error::PartialSigningKey)
        ));
        assert!(matches!(
            SigningKey::from_parts(None, None, Some("c2VjcmV0")),
            Err(Error::PartialSigningKey)
        ));
    }
}
