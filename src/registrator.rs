//! Service registration through [RFC-2136][RFC-2136] dynamic updates.
//!
//! Registering `web._http._tcp.example.com.` with the subtype `_printer` sends one transaction
//! to the update server of `example.com.`:
//!
//! ```text
//! prerequisite: nothing exists at web._http._tcp.example.com.
//! add: _services._dns-sd._udp.example.com.  PTR _http._tcp.example.com.
//! add: _http._tcp.example.com.              PTR web._http._tcp.example.com.
//! add: _printer._sub._http._tcp.example.com. PTR web._http._tcp.example.com.
//! add: web._http._tcp.example.com.          SRV 0 0 80 www.example.com.
//! add: web._http._tcp.example.com.          TXT "path=/"
//! ```
//!
//! Unregistering takes two transactions. The first removes the instance, if it exists. The
//! second removes the `_services._dns-sd._udp` pointer to the type, only if no instance of the
//! type is left. Each transaction is applied atomically by the server, so the type pointer is
//! never removed while an instance still references it.
//!
//! The update server is the target of the `_dns-update._udp.{domain}` SRV record, see
//! [RFC-2136 §4][RFC-2136-4]. Without one, updates go to the transport's own name server.
//!
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136
//! [RFC-2136-4]: https://www.rfc-editor.org/rfc/rfc2136#section-4
use crate::browser::SERVICES_DNSSD_UDP;
use crate::enumerator::DomainEnumerator;
use crate::error::Error;
use crate::service::{ServiceData, ServiceName, ServiceType};
use crate::topology::{DynTopology, SystemTopology};
use crate::transport::{DynTransport, Prerequisite, SigningKey, Update, UpdateTransaction};
use lazy_static::lazy_static;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::rdata::{SRV, TXT};
use trust_dns_proto::rr::{Name, RData, RecordType};

/// Time to live of registered records, in seconds.
pub const DEFAULT_TTL: u32 = 60;

lazy_static! {
    static ref DNS_UPDATE_UDP: Name = Name::from_str("_dns-update._udp").unwrap();
}

/// Registers and unregisters services in one domain.
pub struct Registrator {
    domain: Name,
    transport: DynTransport,
    services_name: Name,
    ttl: u32,
    signing_key: Option<SigningKey>,
    topology: DynTopology,
}

impl Registrator {
    /// Create a registrator for `domain`, sending updates to the domain's update server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`], [`Error::Transport`] or [`Error::ServerError`] if the update
    /// server lookup fails, or [`Error::UpdateServerNotFound`] if the update server has no
    /// address.
    pub async fn new(transport: DynTransport, mut domain: Name) -> Result<Self, Error> {
        if !domain.is_fqdn() {
            domain.set_fqdn(true);
        }
        let transport = update_transport(transport, &domain).await?;
        let services_name = SERVICES_DNSSD_UDP
            .clone()
            .append_domain(&domain)
            .map_err(Error::invalid)?;
        info!("created DNS-SD registrator for domain {domain}");
        Ok(Registrator {
            domain,
            transport,
            services_name,
            ttl: DEFAULT_TTL,
            signing_key: None,
            topology: Arc::new(SystemTopology::default()),
        })
    }

    /// Create a registrator for the domain `enumerator` recommends: its default registration
    /// domain, or else its first registration domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRegistrationDomain`] if there is neither, or any error of
    /// [`Registrator::new`] and the domain enumeration queries.
    pub async fn from_enumerator(enumerator: &DomainEnumerator) -> Result<Self, Error> {
        let domain = match enumerator.default_registering_domain().await? {
            Some(domain) => domain,
            None => enumerator
                .registering_domains()
                .await?
                .into_iter()
                .next()
                .ok_or(Error::NoRegistrationDomain)?,
        };
        Self::new(enumerator.transport().clone(), domain).await
    }

    /// Use `topology` for [`Registrator::local_host_name`].
    #[must_use]
    pub fn with_topology(mut self, topology: DynTopology) -> Self {
        self.topology = topology;
        self
    }

    #[must_use]
    pub fn with_time_to_live(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sign update transactions with `signing_key`, or stop signing them with `None`.
    #[must_use]
    pub fn with_signing_key(mut self, signing_key: Option<SigningKey>) -> Self {
        self.signing_key = signing_key;
        self
    }

    #[must_use]
    pub fn domain(&self) -> &Name {
        &self.domain
    }

    #[must_use]
    pub fn time_to_live(&self) -> u32 {
        self.ttl
    }

    pub fn set_time_to_live(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    #[must_use]
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref()
    }

    /// Configure the TSIG key from its parts. All parts absent disables signing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialSigningKey`] if only some parts are present. The previous key is
    /// kept in that case.
    pub fn set_signing_key(
        &mut self,
        name: Option<&str>,
        algorithm: Option<&str>,
        key: Option<&str>,
    ) -> Result<(), Error> {
        self.signing_key = SigningKey::from_parts(name, algorithm, key)?;
        Ok(())
    }

    /// A name for `instance` of `service_type` in this registrator's domain.
    #[must_use]
    pub fn make_service_name(
        &self,
        instance: impl Into<String>,
        service_type: ServiceType,
    ) -> ServiceName {
        ServiceName::new(instance, service_type, self.domain.clone())
    }

    /// The first host name of the local topology that is neither `localhost` nor a dotted
    /// quad, made fully qualified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNameUnavailable`] if there is no such host name.
    pub fn local_host_name(&self) -> Result<Name, Error> {
        for host in self.topology.computer_host_names() {
            if host.to_ascii_lowercase().starts_with("localhost") || is_dotted_quad(&host) {
                continue;
            }
            match Name::from_str(&host) {
                Ok(mut name) => {
                    name.set_fqdn(true);
                    return Ok(name);
                }
                Err(err) => warn!("invalid host name {host}: {err}"),
            }
        }
        Err(Error::HostNameUnavailable)
    }

    /// Register a service, unless something already exists at its name.
    ///
    /// Returns `false` on a name collision, in which case nothing was changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistrationFailed`] if the server rejected the update,
    /// [`Error::RegistrationTimeout`] if it didn't answer, or [`Error::InvalidFormat`] if the
    /// service name can't be encoded.
    pub async fn register_service(&self, service: &ServiceData) -> Result<bool, Error> {
        let name = service.name();
        let dns_name = name.to_dns_name()?;
        let type_name = name.service_type().dns_name_in(&self.domain)?;

        let mut transaction = self
            .transaction()
            .require(Prerequisite::NameNotInUse(dns_name.clone()))
            .update(self.add(&self.services_name, RData::PTR(type_name.clone())))
            .update(self.add(&type_name, RData::PTR(dns_name.clone())));
        for subtype_name in name.service_type().subtype_dns_names_in(&self.domain)? {
            transaction = transaction.update(self.add(&subtype_name, RData::PTR(dns_name.clone())));
        }
        let transaction = transaction
            .update(self.add(
                &dns_name,
                RData::SRV(SRV::new(0, 0, service.port(), service.host().clone())),
            ))
            .update(self.add(&dns_name, RData::TXT(TXT::new(service.txt_strings()))));

        match self.submit(name, transaction).await? {
            ResponseCode::NoError => {
                info!("registered service {service}");
                Ok(true)
            }
            ResponseCode::YXDomain => {
                info!("service {name} already exists");
                Ok(false)
            }
            code => Err(Error::RegistrationFailed {
                name: name.to_string(),
                code,
            }),
        }
    }

    /// Unregister a service.
    ///
    /// Returns `false` if nothing exists at its name. Once the instance is removed, the pointer
    /// to its type is removed as well if no other instance of the type is left. A failure of
    /// that second step is logged but doesn't fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistrationFailed`] if the server rejected the instance removal,
    /// [`Error::RegistrationTimeout`] if it didn't answer, or [`Error::InvalidFormat`] if the
    /// service name can't be encoded.
    pub async fn unregister_service(&self, name: &ServiceName) -> Result<bool, Error> {
        let dns_name = name.to_dns_name()?;
        let type_name = name.service_type().dns_name_in(&self.domain)?;

        let mut transaction = self
            .transaction()
            .require(Prerequisite::NameInUse(dns_name.clone()))
            .update(Update::Delete {
                name: type_name.clone(),
                rdata: RData::PTR(dns_name.clone()),
            });
        for subtype_name in name.service_type().subtype_dns_names_in(&self.domain)? {
            transaction = transaction.update(Update::Delete {
                name: subtype_name,
                rdata: RData::PTR(dns_name.clone()),
            });
        }
        let transaction = transaction.update(Update::DeleteAll(dns_name));

        match self.submit(name, transaction).await? {
            ResponseCode::NoError => info!("unregistered service {name}"),
            ResponseCode::NXDomain => {
                info!("service {name} doesn't exist");
                return Ok(false);
            }
            code => {
                return Err(Error::RegistrationFailed {
                    name: name.to_string(),
                    code,
                })
            }
        }

        let transaction = self
            .transaction()
            .require(Prerequisite::NameNotInUse(type_name.clone()))
            .update(Update::Delete {
                name: self.services_name.clone(),
                rdata: RData::PTR(type_name.clone()),
            });
        match self.transport.submit_update(transaction).await {
            Ok(ResponseCode::NoError) => info!("removed service type {type_name}"),
            Ok(ResponseCode::YXDomain) => {
                info!("kept service type {type_name}, instances left");
            }
            Ok(code) => error!("failed to remove service type {type_name}, server returned {code}"),
            Err(err) => error!("failed to remove service type {type_name}: {err}"),
        }
        Ok(true)
    }

    fn transaction(&self) -> UpdateTransaction {
        UpdateTransaction::new(self.domain.clone(), self.signing_key.clone())
    }

    fn add(&self, name: &Name, rdata: RData) -> Update {
        Update::Add {
            name: name.clone(),
            ttl: self.ttl,
            rdata,
        }
    }

    async fn submit(
        &self,
        name: &ServiceName,
        transaction: UpdateTransaction,
    ) -> Result<ResponseCode, Error> {
        self.transport
            .submit_update(transaction)
            .await
            .map_err(|err| match err {
                Error::Timeout => Error::RegistrationTimeout(name.to_string()),
                err => err,
            })
    }
}

/// The transport to send updates for `domain` with.
async fn update_transport(transport: DynTransport, domain: &Name) -> Result<DynTransport, Error> {
    let name = DNS_UPDATE_UDP
        .clone()
        .append_domain(domain)
        .map_err(Error::invalid)?;
    let lookup = transport.resolve(&name, RecordType::SRV).await?;
    let Some(srv) = lookup.checked(&name)?.srv_records().into_iter().next() else {
        debug!("no update server for {domain}, using the default name server");
        return Ok(transport);
    };

    let mut addresses = Vec::new();
    for record_type in [RecordType::A, RecordType::AAAA] {
        let lookup = transport.resolve(srv.target(), record_type).await?;
        addresses.extend(lookup.checked(srv.target())?.addresses());
    }
    let address: IpAddr = addresses
        .into_iter()
        .next()
        .ok_or_else(|| Error::UpdateServerNotFound(srv.target().clone()))?;
    let server = SocketAddr::new(address, srv.port());
    info!("using {} ({server}) to update {domain}", srv.target());
    Ok(transport.at_server(server))
}

fn is_dotted_quad(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|part| (1..=3).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Transport;
    use crate::topology::StaticTopology;
    use crate::transport::memory::Fault;
    use crate::transport::InMemoryDns;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    async fn registrator(dns: &InMemoryDns) -> Registrator {
        Registrator::new(Arc::new(dns.clone()), name("example.com."))
            .await
            .unwrap()
    }

    fn topology(host_names: &[&str]) -> DynTopology {
        Arc::new(StaticTopology {
            domains: Vec::new(),
            host_names: host_names.iter().map(ToString::to_string).collect(),
        })
    }

    #[test]
    fn dotted_quads() {
        assert!(is_dotted_quad("192.168.1.10"));
        assert!(!is_dotted_quad("192.168.1"));
        assert!(!is_dotted_quad("box.example.com"));
        assert!(!is_dotted_quad("1234.1.1.1"));
    }

    #[tokio::test]
    async fn local_host_name_skips_unusable_candidates() {
        let registrator = registrator(&InMemoryDns::new()).await.with_topology(topology(&[
            "localhost.localdomain",
            "10.0.0.1",
            "box.example.com",
            "other.example.com.",
        ]));
        assert_eq!(
            registrator.local_host_name().unwrap(),
            name("box.example.com.")
        );

        let registrator = registrator.with_topology(topology(&[
            "LOCALHOST.localdomain",
            "Localhost",
            "127.0.0.1",
        ]));
        assert!(matches!(
            registrator.local_host_name(),
            Err(Error::HostNameUnavailable)
        ));
    }

    #[tokio::test]
    async fn service_names_are_bound_to_the_domain() {
        let registrator = registrator(&InMemoryDns::new()).await;
        let service =
            registrator.make_service_name("web", ServiceType::new("_http", Transport::Tcp));
        assert_eq!(service.domain(), &name("example.com."));
        assert_eq!(service.to_string(), "web._http._tcp.example.com.");
    }

    #[tokio::test]
    async fn signing_key_is_all_or_nothing() {
        let mut registrator = registrator(&InMemoryDns::new()).await;
        registrator
            .set_signing_key(Some("update-key."), Some("hmac-sha256"), Some("c2VjcmV0"))
            .unwrap();
        assert!(registrator.signing_key().is_some());
        assert!(matches!(
            registrator.set_signing_key(Some("update-key."), None, None),
            Err(Error::PartialSigningKey)
        ));
        assert!(registrator.signing_key().is_some());
        registrator.set_signing_key(None, None, None).unwrap();
        assert!(registrator.signing_key().is_none());
    }

    #[tokio::test]
    async fn empty_properties_register_an_empty_txt_string() {
        let dns = InMemoryDns::new();
        let registrator = registrator(&dns).await;
        let service = ServiceData::new(
            registrator.make_service_name("web", ServiceType::new("_http", Transport::Tcp)),
            name("www.example.com."),
            80,
        );
        assert!(registrator.register_service(&service).await.unwrap());
        assert!(
            dns.contains(
                &name("web._http._tcp.example.com."),
                &RData::TXT(TXT::new(vec![String::new()]))
            )
            .await
        );
    }

    #[tokio::test]
    async fn update_timeout_is_a_registration_timeout() {
        let dns = InMemoryDns::new();
        let registrator = registrator(&dns).await;
        let service = ServiceData::new(
            registrator.make_service_name("web", ServiceType::new("_http", Transport::Tcp)),
            name("www.example.com."),
            80,
        );
        dns.fail_updates(name("web._http._tcp.example.com."), Fault::Timeout)
            .await;
        assert!(matches!(
            registrator.register_service(&service).await,
            Err(Error::RegistrationTimeout(_))
        ));
        dns.fail_updates(
            name("web._http._tcp.example.com."),
            Fault::Respond(ResponseCode::Refused),
        )
        .await;
        assert!(matches!(
            registrator.register_service(&service).await,
            Err(Error::RegistrationFailed {
                code: ResponseCode::Refused,
                ..
            })
        ));
        assert!(dns.records(&name("_http._tcp.example.com.")).await.is_empty());
    }

    #[tokio::test]
    async fn update_server_from_srv() {
        let dns = InMemoryDns::new();
        dns.insert(
            name("_dns-update._udp.example.com."),
            RData::SRV(SRV::new(0, 0, 5353, name("ns1.example.com."))),
        )
        .await;
        dns.insert(name("ns1.example.com."), RData::A(Ipv4Addr::new(192, 0, 2, 53)))
            .await;
        assert!(Registrator::new(Arc::new(dns.clone()), name("example.com."))
            .await
            .is_ok());

        let dns = InMemoryDns::new();
        dns.insert(
            name("_dns-update._udp.example.com."),
            RData::SRV(SRV::new(0, 0, 53, name("ns1.example.com."))),
        )
        .await;
        assert!(matches!(
            Registrator::new(Arc::new(dns), name("example.com.")).await,
            Err(Error::UpdateServerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn registration_domain_from_enumeration() {
        let dns = InMemoryDns::new();
        let enumerator = DomainEnumerator::new(Arc::new(dns.clone()), vec![name("example.com.")]);
        assert!(matches!(
            Registrator::from_enumerator(&enumerator).await,
            Err(Error::NoRegistrationDomain)
        ));

        dns.insert(
            name("r._dns-sd._udp.example.com."),
            RData::PTR(name("lab.example.com.")),
        )
        .await;
        let registrator = Registrator::from_enumerator(&enumerator).await.unwrap();
        assert_eq!(registrator.domain(), &name("lab.example.com."));

        dns.insert(
            name("dr._dns-sd._udp.example.com."),
            RData::PTR(name("example.com.")),
        )
        .await;
        let registrator = Registrator::from_enumerator(&enumerator).await.unwrap();
        assert_eq!(registrator.domain(), &name("example.com."));
    }
}
