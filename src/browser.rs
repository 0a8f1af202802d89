//! Service browsing and resolution.
//!
//! # Service types
//!
//! Every service type with instances in a domain is listed by a PTR record at
//! `_services._dns-sd._udp.{domain}`, see [RFC-6763 §9][RFC-6763-9]:
//!
//! ```text
//! _services._dns-sd._udp.example.com. 60 IN PTR _http._tcp.example.com.
//! ```
//!
//! # Service instances
//!
//! Instances of a type are listed by PTR records at `{type}.{transport}.{domain}`, and
//! instances advertising a subtype additionally at `{subtype}._sub.{type}.{transport}.{domain}`,
//! see [RFC-6763 §7.1][RFC-6763-7.1]:
//!
//! ```text
//! _http._tcp.example.com.                  60 IN PTR web._http._tcp.example.com.
//! _printer._sub._http._tcp.example.com.    60 IN PTR web._http._tcp.example.com.
//! ```
//!
//! # Resolution
//!
//! An instance resolves to the host and port of its SRV record and the properties of its TXT
//! record. Only the first SRV record is used: priority and weight are not taken into account.
//! Only the first TXT record is used as well.
//!
//! [RFC-6763-7.1]: https://www.rfc-editor.org/rfc/rfc6763#section-7.1
//! [RFC-6763-9]: https://www.rfc-editor.org/rfc/rfc6763#section-9
use crate::enumerator::{join, DomainEnumerator};
use crate::error::Error;
use crate::service::{labels, ServiceData, ServiceName, ServiceType};
use crate::transport::DynTransport;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info, warn};
use trust_dns_proto::rr::{Name, RecordType};

lazy_static! {
    pub(crate) static ref SERVICES_DNSSD_UDP: Name =
        Name::from_str("_services._dns-sd._udp").unwrap();
}

/// Browses service types and instances in a set of domains.
#[derive(Clone)]
pub struct Browser {
    transport: DynTransport,
    domains: Vec<Name>,
}

impl Browser {
    #[must_use]
    pub fn new(transport: DynTransport, domains: Vec<Name>) -> Self {
        info!("created DNS-SD browser for domains: {}", join(&domains));
        Browser { transport, domains }
    }

    /// Browse the domains found by `enumerator`: its browsing domains, or if there are none its
    /// default browsing domain, or if there is none its legacy browsing domains.
    ///
    /// # Errors
    ///
    /// Returns any error of the domain enumeration queries.
    pub async fn from_enumerator(enumerator: &DomainEnumerator) -> Result<Self, Error> {
        let mut domains = enumerator.browsing_domains().await?;
        if domains.is_empty() {
            domains = match enumerator.default_browsing_domain().await? {
                Some(domain) => vec![domain],
                None => enumerator.legacy_browsing_domains().await?,
            };
        }
        Ok(Self::new(enumerator.transport().clone(), domains))
    }

    #[must_use]
    pub fn domains(&self) -> &[Name] {
        &self.domains
    }

    /// All service types registered in any of the domains, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`], [`Error::Transport`] or [`Error::ServerError`] if any of the
    /// queries fails.
    pub async fn service_types(&self) -> Result<Vec<ServiceType>, Error> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for domain in &self.domains {
            let node = SERVICES_DNSSD_UDP
                .clone()
                .append_domain(domain)
                .map_err(Error::invalid)?;
            for target in self.ptr_targets(&node).await? {
                match service_type_of(&target) {
                    Ok(service_type) => {
                        if seen.insert(service_type.clone()) {
                            results.push(service_type);
                        }
                    }
                    Err(err) => warn!("invalid service type {target}: {err}"),
                }
            }
        }
        Ok(results)
    }

    /// All instances of `service_type` in any of the domains.
    ///
    /// If `service_type` has subtypes, only instances registered under at least one of them are
    /// returned, each once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`], [`Error::Transport`] or [`Error::ServerError`] if any of the
    /// queries fails.
    pub async fn service_instances(
        &self,
        service_type: &ServiceType,
    ) -> Result<Vec<ServiceName>, Error> {
        let mut results = Vec::new();
        if service_type.subtypes().is_empty() {
            for domain in &self.domains {
                let node = service_type.dns_name_in(domain)?;
                results.extend(self.instances_at(&node).await?);
            }
        } else {
            let mut seen = HashSet::new();
            for domain in &self.domains {
                for node in service_type.subtype_dns_names_in(domain)? {
                    for instance in self.instances_at(&node).await? {
                        if seen.insert(instance.clone()) {
                            results.push(instance);
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    /// Resolve an instance to its endpoint and properties.
    ///
    /// Returns `None` when the instance has no SRV record, which is normal for a stale PTR
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::Transport`] if a query can't be completed, or
    /// [`Error::InvalidFormat`] if the name can't be encoded.
    pub async fn service_data(&self, service: &ServiceName) -> Result<Option<ServiceData>, Error> {
        let name = service.to_dns_name()?;

        let lookup = self.transport.resolve(&name, RecordType::SRV).await?;
        if !lookup.is_answer() {
            debug!("no SRV for {name}: {}", lookup.response_code);
            return Ok(None);
        }
        let Some(srv) = lookup.srv_records().into_iter().next() else {
            debug!("no SRV for {name}");
            return Ok(None);
        };
        let mut data = ServiceData::new(service.clone(), srv.target().clone(), srv.port());

        let lookup = self.transport.resolve(&name, RecordType::TXT).await?;
        if let Some(txt) = lookup.txt_records().into_iter().next() {
            data.extend_from_txt(
                txt.txt_data()
                    .iter()
                    .map(|entry| String::from_utf8_lossy(entry).into_owned()),
            );
        }
        Ok(Some(data))
    }

    async fn ptr_targets(&self, node: &Name) -> Result<Vec<Name>, Error> {
        debug!("browsing {node}");
        let lookup = self.transport.resolve(node, RecordType::PTR).await?;
        Ok(lookup.checked(node)?.ptr_targets())
    }

    async fn instances_at(&self, node: &Name) -> Result<Vec<ServiceName>, Error> {
        let targets = self.ptr_targets(node).await?;
        Ok(targets
            .iter()
            .filter_map(|target| match ServiceName::from_dns_name(target) {
                Ok(instance) => Some(instance),
                Err(err) => {
                    warn!("invalid service instance {target}: {err}");
                    None
                }
            })
            .collect())
    }
}

/// The service type a `_services._dns-sd._udp` PTR target names, from its first two labels.
fn service_type_of(target: &Name) -> Result<ServiceType, Error> {
    let mut target_labels = target.iter();
    match (target_labels.next(), target_labels.next()) {
        (Some(name), Some(transport)) => Ok(ServiceType::new(
            labels::decode(name)?,
            labels::decode(transport)?.parse()?,
        )),
        _ => Err(Error::InvalidFormat(format!(
            "too few labels in service type: \"{target}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Transport;
    use crate::transport::memory::Fault;
    use crate::transport::InMemoryDns;
    use std::sync::Arc;
    use trust_dns_proto::op::ResponseCode;
    use trust_dns_proto::rr::rdata::{SRV, TXT};
    use trust_dns_proto::rr::RData;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn browser(dns: &InMemoryDns) -> Browser {
        Browser::new(
            Arc::new(dns.clone()),
            vec![name("example.com."), name("example.org.")],
        )
    }

    #[tokio::test]
    async fn service_types_are_deduplicated() {
        let dns = InMemoryDns::new();
        for (node, target) in [
            ("_services._dns-sd._udp.example.com.", "_http._tcp.example.com."),
            ("_services._dns-sd._udp.example.com.", "_ipp._tcp.example.com."),
            ("_services._dns-sd._udp.example.org.", "_http._tcp.example.org."),
            ("_services._dns-sd._udp.example.org.", "_bogus.example.org."),
        ] {
            dns.insert(name(node), RData::PTR(name(target))).await;
        }
        let types = browser(&dns).service_types().await.unwrap();
        assert_eq!(
            types,
            vec![
                ServiceType::new("_http", Transport::Tcp),
                ServiceType::new("_ipp", Transport::Tcp),
            ]
        );
    }

    #[tokio::test]
    async fn instances_skip_unparsable_targets() {
        let dns = InMemoryDns::new();
        let node = name("_http._tcp.example.com.");
        dns.insert(node.clone(), RData::PTR(name("web._http._tcp.example.com.")))
            .await;
        dns.insert(node.clone(), RData::PTR(name("short.com."))).await;
        let http = ServiceType::new("_http", Transport::Tcp);
        let instances = browser(&dns).service_instances(&http).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance(), "web");
        assert_eq!(instances[0].domain(), &name("example.com."));
    }

    #[tokio::test]
    async fn enumeration_timeout_fails() {
        let dns = InMemoryDns::new();
        dns.fail_queries(name("_http._tcp.example.org."), Fault::Timeout)
            .await;
        let http = ServiceType::new("_http", Transport::Tcp);
        assert!(matches!(
            browser(&dns).service_instances(&http).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn resolve_uses_first_srv_and_first_txt() {
        let dns = InMemoryDns::new();
        let instance = name("web._http._tcp.example.com.");
        dns.insert(
            instance.clone(),
            RData::SRV(SRV::new(0, 0, 8080, name("www1.example.com."))),
        )
        .await;
        dns.insert(
            instance.clone(),
            RData::SRV(SRV::new(0, 0, 8081, name("www2.example.com."))),
        )
        .await;
        dns.insert(
            instance.clone(),
            RData::TXT(TXT::new(vec![
                "path=/".to_string(),
                "Secure".to_string(),
                "=bad".to_string(),
            ])),
        )
        .await;
        dns.insert(
            instance.clone(),
            RData::TXT(TXT::new(vec!["path=/other".to_string(), "extra".to_string()])),
        )
        .await;

        let service = ServiceName::from_dns_name(&instance).unwrap();
        let data = browser(&dns).service_data(&service).await.unwrap().unwrap();
        assert_eq!(data.host(), &name("www1.example.com."));
        assert_eq!(data.port(), 8080);
        assert_eq!(data.property("path"), Some(Some("/")));
        assert_eq!(data.property("secure"), Some(None));
        assert_eq!(data.property("extra"), None);
        assert_eq!(data.properties().len(), 2);
    }

    #[tokio::test]
    async fn resolve_without_txt_has_no_properties() {
        let dns = InMemoryDns::new();
        let instance = name("web._http._tcp.example.com.");
        dns.insert(
            instance.clone(),
            RData::SRV(SRV::new(0, 0, 80, name("www.example.com."))),
        )
        .await;
        let service = ServiceName::from_dns_name(&instance).unwrap();
        let data = browser(&dns).service_data(&service).await.unwrap().unwrap();
        assert!(data.properties().is_empty());
    }

    #[tokio::test]
    async fn resolve_stale_instance_is_none() {
        let dns = InMemoryDns::new();
        let stale = ServiceName::from_dns_name(&name("gone._http._tcp.example.com.")).unwrap();
        assert_eq!(browser(&dns).service_data(&stale).await.unwrap(), None);

        dns.fail_queries(
            name("gone._http._tcp.example.com."),
            Fault::Respond(ResponseCode::ServFail),
        )
        .await;
        assert_eq!(browser(&dns).service_data(&stale).await.unwrap(), None);

        dns.fail_queries(name("gone._http._tcp.example.com."), Fault::Timeout)
            .await;
        assert!(browser(&dns).service_data(&stale).await.is_err());
    }
}
