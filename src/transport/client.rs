//! A UDP implementation of the [`DnsTransport`][super::DnsTransport] trait.
//!
//! Every exchange opens a fresh [`AsyncClient`] against the configured name server. Update
//! transactions carrying a [`SigningKey`] are TSIG signed.
use crate::config::Config;
use crate::error::Error;
use crate::transport::{
    DnsTransport, DynTransport, Lookup, Prerequisite, SigningKey, Update, UpdateTransaction,
};
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;
use trust_dns_client::client::AsyncClient;
use trust_dns_client::op::UpdateMessage;
use trust_dns_client::udp::UdpClientStream;
use trust_dns_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::dnssec::rdata::tsig::TsigAlgorithm;
use trust_dns_client::rr::dnssec::tsig::TSigner;
use trust_dns_proto::rr::{DNSClass, Name, Record, RecordType};
use trust_dns_proto::xfer::{DnsHandle, DnsRequest, DnsRequestOptions, DnsResponse, FirstAnswer};

/// Allowed clock skew for TSIG signatures, in seconds.
const TSIG_FUDGE: u16 = 300;

/// UDP payload size advertised through EDNS, large enough for unfragmented IPv6.
const EDNS_MAX_PAYLOAD: u16 = 1232;

/// A [`DnsTransport`] sending to a single name server over UDP.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct ClientTransport {
    server: SocketAddr,
    timeout: Duration,
}

impl ClientTransport {
    #[must_use]
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        ClientTransport { server, timeout }
    }

    /// Use the first name server of the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the system configuration can't be read or lists no name
    /// servers.
    pub fn from_system_conf(timeout: Duration) -> Result<Self, Error> {
        let (resolver_config, _) = trust_dns_resolver::system_conf::read_system_conf()
            .map_err(|err| Error::Transport(err.to_string()))?;
        let server = resolver_config
            .name_servers()
            .first()
            .map(|name_server| name_server.socket_addr)
            .ok_or_else(|| Error::Transport("no system name server configured".to_string()))?;
        Ok(Self::new(server, timeout))
    }

    /// Use the first of [`Config::name_servers`], or the system resolver when none is
    /// configured.
    ///
    /// # Errors
    ///
    /// See [`ClientTransport::from_system_conf`].
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        match config.name_servers.first() {
            Some(server) => Ok(Self::new(*server, config.timeout)),
            None => Self::from_system_conf(config.timeout),
        }
    }

    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    async fn exchange(
        &self,
        message: Message,
        signer: Option<Arc<TSigner>>,
    ) -> Result<DnsResponse, Error> {
        let stream = UdpClientStream::<UdpSocket, TSigner>::with_timeout_and_signer(
            self.server,
            self.timeout,
            signer,
        );
        let (mut client, background) = AsyncClient::connect(stream).await?;
        tokio::spawn(background);
        let response = client
            .send(DnsRequest::new(message, DnsRequestOptions::default()))
            .first_answer()
            .await?;
        Ok(response)
    }
}

#[async_trait::async_trait]
impl DnsTransport for ClientTransport {
    async fn resolve(&self, name: &Name, record_type: RecordType) -> Result<Lookup, Error> {
        debug!("query {name} {record_type} @{}", self.server);
        let response = self.exchange(query_message(name, record_type), None).await?;
        // There is no TCP retry, so a partial answer must not pass as a complete one.
        if response.truncated() {
            return Err(Error::Transport(format!(
                "truncated response for {name} {record_type} @{}",
                self.server
            )));
        }
        let answers = response
            .answers()
            .iter()
            .filter_map(Record::data)
            .cloned()
            .collect();
        Ok(Lookup::new(response.response_code(), answers))
    }

    async fn submit_update(&self, transaction: UpdateTransaction) -> Result<ResponseCode, Error> {
        debug!(
            "update zone {} with {} prerequisites and {} updates @{}",
            transaction.zone,
            transaction.prerequisites.len(),
            transaction.updates.len(),
            self.server
        );
        let signer = transaction
            .signing_key
            .as_ref()
            .map(tsig_signer)
            .transpose()?
            .map(Arc::new);
        let response = self.exchange(update_message(&transaction), signer).await?;
        Ok(response.response_code())
    }

    fn at_server(&self, server: SocketAddr) -> DynTransport {
        Arc::new(Self::new(server, self.timeout))
    }
}

fn tsig_signer(key: &SigningKey) -> Result<TSigner, Error> {
    let secret = BASE64_ENGINE
        .decode(&key.key)
        .map_err(|err| Error::InvalidSigningKey(err.to_string()))?;
    let algorithm = Name::from_ascii(&key.algorithm)
        .map(TsigAlgorithm::from_name)
        .map_err(|err| Error::InvalidSigningKey(err.to_string()))?;
    TSigner::new(secret, algorithm, key.name.clone(), TSIG_FUDGE)
        .map_err(|err| Error::InvalidSigningKey(err.to_string()))
}

fn query_message(name: &Name, record_type: RecordType) -> Message {
    let mut query = Query::query(name.clone(), record_type);
    query.set_query_class(DNSClass::IN);
    let mut message = Message::new();
    message
        .add_query(query)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_MAX_PAYLOAD);
    message.set_edns(edns);
    message
}

/// Build an [RFC-2136][RFC-2136] update message.
///
/// [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136#section-2.4
fn update_message(transaction: &UpdateTransaction) -> Message {
    let mut zone = Query::new();
    zone.set_name(transaction.zone.clone())
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone);
    for prerequisite in &transaction.prerequisites {
        message.add_pre_requisite(prerequisite_record(prerequisite));
    }
    for update in &transaction.updates {
        message.add_update(update_record(update));
    }
    message
}

fn prerequisite_record(prerequisite: &Prerequisite) -> Record {
    match prerequisite {
        Prerequisite::NameInUse(name) => class_any_record(name, DNSClass::ANY),
        Prerequisite::NameNotInUse(name) => class_any_record(name, DNSClass::NONE),
    }
}

fn update_record(update: &Update) -> Record {
    match update {
        Update::Add { name, ttl, rdata } => Record::from_rdata(name.clone(), *ttl, rdata.clone()),
        Update::Delete { name, rdata } => {
            let mut record = Record::from_rdata(name.clone(), 0, rdata.clone());
            record.set_dns_class(DNSClass::NONE);
            record
        }
        Update::DeleteAll(name) => class_any_record(name, DNSClass::ANY),
    }
}

/// An empty `ANY` record, as used by name prerequisites and delete-all updates.
fn class_any_record(name: &Name, dns_class: DNSClass) -> Record {
    let mut record = Record::with(name.clone(), RecordType::ANY, 0);
    record.set_dns_class(dns_class);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tokio::sync::oneshot;
    use trust_dns_proto::rr::RData;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn update_message_sections() {
        let instance = name("web._http._tcp.example.com.");
        let transaction = UpdateTransaction::new(name("example.com."), None)
            .require(Prerequisite::NameNotInUse(instance.clone()))
            .update(Update::Add {
                name: name("_http._tcp.example.com."),
                ttl: 60,
                rdata: RData::PTR(instance.clone()),
            })
            .update(Update::DeleteAll(instance.clone()));
        let message = update_message(&transaction);

        assert_eq!(message.op_code(), OpCode::Update);
        assert_eq!(message.queries()[0].query_type(), RecordType::SOA);
        assert_eq!(message.queries()[0].name(), &name("example.com."));

        let prerequisite = &message.answers()[0];
        assert_eq!(prerequisite.name(), &instance);
        assert_eq!(prerequisite.dns_class(), DNSClass::NONE);
        assert_eq!(prerequisite.record_type(), RecordType::ANY);

        let updates = message.name_servers();
        assert_eq!(updates[0].dns_class(), DNSClass::IN);
        assert_eq!(updates[0].ttl(), 60);
        assert_eq!(updates[1].dns_class(), DNSClass::ANY);
        assert_eq!(updates[1].record_type(), RecordType::ANY);
    }

    /// Answer one query on a local socket with a single PTR record, reporting the EDNS payload
    /// size the query advertised.
    async fn answer_once(truncated: bool) -> (SocketAddr, oneshot::Receiver<Option<u16>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = socket.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut buf = [0_u8; 4096];
            let (len, client) = socket.recv_from(&mut buf).await.unwrap();
            let request = Message::from_vec(&buf[..len]).unwrap();
            let _ = tx.send(request.extensions().as_ref().map(Edns::max_payload));

            let mut response = Message::new();
            response
                .set_id(request.id())
                .set_message_type(MessageType::Response)
                .set_op_code(OpCode::Query)
                .set_truncated(truncated)
                .add_queries(request.queries().to_vec())
                .add_answer(Record::from_rdata(
                    request.queries()[0].name().clone(),
                    60,
                    RData::PTR(name("web._http._tcp.example.com.")),
                ));
            socket
                .send_to(&response.to_vec().unwrap(), client)
                .await
                .unwrap();
        });
        (server, rx)
    }

    #[tokio::test]
    async fn resolve_advertises_edns() {
        let (server, payload) = answer_once(false).await;
        let transport = ClientTransport::new(server, Duration::from_secs(5));
        let lookup = transport
            .resolve(&name("_http._tcp.example.com."), RecordType::PTR)
            .await
            .unwrap();
        assert_eq!(lookup.response_code, ResponseCode::NoError);
        assert_eq!(
            lookup.ptr_targets(),
            vec![name("web._http._tcp.example.com.")]
        );
        assert_eq!(payload.await.unwrap(), Some(EDNS_MAX_PAYLOAD));
    }

    #[tokio::test]
    async fn truncated_response_is_a_transport_error() {
        let (server, _payload) = answer_once(true).await;
        let transport = ClientTransport::new(server, Duration::from_secs(5));
        assert!(matches!(
            transport
                .resolve(&name("_http._tcp.example.com."), RecordType::PTR)
                .await,
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn delete_record_uses_class_none() {
        let record = update_record(&Update::Delete {
            name: name("_http._tcp.example.com."),
            rdata: RData::PTR(name("web._http._tcp.example.com.")),
        });
        assert_eq!(record.dns_class(), DNSClass::NONE);
        assert_eq!(record.ttl(), 0);
        assert_eq!(record.record_type(), RecordType::PTR);
    }

    #[test]
    fn signer_rejects_bad_key() {
        let key = SigningKey {
            name: name("update-key."),
            algorithm: "hmac-sha256".to_string(),
            key: "not base64!".to_string(),
        };
        assert!(matches!(tsig_signer(&key), Err(Error::InvalidSigningKey(_))));
    }

    #[test]
    fn signer_accepts_valid_key() {
        let key = SigningKey {
            name: name("update-key."),
            algorithm: "hmac-sha256".to_string(),
            key: "c2VjcmV0LXNoYXJlZC1rZXk=".to_string(),
        };
        assert!(tsig_signer(&key).is_ok());
    }
}
