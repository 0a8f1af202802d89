//! An in-process implementation of the [`DnsTransport`][super::DnsTransport] trait.
//!
//! Records live in memory and update transactions are applied under a single write lock, so
//! each transaction is atomic with respect to every other query and update. Faults can be
//! injected per name to exercise timeout and error response handling.
use crate::error::Error;
use crate::transport::{DnsTransport, DynTransport, Lookup, Prerequisite, Update, UpdateTransaction};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::{Name, RData, RecordType};

/// A failure to produce instead of a normal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with [`Error::Timeout`].
    Timeout,
    /// Respond with the given code and no records.
    Respond(ResponseCode),
}

#[derive(Default, Debug)]
struct State {
    records: HashMap<Name, Vec<RData>>,
    query_faults: HashMap<Name, Fault>,
    update_faults: HashMap<Name, Fault>,
    submitted: Vec<UpdateTransaction>,
}

impl State {
    fn in_use(&self, name: &Name) -> bool {
        self.records.get(name).map_or(false, |rdata| !rdata.is_empty())
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Add { name, rdata, .. } => {
                let rrset = self.records.entry(name).or_default();
                if !rrset.contains(&rdata) {
                    rrset.push(rdata);
                }
            }
            Update::Delete { name, rdata } => {
                if let Some(rrset) = self.records.get_mut(&name) {
                    rrset.retain(|existing| *existing != rdata);
                    if rrset.is_empty() {
                        self.records.remove(&name);
                    }
                }
            }
            Update::DeleteAll(name) => {
                self.records.remove(&name);
            }
        }
    }
}

/// An in-memory record store speaking [`DnsTransport`].
///
/// Clones share the same records, so a clone handed to a
/// [`Browser`][crate::browser::Browser] observes updates made through a
/// [`Registrator`][crate::registrator::Registrator] holding another clone.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryDns {
    state: Arc<RwLock<State>>,
}

impl InMemoryDns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record directly, bypassing update transactions.
    pub async fn insert(&self, name: Name, rdata: RData) {
        self.state
            .write()
            .await
            .apply(Update::Add { name, ttl: 0, rdata });
    }

    /// All records at `name`, in insertion order.
    pub async fn records(&self, name: &Name) -> Vec<RData> {
        self.state
            .read()
            .await
            .records
            .get(name)
            .map_or(Vec::default(), Clone::clone)
    }

    pub async fn contains(&self, name: &Name, rdata: &RData) -> bool {
        self.state
            .read()
            .await
            .records
            .get(name)
            .map_or(false, |rrset| rrset.contains(rdata))
    }

    /// Make queries for `name` fail with `fault`.
    pub async fn fail_queries(&self, name: Name, fault: Fault) {
        self.state.write().await.query_faults.insert(name, fault);
    }

    /// Make update transactions with a prerequisite on `name` fail with `fault`.
    pub async fn fail_updates(&self, name: Name, fault: Fault) {
        self.state.write().await.update_faults.insert(name, fault);
    }

    pub async fn clear_faults(&self) {
        let mut state = self.state.write().await;
        state.query_faults.clear();
        state.update_faults.clear();
    }

    /// Number of update transactions submitted so far, applied or not.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.submitted.len()
    }

    /// Every update transaction submitted so far, applied or not, oldest first.
    pub async fn transactions(&self) -> Vec<UpdateTransaction> {
        self.state.read().await.submitted.clone()
    }
}

#[async_trait::async_trait]
impl DnsTransport for InMemoryDns {
    async fn resolve(&self, name: &Name, record_type: RecordType) -> Result<Lookup, Error> {
        let state = self.state.read().await;
        match state.query_faults.get(name) {
            Some(Fault::Timeout) => return Err(Error::Timeout),
            Some(Fault::Respond(code)) => return Ok(Lookup::new(*code, Vec::default())),
            None => {}
        }

        let Some(rrset) = state.records.get(name) else {
            return Ok(Lookup::new(ResponseCode::NXDomain, Vec::default()));
        };
        let answers = rrset
            .iter()
            .filter(|rdata| record_type == RecordType::ANY || rdata.to_record_type() == record_type)
            .cloned()
            .collect();
        Ok(Lookup::new(ResponseCode::NoError, answers))
    }

    async fn submit_update(&self, transaction: UpdateTransaction) -> Result<ResponseCode, Error> {
        let mut state = self.state.write().await;
        state.submitted.push(transaction.clone());

        let fault = transaction
            .prerequisites
            .iter()
            .find_map(|prerequisite| state.update_faults.get(prerequisite.name()).copied());
        match fault {
            Some(Fault::Timeout) => return Err(Error::Timeout),
            Some(Fault::Respond(code)) => return Ok(code),
            None => {}
        }

        let outside_zone = transaction
            .prerequisites
            .iter()
            .map(Prerequisite::name)
            .chain(transaction.updates.iter().map(Update::name))
            .any(|name| !transaction.zone.zone_of(name));
        if outside_zone {
            return Ok(ResponseCode::NotZone);
        }

        for prerequisite in &transaction.prerequisites {
            match prerequisite {
                Prerequisite::NameInUse(name) if !state.in_use(name) => {
                    return Ok(ResponseCode::NXDomain);
                }
                Prerequisite::NameNotInUse(name) if state.in_use(name) => {
                    return Ok(ResponseCode::YXDomain);
                }
                _ => {}
            }
        }

        for update in transaction.updates {
            state.apply(update);
        }
        Ok(ResponseCode::NoError)
    }

    fn at_server(&self, _server: SocketAddr) -> DynTransport {
        Arc::new(self.clone())
    }
}
