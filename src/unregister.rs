use crate::registrator::Registrator;
use crate::service::ServiceName;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Tracks registered services so they can all be unregistered at shutdown.
///
/// Nothing happens on its own: the owner calls [`AutomaticUnregister::unregister_all`] from
/// whatever shutdown hook it has, e.g. [`tokio::signal::ctrl_c`].
pub struct AutomaticUnregister {
    registrator: Arc<Registrator>,
    services: Mutex<HashSet<ServiceName>>,
}

impl AutomaticUnregister {
    #[must_use]
    pub fn new(registrator: Arc<Registrator>) -> Self {
        AutomaticUnregister {
            registrator,
            services: Mutex::default(),
        }
    }

    /// Track `service`. Returns `false` if it was already tracked.
    pub async fn add_service(&self, service: ServiceName) -> bool {
        self.services.lock().await.insert(service)
    }

    /// Stop tracking `service`. Returns `false` if it wasn't tracked.
    pub async fn remove_service(&self, service: &ServiceName) -> bool {
        self.services.lock().await.remove(service)
    }

    pub async fn services(&self) -> Vec<ServiceName> {
        self.services.lock().await.iter().cloned().collect()
    }

    /// Unregister every tracked service and stop tracking them. Failures are logged and don't
    /// stop the remaining unregistrations.
    pub async fn unregister_all(&self) {
        let mut services = self.services.lock().await;
        for service in services.drain() {
            match self.registrator.unregister_service(&service).await {
                Ok(true) => info!("unregistered {service} at shutdown"),
                Ok(false) => info!("{service} was already gone at shutdown"),
                Err(err) => error!("failed to unregister {service} at shutdown: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceData, ServiceType, Transport};
    use crate::transport::memory::Fault;
    use crate::transport::InMemoryDns;
    use std::str::FromStr;
    use trust_dns_proto::rr::Name;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn unregisters_tracked_services_and_continues_on_failure() {
        let dns = InMemoryDns::new();
        let registrator = Arc::new(
            Registrator::new(Arc::new(dns.clone()), name("example.com."))
                .await
                .unwrap(),
        );
        let http = ServiceType::new("_http", Transport::Tcp);
        let handle = AutomaticUnregister::new(registrator.clone());
        for instance in ["a", "b", "c"] {
            let service = registrator.make_service_name(instance, http.clone());
            let data = ServiceData::new(service.clone(), name("www.example.com."), 80);
            assert!(registrator.register_service(&data).await.unwrap());
            assert!(handle.add_service(service).await);
        }
        let c = registrator.make_service_name("c", http.clone());
        assert!(handle.remove_service(&c).await);
        assert!(!handle.remove_service(&c).await);

        dns.fail_updates(name("a._http._tcp.example.com."), Fault::Timeout)
            .await;
        handle.unregister_all().await;

        assert!(handle.services().await.is_empty());
        assert!(!dns.records(&name("a._http._tcp.example.com.")).await.is_empty());
        assert!(dns.records(&name("b._http._tcp.example.com.")).await.is_empty());
        assert!(!dns.records(&name("c._http._tcp.example.com.")).await.is_empty());
    }
}
