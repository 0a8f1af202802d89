//! Best effort guessing of the local host's domains and host names.
//!
//! Domain enumeration starts from a set of "computer domains", see
//! [RFC-6763 §11][RFC-6763-11]: the parent domain of the host name, and the reverse lookup domain
//! of each attached network, e.g. `0.1.168.192.in-addr.arpa.` for `192.168.1.0/24`.
//!
//! [RFC-6763-11]: https://www.rfc-editor.org/rfc/rfc6763#section-11
use crate::config::Config;
use ipnetwork::IpNetwork;
use std::str::FromStr;
use tracing::warn;
use trust_dns_proto::rr::Name;

/// Source of candidate computer domains and host names. Empty lists are valid.
pub trait LocalTopology {
    fn computer_domains(&self) -> Vec<Name>;
    fn computer_host_names(&self) -> Vec<String>;
}

/// `DynTopology` is a type alias for a shared [`LocalTopology`].
pub type DynTopology = std::sync::Arc<dyn LocalTopology + Send + Sync>;

/// Fixed lists of domains and host names.
#[derive(Debug, Clone, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct StaticTopology {
    pub domains: Vec<Name>,
    pub host_names: Vec<String>,
}

impl LocalTopology for StaticTopology {
    fn computer_domains(&self) -> Vec<Name> {
        self.domains.clone()
    }

    fn computer_host_names(&self) -> Vec<String> {
        self.host_names.clone()
    }
}

/// Guesses from the OS host name and configured local networks, with explicit overrides.
#[derive(Debug, Clone, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SystemTopology {
    domains: Vec<Name>,
    host_name: Option<String>,
    networks: Vec<IpNetwork>,
}

impl SystemTopology {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        SystemTopology {
            domains: config.computer_domains.clone(),
            host_name: config.host_name.clone(),
            networks: config.networks.clone(),
        }
    }

    fn os_host_name() -> Option<String> {
        match hostname::get() {
            Ok(name) => name.into_string().ok(),
            Err(err) => {
                warn!("no OS host name: {err}");
                None
            }
        }
    }
}

impl LocalTopology for SystemTopology {
    fn computer_domains(&self) -> Vec<Name> {
        if !self.domains.is_empty() {
            return self.domains.clone();
        }
        let mut domains: Vec<Name> = self
            .computer_host_names()
            .iter()
            .filter_map(|host| parent_domain(host))
            .collect();
        domains.extend(self.networks.iter().map(reverse_domain));
        domains
    }

    fn computer_host_names(&self) -> Vec<String> {
        self.host_name
            .clone()
            .into_iter()
            .chain(Self::os_host_name())
            .collect()
    }
}

/// The host name with its leftmost label removed, if that leaves a domain.
fn parent_domain(host: &str) -> Option<Name> {
    let mut name = Name::from_str(host).ok()?;
    name.set_fqdn(true);
    if name.num_labels() < 2 {
        return None;
    }
    Some(name.base_name())
}

/// The reverse lookup name of the network address, host bits zeroed.
fn reverse_domain(network: &IpNetwork) -> Name {
    Name::from(network.network())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_host_name() {
        assert_eq!(
            parent_domain("box.lab.example.com"),
            Some(Name::from_str("lab.example.com.").unwrap())
        );
        assert_eq!(parent_domain("box"), None);
    }

    #[test]
    fn reverse_lookup_domain_of_network() {
        let network = IpNetwork::from_str("192.168.1.17/24").unwrap();
        assert_eq!(
            reverse_domain(&network),
            Name::from_str("0.1.168.192.in-addr.arpa.").unwrap()
        );
    }

    #[test]
    fn configured_domains_win() {
        let config = Config {
            computer_domains: vec![Name::from_str("example.com.").unwrap()],
            networks: vec![IpNetwork::from_str("10.0.0.0/8").unwrap()],
            ..Config::default()
        };
        let topology = SystemTopology::from_config(&config);
        assert_eq!(
            topology.computer_domains(),
            vec![Name::from_str("example.com.").unwrap()]
        );
    }

    #[test]
    fn configured_host_name_comes_first() {
        let config = Config {
            host_name: Some("box.example.com".to_string()),
            networks: vec![IpNetwork::from_str("10.1.2.3/16").unwrap()],
            ..Config::default()
        };
        let topology = SystemTopology::from_config(&config);
        assert_eq!(topology.computer_host_names()[0], "box.example.com");
        let domains = topology.computer_domains();
        assert_eq!(domains[0], Name::from_str("example.com.").unwrap());
        assert_eq!(
            domains.last(),
            Some(&Name::from_str("0.0.1.10.in-addr.arpa.").unwrap())
        );
    }
}
