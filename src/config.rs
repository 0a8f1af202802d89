use crate::error::Error;
use crate::registrator::DEFAULT_TTL;
use crate::transport::SigningKey;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::Name;

pub type SharedConfig = Arc<Config>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the DNS transport, local topology guessing and registration.
///
/// Every field is optional in the JSON form, e.g.:
///
/// ```json
/// {
///   "name_servers": ["192.0.2.53:53"],
///   "timeout": 5,
///   "computer_domains": ["example.com."],
///   "registration_domain": "example.com.",
///   "ttl": 120,
///   "tsig": { "name": "update-key.", "algorithm": "hmac-sha256", "key": "c2VjcmV0" }
/// }
/// ```
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Name servers to query and update. The first one is used. Empty means the system
    /// resolver's.
    pub name_servers: Vec<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Replaces the guessed computer domains when non-empty.
    pub computer_domains: Vec<Name>,
    /// Replaces the OS reported host name.
    pub host_name: Option<String>,
    /// Local networks whose reverse lookup domains are computer domains too.
    pub networks: Vec<IpNetwork>,
    /// Domains to browse. Empty means ask domain enumeration.
    pub browsing_domains: Vec<Name>,
    /// Domain to register in. Absent means ask domain enumeration.
    pub registration_domain: Option<Name>,
    pub ttl: u32,
    pub tsig: Option<TsigConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TsigConfig {
    pub name: Option<String>,
    pub algorithm: Option<String>,
    pub key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name_servers: Vec::default(),
            timeout: DEFAULT_TIMEOUT,
            computer_domains: Vec::default(),
            host_name: None,
            networks: Vec::default(),
            browsing_domains: Vec::default(),
            registration_domain: None,
            ttl: DEFAULT_TTL,
            tsig: None,
        }
    }
}

impl Config {
    /// Load a `Config` from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it isn't a
    /// valid config, or [`Error::PartialSigningKey`] if `tsig` is only partially set.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.signing_key()?;
        Ok(conf)
    }

    /// The configured TSIG key, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialSigningKey`] if some but not all of the `tsig` fields are set.
    pub fn signing_key(&self) -> Result<Option<SigningKey>, Error> {
        match &self.tsig {
            None => Ok(None),
            Some(tsig) => SigningKey::from_parts(
                tsig.name.as_deref(),
                tsig.algorithm.as_deref(),
                tsig.key.as_deref(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.ttl, 60);
        assert!(config.name_servers.is_empty());
        assert!(config.signing_key().unwrap().is_none());
    }

    #[test]
    fn full_config() {
        let config: Config = serde_json::from_str(
            r#"{
              "name_servers": ["192.0.2.53:53"],
              "timeout": 3,
              "computer_domains": ["example.com."],
              "host_name": "box.example.com",
              "networks": ["192.168.1.17/24"],
              "browsing_domains": ["example.com.", "example.org."],
              "registration_domain": "example.com.",
              "ttl": 120,
              "tsig": { "name": "update-key.", "algorithm": "hmac-sha256", "key": "c2VjcmV0" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.ttl, 120);
        assert_eq!(config.browsing_domains.len(), 2);
        assert_eq!(
            config.registration_domain,
            Some(Name::from_str("example.com.").unwrap())
        );
        let key = config.signing_key().unwrap().unwrap();
        assert_eq!(key.name, Name::from_str("update-key.").unwrap());
    }

    #[test]
    fn partial_tsig_is_a_usage_error() {
        let config: Config =
            serde_json::from_str(r#"{ "tsig": { "name": "update-key." } }"#).unwrap();
        assert!(matches!(
            config.signing_key(),
            Err(Error::PartialSigningKey)
        ));
    }
}
