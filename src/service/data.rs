use crate::service::ServiceName;
use std::collections::BTreeMap;
use std::fmt;
use trust_dns_proto::rr::Name;

/// Key/value properties of a service, keyed by lower cased key. A `None` value is a boolean
/// attribute, present without `=`.
pub type Properties = BTreeMap<String, Option<String>>;

/// The endpoint and metadata of a service instance.
///
/// The host must be fully qualified, e.g. `host1.example.com.`. Property keys are defined by the
/// service type and are case insensitive, see [RFC-6763 §6][RFC-6763-6].
///
/// [RFC-6763-6]: https://www.rfc-editor.org/rfc/rfc6763#section-6
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct ServiceData {
    name: ServiceName,
    host: Name,
    port: u16,
    properties: Properties,
}

impl ServiceData {
    pub fn new(name: ServiceName, mut host: Name, port: u16) -> Self {
        if !host.is_fqdn() {
            host.set_fqdn(true);
        }
        ServiceData {
            name,
            host,
            port,
            properties: Properties::default(),
        }
    }

    /// Set a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: Option<&str>) -> Self {
        self.set_property(key, value);
        self
    }

    #[must_use]
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    #[must_use]
    pub fn host(&self) -> &Name {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_name(&mut self, name: ServiceName) {
        self.name = name;
    }

    pub fn set_host(&mut self, host: Name) {
        self.host = host;
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Look up a property. The outer `Option` is the presence of the key, the inner one its
    /// value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Option<&str>> {
        self.properties
            .get(&key.to_lowercase())
            .map(Option::as_deref)
    }

    /// Set a property, replacing any previous value. Returns the previous value, if any.
    pub fn set_property(&mut self, key: &str, value: Option<&str>) -> Option<Option<String>> {
        self.properties
            .insert(key.to_lowercase(), value.map(ToString::to_string))
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Option<String>> {
        self.properties.remove(&key.to_lowercase())
    }

    /// Render the properties as TXT record strings, `key=value` or a bare `key`.
    ///
    /// A TXT record must hold at least one string, so an empty property map renders as a
    /// single empty string.
    #[must_use]
    pub fn txt_strings(&self) -> Vec<String> {
        let mut strings: Vec<String> = self
            .properties
            .iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{key}={value}"),
                None => key.clone(),
            })
            .collect();
        if strings.is_empty() {
            strings.push(String::new());
        }
        strings
    }

    /// Merge properties parsed from TXT record strings, see [`parse_txt`].
    pub fn extend_from_txt<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            insert_txt_entry(&mut self.properties, entry.as_ref());
        }
    }
}

impl fmt::Display for ServiceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}:{} {:?}", self.name, self.host, self.port, self.properties)
    }
}

/// Parse TXT record strings into properties.
///
/// Each entry is `key=value` or a bare `key`. Empty entries and entries starting with `=` are
/// skipped. Keys are lower cased and only the first occurrence of a key counts.
pub fn parse_txt<I, S>(entries: I) -> Properties
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut properties = Properties::default();
    for entry in entries {
        insert_txt_entry(&mut properties, entry.as_ref());
    }
    properties
}

fn insert_txt_entry(properties: &mut Properties, entry: &str) {
    if entry.is_empty() || entry.starts_with('=') {
        return;
    }
    let (key, value) = match entry.split_once('=') {
        Some((key, value)) => (key.to_lowercase(), Some(value.to_string())),
        None => (entry.to_lowercase(), None),
    };
    properties.entry(key).or_insert(value);
}
