use crate::error::Error;
use crate::service::labels;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use trust_dns_proto::rr::Name;

const SUBTYPE_LABEL: &str = "_sub";

/// The transport protocol a service is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// The DNS label for the transport, `_tcp` or `_udp`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Transport::Tcp => "_tcp",
            Transport::Udp => "_udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "_tcp" => Ok(Transport::Tcp),
            "_udp" => Ok(Transport::Udp),
            _ => Err(Error::InvalidFormat(format!(
                "not a valid transport label: \"{s}\""
            ))),
        }
    }
}

/// A DNS-SD service type, e.g. `_http._tcp`.
///
/// Subtypes only narrow browsing. A `ServiceType` carrying subtypes still equals, and hashes
/// the same as, its base type.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct ServiceType {
    name: String,
    transport: Transport,
    subtypes: Vec<String>,
}

impl ServiceType {
    /// Create a service type from its application protocol label (e.g. `_http`) and transport.
    pub fn new(name: impl Into<String>, transport: Transport) -> Self {
        ServiceType {
            name: name.into(),
            transport,
            subtypes: Vec::new(),
        }
    }

    /// Return a copy of this type restricted to a single subtype. Existing subtypes are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if `subtype` is empty.
    pub fn with_subtype(&self, subtype: impl Into<String>) -> Result<Self, Error> {
        self.with_subtypes([subtype])
    }

    /// Return a copy of this type restricted to the given subtypes. Existing subtypes are
    /// replaced. Repeated subtypes are kept once, in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if any subtype is empty.
    pub fn with_subtypes<I, S>(&self, subtypes: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for subtype in subtypes {
            let subtype: String = subtype.into();
            if subtype.trim().is_empty() {
                return Err(Error::InvalidFormat(
                    "zero length subtype is not allowed".to_string(),
                ));
            }
            if !unique.contains(&subtype) {
                unique.push(subtype);
            }
        }
        Ok(ServiceType {
            name: self.name.clone(),
            transport: self.transport,
            subtypes: unique,
        })
    }

    /// This type without any subtypes.
    #[must_use]
    pub fn base_type(&self) -> Self {
        ServiceType::new(self.name.clone(), self.transport)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    #[must_use]
    pub fn subtypes(&self) -> &[String] {
        &self.subtypes
    }

    /// The `{type}.{transport}` form of the base type.
    #[must_use]
    pub fn dns_string(&self) -> String {
        format!("{}.{}", self.name, self.transport)
    }

    /// One `{subtype}._sub.{type}.{transport}` string per subtype.
    #[must_use]
    pub fn subtype_dns_strings(&self) -> Vec<String> {
        self.subtypes
            .iter()
            .map(|subtype| format!("{subtype}.{SUBTYPE_LABEL}.{}", self.dns_string()))
            .collect()
    }

    /// The name of the PTR node listing instances of this type in `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if a label is too long for DNS.
    pub fn dns_name_in(&self, domain: &Name) -> Result<Name, Error> {
        labels::prepend([self.name.as_bytes(), self.transport.label().as_bytes()], domain)
    }

    /// One PTR node name per subtype, `{subtype}._sub.{type}.{transport}.{domain}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if a label is too long for DNS.
    pub fn subtype_dns_names_in(&self, domain: &Name) -> Result<Vec<Name>, Error> {
        self.subtypes
            .iter()
            .map(|subtype| {
                labels::prepend(
                    [
                        subtype.as_bytes(),
                        SUBTYPE_LABEL.as_bytes(),
                        self.name.as_bytes(),
                        self.transport.label().as_bytes(),
                    ],
                    domain,
                )
            })
            .collect()
    }

    pub(crate) fn parse_subtypes(list: &str) -> Result<Vec<String>, Error> {
        let subtypes: Vec<String> = list.split(',').map(ToString::to_string).collect();
        if subtypes.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidFormat(format!(
                "zero length subtype is not allowed: \"{list}\""
            )));
        }
        Ok(subtypes)
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.transport == other.transport
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.transport.hash(state);
    }
}

/// Formats as `{type}.{transport}[,{subtype}]*`, e.g. `_ftp._tcp,_anon`.
impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.transport)?;
        for subtype in &self.subtypes {
            write!(f, ",{subtype}")?;
        }
        Ok(())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, subtypes) = match s.split_once(',') {
            Some((base, list)) => (base, Some(list)),
            None => (s, None),
        };
        let Some((name, transport)) = base.split_once('.') else {
            return Err(Error::InvalidFormat(format!(
                "no '.' in service type: \"{s}\""
            )));
        };
        let mut service_type = ServiceType::new(name, transport.parse()?);
        if let Some(list) = subtypes {
            service_type = service_type.with_subtypes(Self::parse_subtypes(list)?)?;
        }
        Ok(service_type)
    }
}
