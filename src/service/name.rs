use crate::error::Error;
use crate::service::labels;
use crate::service::ServiceType;
use std::fmt;
use std::str::FromStr;
use trust_dns_proto::rr::Name;

/// Unique identifier of a service instance: instance name, service type and domain.
///
/// Equality and hashing cover all three parts, but subtypes of the service type are ignored
/// (see [`ServiceType`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::module_name_repetitions)]
pub struct ServiceName {
    instance: String,
    service_type: ServiceType,
    domain: Name,
}

impl ServiceName {
    /// Create a service name. `domain` is made fully qualified if it isn't already.
    pub fn new(instance: impl Into<String>, service_type: ServiceType, mut domain: Name) -> Self {
        if !domain.is_fqdn() {
            domain.set_fqdn(true);
        }
        ServiceName {
            instance: instance.into(),
            service_type,
            domain,
        }
    }

    /// The human readable instance name, unescaped.
    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    #[must_use]
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    #[must_use]
    pub fn domain(&self) -> &Name {
        &self.domain
    }

    /// The DNS name holding the instance's SRV and TXT records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the instance name is empty, or a label or the whole
    /// name is too long for DNS.
    pub fn to_dns_name(&self) -> Result<Name, Error> {
        if self.instance.is_empty() {
            return Err(Error::InvalidFormat("empty instance name".to_string()));
        }
        let mut all = self.instance_labels();
        all.push(self.service_type.name().as_bytes().to_vec());
        all.push(self.service_type.transport().label().as_bytes().to_vec());
        labels::prepend(all, &self.domain)
    }

    /// Parse the name a PTR record points at back into a `ServiceName`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if there are fewer than four labels (instance, type,
    /// transport and at least one domain label), the transport label isn't `_tcp` or `_udp`, or a
    /// label isn't valid UTF-8.
    pub fn from_dns_name(name: &Name) -> Result<Self, Error> {
        let num_labels = labels::count(name);
        if num_labels < 4 {
            return Err(Error::InvalidFormat(format!(
                "too few labels in service name: \"{name}\""
            )));
        }
        let parts = name
            .iter()
            .take(3)
            .map(labels::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let service_type = ServiceType::new(parts[1].clone(), parts[2].parse()?);
        Ok(ServiceName::new(
            parts[0].clone(),
            service_type,
            name.trim_to(num_labels - 3),
        ))
    }

    /// When the instance name is itself a name below `domain`, only the labels above `domain`
    /// make up the instance portion. Otherwise the whole instance name is a single label.
    fn instance_labels(&self) -> Vec<Vec<u8>> {
        if let Ok(mut parsed) = Name::from_ascii(&self.instance) {
            parsed.set_fqdn(true);
            let parsed_labels = labels::count(&parsed);
            let domain_labels = labels::count(&self.domain);
            if parsed_labels > domain_labels && self.domain.zone_of(&parsed) {
                let keep = parsed_labels - domain_labels;
                return parsed.iter().take(keep).map(<[u8]>::to_vec).collect();
            }
        }
        vec![self.instance.as_bytes().to_vec()]
    }
}

/// Formats as `{instance}.{type}.{transport}.{domain}[,{subtype}]*` with `.` and `\` in the
/// instance escaped.
impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            escape(&self.instance),
            self.service_type.dns_string(),
            self.domain
        )?;
        for subtype in self.service_type.subtypes() {
            write!(f, ",{subtype}")?;
        }
        Ok(())
    }
}

impl FromStr for ServiceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(i) = index_of_unescaped(s, '.') else {
            return Err(Error::InvalidFormat(format!(
                "no '.' in service name: \"{s}\""
            )));
        };
        let instance = unescape(&s[..i]);
        let (rest, subtypes) = match s[i + 1..].split_once(',') {
            Some((rest, list)) => (rest, Some(list)),
            None => (&s[i + 1..], None),
        };

        let mut parts = rest.splitn(3, '.');
        let (Some(type_name), Some(transport), Some(domain)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidFormat(format!(
                "no domain after service type: \"{s}\""
            )));
        };

        let domain = Name::from_str(domain).map_err(Error::invalid)?;
        if labels::count(&domain) == 0 {
            return Err(Error::InvalidFormat(format!(
                "empty domain in service name: \"{s}\""
            )));
        }

        let mut service_type = ServiceType::new(type_name, transport.parse()?);
        if let Some(list) = subtypes {
            service_type = service_type.with_subtypes(ServiceType::parse_subtypes(list)?)?;
        }
        Ok(ServiceName::new(instance, service_type, domain))
    }
}

/// Escape `.` and `\` per RFC 6763 §4.3.
fn escape(instance: &str) -> String {
    let mut escaped = String::with_capacity(instance.len());
    for c in instance.chars() {
        if c == '.' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Undo [`escape`]: `\x` becomes `x` for any `x`.
fn unescape(escaped: &str) -> String {
    let mut instance = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            instance.push(chars.next().unwrap_or(c));
        } else {
            instance.push(c);
        }
    }
    instance
}

/// Byte index of the first `ch` not preceded by an escaping backslash.
fn index_of_unescaped(s: &str, ch: char) -> Option<usize> {
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == ch {
            return Some(i);
        }
    }
    None
}
