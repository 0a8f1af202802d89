//! The DNS-SD service model.
//!
//! A service instance is identified by a [`ServiceName`]: the triple of a free-form instance name,
//! a [`ServiceType`] and a fully qualified domain. On the wire the name becomes the label
//! sequence `{instance}.{type}.{transport}.{domain}` described in [RFC-6763 §4.1][RFC-6763-4.1].
//!
//! E.g. the instance `Lab Printer` of `_ipp._tcp` in `example.com.`:
//!
//! ```text
//! Lab\ Printer._ipp._tcp.example.com. 60 IN SRV 0 0 631 printer1.example.com.
//! Lab\ Printer._ipp._tcp.example.com. 60 IN TXT "rp=queue1" "color"
//! ```
//!
//! Its human readable form escapes `.` and `\` in the instance name, see
//! [RFC-6763 §4.3][RFC-6763-4.3]: `Lab Printer._ipp._tcp.example.com.`.
//!
//! [RFC-6763-4.1]: https://www.rfc-editor.org/rfc/rfc6763#section-4.1
//! [RFC-6763-4.3]: https://www.rfc-editor.org/rfc/rfc6763#section-4.3

pub mod data;
pub mod name;
pub mod service_type;

pub use data::ServiceData;
pub use name::ServiceName;
pub use service_type::{ServiceType, Transport};

/// Raw label handling. Instance names are arbitrary UTF-8, so labels are built from bytes rather
/// than through the presentation format parser.
pub(crate) mod labels {
    use crate::error::Error;
    use trust_dns_proto::rr::domain::Label;
    use trust_dns_proto::rr::Name;

    /// Build the absolute name `prefix... + domain`.
    pub(crate) fn prepend<I>(prefix: I, domain: &Name) -> Result<Name, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut labels = Vec::new();
        for label in prefix {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(Error::InvalidFormat("empty label".to_string()));
            }
            labels.push(Label::from_raw_bytes(label).map_err(Error::invalid)?);
        }
        for label in domain.iter() {
            labels.push(Label::from_raw_bytes(label).map_err(Error::invalid)?);
        }
        Name::from_labels(labels).map_err(Error::invalid)
    }

    /// Number of labels in `name`. Unlike [`Name::num_labels`] a leading `*` is counted, since
    /// it is an ordinary instance label here.
    pub(crate) fn count(name: &Name) -> usize {
        name.iter().count()
    }

    pub(crate) fn decode(label: &[u8]) -> Result<String, Error> {
        String::from_utf8(label.to_vec()).map_err(Error::invalid)
    }
}
