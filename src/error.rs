//! Error types.

use trust_dns_proto::error::{ProtoError, ProtoErrorKind};
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::Name;

/// `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error enumerates the possible DNS-SD failure states.
///
/// Absence is never an error: empty enumerations are returned as empty `Vec`s, an unresolvable
/// service instance as `None`, and a name collision during registration as `Ok(false)`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a [`ServiceName`][crate::service::ServiceName],
    /// [`ServiceType`][crate::service::ServiceType] or DNS label sequence can't be parsed.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Returned when the DNS transport gave up waiting for a response.
    #[error("DNS request timed out")]
    Timeout,

    /// Returned when the DNS transport failed to deliver a request or read its response.
    #[error("DNS transport error: {0}")]
    Transport(String),

    /// Returned when a query used for enumeration was answered with a response code other than
    /// `NOERROR` or `NXDOMAIN`.
    #[error("server returned {code} for \"{name}\"")]
    ServerError { name: Name, code: ResponseCode },

    /// Returned when the server rejected a registration or unregistration transaction for a
    /// reason other than its prerequisite failing.
    #[error("update for \"{name}\" failed, server returned {code}")]
    RegistrationFailed { name: String, code: ResponseCode },

    /// Returned when a registration or unregistration transaction timed out.
    #[error("update for \"{0}\" timed out")]
    RegistrationTimeout(String),

    /// Returned by [`Registrator::local_host_name`][crate::registrator::Registrator::local_host_name]
    /// when no candidate host name qualifies.
    #[error("no usable local host name found")]
    HostNameUnavailable,

    /// Returned when a signing key is only partially configured.
    #[error("signing key name, algorithm and key must be all set or all unset")]
    PartialSigningKey,

    /// Returned by the transport when a signing key can't be turned into a TSIG signer.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// Returned when domain enumeration finds no domain to register services in.
    #[error("no registration domain found")]
    NoRegistrationDomain,

    /// Returned when the `_dns-update._udp` SRV target of a registration domain has no address.
    #[error("update server \"{0}\" has no address")]
    UpdateServerNotFound(Name),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [loading a `Config`][crate::config::Config::try_from_file] fails due to
    /// invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),
}

impl From<ProtoError> for Error {
    fn from(err: ProtoError) -> Self {
        match err.kind() {
            ProtoErrorKind::Timeout => Error::Timeout,
            _ => Error::Transport(err.to_string()),
        }
    }
}

impl Error {
    pub(crate) fn invalid<E: std::fmt::Display>(err: E) -> Self {
        Error::InvalidFormat(err.to_string())
    }
}
