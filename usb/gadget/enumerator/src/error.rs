use syscall::{
    ECONNRESET, EDOM, EINVAL, EMSGSIZE, ENOTCONN, EOPNOTSUPP, EPERM, EPIPE, ETIMEDOUT,
};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by the enumeration engine.
///
/// None of these are retried internally. A failure during `enumerate` leaves the enumerator in
/// whatever state the failing request reached; a failure during steady state only fails the
/// current control transaction.
#[derive(Debug, Error)]
pub enum Error {
    /// A fixed-size field arrived with the wrong number of bytes.
    #[error("framing error: expected {expected} bytes, got {actual}")]
    MessageSize { expected: usize, actual: usize },

    /// A request reached the device-only path with a non-device recipient.
    #[error("request for recipient {recipient:#04x} is not valid while enumerating")]
    ProtocolViolation { recipient: u8 },

    /// A standard request the device path does not implement.
    #[error("invalid standard device request {request:#04x}")]
    InvalidRequest { request: u8 },

    #[error("descriptor type {kind:#04x} is not supported")]
    NotSupported { kind: u8 },

    #[error("{what} index {index} is out of domain")]
    OutOfDomain { what: &'static str, index: usize },

    #[error("operation not permitted: {0}")]
    NotPermitted(&'static str),

    /// No interface of the active configuration accepted the request.
    #[error("request {request:#04x} for recipient {recipient:#04x} was not handled")]
    UnhandledRequest { request: u8, recipient: u8 },

    /// An interface tried to use the data stage against the request direction.
    #[error("data stage used in the wrong direction")]
    WrongDirection,

    #[error("enumeration aborted by bus reset")]
    BusReset,

    #[error("timed out waiting for a setup packet")]
    Timeout,

    #[error("control event channel closed")]
    ChannelClosed,

    #[error("control endpoint error: {0}")]
    Endpoint(#[from] syscall::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// The errno this error is reported as when surfaced through a scheme.
    pub fn errno(&self) -> i32 {
        match self {
            Self::MessageSize { .. } => EMSGSIZE,
            Self::ProtocolViolation { .. } | Self::InvalidRequest { .. } => ENOTCONN,
            Self::NotSupported { .. } => EOPNOTSUPP,
            Self::OutOfDomain { .. } | Self::UnhandledRequest { .. } => EDOM,
            Self::NotPermitted(_) => EPERM,
            Self::WrongDirection | Self::Config(_) => EINVAL,
            Self::BusReset => ECONNRESET,
            Self::Timeout => ETIMEDOUT,
            Self::ChannelClosed => EPIPE,
            Self::Endpoint(err) => err.errno,
        }
    }
}

impl From<Error> for syscall::Error {
    fn from(err: Error) -> Self {
        syscall::Error::new(err.errno())
    }
}
