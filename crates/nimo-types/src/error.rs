//! The error taxonomy shared by every nImO component.
//!
//! Every fallible operation in the fabric — a Registry handler, a proxy
//! call, a channel transition — returns [`NimoError`], which carries one
//! of a fixed set of [`ErrorKind`]s plus a short human-readable message.
//! The command engine (`nimo-proto`) serializes a `NimoError` into a
//! response's `failureReason` string by `Display`; it never leaks a Rust
//! type across the wire.

use std::fmt;

/// The closed set of failure kinds carried in `failureReason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadArgument,
    MissingArgument,
    NotFound,
    AlreadyExists,
    LimitExceeded,
    ChannelInUse,
    TransportMismatch,
    MessageTooLarge,
    DecodeFailed,
    RegistryNotFound,
    Timeout,
    ServiceBusy,
    Internal,
}

impl ErrorKind {
    /// The wire token for this kind, as used in `failureReason` prefixes
    /// and by CLI tools deciding an exit code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadArgument => "badArgument",
            ErrorKind::MissingArgument => "missingArgument",
            ErrorKind::NotFound => "notFound",
            ErrorKind::AlreadyExists => "alreadyExists",
            ErrorKind::LimitExceeded => "limitExceeded",
            ErrorKind::ChannelInUse => "channelInUse",
            ErrorKind::TransportMismatch => "transportMismatch",
            ErrorKind::MessageTooLarge => "messageTooLarge",
            ErrorKind::DecodeFailed => "decodeFailed",
            ErrorKind::RegistryNotFound => "registryNotFound",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServiceBusy => "serviceBusy",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed result: an [`ErrorKind`] plus a human-readable message.
///
/// This is the only error type that crosses the command-port wire; it
/// never carries a Rust backtrace or a boxed source, matching the
/// Design Notes' requirement that the only process-wide catch is a
/// last-resort log-and-exit in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NimoError {
    pub kind: ErrorKind,
    pub message: String,
}

impl NimoError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadArgument, message)
    }

    pub fn missing_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LimitExceeded, message)
    }

    pub fn channel_in_use(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ChannelInUse, message)
    }

    pub fn transport_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportMismatch, message)
    }

    pub fn message_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MessageTooLarge, message)
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeFailed, message)
    }

    pub fn registry_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RegistryNotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn service_busy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceBusy, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for NimoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

const KNOWN_KINDS: &[ErrorKind] = &[
    ErrorKind::BadArgument,
    ErrorKind::MissingArgument,
    ErrorKind::NotFound,
    ErrorKind::AlreadyExists,
    ErrorKind::LimitExceeded,
    ErrorKind::ChannelInUse,
    ErrorKind::TransportMismatch,
    ErrorKind::MessageTooLarge,
    ErrorKind::DecodeFailed,
    ErrorKind::RegistryNotFound,
    ErrorKind::Timeout,
    ErrorKind::ServiceBusy,
    ErrorKind::Internal,
];

impl NimoError {
    /// Reconstruct a best-effort `NimoError` from a wire `failureReason`
    /// string (the `"kind: message"` shape produced by `Display`). The
    /// wire only ever carries this string (§4.C), so a proxy that wants
    /// a typed kind back has to recover it this way rather than getting
    /// one for free.
    pub fn from_wire_reason(reason: &str) -> Self {
        for kind in KNOWN_KINDS {
            if let Some(rest) = reason.strip_prefix(kind.as_str()) {
                if let Some(message) = rest.strip_prefix(": ") {
                    return NimoError::new(*kind, message.to_string());
                }
            }
        }
        NimoError::internal(reason.to_string())
    }
}

impl std::error::Error for NimoError {}

pub type Result<T> = std::result::Result<T, NimoError>;
