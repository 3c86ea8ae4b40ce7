/// Error is the hub's wire-level error set. Every facade call surfaces
/// exactly one of these; internal helpers return the most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no entry at the requested path")]
    NotFound,
    #[error("resource has no current value")]
    Unavailable,
    #[error("value kind does not match the request")]
    FormatMismatch,
    #[error("creation conflicts with an existing resource")]
    Duplicate,
    #[error("result does not fit the output capacity")]
    Overflow,
    #[error("entry is a namespace, not a resource")]
    Unsupported,
    #[error("malformed path or specification")]
    BadParameter,
    #[error("out of memory")]
    NoMemory,
    #[error("route would form a cycle")]
    CycleDetected,
    #[error("failed to write to the output channel")]
    CommError,
}

impl Error {
    /// True when an `io` surface call failing this way marks the client
    /// as misbehaving; the transport answers by closing its session.
    pub fn kills_session(&self) -> bool {
        matches!(
            self,
            Error::BadParameter | Error::NotFound | Error::FormatMismatch
        )
    }
}

impl From<json::Error> for Error {
    fn from(err: json::Error) -> Error {
        match err {
            json::Error::Format => Error::FormatMismatch,
            json::Error::BadSpec => Error::BadParameter,
            json::Error::NotFound => Error::NotFound,
            json::Error::Overflow => Error::Overflow,
        }
    }
}
