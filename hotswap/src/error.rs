// Hot swap error taxonomy
//
// Every variant aborts the current invocation and maps to its own process
// exit code. Detach problems are a separate, non-fatal type.

use jdwp_client::JdwpError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HotSwapError>;

#[derive(Debug, Error)]
pub enum HotSwapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot find a socket connector")]
    NoSuitableTransport,

    #[error("unable to attach to {target}: {source}")]
    AttachFailed {
        target: String,
        #[source]
        source: JdwpError,
    },

    #[error("{vm} doesn't support class replacement")]
    UnsupportedTarget { vm: String },

    #[error("unable to read class file {}: {source}", path.display())]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no loaded class to swap for {0}")]
    TypeNotLoaded(String),

    #[error("target rejected redefinition of {type_name}: {reason}")]
    RedefinitionRejected { type_name: String, reason: String },

    #[error("session is no longer attached")]
    SessionClosed,

    #[error("communication with target failed: {0}")]
    Protocol(#[source] JdwpError),
}

impl HotSwapError {
    /// Process exit code for this failure class
    pub fn exit_code(&self) -> u8 {
        match self {
            HotSwapError::InvalidArgument(_) => 2,
            HotSwapError::NoSuitableTransport => 3,
            HotSwapError::AttachFailed { .. } => 4,
            HotSwapError::UnsupportedTarget { .. } => 5,
            HotSwapError::ImageUnreadable { .. } => 6,
            HotSwapError::TypeNotLoaded(_) => 7,
            HotSwapError::RedefinitionRejected { .. } => 8,
            HotSwapError::SessionClosed => 9,
            HotSwapError::Protocol(_) => 10,
        }
    }
}

/// Teardown could not cleanly release the session; reported, never raised
#[derive(Debug, Error)]
#[error("unable to disconnect from {target}: {source}")]
pub struct DetachWarning {
    pub target: String,
    #[source]
    pub source: JdwpError,
}
