use netconf_proto::{FrameError, RpcError};
use std::io;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong talking NETCONF to a device.
///
/// Transport-level failures (`Frame`, `Protocol`, `Timeout`, `Io`,
/// `Handshake`) leave the stream position unknown and mark the session
/// broken. The RPC variants are per-call: the device answered, the answer
/// carried `<rpc-error>` entries, and the session stays usable.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect to the device failed before SSH was attempted.
    #[error("device {host}:{port} unreachable")]
    Unreachable {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH authentication failed, or the host-key policy rejected the
    /// connection under strict checking.
    #[error("ssh authentication failed: {0}")]
    Auth(String),

    #[error("netconf handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("operation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("rpc failed with {} error(s)", .errors.len())]
    Rpc { errors: Vec<RpcError> },

    #[error("load-configuration failed with {} error(s)", .errors.len())]
    Load { errors: Vec<RpcError> },

    #[error("commit failed with {} error(s)", .errors.len())]
    Commit { errors: Vec<RpcError> },

    #[error("lock operation denied")]
    Lock { errors: Vec<RpcError> },

    /// The server does not advertise a capability the operation requires.
    #[error("server does not advertise {0}")]
    Unsupported(&'static str),

    /// The session is closed, broken, or otherwise not ready.
    #[error("session is not ready")]
    Closed,

    #[error("malformed reply document")]
    Xml(#[from] quick_xml::DeError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The `<rpc-error>` entries behind an RPC-level failure, if this is one.
    pub fn rpc_errors(&self) -> Option<&[RpcError]> {
        match self {
            Error::Rpc { errors }
            | Error::Load { errors }
            | Error::Commit { errors }
            | Error::Lock { errors } => Some(errors),
            _ => None,
        }
    }
}
