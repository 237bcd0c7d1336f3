//! Protocol layer of the NETCONF client: message framing (RFC 6242),
//! hello/capability exchange, the rpc-reply model and request envelopes
//! (RFC 6241). No I/O happens here; the session layer in `netconf_client`
//! pumps bytes in and out.

pub mod datastore;
pub mod envelope;
pub mod frame;
pub mod hello;
pub mod reply;

pub use datastore::Datastore;
pub use frame::{FrameDecoder, FrameError, Framing};
pub use hello::{BaseVersion, Capabilities, Hello};
pub use reply::{
    ErrorInfo, ErrorSeverity, ErrorTag, ErrorType, LoadConfigResults, RpcError, RpcReply,
    RpcReplyBuilder,
};

/// Namespace of the NETCONF base protocol elements.
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Default port of the SSH `netconf` subsystem (RFC 6242).
pub const DEFAULT_NETCONF_PORT: u16 = 830;

pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";
pub const CAP_CANDIDATE: &str = "urn:ietf:params:netconf:capability:candidate:1.0";
pub const CAP_CONFIRMED_COMMIT: &str = "urn:ietf:params:netconf:capability:confirmed-commit:1.1";
pub const CAP_VALIDATE: &str = "urn:ietf:params:netconf:capability:validate:1.1";
