//! NETCONF client over the SSH `netconf` subsystem (RFC 6241, RFC 6242).
//!
//! A [`Session`] owns one SSH channel to one device: it probes reachability,
//! authenticates, exchanges hellos, locks in the negotiated framing and then
//! runs message-id correlated RPCs one at a time. High-level operations
//! (`get-config`, `edit-config`, lock/commit/validate and the Juniper
//! `load-configuration` family) sit on top of the raw [`Session::rpc`] engine.
//!
//! ```no_run
//! use netconf_client::{Auth, Datastore, Session, SessionConfig};
//!
//! # async fn demo() -> netconf_client::Result<()> {
//! let config = SessionConfig::new("192.0.2.1", "admin", Auth::Password("secret".into()));
//! let session = Session::connect(config).await?;
//! let reply = session.get_config(Datastore::Running, None).await?;
//! println!("{}", reply.to_xml());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod ops;
pub mod session;
pub mod ssh;
pub mod transport;

pub use config::{Auth, SessionConfig};
pub use error::{Error, Result};
pub use ops::{DefaultOperation, Filter, LoadType};
pub use session::{Session, SessionState};
pub use transport::Transport;

pub use netconf_proto as proto;
pub use netconf_proto::{Capabilities, Datastore, RpcError, RpcReply};
