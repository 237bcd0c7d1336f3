//! Session lifecycle and the message-id correlated RPC engine.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::ssh::SshTransport;
use crate::transport::{self, Transport};
use netconf_proto::{envelope, frame};
use netconf_proto::{BaseVersion, Capabilities, FrameDecoder, FrameError, Framing, Hello, RpcReply};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle states. `Broken` is absorbing: it is entered on any transport,
/// framing or timeout failure and only `close` (to release resources) is
/// useful afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Hello,
    Ready,
    Closing,
    Closed,
    Broken,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: SessionState) -> StateCell {
        StateCell(AtomicU8::new(encode_state(state)))
    }

    fn get(&self) -> SessionState {
        decode_state(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SessionState) {
        self.0.store(encode_state(state), Ordering::Release);
    }
}

fn encode_state(state: SessionState) -> u8 {
    match state {
        SessionState::Connecting => 0,
        SessionState::Hello => 1,
        SessionState::Ready => 2,
        SessionState::Closing => 3,
        SessionState::Closed => 4,
        SessionState::Broken => 5,
    }
}

fn decode_state(value: u8) -> SessionState {
    match value {
        0 => SessionState::Connecting,
        1 => SessionState::Hello,
        2 => SessionState::Ready,
        3 => SessionState::Closing,
        4 => SessionState::Closed,
        _ => SessionState::Broken,
    }
}

struct SessionIo {
    transport: Box<dyn Transport>,
    decoder: FrameDecoder,
    framing: Framing,
    next_message_id: u64,
    /// True while a request has been written but its reply not yet fully
    /// read. If a caller is cancelled in that window the stream position is
    /// indeterminate and the session must not be reused.
    in_flight: bool,
}

impl SessionIo {
    async fn send_frame(&mut self, message: &[u8]) -> Result<()> {
        let encoded = frame::encode(message, self.framing);
        self.transport.write_all(&encoded).await?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(message) = self.decoder.next_frame()? {
                return Ok(message);
            }
            let read = self.transport.read(&mut chunk).await?;
            if read == 0 {
                return Err(Error::Frame(FrameError::UnexpectedEof));
            }
            self.decoder.extend(&chunk[..read]);
        }
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.send_frame(request).await?;
        self.recv_frame().await
    }
}

/// One NETCONF session over one SSH channel.
///
/// RPCs are serialized: the engine holds a fair mutex across the
/// write-then-read pair, so concurrent callers queue in FIFO order and
/// message-id correlation stays trivially sound.
pub struct Session {
    io: Mutex<SessionIo>,
    state: StateCell,
    command_timeout: Duration,
    session_id: String,
    server_capabilities: Capabilities,
    base: BaseVersion,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Probes TCP reachability, opens the SSH `netconf` subsystem and runs
    /// the hello exchange.
    pub async fn connect(config: SessionConfig) -> Result<Session> {
        transport::probe(&config.host, config.port, config.connect_timeout).await?;
        let transport = SshTransport::connect(&config).await?;
        Self::handshake(Box::new(transport), &config).await
    }

    /// Checks whether the device accepts TCP connections at all, without
    /// starting SSH. Lets callers distinguish a dead box from bad
    /// credentials.
    pub async fn probe(host: &str, port: u16, connect_timeout: Duration) -> Result<()> {
        transport::probe(host, port, connect_timeout).await
    }

    /// Runs the NETCONF handshake over an already-open transport. `connect`
    /// uses this over SSH; tests drive it over in-memory pipes.
    pub async fn handshake(transport: Box<dyn Transport>, config: &SessionConfig) -> Result<Session> {
        let mut io = SessionIo {
            transport,
            decoder: FrameDecoder::new(),
            framing: Framing::Eom,
            next_message_id: 1,
            in_flight: false,
        };

        // both hellos always travel in end-of-message framing: the server's
        // advertisement is not known yet
        let client_hello = Hello::client(config.client_capabilities.iter().cloned());
        let hello_doc = format!("{}{}", envelope::XML_DECLARATION, client_hello.to_xml());
        io.send_frame(hello_doc.as_bytes()).await?;

        let frame = match timeout(config.connect_timeout, io.recv_frame()).await {
            Err(_) => {
                return Err(Error::Timeout {
                    elapsed: config.connect_timeout,
                })
            }
            Ok(received) => received?,
        };
        let text = String::from_utf8(frame)
            .map_err(|_| Error::Handshake("server hello is not valid utf-8".into()))?;
        let server_hello = Hello::parse(&text)
            .map_err(|err| Error::Handshake(format!("malformed server hello: {err}")))?;
        let session_id = server_hello
            .session_id()
            .ok_or_else(|| Error::Handshake("server hello carries no session-id".into()))?
            .to_string();

        let base = BaseVersion::negotiate(client_hello.capabilities(), server_hello.capabilities());
        let framing = base.framing();
        io.decoder.set_framing(framing);
        io.framing = framing;
        info!(
            target: "netconf::session",
            session_id = %session_id,
            base = %base,
            "session established"
        );

        Ok(Session {
            io: Mutex::new(io),
            state: StateCell::new(SessionState::Ready),
            command_timeout: config.command_timeout,
            session_id,
            server_capabilities: server_hello.into_capabilities(),
            base,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == SessionState::Ready
    }

    /// The session-id announced by the server's hello.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn server_capabilities(&self) -> &Capabilities {
        &self.server_capabilities
    }

    pub fn has_capability(&self, uri: &str) -> bool {
        self.server_capabilities.contains(uri)
    }

    pub fn base_version(&self) -> BaseVersion {
        self.base
    }

    /// Sends one request and returns the parsed reply.
    ///
    /// `request` may be a bare operation element (`<get/>`), a complete
    /// `<rpc>` document, or a named operation without markup; see
    /// [`netconf_proto::envelope::wrap_request`]. The reply is returned
    /// whether or not it carries `<rpc-error>` entries; the high-level
    /// operations translate those into errors.
    pub async fn rpc(&self, request: &str) -> Result<RpcReply> {
        let mut io = self.io.lock().await;
        if self.state.get() != SessionState::Ready {
            return Err(Error::Closed);
        }
        if io.in_flight {
            // the previous caller was cancelled between write and read
            self.fail(&mut io).await;
            return Err(Error::Protocol("stream abandoned mid-exchange".into()));
        }

        let message_id = io.next_message_id.to_string();
        io.next_message_id += 1;
        let request = envelope::wrap_request(request, &message_id)
            .map_err(|err| Error::Protocol(format!("malformed rpc payload: {err}")))?;
        debug!(target: "netconf::session", message_id = %message_id, "sending rpc");

        io.in_flight = true;
        let frame = match timeout(self.command_timeout, io.exchange(request.as_bytes())).await {
            Err(_) => {
                warn!(
                    target: "netconf::session",
                    message_id = %message_id,
                    "rpc timed out, session is broken"
                );
                self.fail(&mut io).await;
                return Err(Error::Timeout {
                    elapsed: self.command_timeout,
                });
            }
            Ok(Err(err)) => {
                self.fail(&mut io).await;
                return Err(err);
            }
            Ok(Ok(frame)) => frame,
        };
        io.in_flight = false;

        let text = match String::from_utf8(frame) {
            Ok(text) => text,
            Err(_) => {
                self.fail(&mut io).await;
                return Err(Error::Protocol("rpc-reply is not valid utf-8".into()));
            }
        };
        let reply = RpcReply::parse(&text)?;
        match reply.message_id() {
            Some(received) if received == message_id => {}
            received => {
                warn!(
                    target: "netconf::session",
                    sent = %message_id,
                    received = ?received,
                    "message-id mismatch"
                );
                self.fail(&mut io).await;
                return Err(Error::Protocol(format!(
                    "message-id mismatch: sent {message_id}, received {received:?}"
                )));
            }
        }
        debug!(target: "netconf::session", message_id = %message_id, "received rpc-reply");
        Ok(reply)
    }

    /// Like [`rpc`](Self::rpc) but hands back the reply document text.
    pub async fn rpc_raw(&self, request: &str) -> Result<String> {
        self.rpc(request).await.map(|reply| reply.to_xml())
    }

    /// Sends `<close-session/>` best-effort and tears the transport down.
    /// Idempotent; a closed session cannot be reopened.
    pub async fn close(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        match self.state.get() {
            SessionState::Closed => return Ok(()),
            SessionState::Ready if !io.in_flight => {
                self.state.set(SessionState::Closing);
                let message_id = io.next_message_id.to_string();
                io.next_message_id += 1;
                if let Ok(request) = envelope::wrap_request("<close-session/>", &message_id) {
                    let _ = timeout(self.command_timeout, io.exchange(request.as_bytes())).await;
                }
            }
            _ => {}
        }
        if let Some(stderr) = io.transport.take_stderr() {
            info!(target: "netconf::session", %stderr, "device stderr output");
        }
        let _ = io.transport.close().await;
        if self.state.get() != SessionState::Broken {
            self.state.set(SessionState::Closed);
        }
        Ok(())
    }

    /// Marks the session broken and releases the transport. Used on every
    /// failure after which the stream position is unknown.
    async fn fail(&self, io: &mut SessionIo) {
        self.state.set(SessionState::Broken);
        if let Some(stderr) = io.transport.take_stderr() {
            warn!(target: "netconf::session", %stderr, "device stderr output");
        }
        let _ = io.transport.close().await;
    }
}
