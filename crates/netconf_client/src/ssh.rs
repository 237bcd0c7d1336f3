//! SSH transport: opens the `netconf` subsystem channel and pumps its byte
//! streams. Stdout bytes feed the framing decoder; stderr bytes are drained
//! into a buffer and surfaced as diagnostics on close or error.

use crate::config::{Auth, SessionConfig};
use crate::error::{Error, Result};
use crate::transport::Transport;
use async_ssh2_tokio::{AuthMethod, Client, ServerCheckMethod};
use russh::ChannelMsg;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

const PUMP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct SshTransport {
    // kept alive for the lifetime of the channel
    client: Client,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
    inbound: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    stderr: Arc<Mutex<Vec<u8>>>,
    pump: JoinHandle<()>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport").finish_non_exhaustive()
    }
}

impl SshTransport {
    /// Authenticates, opens the `netconf` subsystem and starts the channel
    /// pump. The caller is expected to have probed reachability already, so
    /// failures here are reported as authentication or handshake problems.
    pub async fn connect(config: &SessionConfig) -> Result<SshTransport> {
        let auth = auth_method(config).await?;
        let server_check = server_check(config)?;
        debug!(
            target: "netconf::ssh",
            host = %config.host,
            port = config.port,
            "opening ssh connection"
        );
        let client = timeout(
            config.connect_timeout,
            Client::connect(
                (config.host.as_str(), config.port),
                &config.username,
                auth,
                server_check,
            ),
        )
        .await
        .map_err(|_| Error::Timeout {
            elapsed: config.connect_timeout,
        })?
        .map_err(|err| Error::Auth(err.to_string()))?;

        let channel = client
            .get_channel()
            .await
            .map_err(|err| Error::Handshake(format!("channel open failed: {err}")))?;
        channel
            .request_subsystem(true, "netconf")
            .await
            .map_err(|err| Error::Handshake(format!("netconf subsystem denied: {err}")))?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(8);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>(8);
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let stderr_sink = Arc::clone(&stderr);

        let pump = tokio::spawn(async move {
            let mut channel = channel;
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => match outgoing {
                        Some(bytes) => {
                            if channel.data(&bytes[..]).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // transport closed: signal eof and wind down
                            let _ = channel.eof().await;
                            break;
                        }
                    },
                    message = channel.wait() => match message {
                        Some(ChannelMsg::Data { data }) => {
                            if inbound_tx.send(data.to_vec()).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                            stderr_sink.lock().await.extend_from_slice(&data);
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                        Some(_) => {}
                    },
                }
            }
        });

        Ok(SshTransport {
            client,
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            pending: Vec::new(),
            stderr,
            pump,
        })
    }
}

async fn auth_method(config: &SessionConfig) -> Result<AuthMethod> {
    match &config.auth {
        Auth::Password(password) => Ok(AuthMethod::with_password(password)),
        Auth::KeyFile { path, passphrase } => {
            let key = fs::read_to_string(path).await?;
            Ok(AuthMethod::with_key(&key, passphrase.as_deref()))
        }
    }
}

/// Strict checking without a known-hosts file fails closed: there is nothing
/// to verify the server key against.
fn server_check(config: &SessionConfig) -> Result<ServerCheckMethod> {
    if !config.strict_host_key_checking {
        return Ok(ServerCheckMethod::NoCheck);
    }
    match &config.known_hosts_file {
        Some(path) => Ok(ServerCheckMethod::KnownHostsFile(path.display().to_string())),
        None => Err(Error::Auth(
            "strict host key checking requires a known hosts file".into(),
        )),
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.inbound.recv().await {
                Some(bytes) => self.pending = bytes,
                None => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let Some(outbound) = &self.outbound else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed"));
        };
        outbound
            .send(buf.to_vec())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "ssh channel pump stopped"))
    }

    async fn close(&mut self) -> io::Result<()> {
        // dropping the sender makes the pump send eof and exit
        self.outbound.take();
        if timeout(PUMP_SHUTDOWN_GRACE, &mut self.pump).await.is_err() {
            self.pump.abort();
        }
        let _ = self.client.disconnect().await;
        Ok(())
    }

    fn take_stderr(&mut self) -> Option<String> {
        let mut stderr = self.stderr.try_lock().ok()?;
        if stderr.is_empty() {
            return None;
        }
        let drained = stderr.split_off(0);
        Some(String::from_utf8_lossy(&drained).into_owned())
    }
}
