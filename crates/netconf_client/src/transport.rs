use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Byte stream under the framing codec. The SSH adapter is the production
/// implementation; tests drive the session over in-memory pipes.
#[async_trait]
pub trait Transport: Send {
    /// Reads at most `buf.len()` bytes. `Ok(0)` means the peer closed the
    /// channel.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()>;

    /// Bytes the channel produced on its stderr stream since the last call,
    /// if any. Diagnostic only; stderr never interrupts RPC flow.
    fn take_stderr(&mut self) -> Option<String> {
        None
    }
}

/// Plain TCP connect to `(host, port)`, distinguishing "device unreachable"
/// from the authentication failures SSH would report later.
pub async fn probe(host: &str, port: u16, connect_timeout: Duration) -> Result<()> {
    debug!(target: "netconf::transport", host, port, "probing reachability");
    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(source)) => Err(Error::Unreachable {
            host: host.to_string(),
            port,
            source,
        }),
        Err(_) => Err(Error::Unreachable {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::TimedOut, "tcp connect timed out"),
        }),
    }
}
