//! Outbound side: one connection, one request, one reply.

use crate::peer::{bounded_text, WireError, MAX_MESSAGE_SIZE};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Short-lived request/reply client.
///
/// Each [`send`](Transport::send) opens a fresh connection, writes the
/// request, half-closes the write side and reads the reply until the peer
/// closes. Connect, write and read share a single timeout. There is no
/// internal retry.
#[derive(Debug, Clone)]
pub struct Transport {
    default_port: u16,
    timeout: Duration,
}

impl Transport {
    /// Create a client. Addresses without a port get `default_port`.
    pub fn new(default_port: u16, timeout: Duration) -> Self {
        Self {
            default_port,
            timeout,
        }
    }

    /// Same port, different timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            default_port: self.default_port,
            timeout,
        }
    }

    /// The connect+read timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `payload` to `address` and return the reply text.
    ///
    /// Replies are cut off at [`MAX_MESSAGE_SIZE`]. Any timeout, refusal,
    /// reset or empty reply is an error.
    pub async fn send(&self, address: &str, payload: &str) -> Result<String, WireError> {
        let target = with_default_port(address, self.default_port);
        let reply = tokio::time::timeout(self.timeout, exchange(&target, payload))
            .await
            .map_err(|_| WireError::Timeout(self.timeout))??;
        debug!(target = %target, reply_len = reply.len(), "Reply received");
        Ok(reply)
    }
}

async fn exchange(target: &str, payload: &str) -> Result<String, WireError> {
    let mut stream = TcpStream::connect(target).await?;
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    (&mut stream)
        .take(MAX_MESSAGE_SIZE as u64)
        .read_to_end(&mut buf)
        .await?;

    if buf.is_empty() {
        return Err(WireError::EmptyReply);
    }
    bounded_text(buf)
}

/// Append `port` to `address` unless it already names one.
///
/// Accepts `host`, `host:port`, bare IPv4/IPv6 and `[v6]:port`.
pub fn with_default_port(address: &str, port: u16) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    if let Some((host, p)) = address.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') && p.parse::<u16>().is_ok() {
            return address.to_string();
        }
    }
    format!("{address}:{port}")
}
