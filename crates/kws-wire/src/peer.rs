//! PeerNode: TCP listener and request dispatcher for the KWS protocol.
//!
//! A [`PeerNode`] binds a local TCP listener and serves one request per
//! connection: read until the peer half-closes (or goes quiet), decode,
//! dispatch, write exactly one reply, close.
//!
//! The [`PeerHandle`] trait abstracts the kernel state the dispatcher needs
//! (local identity, directory merge and listing, audit log).

use crate::message::{ReqCommand, Reply, Request};

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors from the wire protocol layer.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Peer closed the connection without replying")]
    EmptyReply,
    #[error("Message is not valid UTF-8")]
    InvalidUtf8,
}

/// Maximum size of a single request or reply (64 KiB). Anything past it is
/// discarded.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Once data has arrived, this much silence ends the read. Lets peers that
/// never half-close still get a reply.
const IDLE_GAP: Duration = Duration::from_millis(250);

/// Configuration for a PeerNode.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Address to bind the listener on.
    pub listen_addr: SocketAddr,
    /// Upper bound on connections handled at once.
    pub max_connections: usize,
    /// How long to wait for a request before giving up.
    pub read_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_connections: 64,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Node state the dispatcher acts on.
///
/// The kernel implements this; tests use an in-memory stand-in.
#[async_trait]
pub trait PeerHandle: Send + Sync + 'static {
    /// This node's identity token.
    fn local_identity(&self) -> &str;

    /// Merge a serialized directory into the local one.
    async fn merge_directory(&self, payload: &str) -> Result<(), String>;

    /// The local directory file content, trimmed.
    async fn directory_listing(&self) -> String;

    /// Append an audit record. Failures are the implementor's to log.
    async fn record(&self, summary: &str);
}

/// The local listener.
pub struct PeerNode {
    config: PeerConfig,
    /// Actual bound address (useful when binding to port 0).
    local_addr: SocketAddr,
}

impl PeerNode {
    /// Bind and start accepting connections.
    pub async fn start(
        config: PeerConfig,
        handle: Arc<dyn PeerHandle>,
    ) -> Result<(Arc<Self>, tokio::task::JoinHandle<()>), WireError> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            identity = %handle.local_identity(),
            max_connections = config.max_connections,
            "KWS: listening"
        );

        let node = Arc::new(Self { config, local_addr });

        let node_clone = Arc::clone(&node);
        let accept_handle = tokio::spawn(async move {
            Self::accept_loop(listener, node_clone, handle).await;
        });

        Ok((node, accept_handle))
    }

    /// Get the actual bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn accept_loop(listener: TcpListener, node: Arc<PeerNode>, handle: Arc<dyn PeerHandle>) {
        let permits = Arc::new(Semaphore::new(node.config.max_connections.max(1)));
        loop {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "KWS: accepted connection");
                    let handle = Arc::clone(&handle);
                    let read_timeout = node.config.read_timeout;
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) =
                            Self::handle_inbound(stream, addr, read_timeout, &*handle).await
                        {
                            debug!(%addr, error = %e, "KWS: inbound connection ended");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "KWS: accept error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Serve one connection. The stream is dropped on every return path.
    async fn handle_inbound(
        stream: TcpStream,
        addr: SocketAddr,
        read_timeout: Duration,
        handle: &dyn PeerHandle,
    ) -> Result<(), WireError> {
        let (mut reader, mut writer) = stream.into_split();

        let bytes = read_request(&mut reader, read_timeout).await?;
        let raw = bounded_text(bytes)?;
        if raw.trim().is_empty() {
            debug!(%addr, "KWS: empty request, closing");
            return Ok(());
        }

        let reply = dispatch(&raw, addr, handle).await;
        writer.write_all(reply.encode().as_bytes()).await?;
        writer.flush().await?;
        writer.shutdown().await?;
        Ok(())
    }
}

/// Collect one request.
///
/// Stops at end of stream, at the read timeout, or after [`IDLE_GAP`] of
/// silence once something has arrived. Only the first [`MAX_MESSAGE_SIZE`]
/// bytes are kept; the rest is read and dropped so the peer can finish
/// writing and still get its reply.
async fn read_request<R>(reader: &mut R, read_timeout: Duration) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + read_timeout;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut truncated = false;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let wait = if buf.is_empty() {
            remaining
        } else {
            remaining.min(IDLE_GAP)
        };

        match tokio::time::timeout(wait, reader.read(&mut chunk)).await {
            Err(_) => break,
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                let room = MAX_MESSAGE_SIZE - buf.len();
                if n > room && !truncated {
                    truncated = true;
                    debug!(max = MAX_MESSAGE_SIZE, "KWS: request over the size bound, truncating");
                }
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Ok(Err(e)) => return Err(WireError::Io(e)),
        }
    }

    Ok(buf)
}

/// Decode a message read up to [`MAX_MESSAGE_SIZE`].
///
/// A multi-byte character split by the bound is dropped; any other invalid
/// UTF-8 is an error.
pub(crate) fn bounded_text(bytes: Vec<u8>) -> Result<String, WireError> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            let utf8 = e.utf8_error();
            let mut bytes = e.into_bytes();
            if utf8.error_len().is_some() || bytes.len() < MAX_MESSAGE_SIZE {
                return Err(WireError::InvalidUtf8);
            }
            bytes.truncate(utf8.valid_up_to());
            String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
        }
    }
}

/// Decode `raw`, apply its effect through `handle`, and build the reply.
///
/// Every request that decodes gets an audit record, whether or not it was
/// addressed to this node. Decode failures only get a rejection reply.
pub async fn dispatch(raw: &str, peer_addr: SocketAddr, handle: &dyn PeerHandle) -> Reply {
    let request = match Request::decode(raw) {
        Ok(request) => request,
        Err(e) => {
            debug!(%peer_addr, error = ?e, "KWS: rejecting malformed request");
            return e.reply();
        }
    };
    debug!(%peer_addr, kind = request.kind(), "KWS: request");

    match request {
        Request::Ping { sender } => {
            handle
                .record(&format!("PING from {peer_addr} (sender={sender})"))
                .await;
            Reply::Pong
        }
        Request::Msg {
            sender,
            timestamp,
            text,
        } => {
            handle
                .record(&format!("MSG from {sender}: {text} (sent {timestamp})"))
                .await;
            info!(%sender, "KWS: message received");
            Reply::MsgReceived
        }
        Request::Req {
            target,
            command,
            payload,
            ..
        } => {
            let local = handle.local_identity();
            if target != local {
                handle
                    .record(&format!(
                        "REQ from {peer_addr} for wrong target {target} (local {local})"
                    ))
                    .await;
                return Reply::WrongTarget;
            }

            match command {
                ReqCommand::Info => {
                    handle
                        .record(&format!("INFO request from {peer_addr} answered"))
                        .await;
                    Reply::Info(local.to_string())
                }
                ReqCommand::AddList => {
                    if payload.is_empty() {
                        handle
                            .record(&format!("ADDLIST from {peer_addr} without payload"))
                            .await;
                        return Reply::NoPayload;
                    }
                    match handle.merge_directory(&payload).await {
                        Ok(()) => {
                            handle
                                .record(&format!("ADDLIST from {peer_addr} merged"))
                                .await;
                            Reply::AddListReceived
                        }
                        Err(e) => {
                            warn!(%peer_addr, error = %e, "KWS: directory merge failed");
                            handle
                                .record(&format!("ADDLIST from {peer_addr} failed: {e}"))
                                .await;
                            Reply::AddListFailed
                        }
                    }
                }
                ReqCommand::List => {
                    let listing = handle.directory_listing().await;
                    handle
                        .record(&format!("LIST request from {peer_addr} answered"))
                        .await;
                    Reply::List(listing)
                }
                ReqCommand::Other(other) => {
                    handle
                        .record(&format!("REQ from {peer_addr} with unknown command {other}"))
                        .await;
                    Reply::UnknownReqCommand
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Transport;
    use std::sync::Mutex;

    /// Minimal PeerHandle for testing.
    struct TestHandle {
        identity: String,
        directory: Mutex<String>,
        records: Mutex<Vec<String>>,
        fail_merge: bool,
    }

    impl TestHandle {
        fn new(identity: &str) -> Self {
            Self {
                identity: identity.to_string(),
                directory: Mutex::new(String::new()),
                records: Mutex::new(Vec::new()),
                fail_merge: false,
            }
        }

        fn records(&self) -> Vec<String> {
            self.records.lock().unwrap().clone()
        }

        fn directory(&self) -> String {
            self.directory.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PeerHandle for TestHandle {
        fn local_identity(&self) -> &str {
            &self.identity
        }

        async fn merge_directory(&self, payload: &str) -> Result<(), String> {
            if self.fail_merge {
                return Err("disk full".to_string());
            }
            let mut dir = self.directory.lock().unwrap();
            dir.push_str(payload);
            Ok(())
        }

        async fn directory_listing(&self) -> String {
            self.directory().trim().to_string()
        }

        async fn record(&self, summary: &str) {
            self.records.lock().unwrap().push(summary.to_string());
        }
    }

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    async fn start_node(handle: Arc<TestHandle>) -> Arc<PeerNode> {
        let config = PeerConfig {
            read_timeout: Duration::from_secs(2),
            ..PeerConfig::default()
        };
        let (node, _task) = PeerNode::start(config, handle).await.unwrap();
        node
    }

    #[tokio::test]
    async fn test_ping_pong_over_tcp() {
        let handle = Arc::new(TestHandle::new("T"));
        let node = start_node(handle.clone()).await;

        let transport = Transport::new(5000, Duration::from_secs(5));
        let reply = transport
            .send(&node.local_addr().to_string(), "PING;S")
            .await
            .unwrap();
        assert_eq!(reply, "PONG");
        assert!(handle.directory().is_empty());

        let records = handle.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].contains("sender=S"));
    }

    #[tokio::test]
    async fn test_list_over_tcp() {
        let handle = Arc::new(TestHandle::new("T"));
        *handle.directory.lock().unwrap() = "bob;B1;2024-01-01 00:00:00;Bob;10.0.0.2;online|\n".into();
        let node = start_node(handle.clone()).await;

        let transport = Transport::new(5000, Duration::from_secs(5));
        let reply = transport
            .send(&node.local_addr().to_string(), "REQ;S;T;LIST")
            .await
            .unwrap();
        assert_eq!(reply, "LIST;bob;B1;2024-01-01 00:00:00;Bob;10.0.0.2;online|");
    }

    #[tokio::test]
    async fn test_client_without_half_close_still_answered() {
        let handle = Arc::new(TestHandle::new("T"));
        let node = start_node(handle).await;

        let mut stream = TcpStream::connect(node.local_addr()).await.unwrap();
        stream.write_all(b"PING;legacy").await.unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, "PONG");
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_no_reply() {
        let handle = Arc::new(TestHandle::new("T"));
        let node = start_node(handle.clone()).await;

        let mut stream = TcpStream::connect(node.local_addr()).await.unwrap();
        stream.write_all(&[0xff, 0xfe, 0x00]).await.unwrap();
        stream.shutdown().await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
        assert!(handle.records().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_request_does_not_stop_server() {
        let handle = Arc::new(TestHandle::new("T"));
        let node = start_node(handle).await;
        let transport = Transport::new(5000, Duration::from_secs(5));
        let target = node.local_addr().to_string();

        assert_eq!(transport.send(&target, "HELLO").await.unwrap(), "UNKNOWN_COMMAND");
        assert_eq!(transport.send(&target, "REQ;S").await.unwrap(), "INVALID_REQ_FORMAT");
        assert_eq!(transport.send(&target, "PING;S").await.unwrap(), "PONG");
    }

    #[tokio::test]
    async fn test_read_request_keeps_prefix_up_to_bound() {
        let exact = vec![b'a'; MAX_MESSAGE_SIZE];
        let mut input: &[u8] = &exact;
        let got = read_request(&mut input, Duration::from_secs(2)).await.unwrap();
        assert_eq!(got.len(), MAX_MESSAGE_SIZE);

        let over = vec![b'a'; MAX_MESSAGE_SIZE + 5000];
        let mut input: &[u8] = &over;
        let got = read_request(&mut input, Duration::from_secs(2)).await.unwrap();
        assert_eq!(got, &over[..MAX_MESSAGE_SIZE]);
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_oversize_addlist_is_truncated_and_answered() {
        let handle = Arc::new(TestHandle::new("T"));
        let node = start_node(handle.clone()).await;

        let line = "user;ID;2024-01-01 00:00:00;Name;10.0.0.1;online|\n";
        let payload = line.repeat(70 * 1024 / line.len() + 1);
        let request = format!("REQ;S;T;ADDLIST;{payload}");
        assert!(request.len() > MAX_MESSAGE_SIZE);

        let transport = Transport::new(5000, Duration::from_secs(5));
        let reply = transport
            .send(&node.local_addr().to_string(), &request)
            .await
            .unwrap();
        assert_eq!(reply, "ADDLIST_RECEIVED");

        let merged = handle.directory();
        assert_eq!(merged.len(), MAX_MESSAGE_SIZE - "REQ;S;T;ADDLIST;".len());
        assert!(payload.starts_with(&merged));
        assert!(handle.records()[0].contains("merged"));
    }

    #[tokio::test]
    async fn test_oversize_listing_reaches_client_truncated() {
        let handle = Arc::new(TestHandle::new("T"));
        let line = "user;ID;2024-01-01 00:00:00;Name;10.0.0.1;online|\n";
        *handle.directory.lock().unwrap() = line.repeat(70 * 1024 / line.len() + 1);
        let node = start_node(handle).await;

        let transport = Transport::new(5000, Duration::from_secs(5));
        let reply = transport
            .send(&node.local_addr().to_string(), "REQ;S;T;LIST")
            .await
            .unwrap();
        assert_eq!(reply.len(), MAX_MESSAGE_SIZE);
        assert!(reply.starts_with("LIST;user;ID;"));
    }

    #[test]
    fn test_bounded_text_rejects_invalid_utf8_inside_bound() {
        assert!(matches!(
            bounded_text(vec![b'a', 0xff, b'b']),
            Err(WireError::InvalidUtf8)
        ));
        assert_eq!(bounded_text(b"PONG".to_vec()).unwrap(), "PONG");
    }

    #[tokio::test]
    async fn test_wrong_target_for_every_command() {
        let handle = TestHandle::new("T");
        for cmd in ["INFO", "LIST", "ADDLIST;x;y;z;a;b;online|", "BOGUS"] {
            let reply = dispatch(&format!("REQ;S;other;{cmd}"), addr(), &handle).await;
            assert_eq!(reply, Reply::WrongTarget);
        }
        assert!(handle.directory().is_empty());
        assert_eq!(handle.records().len(), 4);
    }

    #[tokio::test]
    async fn test_dispatch_info_and_unknown() {
        let handle = TestHandle::new("T");
        assert_eq!(
            dispatch("REQ;S;T;info", addr(), &handle).await,
            Reply::Info("T".to_string())
        );
        assert_eq!(
            dispatch("REQ;S;T;reboot", addr(), &handle).await,
            Reply::UnknownReqCommand
        );
    }

    #[tokio::test]
    async fn test_dispatch_addlist() {
        let handle = TestHandle::new("T");
        let payload = "a;A1;2024-01-01 00:00:00;A;h;online|";
        let reply = dispatch(&format!("REQ;S;T;ADDLIST;{payload}"), addr(), &handle).await;
        assert_eq!(reply, Reply::AddListReceived);
        assert_eq!(handle.directory(), payload);

        let reply = dispatch("REQ;S;T;ADDLIST", addr(), &handle).await;
        assert_eq!(reply, Reply::NoPayload);
        assert_eq!(handle.directory(), payload);
    }

    #[tokio::test]
    async fn test_dispatch_addlist_persist_failure() {
        let mut handle = TestHandle::new("T");
        handle.fail_merge = true;
        let reply = dispatch("REQ;S;T;ADDLIST;a;A1;t;A;h;online|", addr(), &handle).await;
        assert_eq!(reply, Reply::AddListFailed);
    }

    #[tokio::test]
    async fn test_dispatch_msg() {
        let handle = TestHandle::new("T");
        assert_eq!(
            dispatch("MSG;S;2024-06-01 10:00:00;hi;there", addr(), &handle).await,
            Reply::MsgReceived
        );
        assert_eq!(
            dispatch("MSG;S;2024-06-01 10:00:00", addr(), &handle).await,
            Reply::InvalidMsgFormat
        );
        let records = handle.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].contains("hi;there"));
    }

    #[test]
    fn test_peer_config_default() {
        let config = PeerConfig::default();
        assert_eq!(config.listen_addr.port(), 0);
        assert_eq!(config.max_connections, 64);
    }
}
