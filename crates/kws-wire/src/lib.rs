//! KWS wire protocol: peer-to-peer liveness, messages and directory sync.
//!
//! Every exchange is one short-lived TCP connection carrying exactly one
//! request and one reply, both semicolon-delimited UTF-8 text.
//!
//! ## Architecture
//!
//! - **Request / Reply**: the text codec for both directions
//! - **Transport**: outbound client that sends one request and reads one reply under a timeout
//! - **PeerNode**: inbound listener that decodes and dispatches each request
//! - **PeerHandle**: trait through which the dispatcher reaches node state

pub mod client;
pub mod message;
pub mod peer;

pub use client::Transport;
pub use message::{ReqCommand, Reply, Request};
pub use peer::{PeerConfig, PeerHandle, PeerNode, WireError};
