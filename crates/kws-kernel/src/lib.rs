//! Core kernel for the KWS peer contact node.
//!
//! The kernel owns the local identity, the directory, the retry queue and
//! the audit log. It serves inbound requests through [`kws_wire::PeerNode`]
//! and runs the presence prober, the outbound retry loop and the INFO
//! poller until the supervisor signals shutdown.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod info_poller;
pub mod kernel;
pub mod prober;
pub mod retry;
pub mod supervisor;

pub use kernel::{KwsKernel, SendOutcome};
