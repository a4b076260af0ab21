//! Core types for the KWS peer contact node.
//!
//! This crate defines the data shared by the store, the wire protocol and the
//! kernel: contacts and their text format, pending outbound requests, node
//! configuration and the common error type. It contains no I/O.

pub mod config;
pub mod contact;
pub mod error;
pub mod pending;
pub mod time;
