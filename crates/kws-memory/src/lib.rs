//! Persistent state for the KWS node.
//!
//! Three flat files back the node, each wrapped in its own service:
//! - **Directory store**: the contact directory, merged with peers' lists
//! - **Retry queue**: outbound requests that could not be delivered yet
//! - **Audit log**: append-only record of inbound traffic and enqueues
//!
//! The directory and the queue are rewritten in full on every mutation. Each
//! service serializes its own load → mutate → save cycle behind an async
//! mutex, and every save replaces the file atomically.

pub mod audit;
pub mod directory;
pub mod queue;

mod atomic;

pub use audit::AuditLog;
pub use directory::{merge_contacts, DirectoryStore, MergeOutcome};
pub use queue::RetryQueue;
