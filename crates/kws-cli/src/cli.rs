//! Clap CLI definitions for KWS.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  kws init --username alice                     Create ~/.kws with a new identity
  kws start                                     Run the node (listener, prober, retry loop)
  kws contact add <identity> --username bob --name Bob --address 10.0.0.2
  kws message Bob hello there                   Send a message (queued if Bob is offline)
  kws request Bob addlist                       Push our directory to Bob
  kws log                                       Show the audit log";

/// KWS: serverless peer contact and messaging node.
#[derive(Parser)]
#[command(name = "kws", version, about = "KWS peer contact node", after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, identity and default config.
    Init {
        /// User name written to a new config file.
        #[arg(long)]
        username: Option<String>,
    },
    /// Run the node until Ctrl+C.
    Start,
    /// Manage contacts (add, list) [*].
    #[command(subcommand)]
    Contact(ContactCommands),
    /// Send a text message to a contact.
    Message {
        /// Contact identity or display name.
        to: String,
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Send a request (INFO, LIST, ADDLIST) to a contact.
    Request {
        /// Contact identity or display name.
        target: String,
        /// Command name, case-insensitive.
        command: String,
    },
    /// Show the audit log.
    Log,
}

#[derive(Subcommand)]
pub enum ContactCommands {
    /// Add a contact.
    Add {
        /// The peer's identity token.
        identity: String,
        /// The peer's user name.
        #[arg(long)]
        username: String,
        /// Display name used to address the contact.
        #[arg(long)]
        name: String,
        /// Host or host:port.
        #[arg(long)]
        address: String,
    },
    /// List all contacts.
    List,
}
