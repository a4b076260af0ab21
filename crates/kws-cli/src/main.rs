//! KWS CLI: run a peer node and talk to contacts from the terminal.

mod cli;
mod cmd;
mod ui;

use clap::Parser;
use cli::{Cli, Commands, ContactCommands};

/// Trace to stderr. `RUST_LOG` wins over the configured level.
fn init_tracing_stderr(default_level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();

    let log_level = kws_kernel::config::load_config(cli.config.as_deref()).log_level;
    init_tracing_stderr(&log_level);

    match cli.command {
        Commands::Init { username } => cmd::node::cmd_init(cli.config, username),
        Commands::Start => cmd::node::cmd_start(cli.config),
        Commands::Contact(ContactCommands::Add {
            identity,
            username,
            name,
            address,
        }) => cmd::contact::cmd_contact_add(cli.config, &identity, &username, &name, &address),
        Commands::Contact(ContactCommands::List) => cmd::contact::cmd_contact_list(cli.config),
        Commands::Message { to, text } => cmd::send::cmd_message(cli.config, &to, &text.join(" ")),
        Commands::Request { target, command } => {
            cmd::send::cmd_request(cli.config, &target, &command)
        }
        Commands::Log => cmd::send::cmd_log(cli.config),
    }
}
