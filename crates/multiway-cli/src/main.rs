//! Multiway CLI: offline administration of relay configuration.
//!
//! Edits go straight to the document database; a running relay picks them
//! up on its next start.

mod cli;

use crate::cli::*;
use clap::Parser;
use multiway_kernel::config::{default_config_path, load_config, write_default_config};
use multiway_kernel::RelayKernel;
use multiway_types::channel::ChannelId;
use multiway_types::config::RelayConfig;
use std::path::Path;
use tracing::info;

fn init_tracing_stderr(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_tracing_stderr(&config.log_level);

    match cli.command {
        Commands::Init => cmd_init(cli.config.as_deref()),
        Commands::Relays { json } => cmd_relays(config, json),
        Commands::Broadcasts { json } => cmd_broadcasts(config, json),
        Commands::Broadcast(BroadcastCommands::Clear { source }) => {
            cmd_broadcast_clear(config, &source)
        }
        Commands::Rss(RssCommands::Add {
            listener,
            broadcast_key,
        }) => cmd_rss_add(config, &listener, &broadcast_key),
        Commands::Rss(RssCommands::List) => cmd_rss_list(config),
        Commands::Config => cmd_config(&config),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn boot(config: RelayConfig) -> RelayKernel {
    RelayKernel::boot(config).unwrap_or_else(|e| fail(e))
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(e),
    }
}

fn cmd_init(config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let config = RelayConfig::default();
    match write_default_config(&path, &config) {
        Ok(true) => println!("Wrote {}", path.display()),
        Ok(false) => println!("Config already exists at {}", path.display()),
        Err(e) => fail(e),
    }

    let config = load_config(Some(&path));
    let db_path = config.database_path();
    boot(config);
    info!(path = %db_path.display(), "Database initialized");
    println!("Database ready at {}", db_path.display());
}

fn cmd_relays(config: RelayConfig, json: bool) {
    let kernel = boot(config);
    let relays = kernel.store().relays();
    if json {
        print_json(relays);
        return;
    }
    if relays.is_empty() {
        println!("No relays configured.");
        return;
    }
    for (name, entry) in relays {
        let members: Vec<&str> = entry.channels.iter().map(ChannelId::as_str).collect();
        println!("{name}: {}", members.join(", "));
    }
}

fn cmd_broadcasts(config: RelayConfig, json: bool) {
    let kernel = boot(config);
    let broadcasts = kernel.store().broadcasts();
    if json {
        print_json(broadcasts);
        return;
    }
    if broadcasts.is_empty() {
        println!("No broadcasts configured.");
        return;
    }
    for (source, destinations) in broadcasts {
        let targets: Vec<&str> = destinations.iter().map(ChannelId::as_str).collect();
        println!("{source} -> {}", targets.join(", "));
    }
}

fn cmd_broadcast_clear(config: RelayConfig, source: &str) {
    let mut kernel = boot(config);
    match kernel.store_mut().clear_broadcast(&ChannelId::from(source)) {
        Ok(_) => {
            info!(source, "Cleared broadcast offline");
            println!("Broadcast removed")
        }
        Err(e) => fail(e),
    }
}

fn cmd_rss_add(config: RelayConfig, listener: &str, broadcast_key: &str) {
    let mut kernel = boot(config);
    let listener = ChannelId::from(listener);
    let broadcast_key = ChannelId::from(broadcast_key);
    match kernel.store_mut().add_rss_link(&listener, &broadcast_key) {
        Ok(()) => {
            info!(listener = %listener, broadcast_key = %broadcast_key, "Added RSS link offline");
            println!("RSS listener added.")
        }
        Err(e) => fail(e),
    }
}

fn cmd_rss_list(config: RelayConfig) {
    let kernel = boot(config);
    let links = &kernel.store().rss().links;
    if links.is_empty() {
        println!("No RSS listeners configured.");
        return;
    }
    for (listener, key) in links {
        println!("{listener} -> broadcast {key}");
    }
}

fn cmd_config(config: &RelayConfig) {
    match toml::to_string_pretty(config) {
        Ok(text) => print!("{text}"),
        Err(e) => fail(e),
    }
}
