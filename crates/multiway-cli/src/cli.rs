//! Clap CLI definitions for Multiway.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multiway: mirror chat channels into each other.
#[derive(Parser)]
#[command(name = "multiway", version, about = "Administer Multiway relay configuration")]
pub struct Cli {
    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create ~/.multiway/ with a default config and an empty database.
    Init,
    /// List configured relays and their member channels.
    Relays {
        /// Output as JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// List configured broadcasts.
    Broadcasts {
        /// Output as JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Manage broadcasts [*].
    #[command(subcommand)]
    Broadcast(BroadcastCommands),
    /// Manage RSS listener links [*].
    #[command(subcommand)]
    Rss(RssCommands),
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand)]
pub enum BroadcastCommands {
    /// Remove the broadcast from a source channel.
    Clear {
        /// Source channel ID.
        source: String,
    },
}

#[derive(Subcommand)]
pub enum RssCommands {
    /// Route feed posts from a listener channel through a broadcast.
    Add {
        /// Channel the feed reader posts into.
        listener: String,
        /// Broadcast source whose destinations receive the posts.
        broadcast_key: String,
    },
    /// List RSS listener links.
    List,
}
