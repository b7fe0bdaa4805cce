//! Chat command registry.
//!
//! Commands are registered by name at startup. Each declares its argument
//! shape up front, so parsing happens once, before the handler runs.

use crate::announcer::AnnouncerSource;
use crate::index::LiveChannelIndex;
use crate::store::{BroadcastChange, ConfigStore, RelayChange};
use crate::validator::DerivedState;
use multiway_types::channel::ChannelId;
use multiway_types::error::{RelayError, RelayResult};
use multiway_types::relay::normalize_relay_name;
use std::collections::BTreeMap;
use tracing::error;

const OVERLAP_WARNING: &str =
    "Warning: One or more of these channels is already linked elsewhere";

/// Argument layout a command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// No arguments.
    Nothing,
    /// A relay name.
    Name,
    /// A relay name followed by any number of channels.
    NameAndChannels,
    /// One channel.
    Channel,
    /// One channel followed by any number of channels.
    ChannelAndChannels,
    /// Exactly two channels.
    TwoChannels,
}

impl ArgShape {
    fn parse(self, tokens: &[&str]) -> Option<CommandArgs> {
        match (self, tokens) {
            (ArgShape::Nothing, _) => Some(CommandArgs::default()),
            (ArgShape::Name, [name, ..]) => Some(CommandArgs::named(name, Vec::new())),
            (ArgShape::NameAndChannels, [name, rest @ ..]) => {
                Some(CommandArgs::named(name, parse_channels(rest)))
            }
            (ArgShape::Channel, [first, ..]) => {
                Some(CommandArgs::channels(parse_channels(&[*first])))
            }
            (ArgShape::ChannelAndChannels, [_, ..]) => {
                Some(CommandArgs::channels(parse_channels(tokens)))
            }
            (ArgShape::TwoChannels, [first, second, ..]) => {
                Some(CommandArgs::channels(parse_channels(&[*first, *second])))
            }
            _ => None,
        }
    }
}

/// Accept a raw channel ID or a `<#ID>` channel mention.
pub fn parse_channel_arg(token: &str) -> ChannelId {
    let id = token
        .strip_prefix("<#")
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(token);
    ChannelId::new(id)
}

fn parse_channels(raw: &[&str]) -> Vec<ChannelId> {
    raw.iter().map(|t| parse_channel_arg(t)).collect()
}

/// Parsed arguments, laid out according to the command's [`ArgShape`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub name: Option<String>,
    pub channels: Vec<ChannelId>,
}

impl CommandArgs {
    fn named(name: &str, channels: Vec<ChannelId>) -> Self {
        Self {
            name: Some(name.to_string()),
            channels,
        }
    }

    fn channels(channels: Vec<ChannelId>) -> Self {
        Self {
            name: None,
            channels,
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Everything a handler may read or mutate.
pub struct CommandContext<'a> {
    pub store: &'a mut ConfigStore,
    /// Freshly fetched for this command.
    pub index: &'a LiveChannelIndex,
    pub state: &'a DerivedState,
    pub announcer: Option<&'a dyn AnnouncerSource>,
}

/// What a command did to the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    /// Read-only command or rejected mutation.
    Unchanged,
    /// A table was written; routing state must be rebuilt.
    Reconfigured,
    /// A relay was deleted; drop it from routing, then rebuild.
    RelayRemoved(String),
}

/// Reply text plus the effect on configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub lines: Vec<String>,
    pub effect: CommandEffect,
}

impl CommandReply {
    fn read_only(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            effect: CommandEffect::Unchanged,
        }
    }

    fn changed(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            effect: CommandEffect::Reconfigured,
        }
    }

    fn relay_change(change: RelayChange, text: &str) -> Self {
        let mut lines = Vec::new();
        if !change.overlapping.is_empty() {
            lines.push(OVERLAP_WARNING.to_string());
        }
        lines.push(text.to_string());
        Self {
            lines,
            effect: CommandEffect::Reconfigured,
        }
    }

    /// All reply lines joined for a single chat message.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

type Handler = fn(&mut CommandContext<'_>, &CommandArgs) -> RelayResult<CommandReply>;

/// A registered command.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    pub shape: ArgShape,
    handler: Handler,
}

/// A command line recognised by [`CommandRegistry::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Known command with well-formed arguments.
    Run { command: &'static str, args: CommandArgs },
    /// Known command, wrong arguments.
    BadUsage { command: &'static str },
    /// Prefix present with `help`, no subcommand or an unknown one.
    Help,
}

/// Name-to-handler table for relay commands.
pub struct CommandRegistry {
    prefix: String,
    commands: BTreeMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    /// Registry with all built-in relay commands.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut registry = Self {
            prefix: prefix.into(),
            commands: BTreeMap::new(),
        };
        for spec in builtin_commands() {
            registry.register(spec);
        }
        registry
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Parse a chat message. `None` if it is not addressed to the registry.
    ///
    /// A blank prefix matches nothing.
    pub fn parse(&self, content: &str) -> Option<Invocation> {
        if self.prefix.trim().is_empty() {
            return None;
        }
        let rest = content.trim_start().strip_prefix(self.prefix.as_str())?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let Some((name, args)) = tokens.split_first() else {
            return Some(Invocation::Help);
        };
        let Some(spec) = self.get(name) else {
            return Some(Invocation::Help);
        };
        Some(match spec.shape.parse(args) {
            Some(args) => Invocation::Run {
                command: spec.name,
                args,
            },
            None => Invocation::BadUsage { command: spec.name },
        })
    }

    /// Run an invocation and produce the reply.
    ///
    /// Configuration errors become user-facing replies; anything else is
    /// logged and reported generically.
    pub fn execute(&self, invocation: &Invocation, ctx: &mut CommandContext<'_>) -> CommandReply {
        let (spec, args) = match invocation {
            Invocation::Help => return CommandReply::read_only(self.help_text()),
            Invocation::BadUsage { command } => {
                let usage = self.get(command).map(|s| s.usage).unwrap_or_default();
                return CommandReply::read_only(format!("Usage: {} {usage}", self.prefix));
            }
            Invocation::Run { command, args } => match self.get(command) {
                Some(spec) => (spec, args),
                None => return CommandReply::read_only(self.help_text()),
            },
        };

        match (spec.handler)(ctx, args) {
            Ok(reply) => reply,
            Err(e) if e.is_user_error() => CommandReply::read_only(e.to_string()),
            Err(e) => {
                error!(command = spec.name, error = %e, "Relay command failed");
                CommandReply::read_only("Something went wrong saving that change.")
            }
        }
    }

    /// Usage listing for every registered command.
    pub fn help_text(&self) -> String {
        let mut text = String::from("Relay commands:\n");
        for spec in self.commands.values() {
            text.push_str(&format!(
                "{} {} - {}\n",
                self.prefix, spec.usage, spec.summary
            ));
        }
        text.push_str(&format!("{} help - show this help", self.prefix));
        text
    }
}

fn builtin_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "make",
            usage: "make <name> <channel>...",
            summary: "form a relay from two or more channels",
            shape: ArgShape::NameAndChannels,
            handler: make_relay,
        },
        CommandSpec {
            name: "addto",
            usage: "addto <name> <channel>...",
            summary: "add channels to a relay",
            shape: ArgShape::NameAndChannels,
            handler: add_to_relay,
        },
        CommandSpec {
            name: "remfrom",
            usage: "remfrom <name> <channel>...",
            summary: "remove channels from a relay",
            shape: ArgShape::NameAndChannels,
            handler: remove_from_relay,
        },
        CommandSpec {
            name: "remove",
            usage: "remove <name>",
            summary: "remove a relay by name",
            shape: ArgShape::Name,
            handler: remove_relay,
        },
        CommandSpec {
            name: "list",
            usage: "list",
            summary: "list relays by name",
            shape: ArgShape::Nothing,
            handler: list_relays,
        },
        CommandSpec {
            name: "makebroadcast",
            usage: "makebroadcast <source> [output]...",
            summary: "broadcast a channel to outputs; no outputs removes it",
            shape: ArgShape::ChannelAndChannels,
            handler: make_broadcast,
        },
        CommandSpec {
            name: "addrss",
            usage: "addrss <broadcast_channel> <rss_channel>",
            summary: "send feed posts from a listener channel through a broadcast",
            shape: ArgShape::TwoChannels,
            handler: add_rss,
        },
        CommandSpec {
            name: "broadfromannounce",
            usage: "broadfromannounce <source>",
            summary: "broadcast a channel to every announcer subscriber",
            shape: ArgShape::Channel,
            handler: broadcast_from_announcer,
        },
    ]
}

fn make_relay(ctx: &mut CommandContext<'_>, args: &CommandArgs) -> RelayResult<CommandReply> {
    let change = ctx
        .store
        .create_relay(args.name(), &args.channels, ctx.index, ctx.state)?;
    Ok(CommandReply::relay_change(change, "Relay formed."))
}

fn add_to_relay(ctx: &mut CommandContext<'_>, args: &CommandArgs) -> RelayResult<CommandReply> {
    let change = ctx
        .store
        .extend_relay(args.name(), &args.channels, ctx.index, ctx.state)?;
    Ok(CommandReply::relay_change(change, "Relay updated."))
}

fn remove_from_relay(
    ctx: &mut CommandContext<'_>,
    args: &CommandArgs,
) -> RelayResult<CommandReply> {
    let change = ctx.store.shrink_relay(args.name(), &args.channels)?;
    Ok(CommandReply::relay_change(change, "Relay updated."))
}

fn remove_relay(ctx: &mut CommandContext<'_>, args: &CommandArgs) -> RelayResult<CommandReply> {
    let name = normalize_relay_name(args.name());
    ctx.store.remove_relay(&name)?;
    Ok(CommandReply {
        lines: vec!["Relay removed".to_string()],
        effect: CommandEffect::RelayRemoved(name),
    })
}

fn list_relays(ctx: &mut CommandContext<'_>, _args: &CommandArgs) -> RelayResult<CommandReply> {
    let relays = ctx.store.list_relays(ctx.state);
    if relays.is_empty() {
        return Ok(CommandReply::read_only("No relays configured."));
    }
    let mut text = String::from("Relay names:");
    for relay in relays {
        let members: Vec<&str> = relay.members.iter().map(ChannelId::as_str).collect();
        let status = if relay.active { "" } else { " (inactive)" };
        text.push_str(&format!(
            "\n {}{status}: {}",
            relay.name,
            members.join(", ")
        ));
    }
    Ok(CommandReply::read_only(text))
}

fn make_broadcast(ctx: &mut CommandContext<'_>, args: &CommandArgs) -> RelayResult<CommandReply> {
    let Some((source, outputs)) = args.channels.split_first() else {
        return Err(RelayError::Internal("broadcast source missing".into()));
    };
    let reply = match ctx.store.set_broadcast(source, outputs, ctx.index)? {
        BroadcastChange::Configured { .. } => "Broadcast configured.",
        BroadcastChange::Removed { .. } => "Broadcast removed",
    };
    Ok(CommandReply::changed(reply))
}

fn add_rss(ctx: &mut CommandContext<'_>, args: &CommandArgs) -> RelayResult<CommandReply> {
    let [broadcast_key, listener] = args.channels.as_slice() else {
        return Err(RelayError::Internal("addrss needs two channels".into()));
    };
    ctx.store.add_rss_link(listener, broadcast_key)?;
    Ok(CommandReply::changed("RSS listener added."))
}

fn broadcast_from_announcer(
    ctx: &mut CommandContext<'_>,
    args: &CommandArgs,
) -> RelayResult<CommandReply> {
    let announcer = ctx
        .announcer
        .ok_or_else(|| RelayError::AnnouncerUnavailable("announcer is not configured".into()))?;
    let Some(source) = args.channels.first() else {
        return Err(RelayError::Internal("broadcast source missing".into()));
    };
    let subscribed = announcer.subscribed_channels()?;
    ctx.store.import_broadcast(source, subscribed)?;
    Ok(CommandReply::changed("Broadcast configured."))
}
