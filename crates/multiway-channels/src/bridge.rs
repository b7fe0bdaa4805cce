//! Relay bridge: connects a platform's message stream to the relay engine.
//!
//! `RelayEngine` handles one inbound message at a time: commands go to the
//! registry, everything else is routed and fanned out. `RelayBridge` runs an
//! engine on its own task until the stream ends or it is stopped.

use crate::announcer::AnnouncerSource;
use crate::commands::{CommandContext, CommandEffect, CommandRegistry, Invocation};
use crate::dispatcher::{self, DeliveryReport};
use crate::formatter;
use crate::index::LiveChannelIndex;
use crate::router::{RouteDecision, RouteMode, RoutingTables, SkipReason};
use crate::store::ConfigStore;
use crate::types::{PlatformError, RelayPlatform};
use crate::validator::DerivedState;
use futures::StreamExt;
use multiway_types::channel::UserId;
use multiway_types::config::RelayConfig;
use multiway_types::message::{InboundMessage, OutboundPayload};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the engine did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// An owner's command ran; this is the reply that was posted.
    Command { reply: String },
    /// A command from someone who is not an owner.
    Unauthorized,
    /// The message was fanned out.
    Routed(DeliveryReport),
    /// Nothing to do.
    Skipped(SkipReason),
}

/// Relay state plus the platform it runs against.
pub struct RelayEngine {
    platform: Arc<dyn RelayPlatform>,
    self_id: UserId,
    store: ConfigStore,
    /// `None` until the first successful channel enumeration.
    state: Option<DerivedState>,
    registry: CommandRegistry,
    owners: Vec<String>,
    announcer: Option<Arc<dyn AnnouncerSource>>,
}

impl RelayEngine {
    pub fn new(platform: Arc<dyn RelayPlatform>, store: ConfigStore, config: &RelayConfig) -> Self {
        Self {
            self_id: platform.self_user_id(),
            platform,
            store,
            state: None,
            registry: CommandRegistry::new(config.command_prefix.clone()),
            owners: config.owners.clone(),
            announcer: None,
        }
    }

    /// Enable `broadfromannounce`.
    pub fn with_announcer(mut self, announcer: Arc<dyn AnnouncerSource>) -> Self {
        self.announcer = Some(announcer);
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn state(&self) -> Option<&DerivedState> {
        self.state.as_ref()
    }

    /// Re-enumerate channels and rebuild the routing state.
    ///
    /// On enumeration failure the previous state is kept.
    pub async fn refresh(&mut self) {
        match LiveChannelIndex::fetch(self.platform.as_ref()).await {
            Ok(index) => {
                let state = DerivedState::rebuild(index, self.store.relays());
                info!(
                    channels = state.index().len(),
                    active_relays = state.active_relays().len(),
                    "Relay state rebuilt"
                );
                self.state = Some(state);
            }
            Err(e) => warn!(error = %e, "Channel enumeration failed, keeping previous state"),
        }
    }

    /// Handle one inbound message to completion.
    pub async fn on_message(&mut self, message: &InboundMessage) -> MessageOutcome {
        if self.state.is_none() {
            self.refresh().await;
        }

        if message.author.id != self.self_id {
            if let Some(invocation) = self.registry.parse(&message.content) {
                if !self.owners.iter().any(|o| o == message.author.id.as_str()) {
                    debug!(user = %message.author.id, "Ignoring relay command from non-owner");
                    return MessageOutcome::Unauthorized;
                }
                return self.run_command(message, &invocation).await;
            }
        }

        self.route(message).await
    }

    async fn run_command(
        &mut self,
        message: &InboundMessage,
        invocation: &Invocation,
    ) -> MessageOutcome {
        // Without a prior snapshot the fallback index is empty and must not
        // become the routing state.
        let (index, fresh) = match LiveChannelIndex::fetch(self.platform.as_ref()).await {
            Ok(index) => (index, true),
            Err(e) => {
                warn!(error = %e, "Channel enumeration failed, using last known channels");
                let last = self.state.as_ref().map(|s| s.index().clone());
                (last.unwrap_or_default(), false)
            }
        };

        let reply = {
            let empty = DerivedState::default();
            let mut ctx = CommandContext {
                store: &mut self.store,
                index: &index,
                state: self.state.as_ref().unwrap_or(&empty),
                announcer: self.announcer.as_deref(),
            };
            self.registry.execute(invocation, &mut ctx)
        };

        if let CommandEffect::RelayRemoved(name) = &reply.effect {
            if let Some(state) = self.state.as_mut() {
                state.purge_relay(name);
            }
        }
        if reply.effect != CommandEffect::Unchanged {
            if fresh || self.state.is_some() {
                self.state = Some(DerivedState::rebuild(index, self.store.relays()));
            } else {
                debug!("No channel snapshot yet, deferring rebuild to the next message");
            }
        }

        let text = reply.text();
        let channel = &message.channel.id;
        if let Err(e) = self
            .platform
            .send(channel, OutboundPayload::Text(text.clone()))
            .await
        {
            warn!(channel = %channel, error = %e, "Failed to send command reply");
        }
        MessageOutcome::Command { reply: text }
    }

    async fn route(&self, message: &InboundMessage) -> MessageOutcome {
        let empty = DerivedState::default();
        let tables = RoutingTables {
            state: self.state.as_ref().unwrap_or(&empty),
            broadcasts: self.store.broadcasts(),
            rss: self.store.rss(),
        };

        let plan = match tables.route(message, &self.self_id) {
            RouteDecision::Dispatch(plan) => plan,
            RouteDecision::Skip(reason) => {
                debug!(channel = %message.channel.id, ?reason, "Message not routed");
                return MessageOutcome::Skipped(reason);
            }
        };

        let payload = match plan.mode {
            RouteMode::Embed => formatter::embed_payload(message),
            RouteMode::RawForward => formatter::forward_payload(message),
        };
        debug!(
            channel = %message.channel.id,
            destinations = plan.destinations.len(),
            mode = ?plan.mode,
            "Routing message"
        );
        let report =
            dispatcher::deliver(self.platform.as_ref(), &plan.destinations, &payload).await;
        MessageOutcome::Routed(report)
    }
}

/// Runs a [`RelayEngine`] against its platform's inbound stream.
pub struct RelayBridge {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<RelayEngine>>,
}

impl RelayBridge {
    /// Subscribe to the platform and start processing messages.
    pub async fn start(mut engine: RelayEngine) -> Result<Self, PlatformError> {
        let mut stream = engine.platform.start().await?;
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let adapter = engine.platform.name().to_string();
        info!(adapter = %adapter, "Relay bridge started");

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        match msg {
                            Some(message) => {
                                engine.on_message(&message).await;
                            }
                            None => {
                                info!(adapter = %adapter, "Platform stream ended");
                                break;
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(adapter = %adapter, "Shutting down relay bridge");
                            break;
                        }
                    }
                }
            }
            engine
        });

        Ok(Self {
            shutdown_tx,
            task: Some(task),
        })
    }

    /// Whether the processing task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop processing and hand the engine back.
    pub async fn stop(&mut self) -> Option<RelayEngine> {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.take()?;
        match task.await {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!(error = %e, "Relay bridge task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;
    use multiway_memory::SqliteDocumentStore;
    use multiway_types::channel::ChannelId;
    use multiway_types::storage::DocumentStore;

    fn engine(platform: Arc<MockPlatform>) -> RelayEngine {
        seeded_engine(platform, serde_json::json!({}))
    }

    fn seeded_engine(platform: Arc<MockPlatform>, relays: serde_json::Value) -> RelayEngine {
        let backend = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        backend.save("relays", relays).unwrap();
        let config = RelayConfig {
            owners: vec!["owner".to_string()],
            ..RelayConfig::default()
        };
        RelayEngine::new(platform, ConfigStore::load(backend), &config)
    }

    #[tokio::test]
    async fn test_first_message_builds_state() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut engine = engine(platform.clone());
        assert!(engine.state().is_none());

        let outcome = engine.on_message(&platform.message("a", "user", "hi")).await;
        assert_eq!(outcome, MessageOutcome::Skipped(SkipReason::NoDestinations));
        assert_eq!(engine.state().map(|s| s.index().len()), Some(2));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_state() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut engine = engine(platform.clone());
        engine.refresh().await;
        platform.fail_enumeration(true);
        engine.refresh().await;
        assert_eq!(engine.state().map(|s| s.index().len()), Some(2));
    }

    #[tokio::test]
    async fn test_owner_command_replies_and_reconfigures() {
        let platform = Arc::new(MockPlatform::new(&["a", "b", "c"]));
        let mut engine = engine(platform.clone());

        let outcome = engine
            .on_message(&platform.message("c", "owner", "!relay make hub a b"))
            .await;
        assert_eq!(
            outcome,
            MessageOutcome::Command {
                reply: "Relay formed.".to_string()
            }
        );
        assert!(engine.state().is_some_and(|s| s.is_relay_active("hub")));
        assert_eq!(platform.sent_texts("c"), vec!["Relay formed.".to_string()]);

        let outcome = engine.on_message(&platform.message("a", "user", "hello")).await;
        let MessageOutcome::Routed(report) = outcome else {
            panic!("expected routing, got {outcome:?}");
        };
        assert_eq!(report.delivered, vec![ChannelId::from("b")]);
    }

    #[tokio::test]
    async fn test_remove_purges_routing() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut engine = engine(platform.clone());
        engine
            .on_message(&platform.message("a", "owner", "!relay make hub a b"))
            .await;
        engine
            .on_message(&platform.message("a", "owner", "!relay remove hub"))
            .await;
        assert!(engine.state().is_some_and(|s| !s.is_channel_active(&ChannelId::from("a"))));
        assert_eq!(
            engine.on_message(&platform.message("a", "user", "hi")).await,
            MessageOutcome::Skipped(SkipReason::NoDestinations)
        );
    }

    #[tokio::test]
    async fn test_command_during_outage_does_not_pin_empty_state() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut engine = seeded_engine(
            platform.clone(),
            serde_json::json!({"hub": {"chans": ["a", "b"]}}),
        );

        platform.fail_enumeration(true);
        let outcome = engine
            .on_message(&platform.message("a", "owner", "!relay addrss a b"))
            .await;
        assert!(matches!(outcome, MessageOutcome::Command { .. }));
        assert!(engine.state().is_none());

        platform.fail_enumeration(false);
        let outcome = engine.on_message(&platform.message("a", "user", "hi")).await;
        let MessageOutcome::Routed(report) = outcome else {
            panic!("expected routing, got {outcome:?}");
        };
        assert_eq!(report.delivered, vec![ChannelId::from("b")]);
    }

    #[tokio::test]
    async fn test_remove_rebuilds_other_relays_against_live_channels() {
        let platform = Arc::new(MockPlatform::new(&["a", "b", "c", "d"]));
        let mut engine = seeded_engine(
            platform.clone(),
            serde_json::json!({"one": {"chans": ["a", "b"]}, "two": {"chans": ["c", "d"]}}),
        );
        engine.refresh().await;
        assert!(engine.state().is_some_and(|s| s.is_relay_active("two")));

        platform.remove_channel("c");
        engine
            .on_message(&platform.message("a", "owner", "!relay remove one"))
            .await;
        assert!(engine.state().is_some_and(|s| !s.is_relay_active("one")));
        assert!(engine.state().is_some_and(|s| !s.is_relay_active("two")));
        assert_eq!(
            engine.on_message(&platform.message("d", "user", "hi")).await,
            MessageOutcome::Skipped(SkipReason::NoDestinations)
        );
        assert!(engine.store().relays().contains_key("two"));
    }

    #[tokio::test]
    async fn test_blank_prefix_still_relays() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let backend = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        backend
            .save("relays", serde_json::json!({"hub": {"chans": ["a", "b"]}}))
            .unwrap();
        let config = RelayConfig {
            command_prefix: String::new(),
            ..RelayConfig::default()
        };
        let mut engine = RelayEngine::new(platform.clone(), ConfigStore::load(backend), &config);

        let outcome = engine.on_message(&platform.message("a", "user", "hi")).await;
        assert!(matches!(outcome, MessageOutcome::Routed(_)), "got {outcome:?}");
    }

    #[tokio::test]
    async fn test_non_owner_command_is_ignored() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut engine = engine(platform.clone());
        let outcome = engine
            .on_message(&platform.message("a", "user", "!relay make hub a b"))
            .await;
        assert_eq!(outcome, MessageOutcome::Unauthorized);
        assert!(engine.store().relays().is_empty());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_processes_stream() {
        let platform = Arc::new(MockPlatform::new(&["a", "b"]));
        let mut bridge = RelayBridge::start(engine(platform.clone())).await.unwrap();
        platform.push(platform.message("a", "owner", "!relay make pair a b"));
        platform.push(platform.message("a", "user", "hello"));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let engine = bridge.stop().await.unwrap();
        assert!(engine.store().relays().contains_key("pair"));
        let relayed: Vec<_> = platform
            .sent()
            .into_iter()
            .filter(|(c, p)| c.as_str() == "b" && p.as_embed().is_some())
            .collect();
        assert_eq!(relayed.len(), 1);
    }

    #[tokio::test]
    async fn test_bridge_stop_returns_engine() {
        let platform = Arc::new(MockPlatform::new(&["a"]));
        let mut bridge = RelayBridge::start(engine(platform.clone())).await.unwrap();
        assert!(bridge.is_running());
        let engine = bridge.stop().await;
        assert!(engine.is_some());
        assert!(!bridge.is_running());
    }
}
