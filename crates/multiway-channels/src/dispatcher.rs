//! Best-effort fan-out of one payload to many channels.

use crate::types::RelayPlatform;
use futures::future::join_all;
use multiway_types::channel::ChannelId;
use multiway_types::message::OutboundPayload;
use tracing::{debug, warn};

/// A send that did not go through. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub channel: ChannelId,
    pub reason: String,
}

/// Per-destination outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<ChannelId>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send `payload` to every destination concurrently.
///
/// Each send is independent: a slow or failing channel neither delays nor
/// cancels the others. Failures are logged and recorded in the report, never
/// returned as an error.
pub async fn deliver<'a, I>(
    platform: &dyn RelayPlatform,
    destinations: I,
    payload: &OutboundPayload,
) -> DeliveryReport
where
    I: IntoIterator<Item = &'a ChannelId>,
{
    let sends = destinations.into_iter().map(|channel| async move {
        let result = platform.send(channel, payload.clone()).await;
        (channel, result)
    });

    let mut report = DeliveryReport::default();
    for (channel, result) in join_all(sends).await {
        match result {
            Ok(()) => report.delivered.push(channel.clone()),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Delivery failed, skipping destination");
                report.failed.push(DeliveryFailure {
                    channel: channel.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        adapter = platform.name(),
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Fan-out complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    fn ids(raw: &[&str]) -> Vec<ChannelId> {
        raw.iter().map(|s| ChannelId::from(*s)).collect()
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_destinations() {
        let platform = MockPlatform::new(&["a", "b", "c"]);
        platform.fail_sends_to("b");

        let destinations = ids(&["a", "b", "c"]);
        let payload = OutboundPayload::Text("hi".to_string());
        let report = deliver(&platform, &destinations, &payload).await;

        assert_eq!(report.delivered, ids(&["a", "c"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].channel, ChannelId::from("b"));
        assert!(report.failed[0].reason.contains("missing permissions"));
        assert_eq!(report.attempted(), 3);
        assert_eq!(platform.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_no_destinations_sends_nothing() {
        let platform = MockPlatform::new(&[]);
        let payload = OutboundPayload::Text("hi".to_string());
        let report = deliver(&platform, &Vec::<ChannelId>::new(), &payload).await;
        assert_eq!(report, DeliveryReport::default());
    }
}
