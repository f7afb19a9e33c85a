//! Deploy event notifier
//!
//! Fire-and-forget: a notifier never blocks the engine and gives no delivery
//! guarantee.

use convoy_core::dto::event::{DeployEvent, DeployEventEnvelope};
use tokio::sync::broadcast;

/// Receives every status transition of a deploy
pub trait Notifier: Send + Sync {
    fn notify(&self, deploy_id: i64, event: DeployEvent);
}

/// Fans events out to any number of live subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<DeployEventEnvelope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeployEventEnvelope> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, deploy_id: i64, event: DeployEvent) {
        // Sending only fails when nobody listens
        if self.tx.send(DeployEventEnvelope { deploy_id, event }).is_err() {
            tracing::trace!(deploy_id, "No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.notify(4, DeployEvent::DeployStarted);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.deploy_id, 4);
        assert_eq!(envelope.event, DeployEvent::DeployStarted);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::default();
        notifier.notify(1, DeployEvent::DeployCanceled);
    }
}
