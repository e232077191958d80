//! Event fan-out from the runtime to the UI layer.

use tokio::sync::mpsc;
use tracing::debug;

use chatdock_contracts::HostEvent;

/// Hands runtime events to whoever bridges them to the UI.
///
/// Publishing never blocks and never fails the publisher: an event with
/// no live subscriber costs a debug log and nothing else.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl EventBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: HostEvent) {
        let name = event.event_name();
        if self.sender.send(event).is_err() {
            debug!(event = name, "dropping host event: no subscriber");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_publish_order() {
        let (bus, mut receiver) = EventBus::channel();
        bus.publish(HostEvent::LoadStarted { id: "a".into() });
        bus.publish(HostEvent::Ready { id: "a".into() });

        assert!(matches!(
            receiver.recv().await,
            Some(HostEvent::LoadStarted { .. })
        ));
        assert!(matches!(receiver.recv().await, Some(HostEvent::Ready { .. })));
    }

    #[tokio::test]
    async fn publish_survives_a_dropped_subscriber() {
        let (bus, receiver) = EventBus::channel();
        drop(receiver);
        bus.publish(HostEvent::RestoreSurfaces);
    }
}
