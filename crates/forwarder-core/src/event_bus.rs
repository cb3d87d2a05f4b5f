//! In-process event bus for forwarding outcomes.

use forwarder_types::ForwarderEvent;
use tokio::sync::broadcast;

/// Broadcast channel for [`ForwarderEvent`]s.
///
/// Publishing never blocks. Subscribers that fall behind by more than the
/// channel capacity miss the oldest events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ForwarderEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ForwarderEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event; errors only when nobody is subscribed.
	pub fn publish(
		&self,
		event: ForwarderEvent,
	) -> Result<(), broadcast::error::SendError<ForwarderEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}
