use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use flume::{Sender, TrySendError};
use iaware_messages::{ConnectionState, Event, StreamEnd};
use log::{info, warn};

/// Lifecycle state of one connection, shared by the client and its receive loop.
///
/// Every transition is logged and published to the owner's event channel.
/// Publishing never blocks: a full channel drops the event.
#[derive(Debug)]
pub(crate) struct Status {
    state: Mutex<ConnectionState>,
    stop_requested: AtomicBool,
    events: Option<Sender<Event>>,
}

impl Status {
    pub(crate) fn new(events: Option<Sender<Event>>) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            stop_requested: AtomicBool::new(false),
            events,
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` unless already there. `Closed` is never left.
    pub(crate) fn set(&self, next: ConnectionState) {
        self.transition(|current| current != ConnectionState::Closed, next);
    }

    /// Move to `next` only from `from`. Returns whether the transition happened.
    pub(crate) fn advance(&self, from: ConnectionState, next: ConnectionState) -> bool {
        self.transition(|current| current == from, next)
    }

    fn transition(&self, allowed: impl Fn(ConnectionState) -> bool, next: ConnectionState) -> bool {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *state;
            if previous == next || !allowed(previous) {
                return false;
            }
            *state = next;
            previous
        };

        info!("Connection {previous} -> {next}");
        self.publish(Event::StateChanged(next));
        true
    }

    /// Mark that the owner asked for the connection to stop.
    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        if self.get().is_active() {
            self.set(ConnectionState::Stopping);
        }
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Publish the terminal condition of the connection.
    pub(crate) fn end(&self, end: StreamEnd) {
        info!("Stream ended: {end}");
        self.publish(Event::StreamEnded(end));
    }

    pub(crate) fn publish(&self, event: Event) {
        let Some(events) = &self.events else {
            return;
        };
        match events.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {event:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_publish_events() {
        let (tx, rx) = flume::unbounded();
        let status = Status::new(Some(tx));

        status.set(ConnectionState::Connecting);
        assert!(status.advance(ConnectionState::Connecting, ConnectionState::Streaming));
        assert!(!status.advance(ConnectionState::Connecting, ConnectionState::Streaming));
        status.set(ConnectionState::Streaming);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                Event::StateChanged(ConnectionState::Connecting),
                Event::StateChanged(ConnectionState::Streaming),
            ]
        );
    }

    #[test]
    fn test_closed_is_terminal() {
        let status = Status::new(None);
        status.set(ConnectionState::Closed);
        status.set(ConnectionState::Streaming);
        status.request_stop();

        assert_eq!(status.get(), ConnectionState::Closed);
        assert!(status.stop_requested());
    }
}
