use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use iaware_messages::{ConnectionState, Event, Request};
use log::{debug, info, warn};

use crate::client::StreamingClient;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives a [`StreamingClient`] from a channel of UI requests.
///
/// Connecting can block for the whole connect timeout, so the UI hands
/// requests to this loop instead of calling the client on its own thread.
pub struct Session {
    client: Arc<StreamingClient>,
    requests: Receiver<Request>,
    events: Option<Sender<Event>>,
    streaming_since: Option<Instant>,
    stall_reported: bool,
}

impl Session {
    pub fn new(
        client: Arc<StreamingClient>,
        requests: Receiver<Request>,
        events: Option<Sender<Event>>,
    ) -> Self {
        debug!("Constructing a new session");
        Self {
            client,
            requests,
            events,
            streaming_since: None,
            stall_reported: false,
        }
    }

    /// Process requests until `Exit` or until every sender is dropped,
    /// then terminate the connection (blocking).
    pub fn run(mut self) {
        loop {
            let msg = self.requests.recv_timeout(POLL_INTERVAL);
            match msg {
                Ok(request) => {
                    if !self.handle(request) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Request channel closed");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => self.watch(),
            }
        }

        self.client.terminate();
        debug!("Session finished");
    }

    /// Returns false once the session should exit.
    fn handle(&mut self, request: Request) -> bool {
        debug!("Session received request: {request:?}");
        let result = match request {
            Request::Connect { host, port } => self.client.connect(&host, port),
            Request::Send(command) => self.client.send_command(command),
            Request::Terminate => {
                self.client.terminate();
                Ok(())
            }
            Request::Exit => return false,
        };

        if let Err(e) = result {
            warn!("Request failed: {e}");
            if let Some(events) = &self.events {
                let _ = events.try_send(Event::RequestFailed(e.to_string()));
            }
        }
        true
    }

    /// Stall watchdog: warn when a streaming connection delivers nothing
    /// for a whole rate window.
    fn watch(&mut self) {
        if self.client.state() != ConnectionState::Streaming {
            self.streaming_since = None;
            self.stall_reported = false;
            return;
        }

        let window = self.client.config().rate_window;
        let since = *self.streaming_since.get_or_insert_with(Instant::now);
        if since.elapsed() < window {
            return;
        }

        let rate = self.client.effective_sampling_frequency();
        if rate > 0.0 {
            if self.stall_reported {
                info!("Samples flowing again at {rate:.0} Hz");
            }
            self.stall_reported = false;
        } else if !self.stall_reported {
            warn!("No samples received for {window:?}, device may be stalled");
            self.stall_reported = true;
        }
    }
}
