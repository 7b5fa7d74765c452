use flume::Sender;
use iaware_messages::{ConnectionState, Event, Request, StreamConfig, StreamEnd};
use log::{debug, warn};

use crate::control_panel::ControlPanel;
use crate::trace::Trace;
use crate::ViewerSettings;

/// Local UI state derived from client events.
pub(super) struct UiState {
    pub connection: ConnectionState,

    /// Why the last connection finished, until a new one starts
    pub last_end: Option<StreamEnd>,

    /// Most recent rejected request
    pub last_error: Option<String>,

    /// Trace widget state
    pub trace: Trace,

    /// Control panel widget state
    pub control_panel: ControlPanel,
}

impl UiState {
    pub fn new(config: &StreamConfig, request_tx: Sender<Request>, settings: ViewerSettings) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            last_end: None,
            last_error: None,
            trace: Trace::new(settings.refresh),
            control_panel: ControlPanel::new(config, settings.host, settings.port, request_tx),
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        debug!("UI received event: {event:?}");
        match event {
            Event::StateChanged(state) => {
                if state == ConnectionState::Connecting {
                    self.last_end = None;
                    self.last_error = None;
                }
                self.connection = state;
                self.control_panel.update_from_state(state);
            }
            Event::StreamEnded(end) => {
                if let StreamEnd::Failed(reason) = &end {
                    warn!("Stream failed: {reason}");
                }
                self.last_end = Some(end);
            }
            Event::RequestFailed(reason) => {
                self.last_error = Some(reason);
            }
        }
    }

    pub fn status_line(&self) -> String {
        let mut line = format!("Connection: {}", self.connection);
        if let Some(end) = &self.last_end {
            line.push_str(&format!(" ({end})"));
        }
        if let Some(error) = &self.last_error {
            line.push_str(&format!(" | last error: {error}"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state() -> (UiState, flume::Receiver<Request>) {
        let (tx, rx) = flume::unbounded();
        let settings = ViewerSettings {
            host: "127.0.0.1".into(),
            port: 5000,
            refresh: Duration::from_millis(50),
        };
        let state = UiState::new(&StreamConfig::default(), tx, settings);
        (state, rx)
    }

    #[test]
    fn test_events_update_status_line() {
        let (mut state, _rx) = state();
        assert_eq!(state.status_line(), "Connection: disconnected");

        state.handle_event(Event::StateChanged(ConnectionState::Streaming));
        state.handle_event(Event::RequestFailed("not connected".into()));
        assert_eq!(
            state.status_line(),
            "Connection: streaming | last error: not connected"
        );

        state.handle_event(Event::StateChanged(ConnectionState::Closed));
        state.handle_event(Event::StreamEnded(StreamEnd::Eof));
        assert_eq!(
            state.status_line(),
            "Connection: closed (device closed the connection)"
        );
    }

    #[test]
    fn test_new_connection_clears_previous_end() {
        let (mut state, _rx) = state();
        state.handle_event(Event::StreamEnded(StreamEnd::Terminated));
        state.handle_event(Event::StateChanged(ConnectionState::Connecting));

        assert!(state.last_end.is_none());
        assert_eq!(state.connection, ConnectionState::Connecting);
    }
}
