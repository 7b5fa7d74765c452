use eframe::egui::{DragValue, Response, TextEdit, Ui, Widget};
use flume::Sender;
use log::warn;

use iaware_messages::{Command, ConnectionState, DeciHertz, Hertz, Request, StreamConfig};

/// Control panel widget for the device connection and acquisition settings.
pub struct ControlPanel {
    request_tx: Sender<Request>,
    host: String,
    port: u16,
    sampling_frequency: u32,
    send_frequency: f32,
    connection: ConnectionState,
    has_pending_changes: bool,
}

impl ControlPanel {
    pub fn new(config: &StreamConfig, host: String, port: u16, request_tx: Sender<Request>) -> Self {
        Self {
            request_tx,
            host,
            port,
            sampling_frequency: config.sampling_frequency.as_hz(),
            send_frequency: config.send_frequency,
            connection: ConnectionState::Disconnected,
            has_pending_changes: false,
        }
    }

    pub fn update_from_state(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    fn request(&self, request: Request) {
        if self.request_tx.send(request).is_err() {
            warn!("Session is gone, request dropped");
        }
    }

    fn send(&self, command: Command) {
        self.request(Request::Send(command));
    }

    fn apply(&mut self) {
        self.send(Command::SetSamplingFrequency(Hertz(self.sampling_frequency)));
        self.send(Command::SetSendDataFrequency(DeciHertz::from_hz(
            self.send_frequency,
        )));
        self.has_pending_changes = false;
    }
}

impl Widget for &mut ControlPanel {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.heading("Device");
        ui.separator();

        let idle = !self.connection.is_active();
        ui.add_enabled_ui(idle, |ui| {
            ui.horizontal(|ui| {
                ui.label("Host:");
                ui.add(TextEdit::singleline(&mut self.host).hint_text("192.168.4.1"));
            });
            ui.horizontal(|ui| {
                ui.label("Port:");
                ui.add(DragValue::new(&mut self.port));
            });
        });

        ui.horizontal(|ui| {
            if ui.add_enabled(idle, eframe::egui::Button::new("Connect")).clicked() {
                self.request(Request::Connect {
                    host: self.host.trim().to_owned(),
                    port: self.port,
                });
            }
            if ui
                .add_enabled(!idle, eframe::egui::Button::new("Disconnect"))
                .clicked()
            {
                self.request(Request::Terminate);
            }
        });

        ui.add_space(10.0);
        ui.heading("Acquisition");
        ui.separator();

        let streaming = self.connection == ConnectionState::Streaming;
        ui.add_enabled_ui(streaming, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Start").clicked() {
                    self.send(Command::StartStream);
                }
                if ui.button("Stop").clicked() {
                    self.send(Command::StopStream);
                }
            });
        });

        ui.add_space(10.0);

        ui.horizontal(|ui| {
            ui.label("Sampling:");
            if ui
                .add(
                    DragValue::new(&mut self.sampling_frequency)
                        .range(1..=100_000)
                        .speed(100)
                        .suffix(" Hz"),
                )
                .changed()
            {
                self.has_pending_changes = true;
            }
        });
        ui.horizontal(|ui| {
            ui.label("Send rate:");
            if ui
                .add(
                    DragValue::new(&mut self.send_frequency)
                        .range(0.0..=DeciHertz::MAX_HZ)
                        .speed(0.1)
                        .fixed_decimals(1)
                        .suffix(" Hz"),
                )
                .changed()
            {
                self.has_pending_changes = true;
            }
        });

        ui.add_space(10.0);
        ui.separator();

        // Apply button (enabled when there are changes and a device to send them to)
        let can_apply = self.has_pending_changes && streaming;
        ui.add_enabled_ui(can_apply, |ui| {
            if ui.button("Apply").clicked() {
                self.apply();
            }
        });

        ui.response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sends_both_frequencies() {
        let (tx, rx) = flume::unbounded();
        let mut panel = ControlPanel::new(&StreamConfig::default(), "127.0.0.1".into(), 5000, tx);
        panel.sampling_frequency = 1_000;
        panel.send_frequency = 12.5;
        panel.has_pending_changes = true;

        panel.apply();

        let requests: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            requests,
            vec![
                Request::Send(Command::SetSamplingFrequency(Hertz(1_000))),
                Request::Send(Command::SetSendDataFrequency(DeciHertz(125))),
            ]
        );
        assert!(!panel.has_pending_changes);
    }
}
