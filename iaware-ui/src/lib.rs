mod control_panel;
mod state;
mod trace;

use std::sync::Arc;
use std::time::{Duration, Instant};

use iaware_client::StreamingClient;
use iaware_messages::{Event, Request};
use state::UiState;

/// Startup settings for the viewer.
#[derive(Debug, Clone)]
pub struct ViewerSettings {
    /// Device address prefilled in the control panel
    pub host: String,
    pub port: u16,
    /// Interval between sample window reads
    pub refresh: Duration,
}

/// Main application struct implementing the egui App trait.
pub struct IawareApp {
    /// Receiver for lifecycle events from the client and session
    event_rx: flume::Receiver<Event>,

    /// Source of snapshots and rate readouts. Never used for blocking calls.
    client: Arc<StreamingClient>,

    /// Local application state
    state: UiState,
}

impl IawareApp {
    fn new(
        client: Arc<StreamingClient>,
        event_rx: flume::Receiver<Event>,
        request_tx: flume::Sender<Request>,
        settings: ViewerSettings,
    ) -> Self {
        Self {
            state: UiState::new(client.config(), request_tx, settings),
            event_rx,
            client,
        }
    }
}

impl eframe::App for IawareApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        // Pull events from the client
        for event in self.event_rx.try_iter() {
            self.state.handle_event(event);
        }

        // Poll the window on our own cadence, not on network arrival
        self.state.trace.poll(&self.client, Instant::now());
        ctx.request_repaint_after(self.state.trace.refresh());

        eframe::egui::SidePanel::right("control_panel")
            .default_width(250.0)
            .show(ctx, |ui| {
                ui.add(&mut self.state.control_panel);
            });

        eframe::egui::TopBottomPanel::bottom("status_line").show(ctx, |ui| {
            ui.label(self.state.status_line());
        });

        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            ui.add(&mut self.state.trace);
        });
    }
}

/// Entry point for the UI module.
///
/// Runs the eframe application on the main thread (blocking) and redraws the
/// sample window every `settings.refresh`.
pub fn run(
    client: Arc<StreamingClient>,
    event_rx: flume::Receiver<Event>,
    request_tx: flume::Sender<Request>,
    settings: ViewerSettings,
) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("iAware"),
        ..Default::default()
    };

    eframe::run_native(
        "iAware",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(IawareApp::new(
                client, event_rx, request_tx, settings,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
