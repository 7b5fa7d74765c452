use std::time::{Duration, Instant};

use eframe::egui::{
    Color32, Pos2, Rect, Response, Sense, Shape, Stroke, Ui, Widget, pos2, vec2,
};
use iaware_client::{Snapshot, StreamingClient};

const CHANNEL_COLORS: [Color32; 4] = [
    Color32::LIGHT_GREEN,
    Color32::LIGHT_BLUE,
    Color32::GOLD,
    Color32::LIGHT_RED,
];

/// Line trace of the sample window, one horizontal lane per channel.
///
/// The window is re-read at most once per refresh interval. Samples are
/// placed by their position in the full window, so a partially filled
/// window grows from the left.
pub struct Trace {
    refresh: Duration,
    last_poll: Option<Instant>,
    snapshot: Snapshot,
    effective_rate: f64,
    device_rate: Option<u32>,
}

impl Trace {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            last_poll: None,
            snapshot: Snapshot::default(),
            effective_rate: 0.0,
            device_rate: None,
        }
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    /// Take a fresh snapshot if the refresh interval has elapsed.
    pub fn poll(&mut self, client: &StreamingClient, now: Instant) {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.refresh {
                return;
            }
        }
        self.last_poll = Some(now);
        self.snapshot = client.get_raw_data();
        self.effective_rate = client.effective_sampling_frequency();
        self.device_rate = client.device_sampling_frequency();
    }

    fn summary(&self) -> String {
        let device = match self.device_rate {
            Some(rate) => format!("{rate} Hz"),
            None => "n/a".to_owned(),
        };
        format!(
            "cursor {} | {}/{} samples | measured {:.0} Hz | device {}",
            self.snapshot.cursor,
            self.snapshot.filled_count(),
            self.snapshot.capacity,
            self.effective_rate,
            device,
        )
    }
}

/// Map `samples` into `lane`, x by window position and y by the sample range.
/// Long windows are decimated to about two points per horizontal pixel.
fn trace_points(samples: &[f32], capacity: usize, lane: Rect) -> Vec<Pos2> {
    if samples.is_empty() {
        return Vec::new();
    }

    let (min, max) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = (max - min).max(f32::EPSILON);
    let slots = capacity.max(samples.len()).max(2) - 1;
    let stride = (samples.len() / (2 * lane.width().max(1.0) as usize)).max(1);

    samples
        .iter()
        .enumerate()
        .step_by(stride)
        .map(|(i, &value)| {
            let x = lane.left() + lane.width() * i as f32 / slots as f32;
            let y = lane.bottom() - lane.height() * (value - min) / span;
            pos2(x, y)
        })
        .collect()
}

impl Widget for &mut Trace {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.label(self.summary());

        if !self.snapshot.is_ready() {
            ui.centered_and_justified(|ui| {
                ui.label("Waiting for data...");
            });
            return ui.response();
        }

        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::hover());
        let rect = response.rect;
        let lane_height = rect.height() / self.snapshot.samples.len() as f32;

        for (index, samples) in self.snapshot.samples.iter().enumerate() {
            let lane = Rect::from_min_size(
                pos2(rect.left(), rect.top() + lane_height * index as f32),
                vec2(rect.width(), lane_height),
            )
            .shrink(4.0);
            let color = CHANNEL_COLORS[index % CHANNEL_COLORS.len()];
            painter.add(Shape::line(
                trace_points(samples, self.snapshot.capacity, lane),
                Stroke::new(1.0, color),
            ));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(100.0, 10.0))
    }

    #[test]
    fn test_partial_window_grows_from_left() {
        let points = trace_points(&[0.0, 1.0, 2.0], 11, lane());

        assert_eq!(points.len(), 3);
        assert_eq!(points[0], pos2(0.0, 10.0));
        assert_eq!(points[2], pos2(20.0, 0.0));
    }

    #[test]
    fn test_flat_signal_stays_in_lane() {
        let points = trace_points(&[5.0; 4], 4, lane());
        assert!(points.iter().all(|p| lane().contains(*p)));
    }

    #[test]
    fn test_long_window_is_decimated() {
        let samples: Vec<f32> = (0..15_000).map(|i| i as f32).collect();
        let points = trace_points(&samples, 15_000, lane());
        assert!(points.len() <= 300);
        assert_eq!(points[0].x, 0.0);
    }

    #[test]
    fn test_poll_respects_refresh_interval() {
        let client = StreamingClient::new(Default::default(), None).unwrap();
        let mut trace = Trace::new(Duration::from_millis(50));
        let start = Instant::now();

        trace.poll(&client, start);
        assert_eq!(trace.last_poll, Some(start));

        trace.poll(&client, start + Duration::from_millis(10));
        assert_eq!(trace.last_poll, Some(start));

        trace.poll(&client, start + Duration::from_millis(60));
        assert_eq!(trace.last_poll, Some(start + Duration::from_millis(60)));
        assert!(!trace.snapshot.is_ready());
    }
}
