use crate::{DeciHertz, Hertz, Seconds};
use std::time::Duration;

/// Acquisition and connection settings for one streaming client.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Number of signal channels carried in each sample row.
    pub channels: usize,
    /// Length of the display window.
    pub samples_duration: Seconds,
    /// Device ADC sampling frequency.
    pub sampling_frequency: Hertz,
    /// Rate at which the device forwards sampled data, in Hz.
    pub send_frequency: f32,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Device port that accepts commands, when it differs from the data port.
    pub command_port: Option<u16>,
    /// Send sampling frequency, send-data frequency and start-stream right after connecting.
    pub configure_on_connect: bool,
    /// Largest inbound frame accepted before the framer treats a length prefix as corrupt.
    pub max_frame_len: usize,
    /// Trailing window used to measure the effective sampling frequency.
    pub rate_window: Duration,
    /// Upper bound on `channels * capacity`, the samples held by the window.
    pub max_window_samples: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            samples_duration: Seconds(1.0),
            sampling_frequency: Hertz(15_000),
            send_frequency: 20.0,
            connect_timeout: Duration::from_secs(3),
            command_port: None,
            configure_on_connect: true,
            max_frame_len: 1024 * 1024,
            rate_window: Duration::from_secs(2),
            max_window_samples: 16 * 1024 * 1024,
        }
    }
}

impl StreamConfig {
    /// Ring capacity in samples per channel: `round(Fs * samples_duration)`, at least 1.
    ///
    /// `None` when the window would hold more than `max_window_samples`.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity_for(self.sampling_frequency)
    }

    /// Ring capacity the window would have at a different sampling frequency.
    pub fn capacity_for(&self, sampling_frequency: Hertz) -> Option<usize> {
        let samples = (f64::from(sampling_frequency.0) * self.samples_duration.0).round();
        let cells = samples.max(1.0) * self.channels as f64;
        // Also false for NaN and infinity.
        if !(cells <= self.max_window_samples as f64) {
            return None;
        }
        Some((samples as usize).max(1))
    }

    pub fn send_frequency_tenths(&self) -> DeciHertz {
        DeciHertz::from_hz(self.send_frequency)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.channels == 0 {
            return Err("channel count must be at least 1");
        }
        if !(self.samples_duration.0 > 0.0) {
            return Err("samples duration must be positive");
        }
        if self.sampling_frequency.0 == 0 {
            return Err("sampling frequency must be positive");
        }
        if !(0.0..=DeciHertz::MAX_HZ).contains(&self.send_frequency) {
            return Err("send-data frequency must be within 0..=25.5 Hz");
        }
        if self.connect_timeout.is_zero() {
            return Err("connect timeout must be positive");
        }
        if self.max_frame_len < 2 {
            return Err("max frame length must fit a header and a command code");
        }
        if self.capacity().is_none() {
            return Err("sample window exceeds max_window_samples");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_fs_times_duration() {
        let config = StreamConfig {
            sampling_frequency: Hertz(15_000),
            samples_duration: Seconds(1.0),
            ..Default::default()
        };
        assert_eq!(config.capacity(), Some(15_000));

        let config = StreamConfig {
            sampling_frequency: Hertz(333),
            samples_duration: Seconds(0.5),
            ..Default::default()
        };
        assert_eq!(config.capacity(), Some(167));
        assert_eq!(config.capacity_for(Hertz(1)), Some(1));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(StreamConfig::default().validate().is_ok());

        let zero_channels = StreamConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(zero_channels.validate().is_err());

        let too_fast = StreamConfig {
            send_frequency: 30.0,
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());

        let no_window = StreamConfig {
            samples_duration: Seconds(0.0),
            ..Default::default()
        };
        assert!(no_window.validate().is_err());
    }

    #[test]
    fn test_window_size_is_bounded() {
        let endless = StreamConfig {
            channels: 2,
            samples_duration: Seconds(1e20),
            sampling_frequency: Hertz(1),
            ..Default::default()
        };
        assert_eq!(endless.capacity(), None);
        assert!(endless.validate().is_err());

        let config = StreamConfig {
            channels: 4,
            max_window_samples: 100,
            ..Default::default()
        };
        assert_eq!(config.capacity_for(Hertz(25)), Some(25));
        assert_eq!(config.capacity_for(Hertz(26)), None);
        assert_eq!(StreamConfig::default().capacity_for(Hertz(u32::MAX)), None);
    }
}
