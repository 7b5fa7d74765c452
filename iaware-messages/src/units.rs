/// Frequency in Hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hertz(pub u32);

impl std::fmt::Display for Hertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

impl Hertz {
    pub const fn as_hz(self) -> u32 {
        self.0
    }
}

/// Frequency in tenths of a Hertz, as carried by the send-data frequency command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeciHertz(pub u8);

impl DeciHertz {
    /// Largest representable rate in Hz.
    pub const MAX_HZ: f32 = u8::MAX as f32 / 10.0;

    /// Convert a rate in Hz to tenths, rounding and clamping to `[0, 25.5]` Hz.
    ///
    /// Rates above 25.5 Hz saturate; this is a precision ceiling of the wire
    /// format, not an error. NaN maps to zero.
    pub fn from_hz(hz: f32) -> Self {
        let tenths = (hz * 10.0).round();
        if tenths.is_nan() {
            return Self(0);
        }
        Self(tenths.clamp(0.0, f32::from(u8::MAX)) as u8)
    }

    pub fn as_hz(self) -> f32 {
        f32::from(self.0) / 10.0
    }
}

impl std::fmt::Display for DeciHertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} Hz", self.as_hz())
    }
}

/// Duration in seconds, used for the display window length.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Seconds(pub f64);

impl std::fmt::Display for Seconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} s", self.0)
    }
}
