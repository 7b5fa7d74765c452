use crate::{DeciHertz, Hertz};

/// Control commands sent from the client to the acquisition device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask the device to begin streaming sample frames.
    StartStream,
    /// Ask the device to stop streaming sample frames.
    StopStream,
    /// Change the device ADC sampling frequency.
    SetSamplingFrequency(Hertz),
    /// Change how often the device forwards buffered samples, in tenths of a Hz.
    SetSendDataFrequency(DeciHertz),
}

impl Command {
    /// Wire code following the `Command` header byte.
    pub const fn code(self) -> u8 {
        match self {
            Command::StartStream => 0,
            Command::StopStream => 1,
            Command::SetSamplingFrequency(_) => 2,
            Command::SetSendDataFrequency(_) => 3,
        }
    }

    /// Build a send-data frequency command from a rate in Hz.
    /// See [`DeciHertz::from_hz`] for the precision ceiling.
    pub fn send_data_frequency(hz: f32) -> Self {
        Command::SetSendDataFrequency(DeciHertz::from_hz(hz))
    }
}

/// Frame kind carried in the byte after the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    Command,
    Group1,
    Group2,
}

impl HeaderKind {
    pub const fn as_byte(self) -> u8 {
        match self {
            HeaderKind::Command => 0,
            HeaderKind::Group1 => 1,
            HeaderKind::Group2 => 2,
        }
    }

    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(HeaderKind::Command),
            1 => Some(HeaderKind::Group1),
            2 => Some(HeaderKind::Group2),
            _ => None,
        }
    }
}

/// Requests sent from the UI to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Open a fresh connection to the device.
    Connect { host: String, port: u16 },
    /// Forward a control command to the device.
    Send(Command),
    /// Close the current connection. The session keeps running.
    Terminate,
    /// Close the current connection and stop the session loop.
    Exit,
}
