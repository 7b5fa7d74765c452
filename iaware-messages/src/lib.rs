mod command;
mod config;
mod event;
mod state;
mod units;

pub use command::{Command, HeaderKind, Request};
pub use config::StreamConfig;
pub use event::{Event, StreamEnd};
pub use state::ConnectionState;
pub use units::{DeciHertz, Hertz, Seconds};
