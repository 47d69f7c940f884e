//! Klaxon alert engine.
//!
//! Subscribes to a newline-delimited JSON notification feed and, for every
//! message, takes over the device until a human acknowledges it: volume is
//! raised to maximum, the device vibrates, plays an alarm and speaks the
//! message, again and again. Whatever happens (acknowledgment, a failing
//! action, a dropped connection, an operator shutdown) the volume levels
//! found before the alarm are put back.
//!
//! Components, leaves first:
//! - [`volume`]: snapshots and the [`VolumeControl`] device backend
//! - [`alarm`]: one vibration/sound/speech pulse
//! - [`prompt`]: bounded yes/no question to the operator
//! - [`source`]: the feed connection and line decoding
//! - [`scope`]: the volume override that always restores
//! - [`acknowledge`]: the alarm-until-acknowledged state machine
//! - [`supervisor`]: the reconnect-forever stream loop

pub mod acknowledge;
pub mod alarm;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod prompt;
pub mod scope;
pub mod source;
pub mod supervisor;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use acknowledge::{AckSettings, AcknowledgmentLoop, EpisodeReport, LoopState};
pub use alarm::{Alarm, CommandAlarm};
pub use config::{CommandsConfig, KlaxonConfig};
pub use error::{Error, Result};
pub use interrupt::{InterruptRoute, Interrupts, spawn_signal_listener};
pub use prompt::{AcknowledgmentPrompt, Answer, TerminalPrompt};
pub use scope::VolumeOverrideScope;
pub use source::{HttpMessageSource, LineStream, Message, MessageSource, decode};
pub use supervisor::{StreamSupervisor, SupervisorSettings, SupervisorStats};
pub use volume::{
    ChannelLevel, ChannelVolume, SetReport, TermuxVolume, VolumeControl, VolumeSnapshot,
};
