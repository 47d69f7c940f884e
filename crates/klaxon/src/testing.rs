//! In-memory stand-ins for the device, the operator and the feed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::time::Instant;

use crate::alarm::Alarm;
use crate::error::{Error, Result};
use crate::prompt::{AcknowledgmentPrompt, Answer};
use crate::source::{LineStream, MessageSource};
use crate::volume::{ChannelVolume, VolumeControl, VolumeSnapshot};

/// Ordered record of what the fakes were asked to do.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct VolumeState {
    channels: Vec<ChannelVolume>,
    fail_queries: bool,
    queries: usize,
    set_calls: usize,
}

#[derive(Default)]
pub(crate) struct FakeVolume {
    state: Mutex<VolumeState>,
    journal: Journal,
}

impl FakeVolume {
    pub(crate) fn with_levels(levels: &[(&str, u32, u32)]) -> Self {
        let channels = levels
            .iter()
            .map(|&(channel, current_level, max_level)| ChannelVolume {
                channel: channel.to_owned(),
                current_level,
                max_level,
            })
            .collect();
        Self {
            state: Mutex::new(VolumeState {
                channels,
                ..Default::default()
            }),
            journal: Journal::default(),
        }
    }

    pub(crate) fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub(crate) fn levels(&self) -> Vec<(String, u32)> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .map(|c| (c.channel.clone(), c.current_level))
            .collect()
    }

    pub(crate) fn fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    pub(crate) fn queries(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub(crate) fn set_calls(&self) -> usize {
        self.state.lock().unwrap().set_calls
    }
}

#[async_trait]
impl VolumeControl for FakeVolume {
    async fn get(&self) -> Result<VolumeSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        if state.fail_queries {
            return Err(Error::device_query("termux-volume exited with status 1"));
        }
        Ok(VolumeSnapshot::new(state.channels.clone()))
    }

    async fn set_channel(&self, channel: &str, level: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.set_calls += 1;
        self.journal.push(format!("set {channel} {level}"));
        match state.channels.iter_mut().find(|c| c.channel == channel) {
            Some(entry) => {
                entry.current_level = level;
                Ok(())
            }
            None => Err(Error::device_set(channel, level, "unknown channel")),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeAlarm {
    messages: Mutex<Vec<String>>,
    fail_after: Option<usize>,
    hang: bool,
    observed: Option<Arc<FakeVolume>>,
    levels_seen: Mutex<Vec<Vec<(String, u32)>>>,
    journal: Journal,
}

impl FakeAlarm {
    /// Succeeds `pulses` times, then every emission fails.
    pub(crate) fn failing_after(pulses: usize) -> Self {
        Self {
            fail_after: Some(pulses),
            ..Default::default()
        }
    }

    /// Records the message, then never finishes the pulse.
    pub(crate) fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    /// Records the device levels at every pulse.
    pub(crate) fn observing(volume: Arc<FakeVolume>) -> Self {
        Self {
            observed: Some(volume),
            ..Default::default()
        }
    }

    pub(crate) fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn levels_seen(&self) -> Vec<Vec<(String, u32)>> {
        self.levels_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Alarm for FakeAlarm {
    async fn emit(&self, message: &str) -> Result<()> {
        if let Some(volume) = &self.observed {
            self.levels_seen.lock().unwrap().push(volume.levels());
        }
        let emitted = {
            let mut messages = self.messages.lock().unwrap();
            messages.push(message.to_owned());
            messages.len()
        };
        self.journal.push(format!("pulse {message}"));
        if self.hang {
            return std::future::pending().await;
        }
        match self.fail_after {
            Some(limit) if emitted > limit => Err(Error::alarm(
                "play",
                process_utils::ActionError::Spawn {
                    program: "play".to_owned(),
                    source: std::io::ErrorKind::NotFound.into(),
                },
            )),
            _ => Ok(()),
        }
    }
}

/// Answers from a script; once it runs out every question times out.
pub(crate) struct ScriptedPrompt {
    answers: VecDeque<Answer>,
}

impl ScriptedPrompt {
    pub(crate) fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    pub(crate) fn silent() -> Self {
        Self::new([])
    }
}

#[async_trait]
impl AcknowledgmentPrompt for ScriptedPrompt {
    async fn ask(&mut self, _prompt: &str, timeout: Duration) -> Answer {
        match self.answers.pop_front() {
            Some(answer) => answer,
            None => {
                tokio::time::sleep(timeout).await;
                Answer::TimedOut
            }
        }
    }
}

/// What one call to [`ScriptedSource::open`] does.
pub(crate) enum Connect {
    Refused,
    /// Yield the lines, then end the stream.
    Lines(Vec<&'static str>),
    /// Yield the lines, then stay open without sending anything.
    LinesThenHang(Vec<&'static str>),
}

/// Feed that follows a script of connections; once the script runs out every
/// connection hangs.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Connect>>,
    opened_at: Mutex<Vec<Instant>>,
    journal: Journal,
}

impl ScriptedSource {
    pub(crate) fn new(script: impl IntoIterator<Item = Connect>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    pub(crate) fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.opened_at.lock().unwrap().clone()
    }

    fn lines(&self, lines: Vec<&'static str>) -> LineStream {
        let journal = self.journal.clone();
        futures::stream::iter(lines)
            .map(move |line| {
                journal.push(format!("read {line}"));
                Ok(Bytes::from_static(line.as_bytes()))
            })
            .boxed()
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn open(&self, _url: &str) -> Result<LineStream> {
        self.opened_at.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connect::Refused) => Err(Error::from(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
            Some(Connect::Lines(lines)) => Ok(self.lines(lines)),
            Some(Connect::LinesThenHang(lines)) => {
                Ok(self.lines(lines).chain(futures::stream::pending()).boxed())
            }
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}
