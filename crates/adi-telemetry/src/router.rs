//! Topic dispatch from received messages to the telemetry register.

use std::sync::Arc;

use adi_core::{Axis, TelemetryRegister, TopicAction, TopicConfig};

use crate::payload::parse_raw;

/// What happened to one received message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    Axis {
        axis: Axis,
        raw: u32,
        /// Time since the previous update on this axis
        since_nanos: Option<u64>,
    },
    SessionReset,
    Logged,
    /// Known topic, unusable payload; no state changed
    Malformed,
    /// Topic not in the table (prefix-only match or garbage)
    Unknown,
}

/// Maps exact topic names to register updates.
///
/// ZeroMQ subscriptions match by prefix, so `adi_pitch` also admits
/// `adi_pitch_trim`. Dispatch therefore compares the full topic.
pub struct TopicRouter {
    register: Arc<TelemetryRegister>,
    topics: Vec<TopicConfig>,
}

impl TopicRouter {
    pub fn new(register: Arc<TelemetryRegister>, topics: Vec<TopicConfig>) -> Self {
        Self { register, topics }
    }

    /// Topic names to subscribe to.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.topic.as_str())
    }

    fn action_for(&self, topic: &[u8]) -> Option<TopicAction> {
        self.topics
            .iter()
            .find(|t| t.topic.as_bytes() == topic)
            .map(|t| t.action)
    }

    pub fn dispatch(&self, topic: &[u8], payload: &[u8]) -> Routed {
        let Some(action) = self.action_for(topic) else {
            tracing::trace!("Ignoring topic {}", String::from_utf8_lossy(topic));
            return Routed::Unknown;
        };

        match action {
            TopicAction::SessionReset => {
                tracing::info!("Session ended by publisher, returning to level");
                self.register.on_session_reset();
                Routed::SessionReset
            }
            TopicAction::Log => {
                tracing::debug!(
                    "{} = {}",
                    String::from_utf8_lossy(topic),
                    String::from_utf8_lossy(payload)
                );
                Routed::Logged
            }
            TopicAction::Pitch | TopicAction::Bank | TopicAction::Turn => {
                let Some(axis) = action.axis() else {
                    return Routed::Unknown;
                };
                let Some(raw) = parse_raw(payload) else {
                    tracing::debug!(
                        "Malformed {} payload: {:?}",
                        axis.name(),
                        String::from_utf8_lossy(payload)
                    );
                    return Routed::Malformed;
                };
                let since_nanos = self.register.on_axis_update(axis, raw);
                match since_nanos {
                    Some(nanos) => tracing::debug!(
                        "{} = {} ({:.2} ms since last)",
                        axis.name(),
                        raw,
                        nanos as f64 * 1e-6
                    ),
                    None => tracing::debug!("{} = {} (first update)", axis.name(), raw),
                }
                Routed::Axis {
                    axis,
                    raw,
                    since_nanos,
                }
            }
        }
    }

    /// Dispatch a received message. Publishers either send two frames
    /// `[topic, payload]` or a single frame `"topic payload"`.
    pub fn handle_frames(&self, frames: &[Vec<u8>]) -> Routed {
        match split_message(frames) {
            Some((topic, payload)) => self.dispatch(topic, payload),
            None => Routed::Unknown,
        }
    }
}

/// Split a received message into topic and payload.
pub fn split_message(frames: &[Vec<u8>]) -> Option<(&[u8], &[u8])> {
    match frames {
        [] => None,
        [single] => {
            let single = single.as_slice();
            match single.iter().position(|&b| b == b' ') {
                Some(at) => Some((&single[..at], &single[at + 1..])),
                None => Some((single, &[])),
            }
        }
        [topic, payload, ..] => Some((topic.as_slice(), payload.as_slice())),
    }
}
