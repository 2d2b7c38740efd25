//! Synthetic instrument feed for bench testing without a simulator.

use std::f64::consts::TAU;

use crate::error::TelemetryResult;

/// Publishes `[topic, decimal value]` messages on a bound PUB socket.
pub struct TelemetryPublisher {
    socket: zmq::Socket,
}

impl TelemetryPublisher {
    pub fn bind(endpoint: &str) -> TelemetryResult<Self> {
        let socket = zmq::Context::new().socket(zmq::PUB)?;
        // give the goodbye a moment to leave before the socket closes
        socket.set_linger(500)?;
        socket.bind(endpoint)?;
        tracing::info!("Publishing synthetic telemetry on {}", endpoint);
        Ok(Self { socket })
    }

    pub fn publish(&self, topic: &str, raw: u32) -> TelemetryResult<()> {
        self.socket
            .send_multipart([topic.as_bytes(), raw.to_string().as_bytes()], 0)?;
        Ok(())
    }

    /// Announce the end of the session.
    pub fn goodbye(&self, topic: &str) -> TelemetryResult<()> {
        self.socket.send_multipart([topic.as_bytes(), b"".as_slice()], 0)?;
        Ok(())
    }
}

/// Slow pitch oscillation plus a continuous roll, in raw instrument units.
///
/// The roll passes through the 0/65535 seam every period, which exercises
/// the shortest-path easing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    /// Seconds per full roll
    pub roll_period_s: f64,
    /// Seconds per pitch oscillation
    pub pitch_period_s: f64,
    /// Peak pitch excursion from mid-scale, raw units
    pub pitch_amplitude: f64,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            roll_period_s: 20.0,
            pitch_period_s: 7.0,
            pitch_amplitude: 8192.0,
        }
    }
}

impl Sweep {
    const MID_SCALE: f64 = 32768.0;
    const FULL_SCALE: f64 = 65536.0;

    pub fn pitch(&self, t: f64) -> u32 {
        let value = Self::MID_SCALE + self.pitch_amplitude * (TAU * t / self.pitch_period_s).sin();
        value.round().clamp(0.0, 65535.0) as u32
    }

    pub fn bank(&self, t: f64) -> u32 {
        let turns = (t / self.roll_period_s).rem_euclid(1.0);
        ((turns * Self::FULL_SCALE) as u32).min(65535)
    }
}
