//! Latest-value register shared between the telemetry thread and the
//! render loop.
//!
//! Each axis is a raw value and a timestamp, stored as two independent
//! atomics. The writer publishes the value before the timestamp, so a reader
//! that sees a fresh timestamp also sees the value written with it. A reader
//! can still pair an old timestamp with a new value for one frame; the next
//! frame corrects it.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::attitude::Axis;
use crate::clock::MonotonicClock;

/// One axis as seen by the reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxisSample {
    pub raw: u32,
    /// 0 means nothing has been received since start or the last reset
    pub updated_at_nanos: u64,
}

impl AxisSample {
    pub fn is_live(&self) -> bool {
        self.updated_at_nanos != 0
    }
}

/// Snapshot of all axes, taken once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySample {
    pub pitch: AxisSample,
    pub bank: AxisSample,
    pub turn: AxisSample,
}

impl TelemetrySample {
    pub fn axis(&self, axis: Axis) -> AxisSample {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Bank => self.bank,
            Axis::Turn => self.turn,
        }
    }
}

#[derive(Default)]
struct AxisCell {
    raw: AtomicU32,
    updated_at: AtomicU64,
}

/// Single-writer, single-reader register of the most recent telemetry.
pub struct TelemetryRegister {
    axes: [AxisCell; 3],
    clock: MonotonicClock,
}

impl TelemetryRegister {
    pub fn new(clock: MonotonicClock) -> Self {
        Self {
            axes: Default::default(),
            clock,
        }
    }

    /// Store a fresh value stamped with the current time.
    ///
    /// Returns the nanoseconds since the previous update of this axis, if
    /// there was one.
    pub fn on_axis_update(&self, axis: Axis, raw: u32) -> Option<u64> {
        self.record(axis, raw, self.clock.now_nanos())
    }

    /// Store a value with an explicit receive time.
    pub fn record(&self, axis: Axis, raw: u32, received_at_nanos: u64) -> Option<u64> {
        let cell = &self.axes[axis.index()];
        cell.raw.store(raw, Ordering::Relaxed);
        let previous = cell.updated_at.swap(received_at_nanos, Ordering::Release);
        (previous != 0).then(|| received_at_nanos.saturating_sub(previous))
    }

    /// The telemetry session ended: every axis goes stale.
    pub fn on_session_reset(&self) {
        for cell in &self.axes {
            cell.updated_at.store(0, Ordering::Release);
        }
    }

    pub fn axis(&self, axis: Axis) -> AxisSample {
        let cell = &self.axes[axis.index()];
        let updated_at_nanos = cell.updated_at.load(Ordering::Acquire);
        let raw = cell.raw.load(Ordering::Relaxed);
        AxisSample {
            raw,
            updated_at_nanos,
        }
    }

    pub fn snapshot(&self) -> TelemetrySample {
        TelemetrySample {
            pitch: self.axis(Axis::Pitch),
            bank: self.axis(Axis::Bank),
            turn: self.axis(Axis::Turn),
        }
    }
}
