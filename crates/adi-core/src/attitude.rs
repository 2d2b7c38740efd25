//! Ball attitude and circular easing toward telemetry targets.

use std::f32::consts::{PI, TAU};

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::telemetry::{AxisSample, TelemetrySample};

/// Pitch and bank of the ball when the aircraft is straight and level.
/// The mesh faces the camera at half a turn, not at zero.
pub const LEVEL_FLIGHT: f32 = PI;

/// Raw instrument value at full deflection.
pub const RAW_FULL_SCALE: f32 = 65535.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Pitch,
    Bank,
    /// Reserved; stored but not eased or drawn
    Turn,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Pitch, Axis::Bank, Axis::Turn];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::Pitch => "pitch",
            Axis::Bank => "bank",
            Axis::Turn => "turn",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::Pitch => 0,
            Axis::Bank => 1,
            Axis::Turn => 2,
        }
    }
}

/// Proportional easing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Easing {
    /// Fraction of the remaining distance covered per frame, in (0, 1]
    pub factor: f32,
    /// Distance below which the value snaps onto the target
    pub epsilon: f32,
    /// Period of the circular quantity; `None` eases on a straight line
    pub wrap_period: Option<f32>,
}

impl Default for Easing {
    fn default() -> Self {
        Self {
            factor: 0.25,
            epsilon: 1e-4,
            wrap_period: Some(TAU),
        }
    }
}

/// Signed distance from `current` to `target` along the shorter arc of a
/// circle with the given period. Ties keep the direct path.
pub fn shortest_delta(current: f32, target: f32, period: f32) -> f32 {
    let delta = target - current;

    if target > current {
        let wrap_delta = period - target + current;
        if wrap_delta < delta {
            return -wrap_delta;
        }
    } else if target < current {
        let wrap_delta = period - current + target;
        if wrap_delta < -delta {
            return wrap_delta;
        }
    }

    delta
}

/// Bring `value` into `[0, period)`.
pub fn wrap_angle(value: f32, period: f32) -> f32 {
    let wrapped = value.rem_euclid(period);
    // rem_euclid rounds tiny negative values up to `period`
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}

/// One easing step of `current` toward `target`. With a wrap period both
/// inputs are taken modulo the period and the result stays in `[0, period)`.
pub fn ease_circular(current: f32, target: f32, easing: &Easing) -> f32 {
    match easing.wrap_period {
        Some(period) => {
            let current = wrap_angle(current, period);
            let target = wrap_angle(target, period);
            let delta = shortest_delta(current, target, period);
            if delta.abs() < easing.epsilon {
                target
            } else {
                wrap_angle(current + delta * easing.factor, period)
            }
        }
        None => {
            let delta = target - current;
            if delta.abs() < easing.epsilon {
                target
            } else {
                current + delta * easing.factor
            }
        }
    }
}

/// Linear map from a raw instrument value to an angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisMapping {
    pub scale: f32,
    pub offset: f32,
}

impl AxisMapping {
    /// Half a turn of travel centred on the level reference.
    pub const PITCH: AxisMapping = AxisMapping {
        scale: PI,
        offset: PI * 0.5,
    };

    /// A full turn of travel.
    pub const BANK: AxisMapping = AxisMapping {
        scale: TAU,
        offset: 0.0,
    };

    pub fn angle(&self, raw: u32) -> f32 {
        raw as f32 / RAW_FULL_SCALE * self.scale + self.offset
    }

    /// Target for an axis: the mapped value while telemetry is live,
    /// level flight otherwise.
    pub fn target(&self, sample: AxisSample) -> f32 {
        if sample.is_live() {
            self.angle(sample.raw)
        } else {
            LEVEL_FLIGHT
        }
    }
}

/// Current and target orientation of the ball, in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngularState {
    pub pitch: f32,
    pub bank: f32,
    pub turn: f32,
    pub target_pitch: f32,
    pub target_bank: f32,
    pub target_turn: f32,
}

impl Default for AngularState {
    fn default() -> Self {
        Self::level()
    }
}

impl AngularState {
    pub fn level() -> Self {
        Self {
            pitch: LEVEL_FLIGHT,
            bank: LEVEL_FLIGHT,
            turn: 0.0,
            target_pitch: LEVEL_FLIGHT,
            target_bank: LEVEL_FLIGHT,
            target_turn: 0.0,
        }
    }

    pub fn set_targets_from_telemetry(&mut self, sample: &TelemetrySample) {
        self.target_pitch = AxisMapping::PITCH.target(sample.pitch);
        self.target_bank = AxisMapping::BANK.target(sample.bank);
    }

    /// Ease pitch and bank one frame toward their targets.
    pub fn advance(&mut self, easing: &Easing) {
        if let Some(period) = easing.wrap_period {
            self.target_pitch = wrap_angle(self.target_pitch, period);
            self.target_bank = wrap_angle(self.target_bank, period);
        }
        self.pitch = ease_circular(self.pitch, self.target_pitch, easing);
        self.bank = ease_circular(self.bank, self.target_bank, easing);
        debug_assert!(self.pitch.is_finite() && self.bank.is_finite());
    }

    /// True once both eased axes sit exactly on their targets.
    pub fn is_settled(&self) -> bool {
        self.pitch == self.target_pitch && self.bank == self.target_bank
    }

    /// Roll about Z by bank, then pitch about X.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_z(self.bank) * Mat4::from_rotation_x(self.pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound_takes_short_arc() {
        let easing = Easing::default();
        let next = ease_circular(0.05, 6.2, &easing);
        assert!(next < 0.05, "expected downward step, got {next}");

        let next = ease_circular(6.2, 0.05, &easing);
        assert!(next > 6.2, "expected upward step, got {next}");
    }

    #[test]
    fn test_direct_path_when_shorter() {
        let easing = Easing::default();
        let next = ease_circular(1.0, 2.0, &easing);
        assert!((next - 1.25).abs() < 1e-6);

        let next = ease_circular(2.0, 1.0, &easing);
        assert!((next - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_tie_keeps_direct_path() {
        // exactly half a period apart in either direction
        assert_eq!(shortest_delta(0.0, 2.0, 4.0), 2.0);
        assert_eq!(shortest_delta(2.0, 0.0, 4.0), -2.0);
    }

    #[test]
    fn test_snaps_inside_epsilon() {
        let easing = Easing::default();
        assert_eq!(ease_circular(1.0, 1.00005, &easing), 1.00005);
        assert_eq!(ease_circular(1.0, 1.0, &easing), 1.0);
    }

    #[test]
    fn test_unwrapped_easing_ignores_period() {
        let easing = Easing {
            wrap_period: None,
            ..Easing::default()
        };
        let next = ease_circular(0.05, 6.2, &easing);
        assert!(next > 0.05);
    }

    #[test]
    fn test_convergence_is_bounded_and_monotonic() {
        let easing = Easing::default();
        let steps = 32;
        for i in 0..steps {
            for j in 0..steps {
                let start = i as f32 / steps as f32 * TAU;
                let target = j as f32 / steps as f32 * TAU;

                let mut current = start;
                let mut remaining = shortest_delta(current, target, TAU).abs();
                let mut n = 0;
                while current != target {
                    current = ease_circular(current, target, &easing);
                    let now = if current == target {
                        0.0
                    } else {
                        shortest_delta(current, target, TAU).abs()
                    };
                    assert!(now <= remaining + 1e-5, "overshoot from {start} to {target}");
                    remaining = now;
                    n += 1;
                    assert!(n <= 40, "no convergence from {start} to {target}");
                }
            }
        }
    }

    #[test]
    fn test_wrap_angle_range() {
        assert_eq!(wrap_angle(TAU, TAU), 0.0);
        assert_eq!(wrap_angle(-1e-9, TAU), 0.0);
        assert!((wrap_angle(TAU + 1.0, TAU) - 1.0).abs() < 1e-5);
        assert!((wrap_angle(-1.0, TAU) - (TAU - 1.0)).abs() < 1e-5);
    }

    #[test]
    fn test_full_scale_bank_settles() {
        let easing = Easing::default();
        let mut state = AngularState::level();
        state.bank = 0.01;
        state.target_bank = AxisMapping::BANK.angle(65535);
        for _ in 0..200 {
            state.advance(&easing);
        }
        assert!(state.is_settled());
        assert!((0.0..TAU).contains(&state.bank));
    }

    /// Bank target sweeping a full turn every 20 s, sampled at 30 Hz,
    /// eased at 60 Hz for several turns.
    fn roll_continuously(direction: f32) {
        let easing = Easing::default();
        let mut state = AngularState::level();
        state.bank = 0.0;
        let mut target = 0.0;
        let turn_per_second = TAU / 20.0;

        for frame in 0..60 * 90 {
            let t = frame as f32 / 60.0;
            if frame % 2 == 0 {
                let raw = ((direction * t * turn_per_second).rem_euclid(TAU) / TAU * RAW_FULL_SCALE) as u32;
                target = AxisMapping::BANK.angle(raw);
            }
            state.target_bank = target;

            let before = state.bank;
            state.advance(&easing);
            let step = shortest_delta(before, state.bank, TAU).abs();
            assert!(step < 0.1, "bank jumped {step} rad at frame {frame}");
            assert!((0.0..TAU).contains(&state.bank), "bank {} out of range", state.bank);
        }
    }

    #[test]
    fn test_continuous_roll_forward_stays_on_short_arc() {
        roll_continuously(1.0);
    }

    #[test]
    fn test_continuous_roll_backward_stays_on_short_arc() {
        roll_continuously(-1.0);
    }

    #[test]
    fn test_mappings() {
        assert!((AxisMapping::PITCH.angle(0) - PI * 0.5).abs() < 1e-6);
        assert!((AxisMapping::PITCH.angle(65535) - PI * 1.5).abs() < 1e-5);
        assert!((AxisMapping::BANK.angle(65535) - TAU).abs() < 1e-5);
        assert!((AxisMapping::PITCH.angle(32768) - PI).abs() < 1e-4);
    }

    #[test]
    fn test_stale_axis_targets_level() {
        let stale = AxisSample {
            raw: 12345,
            updated_at_nanos: 0,
        };
        assert_eq!(AxisMapping::PITCH.target(stale), LEVEL_FLIGHT);
        assert_eq!(AxisMapping::BANK.target(stale), LEVEL_FLIGHT);
    }

    #[test]
    fn test_advance_leaves_turn_alone() {
        let mut state = AngularState::level();
        state.target_turn = 1.0;
        state.advance(&Easing::default());
        assert_eq!(state.turn, 0.0);
    }

    #[test]
    fn test_level_model_matrix() {
        let state = AngularState::level();
        let m = state.model_matrix();
        // half turn about Z then X: +Z maps to -Z
        let z = m.transform_vector3(glam::Vec3::Z);
        assert!((z - glam::Vec3::NEG_Z).length() < 1e-5);
    }
}
