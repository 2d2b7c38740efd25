//! Instrument configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::attitude::{Axis, Easing};
use crate::error::{AdiError, AdiResult};
use crate::mesh::{BallOptions, MAX_VERTICES};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdiConfig {
    pub ball: BallOptions,
    pub easing: Easing,
    pub display: DisplayConfig,
    pub telemetry: TelemetryConfig,
}

impl AdiConfig {
    pub fn load(path: &Path) -> AdiResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AdiConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AdiResult<()> {
        let ball = &self.ball;
        if !(ball.radius.is_finite() && ball.radius > 0.0) {
            return Err(invalid(format!("ball.radius must be positive, got {}", ball.radius)));
        }
        if ball.columns < 1 {
            return Err(invalid("ball.columns must be at least 1"));
        }
        if ball.rows < 3 {
            return Err(invalid("ball.rows must be at least 3"));
        }
        if ball.vertex_count() > MAX_VERTICES {
            return Err(invalid(format!(
                "ball grid needs {} vertices, at most {} fit u16 indices",
                ball.vertex_count(),
                MAX_VERTICES
            )));
        }
        if !(ball.band_span_deg.is_finite() && ball.band_start_deg.is_finite()) {
            return Err(invalid("ball band angles must be finite"));
        }

        let easing = &self.easing;
        if !(easing.factor > 0.0 && easing.factor <= 1.0) {
            return Err(invalid(format!("easing.factor must be in (0, 1], got {}", easing.factor)));
        }
        if !(easing.epsilon > 0.0 && easing.epsilon.is_finite()) {
            return Err(invalid("easing.epsilon must be positive"));
        }
        if let Some(period) = easing.wrap_period {
            if !(period > 0.0 && period.is_finite()) {
                return Err(invalid("easing.wrap_period must be positive"));
            }
        }

        let display = &self.display;
        if !(display.width_in > 0.0 && display.height_in > 0.0) {
            return Err(invalid("display dimensions must be positive"));
        }
        if display.far <= display.near {
            return Err(invalid("display.far must be beyond display.near"));
        }

        if self.telemetry.endpoint.trim().is_empty() {
            return Err(invalid("telemetry.endpoint is empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AdiError {
    AdiError::InvalidConfig(msg.into())
}

/// Physical display and camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Visible width in inches
    pub width_in: f32,
    /// Visible height in inches
    pub height_in: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: [f32; 3],
    pub window_width: u32,
    pub window_height: u32,
    pub title: String,
    /// PNG for the ball face; a generated face is used when absent
    pub texture: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width_in: 3.36,
            height_in: 4.48,
            near: 0.0,
            far: 200.0,
            camera_position: [0.0, 20.0, 100.0],
            window_width: 480,
            window_height: 640,
            title: "ADI".to_string(),
            texture: None,
        }
    }
}

impl DisplayConfig {
    /// Orthographic projection in display inches, origin at the centre.
    pub fn projection(&self) -> Mat4 {
        let half_w = self.width_in * 0.5;
        let half_h = self.height_in * 0.5;
        Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
    }

    pub fn camera(&self) -> Vec3 {
        Vec3::from_array(self.camera_position)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera(), Vec3::ZERO, Vec3::Y)
    }
}

/// What the ingestion adapter does with a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicAction {
    Pitch,
    Bank,
    Turn,
    SessionReset,
    /// Subscribed for diagnostics only
    Log,
}

impl TopicAction {
    pub fn axis(&self) -> Option<Axis> {
        match self {
            TopicAction::Pitch => Some(Axis::Pitch),
            TopicAction::Bank => Some(Axis::Bank),
            TopicAction::Turn => Some(Axis::Turn),
            TopicAction::SessionReset | TopicAction::Log => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub topic: String,
    pub action: TopicAction,
}

impl TopicConfig {
    fn new(topic: &str, action: TopicAction) -> Self {
        Self {
            topic: topic.to_string(),
            action,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// ZeroMQ endpoint of the publisher
    pub endpoint: String,
    pub topics: Vec<TopicConfig>,
    /// Receive timeout; bounds how long shutdown waits on the socket
    pub recv_timeout_ms: i32,
    /// First reconnect delay
    pub reconnect_ms: i32,
    /// Reconnect delay ceiling; the delay doubles up to here
    pub reconnect_max_ms: i32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        use TopicAction::*;

        let topics = vec![
            TopicConfig::new("dcs-bios/output/adi/adi_pitch", Pitch),
            TopicConfig::new("dcs-bios/output/adi/adi_bank", Bank),
            TopicConfig::new("dcs-bios/output/adi/adi_turn", Turn),
            TopicConfig::new("dcs-bios/output/adi/adi_slip", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_gs", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_steer_bank", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_steer_pitch", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_pitch_trim", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_attwarn_flag", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_crswarn_flag", Log),
            TopicConfig::new("dcs-bios/output/adi/adi_gswarn_flag", Log),
            TopicConfig::new("dcs-bios/output/light_system_control_panel/lcp_flight_inst", Log),
            TopicConfig::new("dcs-bios/output/metadata/_acft_name", Log),
            TopicConfig::new("dcs-bios/goodbye", SessionReset),
        ];

        Self {
            endpoint: "tcp://127.0.0.1:5556".to_string(),
            topics,
            recv_timeout_ms: 100,
            reconnect_ms: 2_000,
            reconnect_max_ms: 64_000,
        }
    }
}

impl TelemetryConfig {
    /// First topic bound to `action`.
    pub fn topic_for(&self, action: TopicAction) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| t.action == action)
            .map(|t| t.topic.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        AdiConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "easing": { "factor": 0.5 }, "telemetry": { "endpoint": "tcp://10.0.0.2:6000" } }"#;
        let config: AdiConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.easing.factor, 0.5);
        assert_eq!(config.easing.epsilon, 1e-4);
        assert_eq!(config.telemetry.endpoint, "tcp://10.0.0.2:6000");
        assert_eq!(config.ball, BallOptions::default());
        assert_eq!(
            config.telemetry.topic_for(TopicAction::SessionReset),
            Some("dcs-bios/goodbye")
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AdiConfig::default();
        config.ball.rows = 2;
        assert!(matches!(config.validate(), Err(AdiError::InvalidConfig(_))));

        let mut config = AdiConfig::default();
        config.ball.columns = 300;
        config.ball.rows = 300;
        assert!(config.validate().is_err());

        let mut config = AdiConfig::default();
        config.easing.factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = AdiConfig::default();
        config.telemetry.endpoint = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_projection_covers_display() {
        let display = DisplayConfig::default();
        let proj = display.projection();
        let corner = proj.project_point3(Vec3::new(1.68, 2.24, -1.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AdiConfig::load(Path::new("/nonexistent/adi.json")).unwrap_err();
        assert!(matches!(err, AdiError::Io(_)));
    }
}
