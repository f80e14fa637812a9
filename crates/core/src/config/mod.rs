use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    lighting::{EntertainmentGroup, TargetId},
    ramp::RampConfig,
    Color, Result,
};

/// Top-level configuration structure for the application.
///
/// Every section falls back to its defaults when missing from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub device_name: String,
    pub fade: FadeConfig,
    pub bridge: BridgeConfig,
    pub video: VideoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "LightEffects".to_string(),
            device_name: "MacBook".to_string(),
            fade: FadeConfig::default(),
            bridge: BridgeConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }

    /// Checks the settings that would otherwise only fail once a mode starts.
    pub fn validate(&self) -> Result<()> {
        self.fade.ramp.steps()?;
        if self.video.report_every == 0 {
            return Err(crate::LightControlError::config(
                "video.report_every must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Settings of the fade in/out effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub effect_name: String,
    #[serde(flatten)]
    pub ramp: RampConfig,
    pub base_color: Color,
    /// Index of the entertainment group whose lights are faded.
    pub group: usize,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            effect_name: "fade-effect".to_string(),
            ramp: RampConfig::default(),
            base_color: Color::WHITE,
            group: 0,
        }
    }
}

/// Description of the simulated entertainment bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub ip_address: String,
    pub groups: Vec<EntertainmentGroup>,
    /// Group already selected on the bridge; `None` makes the session pick
    /// the first one.
    pub selected_group: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ip_address: "192.168.1.2".to_string(),
            groups: vec![EntertainmentGroup {
                id: "1".to_string(),
                name: "Entertainment area".to_string(),
                lights: vec![TargetId(1), TargetId(2), TargetId(3)],
            }],
            selected_group: None,
        }
    }
}

/// Settings of the video debug mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Name of the source the operator expects to pick.
    pub source_name: String,
    pub discovery_wait_ms: u64,
    pub capture_timeout_ms: u64,
    /// Log progress every this many processed frames.
    pub report_every: u64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source_name: "TouchDesigner".to_string(),
            discovery_wait_ms: 2000,
            capture_timeout_ms: 100,
            report_every: 30,
            width: 320,
            height: 180,
            frame_rate: 30,
        }
    }
}

impl VideoConfig {
    pub fn discovery_wait(&self) -> Duration {
        Duration::from_millis(self.discovery_wait_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}
