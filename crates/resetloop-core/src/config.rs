use crate::error::{ResetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// Poll intervals, wait budgets and fixed delays, all in whole seconds.
///
/// `None` on a `*_timeout_secs` field means the wait never gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(default = "default_offline_poll")]
    pub offline_poll_secs: u64,
    #[serde(default = "default_offline_timeout")]
    pub offline_timeout_secs: u64,
    #[serde(default = "default_status_poll")]
    pub reachable_poll_secs: u64,
    #[serde(default)]
    pub reachable_timeout_secs: Option<u64>,
    #[serde(default = "default_status_poll")]
    pub boot_poll_secs: u64,
    #[serde(default)]
    pub boot_timeout_secs: Option<u64>,
    #[serde(default = "default_status_poll")]
    pub setup_poll_secs: u64,
    #[serde(default)]
    pub setup_timeout_secs: Option<u64>,
    #[serde(default = "default_stabilize")]
    pub stabilize_secs: u64,
    #[serde(default = "default_post_skip")]
    pub post_skip_secs: u64,
    #[serde(default = "default_inter_cycle")]
    pub inter_cycle_secs: u64,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold_secs: u64,
}

fn default_offline_poll() -> u64 {
    2
}

fn default_offline_timeout() -> u64 {
    60
}

fn default_status_poll() -> u64 {
    5
}

fn default_stabilize() -> u64 {
    80
}

fn default_post_skip() -> u64 {
    120
}

fn default_inter_cycle() -> u64 {
    10
}

fn default_anomaly_threshold() -> u64 {
    900
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            offline_poll_secs: default_offline_poll(),
            offline_timeout_secs: default_offline_timeout(),
            reachable_poll_secs: default_status_poll(),
            reachable_timeout_secs: None,
            boot_poll_secs: default_status_poll(),
            boot_timeout_secs: None,
            setup_poll_secs: default_status_poll(),
            setup_timeout_secs: None,
            stabilize_secs: default_stabilize(),
            post_skip_secs: default_post_skip(),
            inter_cycle_secs: default_inter_cycle(),
            anomaly_threshold_secs: default_anomaly_threshold(),
        }
    }
}

impl TimingConfig {
    pub fn anomaly_threshold(&self) -> Duration {
        Duration::from_secs(self.anomaly_threshold_secs)
    }
}

pub(crate) fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

// ---------------------------------------------------------------------------
// DeviceProfile
// ---------------------------------------------------------------------------

/// Device-side command strings and the text markers the driver looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceProfile {
    #[serde(default = "default_reset_command")]
    pub reset_command: String,
    #[serde(default = "default_skip_setup_command")]
    pub skip_setup_command: String,
    #[serde(default = "default_boot_property")]
    pub boot_property: String,
    #[serde(default = "default_boot_done_value")]
    pub boot_done_value: String,
    #[serde(default = "default_setup_markers")]
    pub setup_markers: Vec<String>,
    #[serde(default = "default_denial_phrase")]
    pub denial_phrase: String,
}

fn default_reset_command() -> String {
    "am broadcast -a android.intent.action.FACTORY_RESET -n android/com.android.server.MasterClearReceiver"
        .to_string()
}

fn default_skip_setup_command() -> String {
    "am broadcast -a com.google.android.clockwork.action.TEST_MODE".to_string()
}

fn default_boot_property() -> String {
    "sys.boot_completed".to_string()
}

fn default_boot_done_value() -> String {
    "1".to_string()
}

fn default_setup_markers() -> Vec<String> {
    vec!["Tap to Begin".to_string(), "SetupWizard".to_string()]
}

fn default_denial_phrase() -> String {
    "adbd cannot run as root".to_string()
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            reset_command: default_reset_command(),
            skip_setup_command: default_skip_setup_command(),
            boot_property: default_boot_property(),
            boot_done_value: default_boot_done_value(),
            setup_markers: default_setup_markers(),
            denial_phrase: default_denial_phrase(),
        }
    }
}

impl DeviceProfile {
    /// Case-insensitive check for the root-denial message.
    pub fn is_denial(&self, stdout: &str) -> bool {
        stdout
            .to_lowercase()
            .contains(&self.denial_phrase.to_lowercase())
    }

    pub fn shows_setup_screen(&self, window_dump: &str) -> bool {
        self.setup_markers
            .iter()
            .any(|marker| window_dump.contains(marker.as_str()))
    }
}

// ---------------------------------------------------------------------------
// ConfigFile
// ---------------------------------------------------------------------------

/// On-disk overrides, e.g.
///
/// ```yaml
/// timing:
///   boot_timeout_secs: 1200
/// device:
///   setup_markers: ["Tap to Begin"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub device: DeviceProfile,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_yaml::from_str(&data)?;
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Everything a run needs, fixed before the first cycle starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub serial: String,
    pub cycles: u32,
    pub output_dir: PathBuf,
    pub timing: TimingConfig,
    pub device: DeviceProfile,
}

impl RunConfig {
    pub fn new(serial: impl Into<String>, cycles: u32) -> Self {
        Self {
            serial: serial.into(),
            cycles,
            output_dir: PathBuf::from("."),
            timing: TimingConfig::default(),
            device: DeviceProfile::default(),
        }
    }

    pub fn with_file(mut self, file: ConfigFile) -> Self {
        self.timing = file.timing;
        self.device = file.device;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.trim().is_empty() {
            return Err(ResetError::InvalidConfig("device serial is empty".into()));
        }
        if self.cycles == 0 {
            return Err(ResetError::InvalidConfig(
                "cycle count must be a positive integer".into(),
            ));
        }
        if self.device.setup_markers.iter().all(|m| m.is_empty()) {
            return Err(ResetError::InvalidConfig(
                "device.setup_markers needs at least one non-empty marker".into(),
            ));
        }
        if self.device.boot_property.trim().is_empty() {
            return Err(ResetError::InvalidConfig(
                "device.boot_property is empty".into(),
            ));
        }
        Ok(())
    }
}
