use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Timestamp layout used in log lines and result rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact timestamp layout used in generated file names.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S: Serializer>(at: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(at))
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Steps of a single reset cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AcquireElevation,
    TriggerReset,
    AwaitOffline,
    AwaitReachable,
    AwaitBootCompleted,
    AwaitSetupScreen,
    Stabilize,
    SkipSetup,
    PostSkipStabilize,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::AcquireElevation => "acquire_elevation",
            Phase::TriggerReset => "trigger_reset",
            Phase::AwaitOffline => "await_offline",
            Phase::AwaitReachable => "await_reachable",
            Phase::AwaitBootCompleted => "await_boot_completed",
            Phase::AwaitSetupScreen => "await_setup_screen",
            Phase::Stabilize => "stabilize",
            Phase::SkipSetup => "skip_setup",
            Phase::PostSkipStabilize => "post_skip_stabilize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Captured result of one bridge invocation.
///
/// `status` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Best human-readable explanation of a failure: stderr, else stdout,
    /// else the exit status.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle results
// ---------------------------------------------------------------------------

/// What the cycle driver reports for one completed reset cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub reboot_duration: Duration,
    pub completed_at: DateTime<Local>,
    pub setup_skipped: bool,
}

/// One row of the result set. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    pub cycle: u32,
    pub reboot_secs: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub completed_at: DateTime<Local>,
    pub anomaly: bool,
    pub setup_skipped: bool,
}

impl CycleResult {
    pub fn from_report(cycle: u32, report: &CycleReport, anomaly: bool) -> Self {
        Self {
            cycle,
            reboot_secs: report.reboot_duration.as_secs_f64(),
            completed_at: report.completed_at,
            anomaly,
            setup_skipped: report.setup_skipped,
        }
    }

    pub fn duration_cell(&self) -> String {
        format!("{:.2}", self.reboot_secs)
    }

    pub fn anomaly_cell(&self) -> &'static str {
        if self.anomaly {
            "Yes"
        } else {
            "No"
        }
    }
}

/// The cycle that stopped a run early and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleFailure {
    pub cycle: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub serial: String,
    pub cycles_requested: u32,
    pub results: Vec<CycleResult>,
    pub aborted: Option<CycleFailure>,
}

impl RunSummary {
    pub fn new(serial: impl Into<String>, cycles_requested: u32) -> Self {
        Self {
            serial: serial.into(),
            cycles_requested,
            results: Vec::new(),
            aborted: None,
        }
    }

    pub fn completed(&self) -> usize {
        self.results.len()
    }

    pub fn anomalies(&self) -> usize {
        self.results.iter().filter(|r| r.anomaly).count()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.results.len() == self.cycles_requested as usize
    }
}
