//! Scripted `DeviceControl` for driver and orchestrator tests.
//!
//! Each factory reset consumes one [`CyclePlan`]. Device behaviour after the
//! reset is a function of time elapsed on the shared [`ManualClock`], so the
//! driver's own polling decides what it observes.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::clock::{Clock, ManualClock};
use crate::device::DeviceControl;
use crate::error::{ResetError, Result};
use crate::types::CommandOutput;

/// Offsets are measured from the moment the reset command is received.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub elevate: CommandOutput,
    pub reset: CommandOutput,
    pub skip: CommandOutput,
    /// `None` means the device never drops off the listing.
    pub offline_at: Option<Duration>,
    /// Listed as `offline` instead of vanishing while rebooting.
    pub listed_offline: bool,
    pub reachable_at: Duration,
    pub boot_at: Duration,
    pub setup_at: Duration,
}

pub const OFFLINE_AFTER: Duration = Duration::from_secs(4);

impl CyclePlan {
    /// Reboot measured by the driver: 120 s.
    pub fn normal() -> Self {
        Self {
            elevate: CommandOutput::ok("restarting adbd as root\n"),
            reset: CommandOutput::ok("Broadcasting: Intent { act=android.intent.action.FACTORY_RESET }\n"),
            skip: CommandOutput::ok("Broadcast completed: result=0\n"),
            offline_at: Some(OFFLINE_AFTER),
            listed_offline: false,
            reachable_at: Duration::from_secs(64),
            boot_at: Duration::from_secs(94),
            setup_at: Duration::from_secs(124),
        }
    }

    /// Setup screen appears `secs` after the device went offline, which is
    /// exactly what the driver reports. `secs` must be a multiple of 5, >= 120.
    pub fn reboot_secs(secs: u64) -> Self {
        Self {
            setup_at: OFFLINE_AFTER + Duration::from_secs(secs),
            ..Self::normal()
        }
    }

    pub fn elevate(mut self, out: CommandOutput) -> Self {
        self.elevate = out;
        self
    }

    pub fn reset(mut self, out: CommandOutput) -> Self {
        self.reset = out;
        self
    }

    pub fn skip(mut self, out: CommandOutput) -> Self {
        self.skip = out;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Elevate,
    ListDevices,
    GetProperty(String),
    DumpWindows,
    Broadcast(String),
    Bugreport(PathBuf),
}

pub struct FakeDevice<'a> {
    clock: &'a ManualClock,
    serial: String,
    plans: VecDeque<CyclePlan>,
    active: Option<CyclePlan>,
    reset_at: Option<Instant>,
    pub calls: Vec<Call>,
    pub fail_bugreport: bool,
    pub bridge_gone: bool,
    /// The bridge cannot be started for the test-mode broadcast only.
    pub skip_unreachable: bool,
}

impl<'a> FakeDevice<'a> {
    pub fn new(clock: &'a ManualClock, serial: &str, plans: Vec<CyclePlan>) -> Self {
        Self {
            clock,
            serial: serial.to_string(),
            plans: plans.into(),
            active: None,
            reset_at: None,
            calls: Vec::new(),
            fail_bugreport: false,
            bridge_gone: false,
            skip_unreachable: false,
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn resets(&self) -> usize {
        self.count(|c| matches!(c, Call::Broadcast(cmd) if cmd.contains("FACTORY_RESET")))
    }

    pub fn bugreports(&self) -> Vec<PathBuf> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Bugreport(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    fn since_reset(&self) -> Option<Duration> {
        self.reset_at
            .map(|at| self.clock.now().saturating_duration_since(at))
    }

    fn plan(&self) -> Option<&CyclePlan> {
        self.active.as_ref()
    }

    fn reachable(&self) -> bool {
        match (self.plan(), self.since_reset()) {
            (Some(plan), Some(t)) => match plan.offline_at {
                Some(off) if t >= off => t >= plan.reachable_at,
                _ => true,
            },
            _ => true,
        }
    }

    fn reached(&self, pick: impl Fn(&CyclePlan) -> Duration) -> bool {
        match (self.plan(), self.since_reset()) {
            (Some(plan), Some(t)) => self.reachable() && t >= pick(plan),
            _ => true,
        }
    }

    fn check_bridge(&self) -> Result<()> {
        if self.bridge_gone {
            return Err(ResetError::BridgeSpawnFailed("No such file or directory".into()));
        }
        Ok(())
    }
}

impl DeviceControl for FakeDevice<'_> {
    fn elevate(&mut self) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::Elevate);
        self.active = Some(self.plans.pop_front().unwrap_or_else(CyclePlan::normal));
        self.reset_at = None;
        Ok(self.active.as_ref().map(|p| p.elevate.clone()).unwrap_or_default())
    }

    fn list_devices(&mut self) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::ListDevices);
        let mut out = String::from("List of devices attached\n");
        if self.reachable() {
            out.push_str(&format!("{}\tdevice\n", self.serial));
        } else if self.plan().is_some_and(|p| p.listed_offline) {
            out.push_str(&format!("{}\toffline\n", self.serial));
        }
        out.push_str("OTHER42\tdevice\n\n");
        Ok(CommandOutput::ok(out))
    }

    fn get_property(&mut self, name: &str) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::GetProperty(name.to_string()));
        if !self.reachable() {
            return Ok(CommandOutput::failed(1, "error: device offline"));
        }
        let value = if self.reached(|p| p.boot_at) { "1\n" } else { "\n" };
        Ok(CommandOutput::ok(value))
    }

    fn dump_windows(&mut self) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::DumpWindows);
        if !self.reachable() {
            return Ok(CommandOutput::failed(1, "error: device offline"));
        }
        let focus = if self.reached(|p| p.setup_at) {
            "com.google.android.wearable.setupwizard/SetupWizardActivity"
        } else {
            "com.google.android.apps.wearable.bootanimation/BootActivity"
        };
        Ok(CommandOutput::ok(format!(
            "WINDOW MANAGER WINDOWS (dumpsys window windows)\n  mCurrentFocus=Window{{1a2b u0 {focus}}}\n"
        )))
    }

    fn broadcast(&mut self, command: &str) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::Broadcast(command.to_string()));
        let plan = self.active.clone().unwrap_or_else(CyclePlan::normal);
        if command.contains("FACTORY_RESET") {
            if plan.reset.success() {
                self.reset_at = Some(self.clock.now());
            }
            Ok(plan.reset)
        } else if self.skip_unreachable {
            Err(ResetError::BridgeSpawnFailed(
                "adb: Resource temporarily unavailable".into(),
            ))
        } else {
            Ok(plan.skip)
        }
    }

    fn bugreport(&mut self, dest: &Path) -> Result<CommandOutput> {
        self.check_bridge()?;
        self.calls.push(Call::Bugreport(dest.to_path_buf()));
        if self.fail_bugreport {
            return Ok(CommandOutput::failed(1, "bugreport: device busy"));
        }
        std::fs::write(dest, b"PK\x03\x04")?;
        Ok(CommandOutput::ok(""))
    }
}
