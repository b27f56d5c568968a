//! One factory-reset cycle: root, reset, wait for the reboot to land on the
//! setup screen, then put the device into test mode for the next cycle.

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{secs, RunConfig};
use crate::device::{state_of, DeviceControl, DeviceState};
use crate::error::{ResetError, Result};
use crate::poll::{poll_until, PollOutcome, PollSpec, TimeoutPolicy};
use crate::types::{format_timestamp, CycleReport, Phase};

pub struct CycleDriver<'a, D: ?Sized, C: ?Sized> {
    device: &'a mut D,
    clock: &'a C,
    config: &'a RunConfig,
}

impl<'a, D, C> CycleDriver<'a, D, C>
where
    D: DeviceControl + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(device: &'a mut D, clock: &'a C, config: &'a RunConfig) -> Self {
        Self {
            device,
            clock,
            config,
        }
    }

    /// Run every phase in order.
    ///
    /// Errors are hard failures for the whole run. A failed setup skip is
    /// not: it is logged and reported through `setup_skipped`.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.acquire_elevation()?;
        self.trigger_reset()?;
        self.await_offline()?;

        let reboot_start = self.clock.now();
        self.await_reachable()?;
        self.await_boot_completed()?;
        self.await_setup_screen()?;
        let reboot_duration = self.clock.now().saturating_duration_since(reboot_start);
        let completed_at = self.clock.wall();
        info!(
            "Reboot + setup screen completed in {:.2} seconds at {}",
            reboot_duration.as_secs_f64(),
            format_timestamp(&completed_at)
        );

        self.settle(Phase::Stabilize, self.config.timing.stabilize_secs);

        let setup_skipped = self.skip_setup();
        if setup_skipped {
            self.settle(Phase::PostSkipStabilize, self.config.timing.post_skip_secs);
        }

        Ok(CycleReport {
            reboot_duration,
            completed_at,
            setup_skipped,
        })
    }

    fn settle(&self, phase: Phase, seconds: u64) {
        info!(phase = %phase, "Waiting {seconds} seconds for the device to settle");
        self.clock.sleep(secs(seconds));
    }

    pub fn acquire_elevation(&mut self) -> Result<()> {
        info!(phase = %Phase::AcquireElevation, "Gaining adb root before factory reset...");
        let out = self.device.elevate()?;
        if !out.success() {
            return Err(ResetError::ElevationFailed(out.failure_detail()));
        }
        // Some adbd builds exit 0 and only say so in the text.
        if self.config.device.is_denial(&out.stdout) {
            return Err(ResetError::ElevationDenied);
        }
        info!("adb root granted");
        Ok(())
    }

    pub fn trigger_reset(&mut self) -> Result<()> {
        info!(phase = %Phase::TriggerReset, "Initiating factory reset");
        let out = self.device.broadcast(&self.config.device.reset_command)?;
        if !out.success() {
            return Err(ResetError::ResetTriggerFailed(out.failure_detail()));
        }
        Ok(())
    }

    /// Soft-bounded: after the offline budget the cycle carries on.
    pub fn await_offline(&mut self) -> Result<PollOutcome> {
        info!(phase = %Phase::AwaitOffline, "Waiting for device to go offline...");
        let timing = &self.config.timing;
        let spec = PollSpec::unbounded(Phase::AwaitOffline, secs(timing.offline_poll_secs))
            .timeout(
                Some(secs(timing.offline_timeout_secs)),
                TimeoutPolicy::Continue,
            )
            .delay_first();
        let serial = self.config.serial.as_str();
        let device = &mut *self.device;
        let outcome = poll_until(self.clock, &spec, || {
            let listing = device.list_devices()?;
            Ok(matches!(
                state_of(&listing.stdout, serial),
                None | Some(DeviceState::Offline)
            ))
        })?;
        match outcome {
            PollOutcome::Satisfied { .. } => info!("Device went offline, reset in progress"),
            PollOutcome::GaveUp { elapsed, .. } => warn!(
                "Device still listed after {}s, continuing anyway",
                elapsed.as_secs()
            ),
        }
        Ok(outcome)
    }

    pub fn await_reachable(&mut self) -> Result<PollOutcome> {
        info!(
            phase = %Phase::AwaitReachable,
            "Waiting for device to come back online after reset..."
        );
        let timing = &self.config.timing;
        let spec = PollSpec::unbounded(Phase::AwaitReachable, secs(timing.reachable_poll_secs))
            .timeout(timing.reachable_timeout_secs.map(secs), TimeoutPolicy::Fail)
            .delay_first();
        let serial = self.config.serial.as_str();
        let device = &mut *self.device;
        let outcome = poll_until(self.clock, &spec, || {
            let listing = device.list_devices()?;
            Ok(state_of(&listing.stdout, serial) == Some(DeviceState::Ready))
        })?;
        info!("Device detected by adb");
        Ok(outcome)
    }

    pub fn await_boot_completed(&mut self) -> Result<PollOutcome> {
        info!(phase = %Phase::AwaitBootCompleted, "Waiting for boot to complete...");
        let timing = &self.config.timing;
        let profile = &self.config.device;
        let spec = PollSpec::unbounded(Phase::AwaitBootCompleted, secs(timing.boot_poll_secs))
            .timeout(timing.boot_timeout_secs.map(secs), TimeoutPolicy::Fail);
        let device = &mut *self.device;
        let outcome = poll_until(self.clock, &spec, || {
            let out = device.get_property(&profile.boot_property)?;
            Ok(out.success() && out.stdout.trim() == profile.boot_done_value)
        })?;
        info!("System boot completed");
        Ok(outcome)
    }

    pub fn await_setup_screen(&mut self) -> Result<PollOutcome> {
        info!(phase = %Phase::AwaitSetupScreen, "Waiting for setup (Tap to Begin) screen...");
        let timing = &self.config.timing;
        let profile = &self.config.device;
        let spec = PollSpec::unbounded(Phase::AwaitSetupScreen, secs(timing.setup_poll_secs))
            .timeout(timing.setup_timeout_secs.map(secs), TimeoutPolicy::Fail);
        let device = &mut *self.device;
        let outcome = poll_until(self.clock, &spec, || {
            let out = device.dump_windows()?;
            Ok(out.success() && profile.shows_setup_screen(&out.stdout))
        })?;
        info!("Setup screen detected");
        Ok(outcome)
    }

    /// Returns whether the device accepted the test-mode broadcast. Any
    /// failure here, including the bridge not running, only degrades the
    /// cycle.
    pub fn skip_setup(&mut self) -> bool {
        info!(phase = %Phase::SkipSetup, "Skipping setup, starting test mode");
        match self.device.broadcast(&self.config.device.skip_setup_command) {
            Ok(out) if out.success() => true,
            Ok(out) => {
                warn!("Failed to start test mode: {}", out.failure_detail());
                false
            }
            Err(e) => {
                warn!("Failed to start test mode: {e}");
                false
            }
        }
    }
}
