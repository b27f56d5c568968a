//! Repeats the reset cycle for the configured count and records each result.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::{secs, RunConfig};
use crate::device::DeviceControl;
use crate::driver::CycleDriver;
use crate::error::Result;
use crate::sink::ResultSink;
use crate::types::{CycleFailure, CycleResult, RunSummary, FILE_STAMP_FORMAT};

/// Strictly greater than: a reboot of exactly the threshold is normal.
pub fn is_anomalous(reboot: Duration, threshold: Duration) -> bool {
    reboot > threshold
}

pub fn bugreport_file_name(cycle: u32, at: &DateTime<Local>) -> String {
    format!("bugreport_cycle_{cycle}_{}.zip", at.format(FILE_STAMP_FORMAT))
}

pub struct Orchestrator<'a, D, C, S> {
    config: &'a RunConfig,
    device: D,
    clock: C,
    sink: S,
}

impl<'a, D, C, S> Orchestrator<'a, D, C, S>
where
    D: DeviceControl,
    C: Clock,
    S: ResultSink,
{
    pub fn new(config: &'a RunConfig, device: D, clock: C, sink: S) -> Self {
        Self {
            config,
            device,
            clock,
            sink,
        }
    }

    /// Run up to `config.cycles` cycles.
    ///
    /// A hard cycle failure ends the run early and is reported in
    /// [`RunSummary::aborted`]; rows already written stay. Only errors that
    /// are not about the device (a result file that cannot be written) come
    /// back as `Err`.
    pub fn run(&mut self) -> Result<RunSummary> {
        let total = self.config.cycles;
        let threshold = self.config.timing.anomaly_threshold();
        let mut summary = RunSummary::new(self.config.serial.clone(), total);

        for cycle in 1..=total {
            info!("===== Cycle {cycle} START =====");
            let cycle_start = self.clock.now();

            let outcome =
                CycleDriver::new(&mut self.device, &self.clock, self.config).run_cycle();
            let report = match outcome {
                Ok(report) => report,
                Err(e) if e.is_cycle_failure() => {
                    error!(cycle, "Factory reset failed at cycle {cycle}: {e}");
                    summary.aborted = Some(CycleFailure {
                        cycle,
                        reason: e.to_string(),
                    });
                    break;
                }
                Err(e) => return Err(e),
            };

            let anomaly = is_anomalous(report.reboot_duration, threshold);
            if anomaly {
                warn!(
                    cycle,
                    "Reboot time exceeded {}s ({:.2} seconds)",
                    threshold.as_secs(),
                    report.reboot_duration.as_secs_f64()
                );
                self.capture_diagnostics(cycle);
            }

            let result = CycleResult::from_report(cycle, &report, anomaly);
            self.sink.append(&self.config.serial, &result)?;
            summary.results.push(result);

            let cycle_total = self.clock.now().saturating_duration_since(cycle_start);
            info!(
                "Cycle {cycle}'s total execution time is {:.2} minutes",
                cycle_total.as_secs_f64() / 60.0
            );
            info!("===== Cycle {cycle} COMPLETE =====");

            if cycle < total {
                self.clock.sleep(secs(self.config.timing.inter_cycle_secs));
            }
        }

        Ok(summary)
    }

    /// Best effort: a failed capture is logged and the cycle still counts.
    fn capture_diagnostics(&mut self, cycle: u32) {
        info!("Capturing bugreport for cycle {cycle}");
        let name = bugreport_file_name(cycle, &self.clock.wall());
        let dest = self.config.output_dir.join(name);
        match self.device.bugreport(&dest) {
            Ok(out) if out.success() => info!("Bugreport saved to {}", dest.display()),
            Ok(out) => warn!("Bugreport for cycle {cycle} failed: {}", out.failure_detail()),
            Err(e) => warn!("Bugreport for cycle {cycle} failed: {e}"),
        }
    }
}
