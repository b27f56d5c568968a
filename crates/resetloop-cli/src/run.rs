use anyhow::Context;
use chrono::Local;
use resetloop_core::{
    adb::AdbClient,
    clock::SystemClock,
    config::{ConfigFile, RunConfig},
    device::{ensure_visible, DeviceState},
    orchestrator::Orchestrator,
    sink::CsvSink,
    types::FILE_STAMP_FORMAT,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::logging;
use crate::output::{print_json, print_summary};

// ---------------------------------------------------------------------------
// RunExit — typed non-zero exit codes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    Aborted { cycle: u32, reason: String },
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::Aborted { .. } => 3,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::Aborted { cycle, reason } => {
                write!(f, "run stopped at cycle {cycle}: {reason}")
            }
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub serial: String,
    pub cycles: u32,
    pub output_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub adb: Option<PathBuf>,
    pub reachable_timeout: Option<u64>,
    pub boot_timeout: Option<u64>,
    pub setup_timeout: Option<u64>,
    pub json: bool,
}

/// Build the immutable run configuration: file overrides first, then flags.
fn build_config(opts: &RunOptions) -> anyhow::Result<RunConfig> {
    let mut config = RunConfig::new(opts.serial.clone(), opts.cycles);
    if let Some(path) = &opts.config {
        let file = ConfigFile::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        config = config.with_file(file);
    }
    config.output_dir = opts.output_dir.clone();

    let timing = &mut config.timing;
    if opts.reachable_timeout.is_some() {
        timing.reachable_timeout_secs = opts.reachable_timeout;
    }
    if opts.boot_timeout.is_some() {
        timing.boot_timeout_secs = opts.boot_timeout;
    }
    if opts.setup_timeout.is_some() {
        timing.setup_timeout_secs = opts.setup_timeout;
    }

    config.validate()?;
    Ok(config)
}

/// Log and result file locations for one run, stamped with its start time.
#[derive(Debug, Clone, PartialEq)]
struct RunFiles {
    log: PathBuf,
    csv: PathBuf,
}

impl RunFiles {
    fn new(dir: &Path, stamp: &str) -> Self {
        Self {
            log: dir.join(format!("factory_reset_log_{stamp}.txt")),
            csv: dir.join(format!("factory_reset_results_{stamp}.csv")),
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(opts: RunOptions) -> anyhow::Result<()> {
    let config = build_config(&opts)?;

    let mut adb = match &opts.adb {
        Some(path) => AdbClient::with_program(path, config.serial.clone()),
        None => AdbClient::locate(config.serial.clone())?,
    };

    // Nothing is written to disk until the device is known to be attached.
    let state = ensure_visible(&mut adb, &config.serial)?;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let stamp = Local::now().format(FILE_STAMP_FORMAT).to_string();
    let files = RunFiles::new(&config.output_dir, &stamp);

    let log_file = File::create(&files.log)
        .with_context(|| format!("failed to create {}", files.log.display()))?;
    logging::init(log_file);
    let sink = CsvSink::create(&files.csv)
        .with_context(|| format!("failed to create {}", files.csv.display()))?;

    info!(
        "Starting factory reset stress test on device {} ({} cycles)",
        config.serial, config.cycles
    );
    if state != DeviceState::Ready {
        warn!("Device {} is listed as {:?}", config.serial, state);
    }

    let summary = Orchestrator::new(&config, &mut adb, SystemClock, sink)
        .run()
        .context("run aborted")?;
    info!("Test completed.");

    if opts.json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }
    println!("\nCSV results saved to: {}", files.csv.display());

    match summary.aborted {
        Some(failure) => Err(RunExit::Aborted {
            cycle: failure.cycle,
            reason: failure.reason,
        }
        .into()),
        None => Ok(()),
    }
}
