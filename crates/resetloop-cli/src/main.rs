mod logging;
mod output;
mod run;

use clap::Parser;
use run::{RunExit, RunOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "resetloop",
    about = "Factory-reset stress test: reset an adb device, time the reboot to setup, repeat",
    version
)]
struct Cli {
    /// Serial number of the target device, as listed by `adb devices`
    serial: String,

    /// Number of reset cycles to run
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    cycles: u32,

    /// Directory for the log, CSV and bugreport files
    #[arg(long, short = 'o', env = "RESETLOOP_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// YAML file overriding timings and device markers
    #[arg(long, env = "RESETLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the adb binary (default: search PATH)
    #[arg(long, env = "RESETLOOP_ADB")]
    adb: Option<PathBuf>,

    /// Give up waiting for the device to reappear after this many seconds
    #[arg(long, value_name = "SECS")]
    reachable_timeout: Option<u64>,

    /// Give up waiting for boot completion after this many seconds
    #[arg(long, value_name = "SECS")]
    boot_timeout: Option<u64>,

    /// Give up waiting for the setup screen after this many seconds
    #[arg(long, value_name = "SECS")]
    setup_timeout: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long, short = 'j')]
    json: bool,
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        RunOptions {
            serial: cli.serial,
            cycles: cli.cycles,
            output_dir: cli.output_dir,
            config: cli.config,
            adb: cli.adb,
            reachable_timeout: cli.reachable_timeout,
            boot_timeout: cli.boot_timeout,
            setup_timeout: cli.setup_timeout,
            json: cli.json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run::run(cli.into()) {
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<RunExit>().map_or(1, RunExit::exit_code);
        std::process::exit(code);
    }
}
