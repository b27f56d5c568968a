//! `DeviceControl` over the `adb` command-line bridge.
//!
//! Every operation is one blocking `adb` invocation. Device-scoped calls are
//! pinned to the run's serial with `-s`, so other attached devices are never
//! touched.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::device::DeviceControl;
use crate::error::{ResetError, Result};
use crate::types::CommandOutput;

#[derive(Debug, Clone)]
pub struct AdbClient {
    program: PathBuf,
    serial: String,
}

impl AdbClient {
    /// Find `adb` on `PATH`.
    pub fn locate(serial: impl Into<String>) -> Result<Self> {
        let program = which::which("adb").map_err(|_| ResetError::BridgeNotFound)?;
        Ok(Self::with_program(program, serial))
    }

    pub fn with_program(program: impl Into<PathBuf>, serial: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            serial: serial.into(),
        }
    }

    fn command(&self, device_scoped: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        if device_scoped {
            cmd.args(["-s", &self.serial]);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn run(&self, device_scoped: bool, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(program = %self.program.display(), ?args, "adb");
        let output = self
            .command(device_scoped)
            .args(args)
            .output()
            .map_err(|e| ResetError::BridgeSpawnFailed(e.to_string()))?;
        Ok(capture(output))
    }

    fn shell(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run(true, &full)
    }
}

fn capture(output: Output) -> CommandOutput {
    CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

impl DeviceControl for AdbClient {
    fn elevate(&mut self) -> Result<CommandOutput> {
        self.run(true, &["root"])
    }

    fn list_devices(&mut self) -> Result<CommandOutput> {
        self.run(false, &["devices"])
    }

    fn get_property(&mut self, name: &str) -> Result<CommandOutput> {
        self.shell(&["getprop", name])
    }

    fn dump_windows(&mut self) -> Result<CommandOutput> {
        self.shell(&["dumpsys", "window", "windows"])
    }

    fn broadcast(&mut self, command: &str) -> Result<CommandOutput> {
        // adb joins shell arguments with spaces, so the command string goes
        // through as a single argument.
        self.shell(&[command])
    }

    /// Streams into `<dest>.part` and only renames to `dest` on success, so a
    /// failed capture never leaves a file that looks like a real report.
    fn bugreport(&mut self, dest: &Path) -> Result<CommandOutput> {
        let partial = partial_path(dest);
        let file = File::create(&partial)?;
        tracing::debug!(dest = %dest.display(), "adb bugreport");
        let spawned = self
            .command(true)
            .arg("bugreport")
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .output();
        let out = match spawned {
            Ok(output) => capture(output),
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                return Err(ResetError::BridgeSpawnFailed(e.to_string()));
            }
        };
        if out.success() {
            std::fs::rename(&partial, dest)?;
        } else {
            let _ = std::fs::remove_file(&partial);
        }
        Ok(out)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
