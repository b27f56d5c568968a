//! The narrow device-control surface the cycle driver depends on.

use std::path::Path;

use crate::error::{ResetError, Result};
use crate::types::CommandOutput;

/// One call per distinct bridge operation.
///
/// Implementations return `Ok` whenever the bridge ran, whatever its exit
/// status; `Err` means the bridge itself could not be run.
pub trait DeviceControl {
    /// Restart the on-device daemon with elevated privileges.
    fn elevate(&mut self) -> Result<CommandOutput>;
    /// Raw listing of every device the bridge can see.
    fn list_devices(&mut self) -> Result<CommandOutput>;
    fn get_property(&mut self, name: &str) -> Result<CommandOutput>;
    /// Window-manager dump used to recognise what is on screen.
    fn dump_windows(&mut self) -> Result<CommandOutput>;
    /// Run an opaque shell command (broadcast intents and the like).
    fn broadcast(&mut self, command: &str) -> Result<CommandOutput>;
    /// Write a full diagnostic snapshot to `dest`.
    fn bugreport(&mut self, dest: &Path) -> Result<CommandOutput>;
}

impl<D: DeviceControl + ?Sized> DeviceControl for &mut D {
    fn elevate(&mut self) -> Result<CommandOutput> {
        (**self).elevate()
    }

    fn list_devices(&mut self) -> Result<CommandOutput> {
        (**self).list_devices()
    }

    fn get_property(&mut self, name: &str) -> Result<CommandOutput> {
        (**self).get_property(name)
    }

    fn dump_windows(&mut self) -> Result<CommandOutput> {
        (**self).dump_windows()
    }

    fn broadcast(&mut self, command: &str) -> Result<CommandOutput> {
        (**self).broadcast(command)
    }

    fn bugreport(&mut self, dest: &Path) -> Result<CommandOutput> {
        (**self).bugreport(dest)
    }
}

// ---------------------------------------------------------------------------
// Device listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Connected and accepting commands.
    Ready,
    Offline,
    Unauthorized,
    Other(String),
}

impl DeviceState {
    fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceState::Ready,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            other => DeviceState::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedDevice {
    pub serial: String,
    pub state: DeviceState,
}

/// Parse `adb devices` output. The banner line and blank lines are skipped;
/// trailing columns (as printed by `adb devices -l`) are ignored.
pub fn parse_device_list(output: &str) -> Vec<ListedDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of devices") && !l.starts_with('*'))
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let serial = cols.next()?;
            let state = cols.next()?;
            Some(ListedDevice {
                serial: serial.to_string(),
                state: DeviceState::parse(state),
            })
        })
        .collect()
}

/// State of `serial` in a device listing, `None` when it is not listed.
pub fn state_of(output: &str, serial: &str) -> Option<DeviceState> {
    parse_device_list(output)
        .into_iter()
        .find(|d| d.serial == serial)
        .map(|d| d.state)
}

/// Startup check: the serial must be listed by the bridge, in any state.
pub fn ensure_visible<D: DeviceControl + ?Sized>(
    device: &mut D,
    serial: &str,
) -> Result<DeviceState> {
    let listing = device.list_devices()?;
    if !listing.success() {
        return Err(ResetError::BridgeSpawnFailed(format!(
            "adb devices: {}",
            listing.failure_detail()
        )));
    }
    state_of(&listing.stdout, serial)
        .ok_or_else(|| ResetError::DeviceNotFound(serial.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "* daemon not running; starting now at tcp:5037\n\
* daemon started successfully\n\
List of devices attached\n\
ABC123\tdevice\n\
XYZ9\toffline\n\
emulator-5554\tunauthorized\n\
\n";

    #[test]
    fn parses_each_listed_device() {
        let devices = parse_device_list(LISTING);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "ABC123");
        assert_eq!(devices[0].state, DeviceState::Ready);
        assert_eq!(devices[1].state, DeviceState::Offline);
        assert_eq!(devices[2].state, DeviceState::Unauthorized);
    }

    #[test]
    fn long_listing_columns_are_ignored() {
        let out = "List of devices attached\nABC123  device usb:1-1 product:sawfish model:Watch\n";
        assert_eq!(state_of(out, "ABC123"), Some(DeviceState::Ready));
    }

    #[test]
    fn serial_match_is_exact() {
        assert_eq!(state_of(LISTING, "ABC12"), None);
        assert_eq!(state_of(LISTING, "XYZ9"), Some(DeviceState::Offline));
        assert_eq!(state_of("List of devices attached\n\n", "ABC123"), None);
    }

    #[test]
    fn unknown_states_are_kept() {
        let out = "List of devices attached\nABC123\trecovery\n";
        assert_eq!(
            state_of(out, "ABC123"),
            Some(DeviceState::Other("recovery".into()))
        );
    }
}
