use crate::answers::*;
use std::fmt;

/// Sync byte leading every command frame.
pub const RPLIDAR_CMD_SYNC_BYTE: u8 = 0xA5;

// Commands without response

/// Command code to stop the measurement process of the LIDAR.
pub const RPLIDAR_CMD_STOP: u8 = 0x25;

/// Command code to reset the LIDAR core. Requires re-initialization afterwards.
pub const RPLIDAR_CMD_RESET: u8 = 0x40;

// Commands with response

/// Command code to start a scan in legacy mode. The device answers with a
/// descriptor and then streams measurement nodes until stopped.
pub const RPLIDAR_CMD_SCAN: u8 = 0x20;

/// Command code to request device information (model, firmware, hardware, serial number).
pub const RPLIDAR_CMD_GET_DEVICE_INFO: u8 = 0x50;

/// Command code to request the device's health status.
pub const RPLIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x52;

/// The commands this client issues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    GetHealth,
    GetInfo,
    StartScan,
    StopScan,
    Reset,
}

impl Command {
    /// Command code following the sync byte.
    pub fn code(self) -> u8 {
        match self {
            Command::GetHealth => RPLIDAR_CMD_GET_DEVICE_HEALTH,
            Command::GetInfo => RPLIDAR_CMD_GET_DEVICE_INFO,
            Command::StartScan => RPLIDAR_CMD_SCAN,
            Command::StopScan => RPLIDAR_CMD_STOP,
            Command::Reset => RPLIDAR_CMD_RESET,
        }
    }

    /// Bytes sent verbatim to the device.
    pub fn frame(self) -> [u8; 2] {
        [RPLIDAR_CMD_SYNC_BYTE, self.code()]
    }

    /// Prefix the device's answer must start with, or `None` for
    /// fire-and-forget commands.
    pub fn expected_response(self) -> Option<&'static [u8]> {
        match self {
            Command::GetHealth => Some(&RPLIDAR_RESP_DEVICE_HEALTH),
            Command::GetInfo => Some(&RPLIDAR_RESP_DEVICE_INFO),
            Command::StartScan => Some(&RPLIDAR_RESP_SCAN),
            Command::StopScan | Command::Reset => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::GetHealth => "get health",
            Command::GetInfo => "get info",
            Command::StartScan => "start scan",
            Command::StopScan => "stop scan",
            Command::Reset => "reset",
        };
        write!(f, "{} ({:02X})", name, self.code())
    }
}
