//! Console-style reporting through the `log` facade.

use crate::answers::{DeviceHealth, DeviceInfo, MeasurementNode};
use crate::base::{Error, Reporter};
use crate::cmds::Command;
use crate::protocol::encode_measurement;
use crate::types::CaptureBatch;
use log::{debug, info, warn};

/// Renders a health record the way the board firmware prints it.
pub fn format_health(health: &DeviceHealth) -> String {
    if health.is_healthy() {
        "Health status: Good".to_owned()
    } else {
        format!("Health status: Warning/Error {}", health.error_code)
    }
}

/// Renders a device info record, one line per field.
pub fn format_info(info: &DeviceInfo) -> Vec<String> {
    vec![
        format!("Model: {}", info.model),
        format!(
            "Firmware version: {}.{}",
            info.firmware_major(),
            info.firmware_minor()
        ),
        format!("Hardware version: {}", info.hardware_version),
        format!("Serial Number: {}", info.serial_number_hex()),
    ]
}

/// Renders the raw bytes of a measurement node.
pub fn format_raw(node: &MeasurementNode) -> String {
    encode_measurement(node)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the decoded fields of a measurement node.
pub fn format_measurement(node: &MeasurementNode) -> String {
    format!(
        "Quality: {} Angle: {:05.3} Distance: {:05.3}",
        node.quality(),
        node.angle_degrees(),
        node.distance_mm()
    )
}

/// [`Reporter`] writing every record to the log.
///
/// Measurements go out at `info` level; with `raw_bytes` set their wire
/// bytes are logged at `debug` level first.
#[derive(Debug, Clone, Default)]
pub struct LogReporter {
    pub raw_bytes: bool,
}

impl LogReporter {
    pub fn new() -> LogReporter {
        LogReporter::default()
    }

    pub fn with_raw_bytes() -> LogReporter {
        LogReporter { raw_bytes: true }
    }
}

impl Reporter for LogReporter {
    fn on_health(&mut self, health: &DeviceHealth) {
        if health.is_healthy() {
            info!("{}", format_health(health));
        } else {
            warn!("{}", format_health(health));
        }
    }

    fn on_info(&mut self, info: &DeviceInfo) {
        for line in format_info(info) {
            info!("{}", line);
        }
    }

    fn on_measurement(&mut self, index: usize, node: &MeasurementNode) {
        if self.raw_bytes {
            debug!("[{}] {}", index, format_raw(node));
        }
        info!("[{}] {}", index, format_measurement(node));
    }

    fn on_response_failure(&mut self, command: Command, err: &Error) {
        warn!("{}: Bad response ({})", command, err);
    }

    fn on_batch_complete(&mut self, batch: &CaptureBatch) {
        info!("Captured {} samples", batch.len());
    }
}
