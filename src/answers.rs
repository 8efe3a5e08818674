use crate::types::Health;
use std::fmt;

// Response descriptors. Only these prefixes are validated; the record
// announced by each descriptor follows immediately.

/// Descriptor answering `GET_HEALTH`: 3 bytes, single response, type 0x06.
pub const RPLIDAR_RESP_DEVICE_HEALTH: [u8; 7] = [0xA5, 0x5A, 0x03, 0x00, 0x00, 0x00, 0x06];

/// Descriptor answering `GET_INFO`: 20 bytes, single response, type 0x04.
pub const RPLIDAR_RESP_DEVICE_INFO: [u8; 7] = [0xA5, 0x5A, 0x14, 0x00, 0x00, 0x00, 0x04];

/// Descriptor answering `SCAN`: 5-byte nodes, multiple responses, type 0x81.
pub const RPLIDAR_RESP_SCAN: [u8; 7] = [0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81];

/// Wire size of a device health record.
pub const RPLIDAR_HEALTH_RECORD_SIZE: usize = 3;

/// Wire size of a device info record.
pub const RPLIDAR_INFO_RECORD_SIZE: usize = 20;

/// Wire size of a legacy measurement node.
pub const RPLIDAR_MEASUREMENT_NODE_SIZE: usize = 5;

// health status

/// Health status code indicating the LIDAR is operating correctly.
pub const RPLIDAR_HEALTH_STATUS_OK: u8 = 0;

/// Health status code indicating a non-critical warning. The LIDAR might still function.
pub const RPLIDAR_HEALTH_STATUS_WARNING: u8 = 1;

/// Health status code indicating a critical error. The LIDAR is likely non-operational.
pub const RPLIDAR_HEALTH_STATUS_ERROR: u8 = 2;

/// Mask for the sync bit in the first byte of a measurement node.
pub const RPLIDAR_RESP_MEASUREMENT_SYNCBIT: u8 = 1;
/// Mask for the inverted sync bit in the first byte of a measurement node.
pub const RPLIDAR_RESP_MEASUREMENT_SYNCBIT_INVERSE: u8 = 1 << 1;
/// Bit shift for extracting the quality value from the first byte of a measurement node.
pub const RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT: usize = 2;
/// Mask for the check bit in the angle field of a measurement node.
pub const RPLIDAR_RESP_MEASUREMENT_CHECKBIT: u16 = 1;
/// Bit shift for extracting the angle value from the angle field of a measurement node.
pub const RPLIDAR_RESP_MEASUREMENT_ANGLE_SHIFT: usize = 1;

/// Device health as reported by the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DeviceHealth {
    /// Health status code (see `RPLIDAR_HEALTH_STATUS_*` constants).
    pub status: u8,
    /// Device-specific code, meaningful when `status` is non-zero.
    pub error_code: u16,
}

impl DeviceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == RPLIDAR_HEALTH_STATUS_OK
    }

    /// Interprets the raw status code.
    ///
    /// Unknown non-zero codes are treated as errors.
    pub fn health(&self) -> Health {
        match self.status {
            RPLIDAR_HEALTH_STATUS_OK => Health::Healthy,
            RPLIDAR_HEALTH_STATUS_WARNING => Health::Warning(self.error_code),
            _ => Health::Error(self.error_code),
        }
    }
}

/// Device identification reported by the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Model ID of the RPLIDAR.
    pub model: u8,
    /// Firmware version (major << 8 | minor).
    pub firmware_version: u16,
    /// Hardware version.
    pub hardware_version: u8,
    /// 16-byte unique serial number, in wire order.
    pub serialnum: [u8; 16],
}

impl DeviceInfo {
    pub fn firmware_major(&self) -> u8 {
        (self.firmware_version >> 8) as u8
    }

    pub fn firmware_minor(&self) -> u8 {
        (self.firmware_version & 0x00FF) as u8
    }

    /// Serial number as hex, most significant byte first (reverse of wire order).
    pub fn serial_number_hex(&self) -> String {
        self.serialnum
            .iter()
            .rev()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model {} firmware {}.{} hardware {} serial {}",
            self.model,
            self.firmware_major(),
            self.firmware_minor(),
            self.hardware_version,
            self.serial_number_hex()
        )
    }
}

/// A single legacy measurement sample.
///
/// The raw wire fields are kept as received; use the accessors for physical units.
/// Max distance: 16.384 meters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MeasurementNode {
    /// Sync bit (bit 0), inverted sync bit (bit 1) and quality (bits 2-7).
    pub sync_quality: u8,
    /// Check bit (bit 0) and angle in 1/64 degree (bits 1-15).
    pub angle_q6_checkbit: u16,
    /// Distance in 1/4 millimeter.
    pub distance_q2: u16,
}

impl MeasurementNode {
    /// Signal quality, 0 to 63.
    #[inline]
    pub fn quality(&self) -> u8 {
        self.sync_quality >> RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT
    }

    /// Heading of the sample in degrees, 0 up to (but excluding) 512.
    ///
    /// A device in working order only reports values below 360.
    #[inline]
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.angle_q6_checkbit >> RPLIDAR_RESP_MEASUREMENT_ANGLE_SHIFT) / 64.0
    }

    /// Distance in millimeters; 0 means no return.
    #[inline]
    pub fn distance_mm(&self) -> f64 {
        f64::from(self.distance_q2) / 4.0
    }

    /// `true` if this sample starts a new revolution.
    #[inline]
    pub fn is_sync(&self) -> bool {
        (self.sync_quality & RPLIDAR_RESP_MEASUREMENT_SYNCBIT) == RPLIDAR_RESP_MEASUREMENT_SYNCBIT
    }

    /// `true` if the inverted sync bit is the complement of the sync bit.
    ///
    /// Not enforced when capturing.
    #[inline]
    pub fn is_sync_consistent(&self) -> bool {
        let inverse = (self.sync_quality & RPLIDAR_RESP_MEASUREMENT_SYNCBIT_INVERSE) != 0;
        self.is_sync() != inverse
    }

    #[inline]
    pub fn check_bit(&self) -> bool {
        (self.angle_q6_checkbit & RPLIDAR_RESP_MEASUREMENT_CHECKBIT) == RPLIDAR_RESP_MEASUREMENT_CHECKBIT
    }
}

impl fmt::Display for MeasurementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quality {} angle {:.3} distance {:.3}",
            self.quality(),
            self.angle_degrees(),
            self.distance_mm()
        )
    }
}
