use crate::answers::*;
use crate::base::{ByteTransport, Error, Result, WireRecord};
use crate::types::ResyncStrategy;
use byteorder::{ByteOrder, LittleEndian};
use log::{trace, warn};
use std::time::{Duration, Instant};

/// Incremental matcher for a fixed response prefix in a noisy byte stream.
///
/// Bytes are pushed one at a time; the matcher tracks how many leading
/// pattern bytes are currently matched and resynchronizes on a mismatch
/// according to its [`ResyncStrategy`].
///
/// # Example
/// ```rust
/// use rplidar_serial::protocol::ResponseMatcher;
/// use rplidar_serial::types::ResyncStrategy;
///
/// let mut matcher = ResponseMatcher::new(&[0xA5, 0x5A], ResyncStrategy::SingleAnchor);
/// assert!(!matcher.push(0xA5));
/// assert!(!matcher.push(0xA5));
/// assert!(matcher.push(0x5A));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatcher<'a> {
    pattern: &'a [u8],
    strategy: ResyncStrategy,
    prefix_function: Vec<usize>,
    matched: usize,
}

impl<'a> ResponseMatcher<'a> {
    /// Creates a matcher for `pattern`, starting with nothing matched.
    pub fn new(pattern: &'a [u8], strategy: ResyncStrategy) -> ResponseMatcher<'a> {
        let prefix_function = match strategy {
            ResyncStrategy::SingleAnchor => Vec::new(),
            ResyncStrategy::FailureFunction => prefix_function(pattern),
        };
        ResponseMatcher {
            pattern,
            strategy,
            prefix_function,
            matched: 0,
        }
    }

    /// Number of pattern bytes currently matched.
    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn is_complete(&self) -> bool {
        self.matched == self.pattern.len()
    }

    /// Forgets any partial match.
    pub fn reset(&mut self) {
        self.matched = 0;
    }

    /// Feeds one received byte. Returns `true` once the whole pattern has been seen.
    ///
    /// Pushing after completion starts looking for the next occurrence.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        if self.is_complete() {
            self.matched = 0;
        }

        let before = self.matched;
        match self.strategy {
            ResyncStrategy::SingleAnchor => {
                if byte == self.pattern[self.matched] {
                    self.matched += 1;
                } else if byte == self.pattern[0] {
                    self.matched = 1;
                } else {
                    self.matched = 0;
                }
            }
            ResyncStrategy::FailureFunction => {
                while self.matched > 0 && byte != self.pattern[self.matched] {
                    self.matched = self.prefix_function[self.matched - 1];
                }
                if byte == self.pattern[self.matched] {
                    self.matched += 1;
                }
            }
        }
        trace!(
            "Matcher byte {:02X}: matched {} -> {} of {}",
            byte,
            before,
            self.matched,
            self.pattern.len()
        );

        self.is_complete()
    }

    /// Reads from `transport` until the pattern has been matched.
    ///
    /// The matcher is reset first so no state carries over between attempts.
    /// Returns the number of bytes consumed, including any noise skipped
    /// before the match; the stream is left positioned right after it.
    ///
    /// # Errors
    ///
    /// * `Error::OperationTimeout` if `timeout` expires first.
    /// * `Error::ProtocolError` if `limit` bytes were consumed without a match.
    ///   A `limit` shorter than the pattern counts as the pattern length.
    /// * Any transport error, unchanged.
    pub fn wait_for<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Option<Duration>,
        limit: Option<usize>,
    ) -> Result<usize> {
        self.reset();
        if self.pattern.is_empty() {
            return Ok(0);
        }

        let limit = limit.map(|limit| limit.max(self.pattern.len()));
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut consumed = 0;
        loop {
            if let Some(limit) = limit {
                if consumed >= limit {
                    warn!(
                        "No match for {:02X?} within {} bytes (best partial match {})",
                        self.pattern, limit, self.matched
                    );
                    return Err(Error::ProtocolError {
                        description: format!(
                            "response {:02X?} not found within {} bytes",
                            self.pattern, limit
                        ),
                    });
                }
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!("Timed out waiting for response {:02X?}", self.pattern);
                        return Err(Error::OperationTimeout);
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            let byte = transport.read_byte(remaining)?;
            consumed += 1;
            if self.push(byte) {
                trace!(
                    "Matched response {:02X?} after {} bytes",
                    self.pattern,
                    consumed
                );
                return Ok(consumed);
            }
        }
    }
}

/// Longest proper prefix of `pattern[..=i]` that is also its suffix, for each `i`.
fn prefix_function(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

/// Reads exactly `buf.len()` bytes, asking the transport again after every short read.
///
/// With `Some(timeout)` the whole read is bounded and `Error::OperationTimeout`
/// is returned on expiry; with `None` it waits as long as the transport keeps
/// working.
pub fn read_fully<T: ByteTransport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<()> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut filled = 0;
    while filled < buf.len() {
        let read = transport.read(&mut buf[filled..])?;
        filled += read;
        if filled < buf.len() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(
                        "Timed out with {} of {} bytes read",
                        filled,
                        buf.len()
                    );
                    return Err(Error::OperationTimeout);
                }
            }
        }
    }
    Ok(())
}

/// Decodes a device health record.
pub fn decode_health(buf: &[u8; RPLIDAR_HEALTH_RECORD_SIZE]) -> DeviceHealth {
    DeviceHealth {
        status: buf[0],
        error_code: LittleEndian::read_u16(&buf[1..3]),
    }
}

/// Decodes a device info record. The serial number is kept in wire order.
pub fn decode_info(buf: &[u8; RPLIDAR_INFO_RECORD_SIZE]) -> DeviceInfo {
    let mut serialnum = [0u8; 16];
    serialnum.copy_from_slice(&buf[4..20]);
    DeviceInfo {
        model: buf[0],
        firmware_version: LittleEndian::read_u16(&buf[1..3]),
        hardware_version: buf[3],
        serialnum,
    }
}

/// Decodes a legacy measurement node.
pub fn decode_measurement(buf: &[u8; RPLIDAR_MEASUREMENT_NODE_SIZE]) -> MeasurementNode {
    MeasurementNode {
        sync_quality: buf[0],
        angle_q6_checkbit: LittleEndian::read_u16(&buf[1..3]),
        distance_q2: LittleEndian::read_u16(&buf[3..5]),
    }
}

pub fn encode_health(health: &DeviceHealth) -> [u8; RPLIDAR_HEALTH_RECORD_SIZE] {
    let mut buf = [0u8; RPLIDAR_HEALTH_RECORD_SIZE];
    buf[0] = health.status;
    LittleEndian::write_u16(&mut buf[1..3], health.error_code);
    buf
}

pub fn encode_info(info: &DeviceInfo) -> [u8; RPLIDAR_INFO_RECORD_SIZE] {
    let mut buf = [0u8; RPLIDAR_INFO_RECORD_SIZE];
    buf[0] = info.model;
    LittleEndian::write_u16(&mut buf[1..3], info.firmware_version);
    buf[3] = info.hardware_version;
    buf[4..20].copy_from_slice(&info.serialnum);
    buf
}

pub fn encode_measurement(node: &MeasurementNode) -> [u8; RPLIDAR_MEASUREMENT_NODE_SIZE] {
    let mut buf = [0u8; RPLIDAR_MEASUREMENT_NODE_SIZE];
    buf[0] = node.sync_quality;
    LittleEndian::write_u16(&mut buf[1..3], node.angle_q6_checkbit);
    LittleEndian::write_u16(&mut buf[3..5], node.distance_q2);
    buf
}

macro_rules! impl_wire_record {
    ($t:ty, $size:expr, $decode:ident, $encode:ident) => {
        impl WireRecord for $t {
            const SIZE: usize = $size;

            fn decode(buf: &[u8]) -> Self {
                match buf.try_into() {
                    Ok(array) => $decode(array),
                    Err(_) => panic!(
                        "{} needs exactly {} bytes, got {}",
                        stringify!($t),
                        $size,
                        buf.len()
                    ),
                }
            }

            fn encode(&self, buf: &mut [u8]) {
                assert_eq!(
                    buf.len(),
                    $size,
                    "{} encodes to exactly {} bytes",
                    stringify!($t),
                    $size
                );
                buf.copy_from_slice(&$encode(self));
            }
        }
    };
}

impl_wire_record!(DeviceHealth, RPLIDAR_HEALTH_RECORD_SIZE, decode_health, encode_health);
impl_wire_record!(DeviceInfo, RPLIDAR_INFO_RECORD_SIZE, decode_info, encode_info);
impl_wire_record!(
    MeasurementNode,
    RPLIDAR_MEASUREMENT_NODE_SIZE,
    decode_measurement,
    encode_measurement
);
