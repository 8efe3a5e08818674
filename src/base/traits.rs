use crate::answers::{DeviceHealth, DeviceInfo, MeasurementNode};
use crate::base::error::{Error, Result};
use crate::cmds::Command;
use crate::types::CaptureBatch;
use std::time::Duration;

/// Blocking byte-oriented access to the serial link the RPLIDAR is attached to.
///
/// Implementations decide how a caller is suspended while waiting for data
/// (a blocking OS read, a completion queue, an interrupt bridge); the session
/// only relies on the contract of each method.
pub trait ByteTransport {
    /// Writes all of `bytes` to the link.
    ///
    /// Returns the number of bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Reads up to `buf.len()` bytes.
    ///
    /// May return fewer bytes than requested, including zero when nothing
    /// arrived within the transport's own poll interval. Callers needing a
    /// full buffer must keep requesting the remainder.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Returns `true` if received bytes are waiting to be read.
    fn bytes_available(&mut self) -> Result<bool>;

    /// Reads a single byte, suspending the caller until it arrives.
    ///
    /// With `Some(timeout)` the wait is aborted after `timeout` and
    /// `Error::OperationTimeout` is returned. With `None` it blocks until a
    /// byte arrives or the transport fails.
    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<u8>;

    /// Drops any input that is already pending on the link.
    ///
    /// Returns the number of bytes discarded.
    fn discard_input(&mut self) -> Result<usize> {
        let mut scratch = [0u8; 64];
        let mut discarded = 0;
        while self.bytes_available()? {
            let read = self.read(&mut scratch)?;
            if read == 0 {
                break;
            }
            discarded += read;
        }
        Ok(discarded)
    }
}

/// Output lines driven by the session: motor enable plus two status indicators.
///
/// The reference board wires indicator A to a red LED and indicator B to a green one.
pub trait StatusSignals {
    /// Asserts or de-asserts the motor enable line.
    fn set_motor(&mut self, enabled: bool) -> Result<()>;

    /// Switches status indicator A.
    fn set_indicator_a(&mut self, on: bool) -> Result<()>;

    /// Switches status indicator B.
    fn set_indicator_b(&mut self, on: bool) -> Result<()>;
}

/// No signal lines attached.
impl StatusSignals for () {
    fn set_motor(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn set_indicator_a(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }

    fn set_indicator_b(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }
}

/// Receives every record the session decodes.
///
/// Formatting and output are entirely up to the implementation.
pub trait Reporter {
    /// Called once the health record has been decoded.
    fn on_health(&mut self, health: &DeviceHealth);

    /// Called once the device info record has been decoded.
    fn on_info(&mut self, info: &DeviceInfo);

    /// Called for each measurement of a completed capture batch, in arrival order.
    fn on_measurement(&mut self, index: usize, node: &MeasurementNode);

    /// Called when a command's response could not be matched, before it is resent.
    fn on_response_failure(&mut self, _command: Command, _err: &Error) {}

    /// Called after the last `on_measurement` of a batch.
    fn on_batch_complete(&mut self, _batch: &CaptureBatch) {}
}

/// Discards everything.
impl Reporter for () {
    fn on_health(&mut self, _health: &DeviceHealth) {}

    fn on_info(&mut self, _info: &DeviceInfo) {}

    fn on_measurement(&mut self, _index: usize, _node: &MeasurementNode) {}
}

/// A fixed-size record carried on the wire.
pub trait WireRecord: Sized {
    /// Size of the record on the wire, in bytes.
    const SIZE: usize;

    /// Decodes the record from exactly `SIZE` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() != SIZE`. Handing a decoder a wrong-sized buffer
    /// is a wiring bug, not a runtime condition.
    fn decode(buf: &[u8]) -> Self;

    /// Encodes the record into exactly `SIZE` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() != SIZE`.
    fn encode(&self, buf: &mut [u8]);
}
