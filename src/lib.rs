//! # Rplidar Serial
//!
//! `rplidar_serial` is a synchronous client for Slamtec RPLIDAR sensors in legacy scan mode.
//! It queries device health and info, starts a scan and captures fixed-size batches of
//! measurement nodes over a single serial link, resynchronizing on noisy input and
//! resending commands whose response does not match.
//!
//! The serial link, the motor/indicator lines and the output of decoded records are
//! collaborators supplied by the caller through the [`ByteTransport`], [`StatusSignals`]
//! and [`Reporter`] traits.

extern crate byteorder;
extern crate log;

pub mod answers;
pub mod base;
pub mod cmds;
mod internals;
pub mod protocol;
pub mod report;
pub mod types;

pub use crate::answers::{DeviceHealth, DeviceInfo, MeasurementNode};
pub use crate::base::{
    ByteTransport, Channel, Error, Reporter, Result, StatusSignals, WireRecord,
};
pub use crate::cmds::Command;
pub use crate::internals::{RPLIDAR_DEFAULT_CACHE_DEPTH, RPLIDAR_DEFAULT_TIMEOUT};
pub use crate::report::LogReporter;
pub use crate::types::{
    CaptureBatch, Health, ResyncStrategy, RetryPolicy, SessionOptions, SessionState,
};

use crate::answers::*;
use crate::protocol::{decode_health, decode_info, decode_measurement, read_fully, ResponseMatcher};
use log::{error, trace, warn};
use std::time::Instant;

/// Drives one RPLIDAR through health check, info query and repeated scan cycles.
///
/// The session exclusively owns the transport for its lifetime. Health and info
/// are queried once; every scan cycle then starts the scan, fills the
/// [`CaptureBatch`] in arrival order, hands it to the reporter and stops the scan.
///
/// # Example
/// ```ignore
/// # use rplidar_serial::{Channel, LogReporter, ScanSession};
/// # use std::time::Duration;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let port = serialport::new("/dev/ttyUSB0", 115200)
///     .timeout(Duration::from_millis(10))
///     .open()?;
/// let mut session = ScanSession::new(Channel::new(port), (), LogReporter::new());
/// session.run(None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScanSession<T, S, R> {
    transport: T,
    signals: S,
    reporter: R,
    options: SessionOptions,
    state: SessionState,
    batch: CaptureBatch,
    health: Option<DeviceHealth>,
    info: Option<DeviceInfo>,
}

impl<T, S, R> ScanSession<T, S, R>
where
    T: ByteTransport,
    S: StatusSignals,
    R: Reporter,
{
    /// Creates a session with default [`SessionOptions`].
    pub fn new(transport: T, signals: S, reporter: R) -> ScanSession<T, S, R> {
        ScanSession::with_options(transport, signals, reporter, SessionOptions::default())
    }

    /// Creates a session with custom options.
    pub fn with_options(
        transport: T,
        signals: S,
        reporter: R,
        options: SessionOptions,
    ) -> ScanSession<T, S, R> {
        trace!("Creating new ScanSession with {:?}", options);
        ScanSession {
            transport,
            signals,
            reporter,
            batch: CaptureBatch::with_capacity(options.capacity),
            options,
            state: SessionState::Init,
            health: None,
            info: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Nodes of the last completed capture.
    pub fn batch(&self) -> &CaptureBatch {
        &self.batch
    }

    /// Health record from the last successful health query.
    pub fn health(&self) -> Option<&DeviceHealth> {
        self.health.as_ref()
    }

    /// Info record from the last successful info query.
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Ends the session, giving the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn enter(&mut self, state: SessionState) {
        trace!("Session state {} -> {}", self.state, state);
        self.state = state;
    }

    fn send(&mut self, command: Command) -> Result<()> {
        trace!("Sending {}", command);
        self.transport.write(&command.frame())?;
        Ok(())
    }

    /// Sends `command`, waits for its response descriptor and reads the
    /// record that follows into `payload`. A single attempt; the response
    /// timeout covers the descriptor and the record together.
    fn try_request(&mut self, command: Command, pattern: &[u8], payload: &mut [u8]) -> Result<()> {
        self.send(command)?;
        let started = Instant::now();
        let mut matcher = ResponseMatcher::new(pattern, self.options.resync);
        let consumed = matcher.wait_for(
            &mut self.transport,
            self.options.response_timeout,
            self.options.match_limit,
        )?;
        if consumed > pattern.len() {
            trace!("Skipped {} bytes before response", consumed - pattern.len());
        }
        let remaining = self
            .options
            .response_timeout
            .map(|timeout| timeout.saturating_sub(started.elapsed()));
        read_fully(&mut self.transport, payload, remaining)
    }

    /// Sends `command` until its response matches, as allowed by the retry policy.
    fn request(&mut self, command: Command, payload: &mut [u8]) -> Result<()> {
        let pattern = match command.expected_response() {
            Some(pattern) => pattern,
            None => {
                return Err(Error::OperationFail {
                    description: format!("{} has no response to wait for", command),
                })
            }
        };

        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            match self.try_request(command, pattern, payload) {
                Ok(()) => {
                    trace!("{} answered after {} attempt(s)", command, attempts);
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{}: bad response on attempt {}: {}", command, attempts, e);
                    self.reporter.on_response_failure(command, &e);
                    if !self.options.retry.allows_retry(attempts) {
                        error!("{}: giving up after {} attempts", command, attempts);
                        return Err(Error::OperationFail {
                            description: format!(
                                "no valid response to {} after {} attempts: {}",
                                command, attempts, e
                            ),
                        });
                    }
                }
                Err(e) => {
                    error!("{}: transport failure: {}", command, e);
                    return Err(e);
                }
            }
        }
    }

    /// Queries the device health and reports it.
    pub fn query_health(&mut self) -> Result<DeviceHealth> {
        self.enter(SessionState::QueryHealth);
        self.signals.set_indicator_a(false)?;
        self.signals.set_indicator_b(true)?;

        let mut buf = [0u8; RPLIDAR_HEALTH_RECORD_SIZE];
        self.request(Command::GetHealth, &mut buf)?;
        let health = decode_health(&buf);
        trace!(
            "Parsed device health: status={}, error_code={:04X}",
            health.status,
            health.error_code
        );
        if !health.is_healthy() {
            warn!("Device reports {:?}", health.health());
        }
        self.health = Some(health);
        self.reporter.on_health(&health);
        Ok(health)
    }

    /// Queries the device info and reports it.
    pub fn query_info(&mut self) -> Result<DeviceInfo> {
        self.enter(SessionState::QueryInfo);
        self.signals.set_indicator_a(false)?;
        self.signals.set_indicator_b(true)?;

        let mut buf = [0u8; RPLIDAR_INFO_RECORD_SIZE];
        self.request(Command::GetInfo, &mut buf)?;
        let info = decode_info(&buf);
        trace!("Parsed device info: {}", info);
        self.info = Some(info);
        self.reporter.on_info(&info);
        Ok(info)
    }

    /// Spins up the motor and starts a scan; on success the session is `Capturing`.
    pub fn start_scan(&mut self) -> Result<()> {
        self.enter(SessionState::StartScan);
        self.signals.set_indicator_a(true)?;
        self.signals.set_indicator_b(false)?;
        self.signals.set_motor(true)?;

        if let Err(e) = self.confirm_scan() {
            self.release_motor();
            return Err(e);
        }
        self.enter(SessionState::Capturing);
        Ok(())
    }

    fn confirm_scan(&mut self) -> Result<()> {
        if self.options.flush_before_scan {
            let discarded = self.transport.discard_input()?;
            if discarded > 0 {
                trace!("Flushed {} stale bytes before scan", discarded);
            }
        }
        self.request(Command::StartScan, &mut [])
    }

    /// Switches the motor off on an error path, where the original error wins.
    fn release_motor(&mut self) {
        if let Err(e) = self.signals.set_motor(false) {
            warn!("Failed to stop motor: {}", e);
        }
    }

    /// Fills the capture batch with exactly `capacity` measurement nodes.
    ///
    /// The device streams nodes back to back once scanning, so no framing is
    /// checked here. Each node is read to completion before the next one;
    /// nothing is skipped.
    pub fn capture(&mut self) -> Result<&CaptureBatch> {
        if self.state != SessionState::Capturing {
            return Err(Error::OperationFail {
                description: format!("cannot capture in state {}", self.state),
            });
        }

        self.batch.clear();
        let mut raw = [0u8; RPLIDAR_MEASUREMENT_NODE_SIZE];
        while !self.batch.is_full() {
            if let Err(e) = read_fully(&mut self.transport, &mut raw, self.options.capture_timeout) {
                error!(
                    "Capture aborted after {} of {} nodes: {}",
                    self.batch.len(),
                    self.batch.capacity(),
                    e
                );
                return Err(e);
            }
            self.batch.push(decode_measurement(&raw));
        }
        trace!("Captured {} nodes", self.batch.len());
        Ok(&self.batch)
    }

    /// Stops the scan and the motor. The device sends no confirmation.
    pub fn stop_scan(&mut self) -> Result<()> {
        self.enter(SessionState::StopScan);
        self.send(Command::StopScan)?;
        self.signals.set_motor(false)?;
        Ok(())
    }

    /// Resets the device core. Health and info must be queried again afterwards.
    pub fn reset_core(&mut self) -> Result<()> {
        self.send(Command::Reset)?;
        self.signals.set_motor(false)?;
        self.health = None;
        self.info = None;
        self.enter(SessionState::Init);
        Ok(())
    }

    /// Runs one scan cycle: start, capture, report every node, stop.
    ///
    /// If the capture fails for any reason other than a transport fault the
    /// scan is still stopped before the error is returned. After a transport
    /// fault only the motor is switched off.
    pub fn run_cycle(&mut self) -> Result<&CaptureBatch> {
        self.start_scan()?;

        if let Err(e) = self.capture().map(|batch| batch.len()) {
            if matches!(e, Error::IoError(_)) {
                self.release_motor();
            } else if let Err(stop_err) = self.stop_scan() {
                warn!("Failed to stop scan after capture error: {}", stop_err);
            }
            return Err(e);
        }

        for (index, node) in self.batch.iter().enumerate() {
            self.reporter.on_measurement(index, node);
        }
        self.reporter.on_batch_complete(&self.batch);

        self.stop_scan()?;
        Ok(&self.batch)
    }

    /// Queries health and info once, then runs `cycles` scan cycles (forever with `None`).
    pub fn run(&mut self, cycles: Option<usize>) -> Result<()> {
        self.enter(SessionState::Init);
        self.query_health()?;
        self.query_info()?;

        let mut completed = 0usize;
        while cycles.map_or(true, |limit| completed < limit) {
            self.run_cycle()?;
            completed += 1;
            trace!("Completed scan cycle {}", completed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_health, encode_info, encode_measurement};
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Write(Vec<u8>),
        Motor(bool),
        IndicatorA(bool),
        IndicatorB(bool),
    }

    type EventLog = Rc<RefCell<Vec<Event>>>;

    /// Simulated device: every command written queues its next scripted reply.
    struct MockLidar {
        replies: HashMap<u8, VecDeque<Vec<u8>>>,
        rx: VecDeque<u8>,
        events: EventLog,
        chunk: usize,
        disconnected: bool,
        pace: Duration,
    }

    impl MockLidar {
        fn new(events: &EventLog) -> MockLidar {
            MockLidar {
                replies: HashMap::new(),
                rx: VecDeque::new(),
                events: events.clone(),
                chunk: 3,
                disconnected: false,
                pace: Duration::ZERO,
            }
        }

        fn reply(mut self, command: Command, bytes: Vec<u8>) -> MockLidar {
            self.replies
                .entry(command.code())
                .or_default()
                .push_back(bytes);
            self
        }

        fn gone() -> Error {
            Error::IoError(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        }
    }

    impl ByteTransport for MockLidar {
        fn write(&mut self, bytes: &[u8]) -> Result<usize> {
            self.events.borrow_mut().push(Event::Write(bytes.to_vec()));
            if let Some(queue) = self.replies.get_mut(&bytes[1]) {
                if let Some(reply) = queue.pop_front() {
                    self.rx.extend(reply);
                }
            }
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.rx.is_empty() && self.disconnected {
                return Err(MockLidar::gone());
            }
            let n = buf.len().min(self.chunk).min(self.rx.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.rx.pop_front().unwrap();
            }
            Ok(n)
        }

        fn bytes_available(&mut self) -> Result<bool> {
            Ok(!self.rx.is_empty())
        }

        fn read_byte(&mut self, _timeout: Option<Duration>) -> Result<u8> {
            if !self.pace.is_zero() {
                std::thread::sleep(self.pace);
            }
            match self.rx.pop_front() {
                Some(byte) => Ok(byte),
                None if self.disconnected => Err(MockLidar::gone()),
                None => Err(Error::OperationTimeout),
            }
        }
    }

    struct MockSignals {
        events: EventLog,
    }

    impl StatusSignals for MockSignals {
        fn set_motor(&mut self, enabled: bool) -> Result<()> {
            self.events.borrow_mut().push(Event::Motor(enabled));
            Ok(())
        }

        fn set_indicator_a(&mut self, on: bool) -> Result<()> {
            self.events.borrow_mut().push(Event::IndicatorA(on));
            Ok(())
        }

        fn set_indicator_b(&mut self, on: bool) -> Result<()> {
            self.events.borrow_mut().push(Event::IndicatorB(on));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        health: Vec<DeviceHealth>,
        info: Vec<DeviceInfo>,
        measurements: Vec<(usize, MeasurementNode)>,
        failures: Vec<Command>,
        batches: usize,
    }

    impl Reporter for Recorder {
        fn on_health(&mut self, health: &DeviceHealth) {
            self.health.push(*health);
        }

        fn on_info(&mut self, info: &DeviceInfo) {
            self.info.push(*info);
        }

        fn on_measurement(&mut self, index: usize, node: &MeasurementNode) {
            self.measurements.push((index, *node));
        }

        fn on_response_failure(&mut self, command: Command, _err: &Error) {
            self.failures.push(command);
        }

        fn on_batch_complete(&mut self, _batch: &CaptureBatch) {
            self.batches += 1;
        }
    }

    fn health_reply(status: u8, error_code: u16) -> Vec<u8> {
        let mut reply = RPLIDAR_RESP_DEVICE_HEALTH.to_vec();
        reply.extend_from_slice(&encode_health(&DeviceHealth { status, error_code }));
        reply
    }

    fn sample_info() -> DeviceInfo {
        let mut serialnum = [0u8; 16];
        for (i, b) in serialnum.iter_mut().enumerate() {
            *b = (i as u8) * 0x11;
        }
        DeviceInfo {
            model: 0x18,
            firmware_version: 0x011D,
            hardware_version: 7,
            serialnum,
        }
    }

    fn info_reply(info: &DeviceInfo) -> Vec<u8> {
        let mut reply = RPLIDAR_RESP_DEVICE_INFO.to_vec();
        reply.extend_from_slice(&encode_info(info));
        reply
    }

    /// Deterministic node stream: sync every 360 samples, one sample per degree.
    fn synthetic_node(i: usize) -> MeasurementNode {
        let sync = if i % 360 == 0 { 0b01 } else { 0b10 };
        MeasurementNode {
            sync_quality: (((i % 64) as u8) << 2) | sync,
            angle_q6_checkbit: ((((i % 360) * 64) << 1) | 1) as u16,
            distance_q2: i as u16,
        }
    }

    fn scan_reply(nodes: usize, offset: usize) -> Vec<u8> {
        let mut reply = RPLIDAR_RESP_SCAN.to_vec();
        for i in offset..offset + nodes {
            reply.extend_from_slice(&encode_measurement(&synthetic_node(i)));
        }
        reply
    }

    fn session(
        lidar: MockLidar,
        events: &EventLog,
        options: SessionOptions,
    ) -> ScanSession<MockLidar, MockSignals, Recorder> {
        let signals = MockSignals {
            events: events.clone(),
        };
        ScanSession::with_options(lidar, signals, Recorder::default(), options)
    }

    fn writes_of(events: &EventLog, command: Command) -> usize {
        let frame = command.frame().to_vec();
        events
            .borrow()
            .iter()
            .filter(|e| **e == Event::Write(frame.clone()))
            .count()
    }

    #[test]
    fn healthy_device_reports_status_zero() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(Command::GetHealth, health_reply(0, 0));
        let mut session = session(lidar, &events, SessionOptions::default());

        let health = session.query_health().unwrap();
        assert_eq!(health, DeviceHealth { status: 0, error_code: 0 });
        assert_eq!(health.health(), Health::Healthy);
        assert_eq!(session.reporter().health, vec![health]);
        assert!(session.reporter().failures.is_empty());
        assert_eq!(session.state(), SessionState::QueryHealth);
    }

    #[test]
    fn warning_device_reports_error_code() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(Command::GetHealth, health_reply(1, 0x1234));
        let mut session = session(lidar, &events, SessionOptions::default());

        let health = session.query_health().unwrap();
        assert_eq!(session.reporter().health, vec![DeviceHealth { status: 1, error_code: 0x1234 }]);
        assert_eq!(health.health(), Health::Warning(0x1234));
        assert_eq!(session.health(), Some(&health));
    }

    #[test]
    fn info_query_decodes_after_noise() {
        let events = EventLog::default();
        let info = sample_info();
        let mut reply = vec![0x00, 0xA5, 0xA5];
        reply.extend(info_reply(&info));
        let lidar = MockLidar::new(&events).reply(Command::GetInfo, reply);
        let mut session = session(lidar, &events, SessionOptions::default());

        assert_eq!(session.query_info().unwrap(), info);
        assert_eq!(session.reporter().info, vec![info]);
        assert_eq!(session.info().unwrap().serial_number_hex(), "ffeeddccbbaa99887766554433221100");
    }

    #[test]
    fn health_query_resends_until_answered() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events)
            .reply(Command::GetHealth, vec![])
            .reply(Command::GetHealth, health_reply(0, 0));
        let mut session = session(lidar, &events, SessionOptions::default());

        session.query_health().unwrap();
        assert_eq!(writes_of(&events, Command::GetHealth), 2);
        assert_eq!(session.reporter().failures, vec![Command::GetHealth]);
    }

    #[test]
    fn start_scan_retries_until_third_response_matches() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events)
            .reply(Command::StartScan, vec![0xA5, 0x5A, 0x05, 0x00, 0x00, 0x00, 0x81])
            .reply(Command::StartScan, vec![0x12, 0x34])
            .reply(Command::StartScan, scan_reply(4, 0));
        let options = SessionOptions::default().with_capacity(4);
        let mut session = session(lidar, &events, options);

        session.start_scan().unwrap();
        assert_eq!(writes_of(&events, Command::StartScan), 3);
        assert_eq!(
            session.reporter().failures,
            vec![Command::StartScan, Command::StartScan]
        );
        assert_eq!(session.state(), SessionState::Capturing);

        let batch = session.capture().unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[3], synthetic_node(3));
    }

    #[test]
    fn no_capture_before_scan_is_confirmed() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(Command::StartScan, vec![0x00; 4]);
        let options = SessionOptions::default()
            .with_capacity(1)
            .with_retry(RetryPolicy::Limited(1));
        let mut session = session(lidar, &events, options);

        assert!(matches!(session.capture(), Err(Error::OperationFail { .. })));
        assert!(matches!(session.start_scan(), Err(Error::OperationFail { .. })));
        assert_eq!(session.state(), SessionState::StartScan);
        assert!(matches!(session.capture(), Err(Error::OperationFail { .. })));
        assert_eq!(events.borrow().last(), Some(&Event::Motor(false)));
    }

    #[test]
    fn failed_start_switches_motor_off() {
        let events = EventLog::default();
        let mut lidar = MockLidar::new(&events);
        lidar.disconnected = true;
        let mut session = session(lidar, &events, SessionOptions::default());

        assert!(matches!(session.start_scan(), Err(Error::IoError(_))));
        let log = events.borrow();
        assert_eq!(log.last(), Some(&Event::Motor(false)));
        assert_eq!(log.iter().filter(|e| **e == Event::Motor(true)).count(), 1);
    }

    #[test]
    fn payload_shares_the_response_deadline() {
        let events = EventLog::default();
        // descriptor only, the record never arrives
        let mut lidar =
            MockLidar::new(&events).reply(Command::GetHealth, RPLIDAR_RESP_DEVICE_HEALTH.to_vec());
        lidar.pace = Duration::from_millis(10);
        let options = SessionOptions::default()
            .with_response_timeout(Some(Duration::from_millis(100)))
            .with_retry(RetryPolicy::Limited(1));
        let mut session = session(lidar, &events, options);

        let started = Instant::now();
        assert!(matches!(session.query_health(), Err(Error::OperationFail { .. })));
        // descriptor takes ~70ms; a fresh timeout for the record would reach ~170ms
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn match_limit_turns_noise_into_mismatch() {
        let events = EventLog::default();
        let mut noisy = vec![0x42; 20];
        noisy.extend(health_reply(0, 0));
        let lidar = MockLidar::new(&events)
            .reply(Command::GetHealth, noisy)
            .reply(Command::GetHealth, vec![]);
        let options = SessionOptions::default().with_match_limit(Some(16));
        let mut session = session(lidar, &events, options);

        // first attempt gives up after 16 noise bytes, the second finds the
        // descriptor behind the remaining 4
        session.query_health().unwrap();
        assert_eq!(writes_of(&events, Command::GetHealth), 2);
        assert_eq!(session.reporter().failures.len(), 1);
    }

    #[test]
    fn bounded_retries_give_up() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events);
        let options = SessionOptions::default().with_retry(RetryPolicy::Limited(2));
        let mut session = session(lidar, &events, options);

        match session.query_info() {
            Err(Error::OperationFail { description }) => {
                assert!(description.contains("after 2 attempts"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(writes_of(&events, Command::GetInfo), 2);
        assert_eq!(session.reporter().failures.len(), 2);
        assert!(session.info().is_none());
    }

    #[test]
    fn transport_fault_is_not_retried() {
        let events = EventLog::default();
        let mut lidar = MockLidar::new(&events);
        lidar.disconnected = true;
        let mut session = session(lidar, &events, SessionOptions::default());

        assert!(matches!(session.query_health(), Err(Error::IoError(_))));
        assert_eq!(writes_of(&events, Command::GetHealth), 1);
        assert!(session.reporter().failures.is_empty());
    }

    #[test]
    fn captures_full_batch_in_arrival_order() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(
            Command::StartScan,
            scan_reply(RPLIDAR_DEFAULT_CACHE_DEPTH, 0),
        );
        let mut session = session(lidar, &events, SessionOptions::default());

        session.start_scan().unwrap();
        let batch = session.capture().unwrap();
        assert_eq!(batch.len(), 8192);
        for (i, node) in batch.iter().enumerate() {
            assert_eq!(*node, synthetic_node(i));
        }

        assert_eq!(batch[0].quality(), 0);
        assert!(batch[0].is_sync());
        assert_eq!(batch[0].angle_degrees(), 0.0);
        assert_eq!(batch[0].distance_mm(), 0.0);

        assert_eq!(batch[361].quality(), 41);
        assert!(!batch[361].is_sync());
        assert_eq!(batch[361].angle_degrees(), 1.0);
        assert_eq!(batch[361].distance_mm(), 90.25);

        assert_eq!(batch[8191].quality(), 63);
        assert_eq!(batch[8191].angle_degrees(), 271.0);
        assert_eq!(batch[8191].distance_mm(), 2047.75);
        assert!(session.transport().rx.is_empty());
    }

    #[test]
    fn stale_input_is_flushed_before_scan() {
        let events = EventLog::default();
        let mut lidar = MockLidar::new(&events).reply(Command::StartScan, scan_reply(2, 100));
        // leftovers of an earlier scan, including a descriptor
        lidar.rx.extend(RPLIDAR_RESP_SCAN.iter());
        lidar.rx.extend([0xFF, 0xFF, 0xFF]);
        let options = SessionOptions::default().with_capacity(2);
        let mut session = session(lidar, &events, options);

        session.start_scan().unwrap();
        let batch = session.capture().unwrap();
        assert_eq!(batch.as_slice(), &[synthetic_node(100), synthetic_node(101)]);
    }

    #[test]
    fn capture_timeout_stops_the_scan() {
        let events = EventLog::default();
        let mut reply = scan_reply(1, 0);
        reply.extend([0x00, 0x00]);
        let lidar = MockLidar::new(&events).reply(Command::StartScan, reply);
        let options = SessionOptions::default()
            .with_capacity(2)
            .with_capture_timeout(Some(Duration::from_millis(5)));
        let mut session = session(lidar, &events, options);

        assert!(matches!(session.run_cycle(), Err(Error::OperationTimeout)));
        assert_eq!(session.state(), SessionState::StopScan);
        assert_eq!(writes_of(&events, Command::StopScan), 1);
        assert!(session.reporter().measurements.is_empty());
        assert_eq!(events.borrow().last(), Some(&Event::Motor(false)));
    }

    #[test]
    fn disconnect_during_capture_propagates() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(Command::StartScan, scan_reply(1, 0));
        let options = SessionOptions::default().with_capacity(2);
        let mut session = session(lidar, &events, options);

        session.start_scan().unwrap();
        // unplugged after the first node
        session.transport.disconnected = true;
        assert!(matches!(session.capture(), Err(Error::IoError(_))));
        assert_eq!(session.batch().len(), 1);
    }

    #[test]
    fn disconnect_during_cycle_switches_motor_off() {
        let events = EventLog::default();
        let mut lidar = MockLidar::new(&events).reply(Command::StartScan, scan_reply(1, 0));
        lidar.chunk = 5;
        let options = SessionOptions::default().with_capacity(2);
        let mut session = session(lidar, &events, options);
        session.transport.disconnected = true;

        assert!(matches!(session.run_cycle(), Err(Error::IoError(_))));
        assert_eq!(session.batch().len(), 1);
        assert_eq!(writes_of(&events, Command::StopScan), 0);
        assert_eq!(events.borrow().last(), Some(&Event::Motor(false)));
    }

    #[test]
    fn full_session_queries_once_and_cycles() {
        let events = EventLog::default();
        let info = sample_info();
        let lidar = MockLidar::new(&events)
            .reply(Command::GetHealth, health_reply(0, 0))
            .reply(Command::GetInfo, info_reply(&info))
            .reply(Command::StartScan, scan_reply(3, 0))
            .reply(Command::StartScan, scan_reply(3, 3));
        let options = SessionOptions::default().with_capacity(3);
        let mut session = session(lidar, &events, options);

        session.run(Some(2)).unwrap();

        let recorder = session.reporter();
        assert_eq!(recorder.health.len(), 1);
        assert_eq!(recorder.info, vec![info]);
        assert_eq!(recorder.batches, 2);
        let indices: Vec<usize> = recorder.measurements.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(recorder.measurements[4].1, synthetic_node(4));
        assert_eq!(session.batch().as_slice()[0], synthetic_node(3));
        assert_eq!(session.state(), SessionState::StopScan);

        let log = events.borrow();
        let expected = vec![
            Event::IndicatorA(false),
            Event::IndicatorB(true),
            Event::Write(vec![0xA5, 0x52]),
            Event::IndicatorA(false),
            Event::IndicatorB(true),
            Event::Write(vec![0xA5, 0x50]),
            Event::IndicatorA(true),
            Event::IndicatorB(false),
            Event::Motor(true),
            Event::Write(vec![0xA5, 0x20]),
            Event::Write(vec![0xA5, 0x25]),
            Event::Motor(false),
            Event::IndicatorA(true),
            Event::IndicatorB(false),
            Event::Motor(true),
            Event::Write(vec![0xA5, 0x20]),
            Event::Write(vec![0xA5, 0x25]),
            Event::Motor(false),
        ];
        assert_eq!(*log, expected);
    }

    #[test]
    fn reset_requires_new_queries() {
        let events = EventLog::default();
        let lidar = MockLidar::new(&events).reply(Command::GetHealth, health_reply(0, 0));
        let mut session = session(lidar, &events, SessionOptions::default());

        session.query_health().unwrap();
        session.reset_core().unwrap();
        assert!(session.health().is_none());
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(writes_of(&events, Command::Reset), 1);
        assert!(session.into_inner().rx.is_empty());
    }
}
