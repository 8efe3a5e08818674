use crate::answers::MeasurementNode;
use crate::internals::{RPLIDAR_DEFAULT_CACHE_DEPTH, RPLIDAR_DEFAULT_TIMEOUT};
use std::fmt;
use std::ops::Index;
use std::slice;
use std::time::Duration;

/// Represents the health status reported by the RPLIDAR device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// The device reports it is operating correctly.
    Healthy,
    /// The device reports a warning condition, but may still be operational. Contains the warning code.
    Warning(u16),
    /// The device reports a fatal error and is likely not operational. Contains the error code.
    Error(u16),
}

/// How the response matcher recovers after a byte breaks a partial match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncStrategy {
    /// Restart at index 1 if the offending byte equals the first pattern
    /// byte, otherwise at index 0.
    ///
    /// Misses a true match that overlaps a longer false partial match when
    /// the first pattern byte recurs inside the pattern. None of the
    /// RPLIDAR descriptors have that shape.
    #[default]
    SingleAnchor,
    /// Fall back along the pattern's prefix function (Knuth-Morris-Pratt),
    /// which never misses an occurrence.
    FailureFunction,
}

/// How often a command is resent when its response does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Resend until the response matches or the transport fails.
    #[default]
    Unbounded,
    /// Give up after this many attempts in total (values below 1 count as 1).
    Limited(u32),
}

impl RetryPolicy {
    /// Whether another attempt may follow `attempts` failed ones.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        match self {
            RetryPolicy::Unbounded => true,
            RetryPolicy::Limited(max) => attempts < (*max).max(1),
        }
    }
}

/// Runtime configuration of a [`ScanSession`](crate::ScanSession).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Bound on one request attempt, shared by the descriptor match and the
    /// record that follows it. `None` blocks until the response arrives.
    pub response_timeout: Option<Duration>,

    /// Bytes the matcher may consume before declaring a mismatch, the matched
    /// descriptor included. Limits below the descriptor length are raised to it.
    /// `None` scans indefinitely.
    pub match_limit: Option<usize>,

    pub resync: ResyncStrategy,

    pub retry: RetryPolicy,

    /// Drain stale input before sending the start-scan command.
    pub flush_before_scan: bool,

    /// Bound on reading each measurement node while capturing. `None` waits indefinitely.
    pub capture_timeout: Option<Duration>,

    /// Number of measurement nodes per capture batch.
    pub capacity: usize,
}

impl SessionOptions {
    /// Options with a specific response timeout.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> SessionOptions {
        self.response_timeout = timeout;
        self
    }

    pub fn with_match_limit(mut self, limit: Option<usize>) -> SessionOptions {
        self.match_limit = limit;
        self
    }

    pub fn with_resync(mut self, resync: ResyncStrategy) -> SessionOptions {
        self.resync = resync;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> SessionOptions {
        self.retry = retry;
        self
    }

    pub fn with_flush_before_scan(mut self, flush: bool) -> SessionOptions {
        self.flush_before_scan = flush;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Option<Duration>) -> SessionOptions {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> SessionOptions {
        self.capacity = capacity;
        self
    }
}

impl Default for SessionOptions {
    /// One second response timeout, unbounded scan and retries, flush before scan,
    /// unbounded capture of 8192 nodes.
    fn default() -> SessionOptions {
        SessionOptions {
            response_timeout: Some(RPLIDAR_DEFAULT_TIMEOUT),
            match_limit: None,
            resync: ResyncStrategy::default(),
            retry: RetryPolicy::default(),
            flush_before_scan: true,
            capture_timeout: None,
            capacity: RPLIDAR_DEFAULT_CACHE_DEPTH,
        }
    }
}

/// Phase of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    QueryHealth,
    QueryInfo,
    StartScan,
    Capturing,
    StopScan,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::QueryHealth => "QUERY_HEALTH",
            SessionState::QueryInfo => "QUERY_INFO",
            SessionState::StartScan => "START_SCAN",
            SessionState::Capturing => "CAPTURING",
            SessionState::StopScan => "STOP_SCAN",
        };
        f.write_str(name)
    }
}

/// Fixed-capacity batch of measurement nodes in arrival order.
///
/// Storage is allocated once and reused across scan cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureBatch {
    nodes: Vec<MeasurementNode>,
    capacity: usize,
}

impl CaptureBatch {
    pub fn with_capacity(capacity: usize) -> CaptureBatch {
        CaptureBatch {
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    /// Empties the batch, keeping its storage.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Appends a node; returns `false` (dropping nothing already stored) if the batch is full.
    pub fn push(&mut self, node: MeasurementNode) -> bool {
        if self.is_full() {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn as_slice(&self) -> &[MeasurementNode] {
        &self.nodes
    }

    pub fn iter(&self) -> slice::Iter<'_, MeasurementNode> {
        self.nodes.iter()
    }
}

impl Index<usize> for CaptureBatch {
    type Output = MeasurementNode;

    fn index(&self, index: usize) -> &MeasurementNode {
        &self.nodes[index]
    }
}

impl<'a> IntoIterator for &'a CaptureBatch {
    type Item = &'a MeasurementNode;
    type IntoIter = slice::Iter<'a, MeasurementNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
