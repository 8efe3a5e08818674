use std::time::Duration;

/// Default timeout duration for waiting for responses from the RPLIDAR.
pub const RPLIDAR_DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of measurement nodes captured per scan cycle.
pub const RPLIDAR_DEFAULT_CACHE_DEPTH: usize = 8192;
