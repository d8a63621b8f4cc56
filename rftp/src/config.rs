//! Session configuration.
//!
//! Every tunable is passed into session construction explicitly; the
//! defaults below are the values the CLI starts from.

use std::path::PathBuf;
use std::time::Duration;

use crate::arq::RetryPolicy;

/// Default UDP port for both roles.
pub const DEFAULT_PORT: u16 = 5000;
/// Default quiet period the server waits for duplicate Term messages.
pub const DEFAULT_TIME_WAIT: Duration = Duration::from_millis(30);
/// Default largest file a client will offer (2 GB, decimal).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2_000_000_000;
/// Hard ceiling imposed by the 32-bit size field on the wire.
pub const WIRE_MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Client-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub retry: RetryPolicy,
    /// Files larger than this fail before the Init is sent.  Clamped to
    /// [`WIRE_MAX_FILE_SIZE`].
    pub max_file_size: u64,
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.retry.timeout = timeout;
        self
    }

    pub fn with_max_transmissions(mut self, max: u32) -> Self {
        self.retry = RetryPolicy::bounded(self.retry.timeout, max);
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// The size cap actually enforced.
    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.min(WIRE_MAX_FILE_SIZE)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// How the server treats a message it has already accepted once.
///
/// Under [`DuplicatePolicy::Ignore`] a retransmitted Data message (its first
/// acknowledgment was lost) is neither written nor acknowledged, so the
/// client keeps retransmitting it and the transfer stalls.  That is the
/// reference protocol behavior and stays the default for interoperability;
/// [`DuplicatePolicy::Reacknowledge`] is the corrected stop-and-wait receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Ignore,
    /// Re-send the acknowledgment for duplicate Data and Init messages
    /// without writing them again.
    Reacknowledge,
}

/// Server-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory received files are written into (created if missing).
    pub output_dir: PathBuf,
    /// Quiet period after the Term acknowledgment.
    pub time_wait: Duration,
    /// Overall cap on the TIME_WAIT phase; `None` waits for a quiet period
    /// however long duplicates keep arriving.
    pub time_wait_limit: Option<Duration>,
    pub duplicates: DuplicatePolicy,
}

impl ServerConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            time_wait: DEFAULT_TIME_WAIT,
            time_wait_limit: None,
            duplicates: DuplicatePolicy::default(),
        }
    }

    pub fn with_time_wait(mut self, time_wait: Duration) -> Self {
        self.time_wait = time_wait;
        self
    }

    pub fn with_time_wait_limit(mut self, limit: Duration) -> Self {
        self.time_wait_limit = Some(limit);
        self
    }

    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }
}
