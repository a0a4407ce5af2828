use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::progress::SpeedCalculator;

/// Which way bytes move relative to the party holding the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Point-in-time snapshot of a transfer, for presentation layers.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub name: String,
    pub direction: Direction,
    pub status: TransferStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    /// Current throughput over the sliding measurement window.
    pub bytes_per_second: f64,
    /// Estimated time to move the remaining bytes, when a rate is known.
    pub eta: Option<Duration>,
    pub error: String,
}

impl TransferProgress {
    /// Completion as a fraction in `0.0..=1.0` (1.0 for zero-byte files).
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.transferred_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// The unit of file movement: declared size, bytes moved, lifecycle status.
///
/// Thread-safe; the I/O loop updates it while observers poll snapshots.
/// Invariant: `transferred_bytes <= total_bytes`, and the transfer is
/// complete exactly when they are equal.
pub struct TransferState {
    inner: RwLock<StateInner>,
    speed: SpeedCalculator,
}

struct StateInner {
    name: String,
    direction: Direction,
    status: TransferStatus,
    total_bytes: u64,
    transferred_bytes: u64,
    started_at: Option<Instant>,
    updated_at: Instant,
    error: String,
}

impl TransferState {
    /// Creates a new pending transfer.
    pub fn new(name: impl Into<String>, direction: Direction, total_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(StateInner {
                name: name.into(),
                direction,
                status: TransferStatus::Pending,
                total_bytes,
                transferred_bytes: 0,
                started_at: None,
                updated_at: Instant::now(),
                error: String::new(),
            }),
            speed: SpeedCalculator::default(),
        }
    }

    /// Marks the transfer as in progress.
    pub fn start(&self) {
        let mut s = self.inner.write().unwrap();
        s.status = TransferStatus::InProgress;
        let now = Instant::now();
        s.started_at = Some(now);
        s.updated_at = now;
    }

    /// Records `bytes` moved. Saturates at the declared total so the
    /// invariant holds even against a misbehaving peer.
    pub fn add_progress(&self, bytes: u64) {
        self.speed.record(bytes);
        let mut s = self.inner.write().unwrap();
        s.transferred_bytes = s.transferred_bytes.saturating_add(bytes).min(s.total_bytes);
        s.updated_at = Instant::now();
    }

    /// Marks the transfer as completed.
    pub fn complete(&self) {
        let mut s = self.inner.write().unwrap();
        s.status = TransferStatus::Completed;
        s.updated_at = Instant::now();
    }

    /// Marks the transfer as failed with an error message.
    pub fn fail(&self, err: &str) {
        let mut s = self.inner.write().unwrap();
        s.status = TransferStatus::Failed;
        s.error = err.to_string();
        s.updated_at = Instant::now();
    }

    /// Returns a snapshot for display.
    pub fn snapshot(&self) -> TransferProgress {
        let s = self.inner.read().unwrap();
        let remaining = s.total_bytes.saturating_sub(s.transferred_bytes);
        TransferProgress {
            name: s.name.clone(),
            direction: s.direction,
            status: s.status,
            total_bytes: s.total_bytes,
            transferred_bytes: s.transferred_bytes,
            bytes_per_second: self.speed.bytes_per_second(),
            eta: self.speed.eta(remaining),
            error: s.error.clone(),
        }
    }

    /// `true` while pending or in progress.
    pub fn is_active(&self) -> bool {
        let s = self.inner.read().unwrap();
        matches!(
            s.status,
            TransferStatus::Pending | TransferStatus::InProgress
        )
    }

    /// `true` exactly when every declared byte has moved.
    pub fn is_complete(&self) -> bool {
        let s = self.inner.read().unwrap();
        s.transferred_bytes == s.total_bytes
    }

    pub fn name(&self) -> String {
        self.inner.read().unwrap().name.clone()
    }

    pub fn status(&self) -> TransferStatus {
        self.inner.read().unwrap().status
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.read().unwrap().total_bytes
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.inner.read().unwrap().transferred_bytes
    }
}
