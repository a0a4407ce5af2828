use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::state::{TransferProgress, TransferState};

/// Default interval between periodic progress notifications.
const NOTIFY_INTERVAL: Duration = Duration::from_millis(500);

/// Default sliding window for throughput measurement.
const SPEED_WINDOW: Duration = Duration::from_secs(5);

/// Callback invoked with transfer progress.
pub type ProgressCallback = Box<dyn Fn(TransferProgress) + Send + Sync>;

/// Sliding-window throughput over byte samples.
///
/// Every [`TransferState`] owns one and feeds it a sample per chunk moved,
/// so the rate and ETA carried by progress snapshots come from actual wire
/// traffic, not synthetic counters.
pub struct SpeedCalculator {
    window: Duration,
    samples: Mutex<VecDeque<Sample>>,
}

struct Sample {
    at: Instant,
    bytes: u64,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(SPEED_WINDOW)
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Records `bytes` moved at the current instant and prunes samples that
    /// have fallen out of the window.
    pub fn record(&self, bytes: u64) {
        let now = Instant::now();
        let mut samples = self.samples.lock().unwrap();
        samples.push_back(Sample { at: now, bytes });
        while let Some(front) = samples.front() {
            if now.duration_since(front.at) > self.window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average throughput across the window, in bytes per second.
    ///
    /// Zero until at least two samples span a measurable interval.
    pub fn bytes_per_second(&self) -> f64 {
        let samples = self.samples.lock().unwrap();
        if samples.len() < 2 {
            return 0.0;
        }
        let first = samples.front().map(|s| s.at);
        let last = samples.back().map(|s| s.at);
        let (Some(first), Some(last)) = (first, last) else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if elapsed.is_zero() {
            return 0.0;
        }
        let total: u64 = samples.iter().map(|s| s.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining_bytes` at the current rate.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }

    /// Discards all samples, e.g. when a transfer restarts after a resume.
    pub fn reset(&self) {
        self.samples.lock().unwrap().clear();
    }
}

/// Periodically pushes snapshots of active transfers to registered
/// callbacks.
///
/// Purely observational: it holds shared references to transfer state but
/// never touches the transfer I/O path.
pub struct ProgressTracker {
    shared: Arc<Shared>,
    interval: Duration,
    ticker: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

struct Shared {
    callbacks: Mutex<Vec<ProgressCallback>>,
    transfers: Mutex<HashMap<String, Arc<TransferState>>>,
}

impl Shared {
    /// Snapshots every active transfer, then invokes callbacks outside the
    /// transfer lock.
    fn broadcast_active(&self) {
        let snapshots: Vec<TransferProgress> = {
            let transfers = self.transfers.lock().unwrap();
            transfers
                .values()
                .filter(|t| t.is_active())
                .map(|t| t.snapshot())
                .collect()
        };
        let callbacks = self.callbacks.lock().unwrap();
        for progress in snapshots {
            for cb in callbacks.iter() {
                cb(progress.clone());
            }
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::with_interval(NOTIFY_INTERVAL)
    }
}

impl ProgressTracker {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                callbacks: Mutex::new(Vec::new()),
                transfers: Mutex::new(HashMap::new()),
            }),
            interval,
            ticker: Mutex::new(None),
        }
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        self.shared.callbacks.lock().unwrap().push(callback);
    }

    /// Begins tracking a transfer, keyed by its filename.
    pub fn track(&self, state: Arc<TransferState>) {
        let name = state.name();
        self.shared.transfers.lock().unwrap().insert(name, state);
    }

    /// Stops tracking a transfer.
    pub fn untrack(&self, name: &str) {
        self.shared.transfers.lock().unwrap().remove(name);
    }

    /// Returns a tracked transfer by name.
    pub fn get(&self, name: &str) -> Option<Arc<TransferState>> {
        self.shared.transfers.lock().unwrap().get(name).cloned()
    }

    /// Sends a one-time progress notification for a single transfer.
    pub fn notify(&self, name: &str) {
        let snapshot = {
            let transfers = self.shared.transfers.lock().unwrap();
            transfers.get(name).map(|t| t.snapshot())
        };
        if let Some(progress) = snapshot {
            let callbacks = self.shared.callbacks.lock().unwrap();
            for cb in callbacks.iter() {
                cb(progress.clone());
            }
        }
    }

    /// Starts periodic notifications in a background tokio task.
    ///
    /// Call [`stop`](Self::stop) to cancel; starting again replaces the
    /// previous ticker.
    pub fn start(&self) {
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        *self.ticker.lock().unwrap() = Some(tx);

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => shared.broadcast_active(),
                    _ = &mut rx => break,
                }
            }
        });
    }

    /// Stops the periodic notification task.
    pub fn stop(&self) {
        // Dropping the sender signals the task to exit.
        drop(self.ticker.lock().unwrap().take());
    }
}
