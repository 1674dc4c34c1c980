use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use audio_line_core::LineError;
use parking_lot::Mutex;

use crate::stream::VirtualStream;

pub(crate) type StreamTable = Arc<Mutex<Vec<Arc<VirtualStream>>>>;

/// Advance every live stream by `elapsed`, pruning released ones.
///
/// The table lock is dropped before any stream is touched, so notifiers
/// never run under it.
pub(crate) fn advance_all(streams: &StreamTable, elapsed: Duration, time_scale: f64) {
    let live: Vec<Arc<VirtualStream>> = {
        let mut table = streams.lock();
        table.retain(|s| !s.is_released());
        table.clone()
    };
    for stream in live {
        stream.advance(elapsed, time_scale);
    }
}

/// Spawn the device clock thread. Runs until `running` is cleared; unpark
/// the thread to make it notice promptly.
pub(crate) fn spawn(
    running: Arc<AtomicBool>,
    streams: StreamTable,
    tick: Duration,
    time_scale: f64,
) -> Result<thread::JoinHandle<()>, LineError> {
    thread::Builder::new()
        .name("virtual-sound-clock".into())
        .spawn(move || {
            let mut last = Instant::now();
            while running.load(Ordering::SeqCst) {
                thread::park_timeout(tick);
                let now = Instant::now();
                advance_all(&streams, now - last, time_scale);
                last = now;
            }
            log::debug!("Virtual sound clock stopped");
        })
        .map_err(|e| LineError::LineUnavailable(format!("failed to spawn clock thread: {}", e)))
}

/// Wait for the clock thread to exit. Returns false, after logging, if it
/// panicked.
pub(crate) fn join(handle: thread::JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            log::error!("Virtual sound clock thread panicked: {}", message);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_reports_a_panicked_clock() {
        let handle = thread::spawn(|| panic!("tick overflow"));
        assert!(!join(handle));
    }

    #[test]
    fn spawned_clock_stops_when_unparked() {
        let running = Arc::new(AtomicBool::new(true));
        let streams: StreamTable = Arc::new(Mutex::new(Vec::new()));
        let handle = spawn(Arc::clone(&running), streams, Duration::from_secs(60), 1.0).unwrap();

        running.store(false, Ordering::SeqCst);
        handle.thread().unpark();
        assert!(join(handle));
    }
}
