//! The background writer thread.
//!
//! One dedicated worker drains the frame queue, resolves each entry on the
//! sample clock, and persists it under the active recording session. It is
//! the only thread that performs disk I/O for the pipeline, so the capture
//! and acquisition contexts never wait on the filesystem.
//!
//! The loop polls cooperatively: when recording is off, or the queue is
//! empty, or the head entry is not yet resolvable, it sleeps for the
//! configured poll interval instead of spinning.
//!
//! Unresolved entries are retried in place. The head entry blocks the queue
//! until its bracketing anchors arrive, which is what keeps persisted frame
//! indices in arrival order. Retry is bounded: after
//! `max_resolve_attempts` failed polls the entry is dropped with a warning,
//! without consuming a frame index.

use crate::config::WriterSettings;
use crate::correlator::TimeCorrelator;
use crate::error::{PipelineError, PipelineResult};
use crate::queue::FrameQueue;
use crate::session::{RecordingSession, ResolvedFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long `shutdown` waits for the worker before detaching it.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the background writer thread.
pub struct FrameWriter {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameWriter {
    /// Spawn the worker. It runs until `stop_and_join` (or drop).
    pub fn spawn(
        queue: Arc<FrameQueue>,
        correlator: Arc<TimeCorrelator>,
        session: Arc<RecordingSession>,
        settings: WriterSettings,
    ) -> PipelineResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("frame-writer".to_string())
            .spawn(move || run_loop(&queue, &correlator, &session, &settings, &thread_stop))
            .map_err(|e| PipelineError::WriterSpawn(e.to_string()))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the worker to stop and wait for it, bounded by `JOIN_TIMEOUT`.
    ///
    /// Returns false if the worker did not exit in time; it is then detached
    /// so the host's shutdown sequence can proceed.
    pub fn stop_and_join(&mut self) -> bool {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            let _ = handle.join();
            true
        } else {
            tracing::warn!(
                timeout_ms = JOIN_TIMEOUT.as_millis() as u64,
                "Writer thread did not stop within the grace period; detaching"
            );
            false
        }
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_and_join();
        }
    }
}

fn run_loop(
    queue: &FrameQueue,
    correlator: &TimeCorrelator,
    session: &RecordingSession,
    settings: &WriterSettings,
    stop: &AtomicBool,
) {
    let poll = Duration::from_millis(settings.poll_interval_ms.max(1));
    tracing::debug!(poll_ms = poll.as_millis() as u64, "Writer thread started");

    while !stop.load(Ordering::Acquire) {
        if !session.is_recording() {
            thread::sleep(poll);
            continue;
        }
        if !process_one(queue, correlator, session, settings.max_resolve_attempts) {
            thread::sleep(poll);
        }
    }

    drain(queue, correlator, session, settings);
    tracing::debug!("Writer thread exiting");
}

/// Persist the head entry if possible. Returns true when an entry was
/// persisted and more work may be immediately available.
fn process_one(
    queue: &FrameQueue,
    correlator: &TimeCorrelator,
    session: &RecordingSession,
    max_resolve_attempts: u32,
) -> bool {
    let generation = queue.generation();
    let Some(mut entry) = queue.pop_front() else {
        return false;
    };

    let sample_number = match entry.sample_number {
        Some(sample) => sample,
        None => match correlator.resolve(entry.arrival_time) {
            Some(sample) => sample,
            None => {
                entry.attempts += 1;
                if entry.attempts >= max_resolve_attempts {
                    tracing::warn!(
                        arrival_time = entry.arrival_time,
                        attempts = entry.attempts,
                        "Dropping frame: no bracketing anchors arrived"
                    );
                } else if !queue.requeue_front(entry, generation) {
                    tracing::debug!("Queue cleared while entry was in flight; entry dropped");
                }
                return false;
            }
        },
    };

    let persisted = session.write_frame(ResolvedFrame {
        sample_number,
        software_time: entry.arrival_time,
        payload: entry.payload,
        quality: entry.quality,
    });
    if !persisted {
        // Session went Idle between pop and write; the stop path clears the
        // queue, so the entry is simply dropped.
        tracing::debug!(
            arrival_time = entry.arrival_time,
            "Session closed before entry could be persisted"
        );
        return false;
    }

    // Anchors older than the oldest still-pending frame can no longer be
    // a lower bracket for anything.
    if let Some(oldest) = queue.oldest_arrival() {
        correlator.prune_older_than(oldest);
    }
    true
}

/// Best-effort drain of already-queued resolvable entries after the stop
/// signal, bounded by the configured grace period.
fn drain(
    queue: &FrameQueue,
    correlator: &TimeCorrelator,
    session: &RecordingSession,
    settings: &WriterSettings,
) {
    let deadline = Instant::now() + Duration::from_millis(settings.shutdown_grace_ms);
    let mut drained: u64 = 0;

    while Instant::now() < deadline && session.is_recording() && !queue.is_empty() {
        if !process_one(queue, correlator, session, settings.max_resolve_attempts) {
            // Head is unresolvable and no new anchors will arrive now.
            break;
        }
        drained += 1;
    }

    if drained > 0 {
        tracing::info!(drained, "Drained queued frames during shutdown");
    }
    let remaining = queue.len();
    if remaining > 0 {
        tracing::warn!(remaining, "Frames left unwritten at shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PendingFrame;
    use tempfile::TempDir;

    fn pipeline_parts() -> (Arc<FrameQueue>, Arc<TimeCorrelator>, Arc<RecordingSession>) {
        (
            Arc::new(FrameQueue::new()),
            Arc::new(TimeCorrelator::new()),
            Arc::new(RecordingSession::new()),
        )
    }

    fn fast_settings() -> WriterSettings {
        WriterSettings {
            poll_interval_ms: 1,
            shutdown_grace_ms: 200,
            max_resolve_attempts: 50,
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn writes_resolvable_frames_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let (queue, correlator, session) = pipeline_parts();

        session
            .start(&temp_dir.path().join("rec"), 1, 1, true, false)
            .unwrap();
        correlator.add_anchor(0, 1000);
        correlator.add_anchor(100, 2000);

        queue.push(PendingFrame::new(10, None, 75));
        queue.push(PendingFrame::new(50, None, 75));
        queue.push(PendingFrame::new(90, None, 75));

        let mut writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            fast_settings(),
        )
        .unwrap();

        assert!(wait_for(
            || session.written_frame_count() == 3,
            Duration::from_secs(2)
        ));
        assert!(writer.stop_and_join());
        session.stop();

        let contents = std::fs::read_to_string(
            temp_dir
                .path()
                .join("rec")
                .join(crate::session::TIMESTAMP_FILE_NAME),
        )
        .unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(rows, vec!["0,1,1,1100,10", "1,1,1,1500,50", "2,1,1,1900,90"]);
    }

    #[test]
    fn unresolved_head_blocks_until_anchor_arrives() {
        let temp_dir = TempDir::new().unwrap();
        let (queue, correlator, session) = pipeline_parts();

        session
            .start(&temp_dir.path().join("rec"), 1, 1, true, false)
            .unwrap();
        correlator.add_anchor(0, 1000);
        correlator.add_anchor(100, 2000);

        // 150 is beyond the last anchor; 50 is resolvable but must wait
        // behind the head to preserve arrival order.
        queue.push(PendingFrame::new(150, None, 75));
        queue.push(PendingFrame::new(50, None, 75));

        let mut writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            WriterSettings {
                max_resolve_attempts: 10_000,
                ..fast_settings()
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(session.written_frame_count(), 0);

        correlator.add_anchor(200, 3000);
        assert!(wait_for(
            || session.written_frame_count() == 2,
            Duration::from_secs(2)
        ));
        assert!(writer.stop_and_join());
        session.stop();

        let contents = std::fs::read_to_string(
            temp_dir
                .path()
                .join("rec")
                .join(crate::session::TIMESTAMP_FILE_NAME),
        )
        .unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(rows, vec!["0,1,1,2500,150", "1,1,1,1500,50"]);
    }

    #[test]
    fn bounded_retry_drops_unresolvable_frame() {
        let temp_dir = TempDir::new().unwrap();
        let (queue, correlator, session) = pipeline_parts();

        session
            .start(&temp_dir.path().join("rec"), 1, 1, true, false)
            .unwrap();

        // No anchors at all: the entry can never resolve.
        queue.push(PendingFrame::new(10, None, 75));

        let mut writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            WriterSettings {
                max_resolve_attempts: 3,
                ..fast_settings()
            },
        )
        .unwrap();

        assert!(wait_for(|| queue.is_empty(), Duration::from_secs(2)));
        // Dropped without consuming a frame index.
        assert_eq!(session.written_frame_count(), 0);
        assert!(writer.stop_and_join());
    }

    #[test]
    fn pre_resolved_entries_skip_the_correlator() {
        let temp_dir = TempDir::new().unwrap();
        let (queue, correlator, session) = pipeline_parts();

        session
            .start(&temp_dir.path().join("rec"), 1, 1, true, false)
            .unwrap();

        queue.push(PendingFrame::pre_resolved(77, 4242, None, 75));

        let mut writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            fast_settings(),
        )
        .unwrap();

        assert!(wait_for(
            || session.written_frame_count() == 1,
            Duration::from_secs(2)
        ));
        assert!(writer.stop_and_join());
        session.stop();

        let contents = std::fs::read_to_string(
            temp_dir
                .path()
                .join("rec")
                .join(crate::session::TIMESTAMP_FILE_NAME),
        )
        .unwrap();
        assert_eq!(contents.lines().nth(1).unwrap(), "0,1,1,4242,77");
    }

    #[test]
    fn idle_session_writes_nothing() {
        let (queue, correlator, session) = pipeline_parts();
        correlator.add_anchor(0, 1000);
        correlator.add_anchor(100, 2000);
        queue.push(PendingFrame::new(50, None, 75));

        let mut writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            fast_settings(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(session.written_frame_count(), 0);
        assert_eq!(queue.len(), 1);
        assert!(writer.stop_and_join());
    }

    #[test]
    fn stop_and_join_is_idempotent() {
        let (queue, correlator, session) = pipeline_parts();
        let mut writer =
            FrameWriter::spawn(queue, correlator, session, fast_settings()).unwrap();

        assert!(writer.stop_and_join());
        assert!(writer.stop_and_join());
    }
}
