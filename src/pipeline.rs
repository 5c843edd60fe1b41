//! The assembled recording pipeline and its collaborator-facing contract.
//!
//! `FramePipeline` wires the four pipeline components together and exposes
//! the three surfaces the host interacts with:
//!
//! - the camera collaborator delivers frames (`on_frame_received`,
//!   `on_still_picture_ready`);
//! - the acquisition collaborator delivers one anchor per processing block
//!   (`on_block_processed`);
//! - the host control surface starts and stops recordings and queries the
//!   written-frame count.
//!
//! The camera and acquisition entry points run on real-time contexts: they
//! only touch the queue, the correlator, and atomic flags, each under a
//! short-held lock, and return immediately. All disk I/O happens on the
//! writer thread, except for the directory/file creation performed
//! synchronously by `start_recording` so that configuration errors surface
//! to the caller.

use crate::capabilities::{Clock, PathProvider};
use crate::config::{is_legal_directory_name, RecordingSettings, Settings};
use crate::correlator::TimeCorrelator;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, PendingFrame};
use crate::queue::FrameQueue;
use crate::session::RecordingSession;
use crate::writer::FrameWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// The asynchronous recording pipeline.
pub struct FramePipeline {
    queue: Arc<FrameQueue>,
    correlator: Arc<TimeCorrelator>,
    session: Arc<RecordingSession>,
    writer: Mutex<FrameWriter>,
    clock: Arc<dyn Clock>,
    paths: Arc<dyn PathProvider>,
    recording_cfg: RecordingSettings,
    image_quality: AtomicU8,
    frames_received: AtomicI64,
}

impl FramePipeline {
    /// Build the pipeline and spawn its writer thread.
    pub fn new(
        settings: &Settings,
        clock: Arc<dyn Clock>,
        paths: Arc<dyn PathProvider>,
    ) -> PipelineResult<Self> {
        settings.validate()?;

        let queue = Arc::new(FrameQueue::new());
        let correlator = Arc::new(TimeCorrelator::new());
        let session = Arc::new(RecordingSession::new());

        let writer = FrameWriter::spawn(
            Arc::clone(&queue),
            Arc::clone(&correlator),
            Arc::clone(&session),
            settings.writer.clone(),
        )?;

        Ok(Self {
            queue,
            correlator,
            session,
            writer: Mutex::new(writer),
            clock,
            paths,
            recording_cfg: settings.recording.clone(),
            image_quality: AtomicU8::new(clamp_quality(i32::from(
                settings.recording.image_quality,
            ))),
            frames_received: AtomicI64::new(0),
        })
    }

    /// Camera callback: a frame arrived at `arrival_time` (software ms).
    ///
    /// Never blocks beyond the queue's list manipulation. Returns true when
    /// the frame was accepted for persistence (recording on, pipeline alive).
    pub fn on_frame_received(&self, frame: Frame, arrival_time: i64) -> bool {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        if !self.session.is_recording() {
            return false;
        }
        let quality = self.image_quality.load(Ordering::Relaxed);
        self.queue
            .push(PendingFrame::new(arrival_time, Some(frame), quality))
    }

    /// Camera callback: a trigger-driven still, already stamped on the
    /// sample clock, is ready.
    pub fn on_still_picture_ready(&self, frame: Frame, trigger_sample_number: i64) -> bool {
        if !self.session.is_recording() {
            return false;
        }
        let quality = self.image_quality.load(Ordering::Relaxed);
        self.queue.push(PendingFrame::pre_resolved(
            self.clock.now_ms(),
            trigger_sample_number,
            Some(frame),
            quality,
        ))
    }

    /// Acquisition callback: one anchor per processing block.
    pub fn on_block_processed(&self, first_sample_number: i64, software_time: i64) {
        self.correlator.add_anchor(software_time, first_sample_number);
    }

    /// Start (or replace) a recording session.
    ///
    /// The recording tree is
    /// `<parent>/experiment<N>/recording<M>/<directory_name>/`. Directory
    /// creation errors surface here and leave the session Idle.
    pub fn start_recording(
        &self,
        experiment_number: u32,
        recording_number: u32,
        reset_frame_index: bool,
    ) -> PipelineResult<()> {
        if experiment_number < 1 {
            return Err(PipelineError::Configuration(
                "experiment_number must be at least 1".to_string(),
            ));
        }
        if !is_legal_directory_name(&self.recording_cfg.directory_name) {
            return Err(PipelineError::Configuration(format!(
                "invalid recording directory name: '{}'",
                self.recording_cfg.directory_name
            )));
        }

        let directory = self.recording_directory(experiment_number, recording_number);
        self.session.start(
            &directory,
            experiment_number,
            recording_number,
            reset_frame_index,
            self.recording_cfg.save_images,
        )
    }

    /// Stop the active recording and discard any state belonging to it.
    ///
    /// Pending frames and the anchor history are cleared so nothing from
    /// this session can leak into the next one's files.
    pub fn stop_recording(&self) {
        self.session.stop();
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Cleared pending frames at stop");
        }
        self.correlator.clear();
    }

    /// Frames persisted since the index was last reset.
    pub fn written_frame_count(&self) -> i64 {
        self.session.written_frame_count()
    }

    /// Frames received from the camera since construction, recording or not.
    pub fn frames_received(&self) -> i64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Entries waiting on the queue.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    /// Set the JPEG quality for subsequently queued frames, clamped to 1..=100.
    pub fn set_image_quality(&self, quality: i32) {
        self.image_quality
            .store(clamp_quality(quality), Ordering::Relaxed);
    }

    pub fn image_quality(&self) -> u8 {
        self.image_quality.load(Ordering::Relaxed)
    }

    /// Stop everything: close the active session, reject further frames,
    /// and stop the writer thread with a bounded wait.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if self.session.is_recording() {
            self.stop_recording();
        }
        self.queue.close();
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_and_join();
    }

    fn recording_directory(&self, experiment_number: u32, recording_number: u32) -> PathBuf {
        self.paths
            .recording_parent()
            .join(format!("experiment{experiment_number}"))
            .join(format!("recording{recording_number}"))
            .join(&self.recording_cfg.directory_name)
    }
}

fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(1, 100) as u8
}
