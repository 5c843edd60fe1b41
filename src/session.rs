//! Recording-session state and persistence.
//!
//! A `RecordingSession` owns the mutable "where/how to write right now"
//! state: the target directory, experiment/recording numbers, the open
//! timestamp log, and the recording on/off flag. Sessions transition
//! `Idle -> Active -> Idle`; starting while already active replaces the
//! current session after flushing it.
//!
//! Locking discipline: the session mutex is contended only by the writer
//! thread and the host control surface. Real-time producers read the atomic
//! `recording` flag and never take the mutex, so holding it across the file
//! writes below cannot stall capture or acquisition contexts. Taking the
//! mutex is also exactly what quiesces the writer during a start/stop swap.

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::image_writer::JpegWriter;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Timestamp log file name inside a recording directory.
pub const TIMESTAMP_FILE_NAME: &str = "frame_timestamps.csv";

/// Sync marker file name inside a recording directory.
pub const SYNC_FILE_NAME: &str = "sync_messages.txt";

/// Image subfolder inside a recording directory.
pub const FRAMES_SUBDIR: &str = "frames";

const TIMESTAMP_HEADER: &str =
    "# Frame index, Recording number, Experiment number, Source timestamp, Software timestamp\n";

/// A frame with its resolved sample-clock position, ready to persist.
#[derive(Debug)]
pub struct ResolvedFrame {
    pub sample_number: i64,
    pub software_time: i64,
    pub payload: Option<Frame>,
    pub quality: u8,
}

/// Open file handles and counters for one active recording.
struct ActiveRecording {
    directory: PathBuf,
    frames_dir: PathBuf,
    experiment_number: u32,
    recording_number: u32,
    timestamps: csv::Writer<File>,
    save_images: bool,
    first_frame_time: Option<i64>,
    written: i64,
}

/// The currently-active recording target, or Idle.
pub struct RecordingSession {
    active: Mutex<Option<ActiveRecording>>,
    recording: AtomicBool,
    frame_index: AtomicI64,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            recording: AtomicBool::new(false),
            frame_index: AtomicI64::new(0),
        }
    }

    /// Start a recording into `directory`.
    ///
    /// Creates the directory tree (including the image subfolder) and the
    /// timestamp log, then enables writing. An already-active session is
    /// flushed and closed first. On failure the session is left Idle and the
    /// error is returned; nothing is ever written to a path that could not
    /// be created.
    pub fn start(
        &self,
        directory: &Path,
        experiment_number: u32,
        recording_number: u32,
        reset_frame_index: bool,
        save_images: bool,
    ) -> PipelineResult<()> {
        self.recording.store(false, Ordering::Release);

        let mut guard = self.lock();
        if let Some(previous) = guard.take() {
            tracing::info!(
                directory = %previous.directory.display(),
                "Replacing active recording session"
            );
            Self::finalize(previous);
        }

        let frames_dir = directory.join(FRAMES_SUBDIR);
        std::fs::create_dir_all(&frames_dir).map_err(|e| {
            PipelineError::Session(format!(
                "failed to create recording directory {}: {e}",
                directory.display()
            ))
        })?;

        let timestamps = Self::create_timestamp_file(&directory.join(TIMESTAMP_FILE_NAME))?;

        if reset_frame_index {
            self.frame_index.store(0, Ordering::Release);
        }

        *guard = Some(ActiveRecording {
            directory: directory.to_path_buf(),
            frames_dir,
            experiment_number,
            recording_number,
            timestamps,
            save_images,
            first_frame_time: None,
            written: 0,
        });
        drop(guard);

        self.recording.store(true, Ordering::Release);
        tracing::info!(
            directory = %directory.display(),
            experiment_number,
            recording_number,
            reset_frame_index,
            "Recording session started"
        );
        Ok(())
    }

    /// Stop the active recording, flushing and closing its files.
    pub fn stop(&self) {
        self.recording.store(false, Ordering::Release);
        if let Some(previous) = self.lock().take() {
            Self::finalize(previous);
        }
    }

    /// Persist one resolved frame under the active session.
    ///
    /// No-op (returns false) when no session is active. Per-item I/O errors
    /// are logged and skipped; the frame index advances regardless so the
    /// index sequence stays aligned with the sample-clock record.
    pub fn write_frame(&self, frame: ResolvedFrame) -> bool {
        let mut guard = self.lock();
        let Some(recording) = guard.as_mut() else {
            return false;
        };

        let index = self.frame_index.fetch_add(1, Ordering::AcqRel);

        if recording.save_images {
            if let Some(payload) = &frame.payload {
                let path = recording.frames_dir.join(format!("frame_{index:010}.jpg"));
                if let Err(e) = JpegWriter::write_frame(payload, &path, frame.quality) {
                    tracing::warn!(index, error = %e, "Failed to write frame image; skipping");
                }
            }
        }

        let row = [
            index.to_string(),
            recording.recording_number.to_string(),
            recording.experiment_number.to_string(),
            frame.sample_number.to_string(),
            frame.software_time.to_string(),
        ];
        if let Err(e) = recording.timestamps.write_record(&row) {
            tracing::warn!(index, error = %e, "Failed to append timestamp row; skipping");
        } else if let Err(e) = recording.timestamps.flush() {
            tracing::warn!(index, error = %e, "Failed to flush timestamp log");
        }

        if recording.first_frame_time.is_none() {
            recording.first_frame_time = Some(frame.software_time);
        }
        recording.written += 1;
        true
    }

    /// True only while a session is active and its directory and timestamp
    /// log both still exist on disk.
    pub fn has_valid_path(&self) -> bool {
        let guard = self.lock();
        match guard.as_ref() {
            Some(recording) => {
                recording.directory.exists()
                    && recording.directory.join(TIMESTAMP_FILE_NAME).exists()
            }
            None => false,
        }
    }

    /// Fast-path flag for producers; readable without taking the lock.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Next frame index to be assigned; equals the count of frames written
    /// since the index was last reset.
    pub fn written_frame_count(&self) -> i64 {
        self.frame_index.load(Ordering::Acquire)
    }

    fn create_timestamp_file(path: &Path) -> PipelineResult<csv::Writer<File>> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                PipelineError::Session(format!(
                    "failed to open timestamp file {}: {e}",
                    path.display()
                ))
            })?;

        // The header is a raw comment line; the csv writer handles data rows.
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);
        if is_new {
            file.write_all(TIMESTAMP_HEADER.as_bytes()).map_err(|e| {
                PipelineError::Session(format!(
                    "failed to write timestamp header to {}: {e}",
                    path.display()
                ))
            })?;
        }

        Ok(csv::Writer::from_writer(file))
    }

    fn finalize(mut recording: ActiveRecording) {
        if let Err(e) = recording.timestamps.flush() {
            tracing::warn!(error = %e, "Failed to flush timestamp log on close");
        }

        // One sync marker per recording, only once a frame was captured.
        if let Some(first_frame_time) = recording.first_frame_time {
            if let Err(e) = Self::write_sync_marker(&recording.directory, first_frame_time) {
                tracing::warn!(error = %e, "Failed to write sync marker");
            }
        }

        tracing::info!(
            directory = %recording.directory.display(),
            recording_number = recording.recording_number,
            written = recording.written,
            "Recording session closed"
        );
    }

    fn write_sync_marker(directory: &Path, first_frame_time: i64) -> PipelineResult<()> {
        let path = directory.join(SYNC_FILE_NAME);
        let mut file = File::create(&path)?;
        writeln!(file, "First recorded frame time: {first_frame_time}")?;
        file.flush()?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
