//! # Frame Sync Core Library
//!
//! This crate implements an asynchronous recording pipeline for camera
//! frames that must be timestamped on a separately-clocked acquisition
//! device's sample timeline. Frames and acquisition sample-block anchors
//! arrive on real-time contexts that may never block; a dedicated background
//! writer interpolates each frame's arrival time onto the sample clock and
//! persists image payloads plus a CSV timestamp log.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`capabilities`**: Injected host services (`Clock`, `PathProvider`) so
//!   the core runs under test without a host application.
//! - **`config`**: Structures for loading and validating configuration from
//!   TOML files. See `config::Settings`.
//! - **`correlator`**: `TimeCorrelator`, the ordered anchor history and the
//!   software-time to sample-number interpolation.
//! - **`error`**: The custom `PipelineError` enum for centralized error
//!   handling across the crate.
//! - **`frame`**: Frame payloads and the queue-entry type.
//! - **`image_writer`**: JPEG export of frame payloads.
//! - **`logging`**: `tracing` subscriber initialization.
//! - **`pipeline`**: `FramePipeline`, the assembled pipeline and the
//!   collaborator-facing contract (camera events, acquisition anchors, host
//!   start/stop control).
//! - **`queue`**: `FrameQueue`, the lock-protected FIFO hand-off between the
//!   capture context and the writer.
//! - **`session`**: `RecordingSession`, the mutable recording target
//!   (directory, numbering, open timestamp log) with atomic start/stop.
//! - **`writer`**: `FrameWriter`, the background worker that drains the
//!   queue and performs all disk I/O.

pub mod capabilities;
pub mod config;
pub mod correlator;
pub mod error;
pub mod frame;
pub mod image_writer;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod writer;

pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
pub use frame::Frame;
pub use pipeline::FramePipeline;
