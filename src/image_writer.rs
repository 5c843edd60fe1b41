//! JPEG export for camera frames.
//!
//! Writes single frames as JPEG files. Supports 8-bit grayscale and
//! interleaved 8-bit RGB payloads.

use crate::frame::Frame;
use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// JPEG export functionality for frame payloads.
pub struct JpegWriter;

impl JpegWriter {
    /// Write a frame to a JPEG file at the given quality (1..=100).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Frame dimensions don't match the data size
    /// - The file cannot be created
    /// - JPEG encoding fails
    pub fn write_frame<P: AsRef<Path>>(frame: &Frame, path: P, quality: u8) -> Result<()> {
        let path = path.as_ref();

        if frame.data.len() != frame.expected_len() {
            return Err(anyhow!(
                "Frame data size mismatch: expected {} bytes for {}x{} ({} channel), got {} bytes",
                frame.expected_len(),
                frame.width,
                frame.height,
                frame.channels,
                frame.data.len()
            ));
        }

        let color = match frame.channels {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            other => return Err(anyhow!("Unsupported channel count: {other}")),
        };

        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let writer = BufWriter::new(file);

        JpegEncoder::new_with_quality(writer, quality.clamp(1, 100))
            .encode(&frame.data, frame.width, frame.height, color)
            .with_context(|| format!("Failed to encode JPEG to {:?}", path))?;

        tracing::debug!(
            path = ?path,
            dimensions = format!("{}x{}", frame.width, frame.height),
            channels = frame.channels,
            quality,
            "Wrote JPEG frame"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gradient_gray(width: u32, height: u32) -> Frame {
        let len = (width * height) as usize;
        let data: Vec<u8> = (0..len)
            .map(|i| ((i as f32 / len as f32) * 255.0) as u8)
            .collect();
        Frame::gray(width, height, data)
    }

    #[test]
    fn writes_gray_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gray.jpg");

        let frame = gradient_gray(64, 48);
        JpegWriter::write_frame(&frame, &path, 75).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn writes_rgb_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rgb.jpg");

        let data = vec![128u8; 64 * 48 * 3];
        let frame = Frame::rgb(64, 48, data);
        JpegWriter::write_frame(&frame, &path, 90).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn rejects_size_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jpg");

        let mut frame = gradient_gray(64, 48);
        frame.data.truncate(10);

        let result = JpegWriter::write_frame(&frame, &path, 75);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("mismatch"));
    }

    #[test]
    fn rejects_unknown_channel_count() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jpg");

        let frame = Frame {
            width: 2,
            height: 2,
            channels: 4,
            data: vec![0u8; 16],
        };

        assert!(JpegWriter::write_frame(&frame, &path, 75).is_err());
    }
}
