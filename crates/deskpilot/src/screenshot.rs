//! Primary-monitor capture and encoding for the computer tool.
//!
//! Screenshots are downscaled to the XGA resolution the remote model
//! works in before being PNG-encoded and base64'd onto the wire.

use crate::AgentError;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageBuffer, ImageEncoder, Rgba};
use std::io::Cursor;
use xcap::Monitor;

/// Width of the virtual display the model sees.
pub const TARGET_WIDTH: u32 = 1024;
/// Height of the virtual display the model sees.
pub const TARGET_HEIGHT: u32 = 768;

/// Holds captured screenshot data (RGBA).
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw RGBA image data
    pub image_data: Vec<u8>,
    /// Width of the image
    pub width: u32,
    /// Height of the image
    pub height: u32,
}

impl ScreenshotResult {
    /// Capture the primary monitor. Falls back to the first monitor if
    /// none reports as primary.
    pub fn capture_primary() -> Result<Self, AgentError> {
        let monitors =
            Monitor::all().map_err(|e| AgentError::Screenshot(format!("monitor query: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| AgentError::Screenshot("no monitors found".into()))?;
        let img = monitor
            .capture_image()
            .map_err(|e| AgentError::Screenshot(format!("capture: {e}")))?;
        Ok(Self {
            width: img.width(),
            height: img.height(),
            image_data: img.into_raw(),
        })
    }

    /// Resize to the given dimensions with Lanczos3 resampling.
    pub fn resize_to(&self, width: u32, height: u32) -> Result<Self, AgentError> {
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let img = ImageBuffer::<Rgba<u8>, _>::from_raw(
            self.width,
            self.height,
            self.image_data.clone(),
        )
        .ok_or_else(|| AgentError::Screenshot("image buffer dimension mismatch".into()))?;
        let resized = image::imageops::resize(&img, width, height, FilterType::Lanczos3);
        Ok(Self {
            width,
            height,
            image_data: resized.into_raw(),
        })
    }

    /// Encode the raw RGBA data to PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, AgentError> {
        let mut png_data = Vec::new();
        let encoder = PngEncoder::new(Cursor::new(&mut png_data));
        encoder
            .write_image(
                &self.image_data,
                self.width,
                self.height,
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| AgentError::Screenshot(format!("PNG encode: {e}")))?;
        Ok(png_data)
    }

    /// Encode to a base64 PNG string suitable for an API image block.
    pub fn to_base64_png(&self) -> Result<String, AgentError> {
        Ok(general_purpose::STANDARD.encode(self.to_png()?))
    }
}

/// Capture the primary monitor, downscale to XGA, and base64-encode.
pub fn capture_xga_base64() -> Result<String, AgentError> {
    ScreenshotResult::capture_primary()?
        .resize_to(TARGET_WIDTH, TARGET_HEIGHT)?
        .to_base64_png()
}

/// Physical size of the primary monitor in pixels.
pub fn primary_screen_size() -> Result<(u32, u32), AgentError> {
    let monitors =
        Monitor::all().map_err(|e| AgentError::Screenshot(format!("monitor query: {e}")))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
        .ok_or_else(|| AgentError::Screenshot("no monitors found".into()))?;
    let width = monitor
        .width()
        .map_err(|e| AgentError::Screenshot(format!("monitor width: {e}")))?;
    let height = monitor
        .height()
        .map_err(|e| AgentError::Screenshot(format!("monitor height: {e}")))?;
    Ok((width, height))
}
