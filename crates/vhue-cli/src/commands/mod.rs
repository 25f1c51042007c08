//! CLI command implementations

pub mod rotate;
pub mod shift;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use vhue_core::ImageBuffer;
use vhue_pool::{CancelToken, PipelineConfig};

/// Load image from path as packed RGB, or RGBA if it has alpha
pub fn load_image(path: &Path) -> Result<ImageBuffer> {
    let img = image::open(path).with_context(|| format!("Failed to load: {}", path.display()))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let buffer = if img.color().has_alpha() {
        ImageBuffer::from_raw(w, h, 4, img.to_rgba8().into_raw())
    } else {
        ImageBuffer::from_raw(w, h, 3, img.to_rgb8().into_raw())
    };
    buffer.with_context(|| format!("Unsupported image: {}", path.display()))
}

/// Save image to path; format follows the extension
pub fn save_image(path: &Path, image: &ImageBuffer) -> Result<()> {
    let w = u32::try_from(image.width()).context("Image too wide")?;
    let h = u32::try_from(image.height()).context("Image too tall")?;
    let data = image.data().to_vec();

    let saved = match image.channels() {
        3 => image::RgbImage::from_raw(w, h, data).map(|img| img.save(path)),
        4 => image::RgbaImage::from_raw(w, h, data).map(|img| img.save(path)),
        c => bail!("Cannot save {c}-channel image"),
    };
    saved
        .context("Pixel buffer does not match image size")?
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Route Ctrl-C to `token` so a run stops at the next frame boundary.
/// Can only be installed once per process.
pub fn install_interrupt(token: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, cancelling");
        token.cancel();
    })
    .context("Failed to install Ctrl-C handler")
}

/// Path of one animation frame inside `dir`
pub fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

/// Loads `--config` if given, then applies `-j`.
pub fn base_config(config: Option<&Path>, threads: usize) -> Result<PipelineConfig> {
    let mut cfg = match config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if threads > 0 {
        cfg.worker_count = Some(threads);
    }
    Ok(cfg)
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
