//! Rotate command
//!
//! Renders successive hue rotations of one image into numbered PNG frames.
//! `--serial` runs the single-threaded reference path for comparison.
//! Ctrl-C stops either path after the frame being written.

use crate::{Cli, RotateArgs};
#[allow(unused_imports)]
use tracing::{debug, info, trace};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use vhue_color::{apply_serial, normalize_angle, HueShift};
use vhue_core::{ImageBuffer, PartitionPolicy};
use vhue_pool::{CancelToken, Coordinator, Frame, FrameLimit, PipelineConfig};

use super::{base_config, format_size, frame_path, install_interrupt, load_image, save_image};

pub fn run(args: &RotateArgs, cli: &Cli) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "rotate::run");

    let config = pipeline_config(args, cli)?;
    let source = load_image(&args.input)?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create: {}", args.output.display()))?;

    if cli.verbose > 0 {
        println!(
            "Rotating {} ({}x{}, {} ch, {})",
            args.input.display(),
            source.width(),
            source.height(),
            source.channels(),
            format_size(source.size_bytes() as u64)
        );
    }

    let started = Instant::now();
    let frames = if args.serial {
        let cancel = CancelToken::new();
        install_interrupt(cancel.clone())?;
        run_serial(&source, &config, &args.output, &cancel)?
    } else {
        run_pooled(source, config, args, cli.verbose)?
    };

    info!(frames, elapsed = ?started.elapsed(), "rotate finished");
    if cli.verbose > 0 {
        println!("Wrote {} frames to {} in {:.2?}", frames, args.output.display(), started.elapsed());
    }

    Ok(())
}

/// Config file and `-j` first, then this command's flags.
fn pipeline_config(args: &RotateArgs, cli: &Cli) -> Result<PipelineConfig> {
    let mut config = base_config(cli.config.as_deref(), cli.threads)?;
    if let Some(n) = args.frames {
        config.frame_count = Some(n);
        config.run_forever = false;
    }
    if args.forever {
        config.frame_count = None;
        config.run_forever = true;
    }
    if let Some(step) = args.step {
        config.rotation_step = step;
    }
    if let Some(angle) = args.angle {
        config.initial_angle = angle;
    }
    if let Some(ms) = args.timeout_ms {
        config.collect_timeout_ms = Some(ms);
    }
    if args.exact {
        config.partition = PartitionPolicy::Exact;
    }
    config.validate()?;
    Ok(config)
}

fn run_pooled(source: ImageBuffer, config: PipelineConfig, args: &RotateArgs, verbose: u8) -> Result<u64> {
    let mut coord = Coordinator::new(config, HueShift).context("Failed to start worker pool")?;
    install_interrupt(coord.cancel_token())?;
    info!(workers = coord.worker_count(), "Rendering frames");

    let mut sink = |frame: &Frame| -> vhue_core::Result<()> {
        let path = frame_path(&args.output, frame.index);
        save_image(&path, &frame.image).map_err(|e| vhue_core::Error::sink(format!("{e:#}")))?;
        if verbose > 1 {
            println!("  {} ({:.1} deg)", path.display(), frame.angle);
        }
        Ok(())
    };
    let summary = coord.run(Arc::new(source), &mut sink)?;
    coord.shutdown()?;

    debug!(?summary, "pool run complete");
    if summary.cancelled && verbose > 0 {
        println!("Interrupted after {} frames", summary.frames);
    }
    Ok(summary.frames)
}

fn run_serial(source: &ImageBuffer, config: &PipelineConfig, output: &Path, cancel: &CancelToken) -> Result<u64> {
    let mut angle = normalize_angle(config.initial_angle);
    let mut index = 0;
    loop {
        if matches!(config.frame_limit(), FrameLimit::Count(n) if index >= n) {
            break;
        }
        if !cancel.wait_while_paused() {
            info!(frames = index, "serial run cancelled");
            break;
        }
        let mut image = source.clone();
        apply_serial(&mut image, &HueShift, angle);
        save_image(&frame_path(output, index), &image)?;
        trace!(index, angle, "serial frame written");

        index += 1;
        angle = normalize_angle(angle + config.rotation_step);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ImageBuffer {
        ImageBuffer::from_raw(2, 2, 3, vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 10, 20, 30]).unwrap()
    }

    #[test]
    fn test_serial_writes_requested_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig { frame_count: Some(2), rotation_step: 90.0, ..Default::default() };

        let frames = run_serial(&source(), &config, dir.path(), &CancelToken::new()).unwrap();
        assert_eq!(frames, 2);
        assert!(frame_path(dir.path(), 0).exists());
        assert!(frame_path(dir.path(), 1).exists());
        assert!(!frame_path(dir.path(), 2).exists());
    }

    #[test]
    fn test_serial_forever_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig { frame_count: None, run_forever: true, ..Default::default() };
        let cancel = CancelToken::new();
        cancel.cancel();

        let frames = run_serial(&source(), &config, dir.path(), &cancel).unwrap();
        assert_eq!(frames, 0);
        assert!(!frame_path(dir.path(), 0).exists());
    }
}
