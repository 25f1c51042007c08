//! Shift command - single hue shift

use anyhow::{Context, Result};
use crate::{Cli, ShiftArgs, commands::{base_config, load_image, save_image}};
use std::sync::Arc;
#[allow(unused_imports)]
use tracing::{debug, info, trace};
use vhue_color::{apply_serial, HueShift};
use vhue_pool::Coordinator;

pub fn run(args: &ShiftArgs, cli: &Cli) -> Result<()> {
    trace!(input = %args.input.display(), angle = args.angle, "shift::run");
    if cli.verbose > 0 {
        println!("Loading: {}", args.input.display());
    }

    let input = load_image(&args.input)?;
    info!(w = input.width(), h = input.height(), angle = args.angle, serial = args.serial, "Shifting hue");

    let result = if args.serial {
        let mut image = input;
        apply_serial(&mut image, &HueShift, args.angle);
        image
    } else {
        let config = base_config(cli.config.as_deref(), cli.threads)?;
        let mut coord = Coordinator::new(config, HueShift).context("Failed to start worker pool")?;
        let image = coord.render_at(&Arc::new(input), args.angle)?;
        coord.shutdown()?;
        image
    };

    save_image(&args.output, &result)?;

    if cli.verbose > 0 {
        println!("Saved: {}", args.output.display());
    }

    Ok(())
}
