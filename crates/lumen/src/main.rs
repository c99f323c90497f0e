//! Offline render driver.
//!
//! Loads a scene description, accumulates a fixed number of path-traced
//! passes, and writes the gamma-corrected result to a PNG next to the
//! working directory.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Arg, Command};
use lumen_renderer::{load_scene, trace_scene, Camera, Frame, ImagePlaneCache};

const DEFAULT_WIDTH: u32 = 800;
const DEFAULT_HEIGHT: u32 = 480;
const ACCUMULATION_PASSES: u32 = 16;
const OUTPUT_FILENAME: &str = "output.png";

fn cli() -> Command {
    Command::new("lumen")
        .about("Monte-Carlo path tracer")
        .arg(Arg::new("file").long("file").short('f').value_name("PATH"))
        .arg(Arg::new("width").long("width").short('w').value_name("INT"))
        .arg(
            Arg::new("height")
                .long("height")
                .short('h')
                .value_name("INT"),
        )
        .disable_help_flag(true)
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = cli().get_matches();

    // No scene file means there is nothing to do; print usage and leave
    // with a success status.
    let Some(scene_file) = matches.get_one::<String>("file") else {
        cli().print_help()?;
        return Ok(());
    };

    let width = matches
        .get_one::<String>("width")
        .map(|v| v.parse::<u32>())
        .transpose()
        .context("invalid --width")?
        .unwrap_or(DEFAULT_WIDTH);
    let height = matches
        .get_one::<String>("height")
        .map(|v| v.parse::<u32>())
        .transpose()
        .context("invalid --height")?
        .unwrap_or(DEFAULT_HEIGHT);

    let scene = match load_scene(scene_file) {
        Ok(scene) => scene,
        Err(err) => {
            log::error!("Failed to read scene file {scene_file}: {err}.");
            return Ok(());
        }
    };

    let camera = scene.camera(0).copied().unwrap_or_else(|| {
        log::warn!("Scene defines no camera; using the default view.");
        Camera::default()
    });

    let mut frame = Frame::new(width, height);
    let mut cache = ImagePlaneCache::new(width, height);

    let base_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|t| t.as_nanos() as u64)
        .unwrap_or(0);

    for pass in 0..ACCUMULATION_PASSES {
        trace_scene(
            &camera,
            &scene,
            &mut frame,
            Some(&mut cache),
            base_seed.wrapping_add(pass as u64),
        );
    }

    let image = image::RgbImage::from_raw(width, height, frame.display_buffer().to_vec())
        .context("display buffer size mismatch")?;
    image
        .save(OUTPUT_FILENAME)
        .with_context(|| format!("failed to write {OUTPUT_FILENAME}"))?;

    log::info!(
        "Wrote {} ({}x{}, {} passes).",
        OUTPUT_FILENAME,
        width,
        height,
        ACCUMULATION_PASSES
    );

    Ok(())
}
