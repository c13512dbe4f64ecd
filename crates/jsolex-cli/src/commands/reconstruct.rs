use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use jsolex_core::events::{Broadcaster, Event, EventListener, GeneratedImageKind};
use jsolex_core::pipeline::{self, BandingParams, GeometryParams, ProcessParams, RequestedImages, SpectrumParams};

use crate::emitter::PngEmitter;
use crate::summary;

#[derive(Args)]
pub struct ReconstructArgs {
    /// Input SER file
    pub file: PathBuf,

    /// Process-parameters config file (TOML). Overrides every other flag.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name of the targeted absorption ray, e.g. "H-alpha"
    #[arg(long, default_value = "H-alpha")]
    pub ray: String,

    /// Primary pixel shift for the main reconstructed image
    #[arg(long, default_value_t = 0.0)]
    pub shift: f64,

    /// Additional pixel shifts to reconstruct and emit alongside the primary one
    #[arg(long, value_delimiter = ',')]
    pub extra_shifts: Vec<f64>,

    /// Opposite pixel-shift pair "red,blue" for a Doppler composite
    #[arg(long)]
    pub doppler: Option<String>,

    /// Swap the red/blue shifts in the Doppler pair
    #[arg(long)]
    pub switch_red_blue: bool,

    /// Force the tilt angle (radians) instead of fitting it from the ellipse
    #[arg(long)]
    pub forced_tilt: Option<f64>,

    /// Force the x/y axis ratio instead of fitting it from the ellipse
    #[arg(long)]
    pub forced_xy_ratio: Option<f64>,

    /// Flip the reconstructed image horizontally
    #[arg(long)]
    pub flip_horizontal: bool,

    /// Flip the reconstructed image vertically
    #[arg(long)]
    pub flip_vertical: bool,

    /// Row-window width for the banding corrector
    #[arg(long)]
    pub band_width: Option<usize>,

    /// Number of banding-correction passes
    #[arg(long)]
    pub band_passes: Option<usize>,

    /// Directory the reconstructed images are written to
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,
}

fn build_params(args: &ReconstructArgs) -> Result<ProcessParams> {
    if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config {}", config_path.display()))?;
        return toml::from_str(&contents).context("invalid process-parameters config");
    }

    let doppler_shift = match &args.doppler {
        Some(spec) => {
            let parts: Vec<f64> = spec.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if parts.len() != 2 {
                anyhow::bail!("--doppler expects \"red,blue\", got {spec:?}");
            }
            Some((parts[0], parts[1]))
        }
        None => None,
    };

    let mut pixel_shifts = vec![args.shift];
    pixel_shifts.extend(args.extra_shifts.iter().copied());
    let kinds = pixel_shifts.iter().map(|_| GeneratedImageKind::Reconstruction).collect();

    Ok(ProcessParams {
        spectrum: SpectrumParams {
            ray: args.ray.clone(),
            pixel_shift: args.shift,
            doppler_shift,
            switch_red_blue: args.switch_red_blue,
            ..Default::default()
        },
        observation: Default::default(),
        geometry: GeometryParams {
            forced_tilt: args.forced_tilt,
            forced_xy_ratio: args.forced_xy_ratio,
            horizontal_mirror: args.flip_horizontal,
            vertical_mirror: args.flip_vertical,
            ..Default::default()
        },
        banding: BandingParams {
            width: args.band_width.unwrap_or_else(|| BandingParams::default().width),
            passes: args.band_passes.unwrap_or_else(|| BandingParams::default().passes),
        },
        requested_images: RequestedImages { kinds, pixel_shifts, ..Default::default() },
        extra: Default::default(),
    })
}

/// Drives an [`indicatif`] progress bar off the core's broadcast events
/// (§4.8), the same "subscribe a reporter to the pipeline" shape the
/// teacher uses for its own `run_pipeline(&config, |stage, progress| ...)`
/// callback, generalized to the tagged-event model.
struct ProgressListener {
    bar: ProgressBar,
}

impl EventListener for ProgressListener {
    fn on_event(&self, event: &Event) {
        match event {
            Event::ProcessingStart => self.bar.set_message("starting"),
            Event::VideoMetadata { total_frames, width, height } => {
                self.bar.set_message(format!("{total_frames} frames, {width}x{height}"));
            }
            Event::OutputImageDimensionsDetermined { width, height } => {
                self.bar.set_message(format!("reconstructing {width}x{height}"));
            }
            Event::Progress { fraction, task } => {
                self.bar.set_position((fraction * 100.0) as u64);
                self.bar.set_message(task.clone());
            }
            Event::ImageGenerated { title, .. } => {
                self.bar.println(format!("generated: {title}"));
            }
            Event::Notification { severity, title, message, .. } => {
                self.bar.println(format!("[{severity:?}] {title}: {message}"));
            }
            Event::Suggestion { message } => {
                self.bar.println(format!("suggestion: {message}"));
            }
            Event::ProcessingDone { shift_images, .. } => {
                self.bar.set_position(100);
                self.bar.set_message(format!("done ({shift_images} image(s))"));
            }
            _ => {}
        }
    }
}

pub fn run(args: &ReconstructArgs) -> Result<()> {
    let params = build_params(args)?;
    summary::print_run_summary(&args.file, &params);

    let emitter = PngEmitter::new(args.output.clone())
        .with_context(|| format!("failed to create output directory {}", args.output.display()))?;

    let broadcaster = Broadcaster::new();
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:40} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );
    broadcaster.add_listener(Arc::new(ProgressListener { bar: bar.clone() }));

    let outcome = pipeline::reconstruct(&args.file, &params, &emitter, &broadcaster)?;

    bar.finish_with_message("done");
    summary::print_outcome_summary(&outcome, emitter.written_count());

    Ok(())
}
