use std::path::Path;

use console::Style;
use jsolex_core::pipeline::{ProcessParams, ProcessingOutcome};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(file: &Path, params: &ProcessParams) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("JSol'Ex Reconstruction"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(file.display()));
    println!();

    println!("  {}", s.header.apply_to("Spectrum"));
    println!("    {:<14}{}", s.label.apply_to("Ray"), s.value.apply_to(&params.spectrum.ray));
    println!("    {:<14}{}", s.label.apply_to("Shift"), s.value.apply_to(params.spectrum.pixel_shift));
    match params.spectrum.doppler_shift {
        Some((red, blue)) => println!(
            "    {:<14}{}",
            s.label.apply_to("Doppler"),
            s.value.apply_to(format!("{red:+.2} / {blue:+.2}"))
        ),
        None => println!("    {:<14}{}", s.label.apply_to("Doppler"), s.disabled.apply_to("disabled")),
    }
    println!();

    println!("  {}", s.header.apply_to("Geometry"));
    match params.geometry.forced_tilt {
        Some(t) => println!("    {:<14}{}", s.label.apply_to("Tilt"), s.value.apply_to(format!("{t:.4} rad (forced)"))),
        None => println!("    {:<14}{}", s.label.apply_to("Tilt"), s.value.apply_to("auto-fit")),
    }
    match params.geometry.forced_xy_ratio {
        Some(r) => println!("    {:<14}{}", s.label.apply_to("XY ratio"), s.value.apply_to(format!("{r:.4} (forced)"))),
        None => println!("    {:<14}{}", s.label.apply_to("XY ratio"), s.value.apply_to("auto-fit")),
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Mirrors"),
        s.value.apply_to(format!(
            "h={} v={}",
            params.geometry.horizontal_mirror, params.geometry.vertical_mirror
        ))
    );
    println!();

    println!("  {}", s.header.apply_to("Banding"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Width/passes"),
        s.value.apply_to(format!("{} / {}", params.banding.width, params.banding.passes))
    );
    println!();

    println!("  {}", s.header.apply_to("Requested images"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Shifts"),
        s.value.apply_to(format!("{:?}", params.requested_images.pixel_shifts))
    );
    println!();
}

pub fn print_outcome_summary(outcome: &ProcessingOutcome, files_written: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(outcome.source.total_frames)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Polynomial"),
        s.value.apply_to(format!(
            "a={:.6} b={:.6} c={:.3}",
            outcome.polynomial.a, outcome.polynomial.b, outcome.polynomial.c
        ))
    );
    match outcome.ellipse {
        Some(ref e) => println!(
            "    {:<14}{}",
            s.label.apply_to("Ellipse"),
            s.value.apply_to(format!(
                "center=({:.1},{:.1}) axes=({:.1},{:.1})",
                e.center_x, e.center_y, e.semi_major, e.semi_minor
            ))
        ),
        None => println!("    {:<14}{}", s.label.apply_to("Ellipse"), s.disabled.apply_to("fit failed")),
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Images"),
        s.value.apply_to(format!("{} reconstructed, {} files written", outcome.images.len(), files_written))
    );
    println!();
}
