use anyhow::Result;
use jsolex_core::pipeline::{ProcessParams, RequestedImages, SpectrumParams};

/// Print a full default `ProcessParams` as TOML to stdout, a starting point
/// for a `--config` file (§6 "Process parameters").
pub fn run() -> Result<()> {
    let params = ProcessParams {
        spectrum: SpectrumParams { ray: "H-alpha".to_string(), ..Default::default() },
        observation: Default::default(),
        geometry: Default::default(),
        banding: Default::default(),
        requested_images: RequestedImages::default(),
        extra: Default::default(),
    };
    let toml_str = toml::to_string_pretty(&params)?;
    print!("{}", toml_str);
    Ok(())
}
