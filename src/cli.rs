use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::imageops::FilterType;
use stylemask::config::DEFAULT_GARMENT_LABELS;
use stylemask::inference::ChannelLayout;
use stylemask::{ENV_SEGMENTATION_MODEL, ENV_STYLE_MODEL, MaskProcessingOptions};

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Human-parsing ONNX model (heuristic mask when absent)
    #[arg(long = "segmentation-model", env = ENV_SEGMENTATION_MODEL)]
    pub segmentation_model: Option<PathBuf>,
    /// Square input size of the segmentation model
    #[arg(long = "segmentation-size", default_value_t = 512)]
    pub segmentation_size: usize,
    /// Segmentation labels treated as subject
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_GARMENT_LABELS.to_vec())]
    pub labels: Vec<i32>,
    /// Give up on segmentation after this many milliseconds (0 waits forever)
    #[arg(long = "segmentation-timeout-ms", default_value_t = 5000)]
    pub segmentation_timeout_ms: u64,
    /// Intra-op thread count for ORT (None to let ORT decide)
    #[arg(long)]
    pub intra_threads: Option<usize>,
    /// Filter used when aligning masks with the content image
    #[arg(long = "mask-filter", value_enum, default_value_t = ResampleFilter::Triangle)]
    pub mask_filter: ResampleFilter,
    /// Filter used when aligning stylized output with the content image
    #[arg(long = "stylized-filter", value_enum, default_value_t = ResampleFilter::CatmullRom)]
    pub stylized_filter: ResampleFilter,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the subject mask for an image and export it as a PNG
    Mask(MaskCommand),
    /// Blend an already stylized image into the content through a mask
    Composite(CompositeCommand),
    /// Stylize the masked region of an image with a style-transfer model
    Stylize(StylizeCommand),
}

/// Resampling filters for image resizing.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    /// Convert ResampleFilter to image::imageops::FilterType.
    fn from(value: ResampleFilter) -> Self {
        match value {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Tensor layouts accepted by the model adapters.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LayoutArg {
    Nchw,
    Nhwc,
}

impl From<LayoutArg> for ChannelLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Nchw => ChannelLayout::Nchw,
            LayoutArg::Nhwc => ChannelLayout::Nhwc,
        }
    }
}

#[derive(Args, Debug)]
pub struct MaskCommand {
    /// Input image path
    pub input: PathBuf,
    /// Output path (defaults to `<name>-mask.png`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Apply the mask processing chain before export
    #[arg(long)]
    pub processed: bool,
    /// Also export a tinted preview of the mask over the image
    #[arg(long = "preview", value_name = "PATH", num_args = 0..=1)]
    pub preview: Option<Option<PathBuf>>,
    #[command(flatten)]
    pub mask_processing: MaskProcessingArgs,
}

#[derive(Args, Debug)]
pub struct CompositeCommand {
    /// Content image path
    pub content: PathBuf,
    /// Stylized image path (resized to the content if needed)
    pub stylized: PathBuf,
    /// Mask image path; without one the whole image is cross-faded
    #[arg(long)]
    pub mask: Option<PathBuf>,
    /// Blend strength (0.0-1.0)
    #[arg(short, long, default_value_t = 1.0)]
    pub strength: f32,
    /// Output path (defaults to `<name>-composite.png`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub mask_processing: MaskProcessingArgs,
}

#[derive(Args, Debug)]
pub struct StylizeCommand {
    /// Content image path
    pub content: PathBuf,
    /// Style image path
    pub style: PathBuf,
    /// Style-transfer ONNX model
    #[arg(long = "style-model", env = ENV_STYLE_MODEL, default_value = "style.onnx")]
    pub style_model: PathBuf,
    /// Square content input size of the style model
    #[arg(long = "content-size", default_value_t = 384)]
    pub content_size: usize,
    /// Square style input size of the style model
    #[arg(long = "style-size", default_value_t = 256)]
    pub style_size: usize,
    /// Tensor layout of the style model
    #[arg(long, value_enum, default_value_t = LayoutArg::Nhwc)]
    pub layout: LayoutArg,
    /// Pixel value scale of the style model (255 for 0..1 tensors, 1 for 0..255)
    #[arg(long = "value-scale", default_value_t = 255.0)]
    pub value_scale: f32,
    /// Blend strength (0.0-1.0)
    #[arg(short, long, default_value_t = 1.0)]
    pub strength: f32,
    /// Stylize the whole image instead of the masked region
    #[arg(long = "no-mask")]
    pub no_mask: bool,
    /// Output path (defaults to `<name>-stylized.png`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Save the mask used for compositing
    #[arg(long = "export-mask", value_name = "PATH", num_args = 0..=1)]
    pub export_mask: Option<Option<PathBuf>>,
    /// Save the raw stylized image before compositing
    #[arg(long = "export-stylized", value_name = "PATH", num_args = 0..=1)]
    pub export_stylized: Option<Option<PathBuf>>,
    #[command(flatten)]
    pub mask_processing: MaskProcessingArgs,
}

#[derive(Args, Debug)]
pub struct MaskProcessingArgs {
    /// Odd neighbourhood size of the speck cleaner
    #[arg(long = "clean-kernel", default_value_t = 3)]
    pub clean_kernel: u32,
    /// Binarize the mask at this level (0-255 or 0.0-1.0)
    #[arg(long = "mask-threshold", value_parser = parse_mask_threshold)]
    pub mask_threshold: Option<u8>,
    /// Grow the included region by this many pixels
    #[arg(long = "dilation-radius")]
    pub dilation_radius: Option<f32>,
    /// Soften the mask edge with a gaussian of this sigma
    #[arg(long = "feather-sigma")]
    pub feather_sigma: Option<f32>,
}

impl From<&MaskProcessingArgs> for MaskProcessingOptions {
    fn from(args: &MaskProcessingArgs) -> Self {
        Self {
            clean_kernel: args.clean_kernel,
            threshold: args.mask_threshold,
            dilation_radius: args.dilation_radius,
            feather_sigma: args.feather_sigma,
        }
    }
}

fn parse_mask_threshold(value: &str) -> Result<u8, String> {
    if let Ok(int_value) = value.parse::<u8>() {
        return Ok(int_value);
    }

    let float_value = value
        .parse::<f32>()
        .map_err(|_| format!("mask threshold must be numeric (0-255 or 0.0-1.0), got `{value}`"))?;

    if (0.0..=1.0).contains(&float_value) {
        let scaled = (float_value * 255.0).round() as i32;
        return Ok(scaled.clamp(0, 255) as u8);
    }

    Err(format!(
        "mask threshold {value} is out of range; expected 0-255 or 0.0-1.0"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_accepts_bytes_and_fractions() {
        assert_eq!(parse_mask_threshold("200"), Ok(200));
        assert_eq!(parse_mask_threshold("0.5"), Ok(128));
        assert_eq!(parse_mask_threshold("1.0"), Ok(255));
        assert!(parse_mask_threshold("300").is_err());
        assert!(parse_mask_threshold("half").is_err());
    }

    #[test]
    fn labels_parse_comma_separated() {
        let cli = Cli::try_parse_from(["stylemask", "--labels", "4,5", "mask", "in.png"]).unwrap();
        assert_eq!(cli.global.labels, vec![4, 5]);
        assert!(matches!(cli.command, Commands::Mask(_)));
    }

    #[test]
    fn strength_defaults_to_full() {
        let cli = Cli::try_parse_from(["stylemask", "composite", "a.png", "b.png"]).unwrap();
        let Commands::Composite(cmd) = cli.command else {
            panic!("expected composite");
        };
        assert_eq!(cmd.strength, 1.0);
        assert!(cmd.mask.is_none());
    }
}
