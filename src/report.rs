use stylemask::{PipelineWarning, StyleMaskError};

pub fn report_error(err: &StyleMaskError) {
    match err {
        StyleMaskError::ModelNotFound { path } => {
            eprintln!("Model file not found: {}", path.display());
            eprintln!();
            eprintln!("Please specify the model paths:");
            eprintln!(
                "  - Use --style-model <path> or set {}",
                stylemask::ENV_STYLE_MODEL
            );
            eprintln!(
                "  - Use --segmentation-model <path> or set {} (optional)",
                stylemask::ENV_SEGMENTATION_MODEL
            );
        }
        StyleMaskError::StylizeFailed(message) => {
            eprintln!("Stylization failed: {message}");
            eprintln!("The request can be retried, for example with another style image.");
        }
        _ => {
            eprintln!("{err}");
        }
    }
}

pub fn report_warnings(warnings: &[PipelineWarning]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
        if matches!(warning, PipelineWarning::EmptyMask { .. }) {
            eprintln!("  the mask can be painted by hand, or pass --no-mask to stylize everything");
        }
    }
}
