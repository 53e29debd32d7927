//! Render command implementation

use std::path::Path;

use crate::cli::error::CliError;
use crate::config::RenderConfig;
use crate::export::AnnotationRenderer;

pub fn handle_render(
    image: &Path,
    annotations: &Path,
    output: &Path,
    config: RenderConfig,
) -> Result<(), CliError> {
    for path in [image, annotations] {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.to_path_buf()));
        }
    }

    let summary = AnnotationRenderer::new(config).render_to_file(image, annotations, output)?;
    println!(
        "Rendered {} shape(s) onto {}x{} image: {}",
        summary.shapes_drawn,
        summary.width,
        summary.height,
        summary.output_path.display()
    );
    if summary.shapes_skipped > 0 {
        println!("Skipped {} degenerate shape(s)", summary.shapes_skipped);
    }
    Ok(())
}
