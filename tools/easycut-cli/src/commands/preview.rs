//! Stream a preview to a file or stdout.

use std::path::PathBuf;

use easycut_common::config::AppConfig;
use easycut_project_model::FilterSpec;
use easycut_render_engine::{PreviewRequest, PREVIEW_MAX_SECS};

pub async fn run(
    config: &AppConfig,
    file: PathBuf,
    seek: f64,
    filters: Vec<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let controller = super::controller(config)?;
    let request = PreviewRequest::new(file)
        .with_seek(seek)
        .with_filters(filters.into_iter().map(FilterSpec::expr).collect());

    let bytes = match &output {
        Some(path) => {
            let mut sink = tokio::fs::File::create(path).await?;
            controller.render_preview(&request, &mut sink).await?
        }
        None => {
            let mut sink = tokio::io::stdout();
            controller.render_preview(&request, &mut sink).await?
        }
    };

    // Stdout may carry the media itself, so the summary goes to stderr.
    eprintln!(
        "Preview of {} ({}s from {}s): {bytes} bytes{}",
        request.path.display(),
        PREVIEW_MAX_SECS,
        request.seek,
        output
            .map(|p| format!(" written to {}", p.display()))
            .unwrap_or_default()
    );
    Ok(())
}
