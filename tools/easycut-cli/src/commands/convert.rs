//! Re-encode a file to the session scheme.

use std::path::PathBuf;

use easycut_common::config::AppConfig;
use easycut_project_model::RenderSessionConfig;

pub async fn run(
    config: &AppConfig,
    file: PathBuf,
    name: String,
    session: Option<PathBuf>,
) -> anyhow::Result<()> {
    let controller = super::controller(config)?;
    if let Some(session) = session {
        let session_config = RenderSessionConfig::load(&session)
            .map_err(|e| anyhow::anyhow!("Failed to load session: {e}"))?;
        controller.set_scheme(session_config.scheme);
    }

    let scheme = controller.scheme();
    println!("Converting {} to {} {}", file.display(), scheme.size, scheme.codec);

    let output = controller
        .convert_to_compliant(&file, &name)
        .await
        .map_err(|e| anyhow::anyhow!("Conversion failed: {e}"))?;
    println!("Converted: {}", output.display());
    Ok(())
}
