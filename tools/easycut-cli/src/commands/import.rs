//! Copy media into a project.

use std::path::PathBuf;

pub async fn run(file: PathBuf, project: PathBuf) -> anyhow::Result<()> {
    let copied = easycut_render_engine::import_media(&file, &project)
        .await
        .map_err(|e| anyhow::anyhow!("Import failed: {e}"))?;
    println!("Imported: {}", copied.display());
    Ok(())
}
