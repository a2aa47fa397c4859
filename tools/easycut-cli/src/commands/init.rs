//! Create a new session file.

use std::path::PathBuf;

use easycut_project_model::{RenderSessionConfig, Scheme, WorkItem};

pub fn run(path: PathBuf, items: Vec<PathBuf>, size: String, fps: f64) -> anyhow::Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!(
            "Session file already exists: {}",
            path.display()
        ));
    }

    let scheme = Scheme {
        size,
        fps,
        ..Scheme::default()
    };
    let session = RenderSessionConfig::builder()
        .scheme(scheme)
        .work_items(items.into_iter().map(WorkItem::new).collect::<Vec<_>>())
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid session: {e}"))?;
    session
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write session: {e}"))?;

    println!("Session created: {}", path.display());
    println!(
        "  Scheme: {} {} @ {}fps, {}",
        session.scheme.size,
        session.scheme.codec,
        session.scheme.fps_arg(),
        session.scheme.bitrate.to_arg()
    );
    println!("  Work items: {}", session.work_items.len());
    println!();
    println!("Edit workItems[].properties to trim (seek, duration), add filters,");
    println!("or switch an item to a complex filter graph (advanced.complex).");

    Ok(())
}
