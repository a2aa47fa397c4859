//! Show media metadata.

use std::path::PathBuf;

use easycut_common::config::AppConfig;

pub async fn run(config: &AppConfig, file: PathBuf, json: bool) -> anyhow::Result<()> {
    let controller = super::controller(config)?;
    let info = controller
        .get_meta(&file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    if let Some(format) = &info.format {
        println!(
            "  Container: {}",
            format.format_name.as_deref().unwrap_or("unknown")
        );
    }
    match info.duration_secs() {
        Some(d) => println!("  Duration: {d:.2}s"),
        None => println!("  Duration: unknown"),
    }
    println!();

    println!("Streams:");
    for stream in &info.streams {
        let kind = stream.codec_type.as_deref().unwrap_or("unknown");
        let codec = stream.codec_name.as_deref().unwrap_or("?");
        match (stream.width, stream.height) {
            (Some(w), Some(h)) => println!(
                "  #{} {kind}: {codec} {w}x{h}{}",
                stream.index,
                stream
                    .frame_rate()
                    .map(|fps| format!(" @ {fps:.2}fps"))
                    .unwrap_or_default()
            ),
            _ => println!("  #{} {kind}: {codec}", stream.index),
        }
    }

    Ok(())
}
