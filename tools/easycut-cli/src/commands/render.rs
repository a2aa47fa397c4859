//! Render a session to the master output.

use std::io::Write;
use std::path::PathBuf;

use easycut_common::config::AppConfig;
use easycut_project_model::RenderSessionConfig;
use easycut_render_engine::RenderEvent;

pub async fn run(
    config: &AppConfig,
    session: PathBuf,
    output: Option<PathBuf>,
    force_unlock: bool,
    show_ffmpeg: bool,
) -> anyhow::Result<()> {
    println!("Rendering session: {}", session.display());

    let mut session_config = RenderSessionConfig::load(&session)
        .map_err(|e| anyhow::anyhow!("Failed to load session: {e}"))?;
    if output.is_some() {
        session_config.output = output;
    }

    let controller = super::controller(config)?;
    if force_unlock && controller.workdir().clear_stale_lock()? {
        println!("  Removed stale render lock");
    }

    let scheme = &session_config.scheme;
    println!("  Work items: {}", session_config.work_items.len());
    println!(
        "  Scheme: {} {} @ {}fps, {} {}",
        scheme.size,
        scheme.codec,
        scheme.fps_arg(),
        scheme.bitrate.to_arg(),
        if scheme.pad { "(padded)" } else { "" }
    );
    println!(
        "  Output: {}",
        session_config
            .output_path(&controller.workdir().default_output_base())
            .display()
    );

    controller.load_session(session_config)?;
    let mut handle = controller.render()?;

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Cancelling...");
                handle.cancel();
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };
        match event {
            RenderEvent::Started { total_items } => {
                tracing::debug!(total_items, "Render started");
            }
            RenderEvent::JobStarted {
                index,
                command_line,
            } => {
                tracing::debug!(index, command = %command_line, "Job started");
            }
            RenderEvent::Progress {
                index,
                job_percent,
                percent,
            } => {
                print!(
                    "\r  Progress: {percent:.1}% (item {}: {})  ",
                    index + 1,
                    job_percent
                        .map(|p| format!("{p:.0}%"))
                        .unwrap_or_else(|| "…".to_string()),
                );
                std::io::stdout().flush().ok();
            }
            RenderEvent::Diagnostic { index, line } => {
                if show_ffmpeg {
                    eprintln!("  [{index}] {line}");
                }
            }
            RenderEvent::FragmentRendered { file_name, .. } => {
                println!("\n  Rendered {file_name}");
            }
            RenderEvent::Concatenating { fragments } => {
                println!("  Joining {fragments} fragments...");
            }
            RenderEvent::Completed { .. } | RenderEvent::Failed { .. } => {}
        }
    }

    match handle.wait().await {
        Ok(outcome) => {
            println!(
                "Render complete: {} ({:.1}s)",
                outcome.output.display(),
                outcome.elapsed_secs
            );
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Render failed: {e}"))
        }
    }
}
