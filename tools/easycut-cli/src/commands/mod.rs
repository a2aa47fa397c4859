//! Subcommand implementations.

pub mod check;
pub mod convert;
pub mod import;
pub mod init;
pub mod preview;
pub mod probe;
pub mod render;

use easycut_common::config::AppConfig;
use easycut_render_engine::RenderSessionController;

/// Controller for the configured workdir and encoder binaries.
pub(crate) fn controller(config: &AppConfig) -> anyhow::Result<RenderSessionController> {
    RenderSessionController::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to set up renderer: {e}"))
}
