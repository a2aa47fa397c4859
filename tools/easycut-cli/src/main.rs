//! EasyCut CLI — Command-line interface for rendering and previewing edits.
//!
//! Usage:
//!   easycut render <SESSION>    Render a session file to the master output
//!   easycut preview <FILE>      Stream a 10-second preview to a file or stdout
//!   easycut probe <FILE>        Show container and stream metadata
//!   easycut convert <FILE>      Re-encode a file with the session scheme
//!   easycut import <FILE>       Copy media into a project's videos/ directory
//!   easycut init <PATH>         Write a new session file
//!   easycut check               Check encoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use easycut_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "easycut",
    about = "Cut, filter and join video clips into one master file",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory (overrides config and EASYCUT_WORKDIR)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every work item of a session and join them
    Render {
        /// Session file (scheme, workItems, output)
        session: PathBuf,

        /// Master output base path, without extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remove a render lock left behind by a crashed render
        #[arg(long)]
        force_unlock: bool,

        /// Print encoder diagnostic lines
        #[arg(long)]
        show_ffmpeg: bool,
    },

    /// Stream a short low-resolution preview
    Preview {
        /// Source media
        file: PathBuf,

        /// Start offset in seconds
        #[arg(long, default_value = "0")]
        seek: f64,

        /// Video filter expression, repeatable (e.g. --filter hflip)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show container and stream metadata
    Probe {
        /// Media file
        file: PathBuf,

        /// Print the full metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encode a file to the session scheme
    Convert {
        /// Source media
        file: PathBuf,

        /// Output name inside the working directory, without extension
        #[arg(short, long)]
        name: String,

        /// Session file whose scheme to use; the default scheme otherwise
        #[arg(long)]
        session: Option<PathBuf>,
    },

    /// Copy media next to a project file
    Import {
        /// Media file to copy
        file: PathBuf,

        /// Project file; the copy goes to <project dir>/videos/
        #[arg(short, long)]
        project: PathBuf,
    },

    /// Write a new session file with the default scheme
    Init {
        /// Session file to create
        path: PathBuf,

        /// Source media to add as work items, in order
        #[arg(long = "item")]
        items: Vec<PathBuf>,

        /// Output frame size
        #[arg(long, default_value = "1280x720")]
        size: String,

        /// Output frame rate
        #[arg(long, default_value = "24")]
        fps: f64,
    },

    /// Check encoder availability and configuration
    Check {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(workdir) = cli.workdir {
        config.workdir = workdir;
    }

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    easycut_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            session,
            output,
            force_unlock,
            show_ffmpeg,
        } => commands::render::run(&config, session, output, force_unlock, show_ffmpeg).await,
        Commands::Preview {
            file,
            seek,
            filters,
            output,
        } => commands::preview::run(&config, file, seek, filters, output).await,
        Commands::Probe { file, json } => commands::probe::run(&config, file, json).await,
        Commands::Convert {
            file,
            name,
            session,
        } => commands::convert::run(&config, file, name, session).await,
        Commands::Import { file, project } => commands::import::run(file, project).await,
        Commands::Init {
            path,
            items,
            size,
            fps,
        } => commands::init::run(path, items, size, fps),
        Commands::Check { write_config } => commands::check::run(&config, write_config),
    }
}
