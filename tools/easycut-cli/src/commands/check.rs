//! Check encoder availability.

use easycut_common::config::{config_file_path, AppConfig};
use easycut_render_engine::{EncoderBinaries, Workdir};

pub fn run(config: &AppConfig, write_config: bool) -> anyhow::Result<()> {
    println!("EasyCut System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if write_config {
        config.save()?;
        println!("Config written: {}", config_path.display());
    } else if config_path.exists() {
        println!("Config file: {}", config_path.display());
    } else {
        println!("Config file: {} (not found, using defaults)", config_path.display());
        println!("  Write one with: easycut check --write-config");
    }
    println!();

    let binaries = match EncoderBinaries::resolve(&config.encoder.binaries) {
        Ok(binaries) => binaries,
        Err(e) => {
            println!("[FAIL] Encoder binaries: {e}");
            return Ok(());
        }
    };

    let mut ready = true;
    match binaries.version() {
        Some(version) => println!("[OK] ffmpeg: {version}"),
        None => {
            ready = false;
            println!("[FAIL] ffmpeg not runnable: {}", binaries.ffmpeg.display());
        }
    }
    println!("     ffprobe: {}", binaries.ffprobe.display());

    match Workdir::ensure(&config.workdir) {
        Ok(workdir) => println!("[OK] Working directory: {}", workdir.root().display()),
        Err(e) => {
            ready = false;
            println!("[FAIL] Working directory: {e}");
        }
    }

    println!();
    if ready {
        println!("Encoder and working directory are ready.");
    } else {
        println!("Some requirements are missing. See above for fixes.");
    }

    Ok(())
}
