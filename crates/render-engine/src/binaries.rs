//! Locating the ffmpeg/ffprobe binaries.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use easycut_common::config::BinarySource;
use easycut_common::error::{EasycutError, EasycutResult};

/// Resolved encoder binary paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderBinaries {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for EncoderBinaries {
    fn default() -> Self {
        Self::system()
    }
}

impl EncoderBinaries {
    /// `ffmpeg` and `ffprobe` looked up on `PATH` at spawn time.
    pub fn system() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// Resolve binaries for the current platform.
    pub fn resolve(source: &BinarySource) -> EasycutResult<Self> {
        Self::resolve_for(source, std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve binaries as if running on `os`/`arch`.
    ///
    /// Bundled and explicit binaries must exist on disk; `System` is not
    /// checked until a job spawns.
    pub fn resolve_for(source: &BinarySource, os: &str, arch: &str) -> EasycutResult<Self> {
        let binaries = match source {
            BinarySource::System => return Ok(Self::system()),
            BinarySource::Bundled { app_dir } => {
                let (platform_dir, exe_suffix) = bundled_platform(os, arch)?;
                let bin_dir = app_dir.join(platform_dir);
                Self {
                    ffmpeg: bin_dir.join(format!("ffmpeg{exe_suffix}")),
                    ffprobe: bin_dir.join(format!("ffprobe{exe_suffix}")),
                }
            }
            BinarySource::Explicit { ffmpeg, ffprobe } => Self {
                ffmpeg: ffmpeg.clone(),
                ffprobe: ffprobe.clone(),
            },
        };

        for binary in [&binaries.ffmpeg, &binaries.ffprobe] {
            ensure_installed(binary)?;
        }

        tracing::debug!(
            ffmpeg = %binaries.ffmpeg.display(),
            ffprobe = %binaries.ffprobe.display(),
            "Resolved encoder binaries"
        );
        Ok(binaries)
    }

    /// Whether ffmpeg can actually be executed.
    pub fn is_available(&self) -> bool {
        self.version().is_some()
    }

    /// First line of `ffmpeg -version`.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}

fn bundled_platform(os: &str, arch: &str) -> EasycutResult<(&'static str, &'static str)> {
    match (os, arch) {
        ("macos", _) => Ok(("bin/darwin", "")),
        ("windows", "x86_64") => Ok(("bin/win64", ".exe")),
        _ => Err(EasycutError::unsupported(format!(
            "This platform or architecture is currently not supported ({os}/{arch})"
        ))),
    }
}

fn ensure_installed(binary: &Path) -> EasycutResult<()> {
    if binary.is_file() {
        Ok(())
    } else {
        Err(EasycutError::config(format!(
            "Binary not installed! ({})",
            binary.display()
        )))
    }
}
