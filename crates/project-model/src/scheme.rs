//! Render scheme: the target encode parameters applied to every fragment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Target encode configuration.
///
/// A scheme is plain data. The render session snapshots it when a render
/// starts, so edits made while a render runs only affect the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheme {
    /// Output frame size as `WIDTHxHEIGHT`.
    pub size: String,

    /// Container extension, e.g. `.mp4`.
    pub format: String,

    /// Video codec passed to the encoder (`libx264`, `libvpx-vp9`, ...).
    pub codec: String,

    /// Video bitrate.
    pub bitrate: Bitrate,

    /// Output frame rate.
    pub fps: f64,

    /// Letterbox/pillarbox to the exact frame size instead of stretching.
    pub pad: bool,
}

impl Default for Scheme {
    fn default() -> Self {
        Self {
            size: "1280x720".to_string(),
            format: ".mp4".to_string(),
            codec: "libx264".to_string(),
            bitrate: Bitrate::Text("1000k".to_string()),
            fps: 24.0,
            pad: true,
        }
    }
}

impl Scheme {
    /// Check that every field can be turned into encoder arguments.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.frame_size()?;

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ModelError::InvalidScheme {
                message: format!("fps must be positive, got {}", self.fps),
            });
        }
        if self.codec.trim().is_empty() {
            return Err(ModelError::InvalidScheme {
                message: "codec is empty".to_string(),
            });
        }
        if self.format.trim_start_matches('.').trim().is_empty() {
            return Err(ModelError::InvalidScheme {
                message: "format is empty".to_string(),
            });
        }
        self.bitrate.validate()
    }

    /// Parsed frame size.
    pub fn frame_size(&self) -> Result<FrameSize, ModelError> {
        self.size.parse()
    }

    /// Container extension with a leading dot.
    pub fn file_suffix(&self) -> String {
        let format = self.format.trim();
        if format.starts_with('.') {
            format.to_string()
        } else {
            format!(".{format}")
        }
    }

    /// File name of the fragment rendered for the work item at `index`.
    pub fn fragment_name(&self, index: usize) -> String {
        format!("master{index}{}", self.file_suffix())
    }

    /// Frame rate formatted for the encoder (`24`, `29.97`).
    pub fn fps_arg(&self) -> String {
        format_number(self.fps)
    }
}

/// Video bitrate, given either as encoder text (`"1000k"`, `"2M"`) or as
/// a plain number of kbit/s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bitrate {
    Kbps(u32),
    Text(String),
}

impl Bitrate {
    /// Encoder argument for `-b:v`.
    ///
    /// Bare numbers get a `k` suffix; text that already carries a unit is
    /// passed through.
    pub fn to_arg(&self) -> String {
        match self {
            Bitrate::Kbps(kbps) => format!("{kbps}k"),
            Bitrate::Text(text) => {
                let text = text.trim();
                match text.chars().last() {
                    Some(c) if c.is_ascii_alphabetic() => text.to_string(),
                    _ => format!("{text}k"),
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let Bitrate::Text(text) = self else {
            return Ok(());
        };
        let digits = text.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if digits.is_empty() || digits.parse::<f64>().is_err() {
            return Err(ModelError::InvalidScheme {
                message: format!("invalid bitrate '{text}'"),
            });
        }
        Ok(())
    }
}

impl From<u32> for Bitrate {
    fn from(kbps: u32) -> Self {
        Bitrate::Kbps(kbps)
    }
}

impl From<&str> for Bitrate {
    fn from(text: &str) -> Self {
        Bitrate::Text(text.to_string())
    }
}

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for FrameSize {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidSize {
            value: s.to_string(),
        };
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Format a number for an encoder argument, dropping a zero fraction.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
